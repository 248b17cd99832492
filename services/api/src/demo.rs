use crate::infra::{build_marketplace, Marketplace};
use clap::Args;
use propad::config::{AppConfig, PolicyConfig, RewardConfig};
use propad::error::AppError;
use propad::marketplace::{
    InquirySubmission, ListingDraft, ListingPurpose, MarketplaceError, Money, PayoutRequest,
    PolicyEngine, PolicyResult, PropertyType, User, UserRegistration, UserRole,
};

#[derive(Args, Debug)]
pub(crate) struct PolicyCheckArgs {
    /// Listing text to evaluate
    pub(crate) text: String,
    /// Print the result as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Reward pool seed amount
    #[arg(long, default_value = "500.00")]
    pub(crate) pool: Money,
    /// Amount of each demo payout; payouts repeat until the pool refuses
    #[arg(long, default_value = "150.00")]
    pub(crate) payout: Money,
}

pub(crate) fn run_policy_check(args: PolicyCheckArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let engine = PolicyEngine::new(config.policy);
    let result = engine.evaluate(&args.text, &[]);

    if args.json {
        let rendered = serde_json::to_string_pretty(&result)
            .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
        println!("{rendered}");
    } else {
        print!("{}", render_policy_result(&result));
    }
    Ok(())
}

fn render_policy_result(result: &PolicyResult) -> String {
    if !result.has_violations() {
        return "clean: no listed phrases found\n".to_string();
    }

    let mut out = String::new();
    let verdict = if result.is_blocked() {
        "blocked"
    } else {
        "accepted with flags"
    };
    out.push_str(&format!("verdict: {verdict}\n"));
    for phrase in &result.blocked {
        out.push_str(&format!("  block: {phrase}\n"));
    }
    for phrase in &result.flagged {
        out.push_str(&format!("  flag:  {phrase}\n"));
    }
    out
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { pool, payout } = args;

    println!("PropAd marketplace demo");
    let service = build_marketplace(
        PolicyConfig::default(),
        RewardConfig {
            default_pool_amount: pool,
        },
    )?;

    let admin = demo_user(&service, "admin@propad.demo", "Moderation Desk", UserRole::Admin)?;
    let agent = demo_user(&service, "rufaro@propad.demo", "Rufaro Agent", UserRole::Agent)?;
    let landlord = demo_user(&service, "chipo@propad.demo", "Chipo Landlord", UserRole::Landlord)?;
    println!("- Registered admin #{}, agent #{}, landlord #{}", admin.id, agent.id, landlord.id);

    println!("\nListing policy");
    match service.create_listing(
        &landlord,
        demo_draft(
            "Four bedroom house in Mount Pleasant",
            "Borehole, solar geyser. A viewing fee of $20 is payable before inspection.",
        ),
    ) {
        Err(MarketplaceError::PolicyBlocked { blocked }) => {
            println!("- Rejected listing: prohibited phrases {}", blocked.join(", "));
        }
        Ok(listing) => println!("- Unexpectedly accepted listing #{}", listing.id),
        Err(other) => return Err(other.into()),
    }

    let listing = service.create_listing(
        &agent,
        demo_draft(
            "Garden flat in Avondale",
            "Two bedrooms, secure parking. Processing fee applies on signing the lease.",
        ),
    )?;
    println!(
        "- Accepted listing #{} ({}) with flagged language recorded",
        listing.id,
        listing.status.label()
    );
    for event in service.policy_events(&admin, Some(10))? {
        println!(
            "  {} hit '{}' on listing {}",
            event.severity.label(),
            event.phrase,
            event
                .listing_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    let listing = service.approve_listing(&admin, listing.id)?;
    println!("- Approved listing #{} ({})", listing.id, listing.status.label());
    service.create_inquiry(
        listing.id,
        InquirySubmission {
            contact_name: "Tendai".to_string(),
            contact_phone: Some("+263 77 123 4567".to_string()),
            contact_email: None,
            message: "Is the flat available from next month?".to_string(),
            source: "cli-demo".to_string(),
        },
    )?;
    let dashboard = service.agent_dashboard(&agent)?;
    println!(
        "- Agent dashboard: {} listings | {} approved | {} leads",
        dashboard.metrics.listings, dashboard.metrics.approved_listings, dashboard.metrics.leads
    );

    println!("\nReward payouts");
    let mut round = 1;
    loop {
        let request = PayoutRequest {
            agent_id: agent.id,
            listing_id: Some(listing.id),
            amount: payout,
            reason: format!("verified listing bonus (round {round})"),
        };
        match service.create_payout(&admin, request) {
            Ok(recorded) => {
                let pool = service.reward_pool(&admin)?;
                println!(
                    "- Paid {} to agent #{} | pool balance {}",
                    recorded.amount, recorded.agent_id, pool.available_amount
                );
            }
            Err(MarketplaceError::InsufficientFunds {
                requested,
                available,
            }) => {
                println!("- Refused {requested}: only {available} left in the pool");
                break;
            }
            Err(other) => return Err(other.into()),
        }
        round += 1;
    }

    let payouts = service.list_payouts(&agent, None)?;
    let paid = payouts
        .iter()
        .try_fold(Money::ZERO, |total, payout| total.checked_add(payout.amount))
        .unwrap_or(Money::ZERO);
    println!("- {} payouts totalling {paid}", payouts.len());

    Ok(())
}

fn demo_user(
    service: &Marketplace,
    email: &str,
    full_name: &str,
    role: UserRole,
) -> Result<User, MarketplaceError> {
    service.register_user(UserRegistration {
        email: email.to_string(),
        password: "demo-password".to_string(),
        full_name: full_name.to_string(),
        phone_number: None,
        role,
    })
}

fn demo_draft(title: &str, description: &str) -> ListingDraft {
    ListingDraft {
        title: title.to_string(),
        description: description.to_string(),
        price: Money::from_cents(72_000),
        currency: "USD".to_string(),
        location_city: "Harare".to_string(),
        location_area: "Avondale".to_string(),
        bedrooms: Some(2),
        bathrooms: Some(1),
        property_type: PropertyType::Apartment,
        listing_purpose: ListingPurpose::Rent,
        tags: vec!["parking".to_string()],
        amenities: vec!["solar".to_string()],
        media_items: Vec::new(),
    }
}
