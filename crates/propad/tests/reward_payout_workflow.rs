//! Reward pool scenarios exercised through the service facade: bootstrap, exact
//! balance accounting, and refusal once the pool is exhausted.

use std::sync::Arc;

use propad::config::{PolicyConfig, RewardConfig};
use propad::marketplace::{
    MarketplaceError, MarketplaceService, MemoryStore, Money, PayoutRequest, User,
    UserRegistration, UserRole,
};

fn service(seed: &str) -> MarketplaceService<MemoryStore> {
    MarketplaceService::new(
        Arc::new(MemoryStore::new()),
        PolicyConfig::default(),
        RewardConfig {
            default_pool_amount: seed.parse().expect("valid seed"),
        },
    )
}

fn register(service: &MarketplaceService<MemoryStore>, email: &str, role: UserRole) -> User {
    service
        .register_user(UserRegistration {
            email: email.to_string(),
            password: "hunter2hunter2".to_string(),
            full_name: "Integration User".to_string(),
            phone_number: None,
            role,
        })
        .expect("registration succeeds")
}

fn payout(agent: &User, amount: &str) -> PayoutRequest {
    PayoutRequest {
        agent_id: agent.id,
        listing_id: None,
        amount: amount.parse().expect("valid amount"),
        reason: "qualified lead".to_string(),
    }
}

#[test]
fn bootstrap_seeds_the_configured_amount() {
    let service = service("125.75");
    let pool = service.bootstrap().expect("bootstrap");
    assert_eq!(pool.total_amount, Money::from_cents(12_575));
    assert_eq!(pool.available_amount, Money::from_cents(12_575));
}

#[test]
fn pool_drains_to_zero_then_refuses_further_payouts() {
    let service = service("500.00");
    let admin = register(&service, "admin@example.test", UserRole::Admin);
    let agent = register(&service, "agent@example.test", UserRole::Agent);

    service
        .create_payout(&admin, payout(&agent, "500.00"))
        .expect("exact balance succeeds");

    match service.create_payout(&admin, payout(&agent, "0.01")) {
        Err(MarketplaceError::InsufficientFunds { available, .. }) => {
            assert_eq!(available, Money::ZERO);
        }
        other => panic!("expected insufficient funds, got {other:?}"),
    }

    let pool = service.reward_pool(&admin).expect("pool");
    assert_eq!(pool.available_amount, Money::ZERO);
    assert_eq!(service.list_payouts(&agent, None).expect("payouts").len(), 1);
}

#[test]
fn many_small_payouts_accumulate_exactly() {
    let service = service("10.00");
    let admin = register(&service, "admin@example.test", UserRole::Admin);
    let agent = register(&service, "agent@example.test", UserRole::Agent);

    for _ in 0..33 {
        service
            .create_payout(&admin, payout(&agent, "0.30"))
            .expect("fits");
    }

    let pool = service.reward_pool(&agent).expect("pool");
    assert_eq!(pool.available_amount, Money::from_cents(10));
    assert!(matches!(
        service.create_payout(&admin, payout(&agent, "0.30")),
        Err(MarketplaceError::InsufficientFunds { .. })
    ));
}
