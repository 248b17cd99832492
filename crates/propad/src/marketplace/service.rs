use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use super::access::{authorize, ADMIN_ONLY, LISTING_AUTHORS, REWARD_VIEWERS};
use super::audit::{AuditEntry, NewAuditEntry};
use super::domain::{
    listing_text, AgentDashboard, AgentMetrics, Announcement, AnnouncementDraft, Inquiry,
    InquirySubmission, Listing, ListingDraft, ListingId, ListingQuery, ListingStatus,
    ListingUpdate, PartnerDraft, PartnerIntegration, RuleId, User, UserId, UserRegistration,
    UserRole,
};
use super::error::MarketplaceError;
use super::policy::{
    normalize_phrase, PolicyEngine, PolicyEvent, PolicyResult, PolicyRule, PolicyRuleDraft,
};
use super::rewards::{LedgerError, PayoutRequest, RewardLedger, RewardPayout, RewardPool};
use super::store::{
    MarketplaceStore, NewInquiry, NewListing, NewPolicyRule, NewUser, StoreTransaction,
};
use crate::config::{PolicyConfig, RewardConfig};

pub const MIN_PASSWORD_CHARS: usize = 8;
pub const MIN_REJECTION_REASON_CHARS: usize = 3;
pub const AUDIT_LOG_LIMIT: usize = 200;
pub const DEFAULT_POLICY_EVENT_LIMIT: usize = 100;
pub const MAX_POLICY_EVENT_LIMIT: usize = 500;
pub const MIN_PARTNER_NAME_CHARS: usize = 3;

/// Marketplace use cases. Every operation runs in one store transaction and commits
/// only after its capability check, policy gate and audit entry succeed.
pub struct MarketplaceService<S> {
    store: Arc<S>,
    policy: Arc<PolicyEngine>,
    ledger: Arc<RewardLedger>,
}

impl<S> MarketplaceService<S>
where
    S: MarketplaceStore + 'static,
{
    pub fn new(store: Arc<S>, policy: PolicyConfig, rewards: RewardConfig) -> Self {
        Self {
            store,
            policy: Arc::new(PolicyEngine::new(policy)),
            ledger: Arc::new(RewardLedger::new(rewards)),
        }
    }

    /// Create the reward pool ahead of the first request.
    pub fn bootstrap(&self) -> Result<RewardPool, MarketplaceError> {
        Ok(self.ledger.bootstrap(self.store.as_ref())?)
    }

    pub fn register_user(&self, registration: UserRegistration) -> Result<User, MarketplaceError> {
        let email = registration.email.trim().to_lowercase();
        if !is_plausible_email(&email) {
            return Err(MarketplaceError::validation("email address is not valid"));
        }
        if registration.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(MarketplaceError::validation(format!(
                "password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }
        let full_name = registration.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(MarketplaceError::validation("full_name must not be empty"));
        }

        let mut tx = self.store.begin()?;
        let user = tx.insert_user(NewUser {
            email,
            full_name,
            phone_number: registration.phone_number,
            role: registration.role,
        })?;
        tx.insert_audit_entry(
            NewAuditEntry::new("user_registered", "User")
                .by(user.id)
                .entity(user.id.0)
                .details(json!({ "role": user.role })),
        )?;
        tx.commit()?;

        info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Resolve an active user as the acting identity.
    pub fn actor(&self, user_id: UserId) -> Result<User, MarketplaceError> {
        let tx = self.store.begin()?;
        tx.user(user_id)?
            .filter(|user| user.is_active)
            .ok_or(MarketplaceError::Unauthenticated)
    }

    pub fn list_agents(&self) -> Result<Vec<User>, MarketplaceError> {
        let tx = self.store.begin()?;
        Ok(tx
            .users()?
            .into_iter()
            .filter(|user| user.is_active && user.role == UserRole::Agent)
            .collect())
    }

    pub fn agent_dashboard(&self, actor: &User) -> Result<AgentDashboard, MarketplaceError> {
        authorize(actor.role, REWARD_VIEWERS)?;
        let tx = self.store.begin()?;

        let assigned: Vec<Listing> = tx
            .listings()?
            .into_iter()
            .filter(|listing| listing.agent_id == Some(actor.id))
            .collect();
        let assigned_ids: BTreeSet<ListingId> = assigned.iter().map(|listing| listing.id).collect();
        let leads = tx
            .inquiries()?
            .iter()
            .filter(|inquiry| assigned_ids.contains(&inquiry.listing_id))
            .count();

        Ok(AgentDashboard {
            agent: actor.clone(),
            metrics: AgentMetrics {
                listings: assigned.len(),
                leads,
                approved_listings: assigned
                    .iter()
                    .filter(|listing| listing.status == ListingStatus::Approved)
                    .count(),
            },
        })
    }

    pub fn create_listing(
        &self,
        actor: &User,
        draft: ListingDraft,
    ) -> Result<Listing, MarketplaceError> {
        authorize(actor.role, LISTING_AUTHORS)?;
        validate_draft(&draft)?;

        let mut tx = self.store.begin()?;
        let text = listing_text(&draft.title, &draft.description);
        self.screen(tx.as_ref(), &text, None, actor)?;

        let listing = tx.insert_listing(NewListing {
            draft,
            owner_id: actor.id,
            agent_id: (actor.role == UserRole::Agent).then_some(actor.id),
        })?;
        let result = self
            .policy
            .record(tx.as_mut(), &text, Some(listing.id), Some(actor.id))?;
        tx.insert_audit_entry(
            NewAuditEntry::new("listing_created", "Listing")
                .by(actor.id)
                .entity(listing.id.0)
                .details(json!({ "flagged_terms": result.flagged })),
        )?;
        tx.commit()?;

        info!(
            listing_id = %listing.id,
            owner_id = %actor.id,
            flagged = result.flagged.len(),
            "listing created"
        );
        Ok(listing)
    }

    pub fn update_listing(
        &self,
        actor: &User,
        id: ListingId,
        update: ListingUpdate,
    ) -> Result<Listing, MarketplaceError> {
        let mut tx = self.store.begin()?;
        let mut listing = tx.listing(id)?.ok_or(MarketplaceError::NotFound("listing"))?;

        let is_admin = actor.role == UserRole::Admin;
        if !is_admin && listing.owner_id != actor.id {
            return Err(MarketplaceError::forbidden(
                "only the listing owner or an admin may update it",
            ));
        }
        if !is_admin && (update.status.is_some() || update.is_featured.is_some()) {
            return Err(MarketplaceError::forbidden(
                "only an admin may change listing status or featuring",
            ));
        }
        validate_update(&update)?;

        let flagged = if update.touches_text() {
            let text = update.policy_text_for(&listing);
            self.screen(tx.as_ref(), &text, Some(id), actor)?;
            self.policy
                .record(tx.as_mut(), &text, Some(id), Some(actor.id))?
                .flagged
        } else {
            Vec::new()
        };

        let fields = update.changed_fields();
        update.apply_to(&mut listing);
        listing.updated_at = Utc::now();
        tx.update_listing(listing.clone())?;
        tx.insert_audit_entry(
            NewAuditEntry::new("listing_updated", "Listing")
                .by(actor.id)
                .entity(id.0)
                .details(json!({ "fields": fields, "flagged_terms": flagged })),
        )?;
        tx.commit()?;

        info!(listing_id = %id, actor_id = %actor.id, ?fields, "listing updated");
        Ok(listing)
    }

    pub fn get_listing(
        &self,
        viewer: Option<&User>,
        id: ListingId,
    ) -> Result<Listing, MarketplaceError> {
        let tx = self.store.begin()?;
        let listing = tx.listing(id)?.ok_or(MarketplaceError::NotFound("listing"))?;
        if listing.is_visible_to(viewer.map(|user| user.id)) {
            Ok(listing)
        } else {
            Err(MarketplaceError::forbidden("listing is not published"))
        }
    }

    /// Approved listings matching `query`, featured first, then newest.
    pub fn list_public_listings(
        &self,
        query: &ListingQuery,
    ) -> Result<Vec<Listing>, MarketplaceError> {
        let limit = query.limit.unwrap_or(ListingQuery::DEFAULT_LIMIT);
        if !(1..=ListingQuery::MAX_LIMIT).contains(&limit) {
            return Err(MarketplaceError::validation(format!(
                "limit must be between 1 and {}",
                ListingQuery::MAX_LIMIT
            )));
        }

        let tx = self.store.begin()?;
        let mut listings: Vec<Listing> = tx
            .listings()?
            .into_iter()
            .filter(|listing| listing.status == ListingStatus::Approved && query.matches(listing))
            .collect();
        listings.sort_by_key(|listing| {
            (
                Reverse(listing.is_featured),
                Reverse(listing.created_at),
                Reverse(listing.id),
            )
        });
        listings.truncate(limit);
        Ok(listings)
    }

    /// Listings the actor owns or is assigned to as agent, newest first.
    pub fn list_my_listings(&self, actor: &User) -> Result<Vec<Listing>, MarketplaceError> {
        let tx = self.store.begin()?;
        let mut listings: Vec<Listing> = tx
            .listings()?
            .into_iter()
            .filter(|listing| listing.owner_id == actor.id || listing.agent_id == Some(actor.id))
            .collect();
        listings.sort_by_key(|listing| (Reverse(listing.created_at), Reverse(listing.id)));
        Ok(listings)
    }

    /// Moderation queue, oldest first.
    pub fn pending_listings(&self, actor: &User) -> Result<Vec<Listing>, MarketplaceError> {
        authorize(actor.role, ADMIN_ONLY)?;
        let tx = self.store.begin()?;
        let mut listings: Vec<Listing> = tx
            .listings()?
            .into_iter()
            .filter(|listing| listing.status == ListingStatus::PendingReview)
            .collect();
        listings.sort_by_key(|listing| (listing.created_at, listing.id));
        Ok(listings)
    }

    pub fn approve_listing(
        &self,
        actor: &User,
        id: ListingId,
    ) -> Result<Listing, MarketplaceError> {
        authorize(actor.role, ADMIN_ONLY)?;
        let mut tx = self.store.begin()?;
        let mut listing = tx.listing(id)?.ok_or(MarketplaceError::NotFound("listing"))?;

        let now = Utc::now();
        listing.status = ListingStatus::Approved;
        listing.verified_at = Some(now);
        listing.updated_at = now;
        tx.update_listing(listing.clone())?;
        tx.insert_audit_entry(
            NewAuditEntry::new("listing_approved", "Listing")
                .by(actor.id)
                .entity(id.0),
        )?;
        tx.commit()?;

        info!(listing_id = %id, admin_id = %actor.id, "listing approved");
        Ok(listing)
    }

    pub fn reject_listing(
        &self,
        actor: &User,
        id: ListingId,
        reason: &str,
    ) -> Result<Listing, MarketplaceError> {
        authorize(actor.role, ADMIN_ONLY)?;
        let reason = reason.trim();
        if reason.chars().count() < MIN_REJECTION_REASON_CHARS {
            return Err(MarketplaceError::validation(format!(
                "rejection reason must be at least {MIN_REJECTION_REASON_CHARS} characters"
            )));
        }

        let mut tx = self.store.begin()?;
        let mut listing = tx.listing(id)?.ok_or(MarketplaceError::NotFound("listing"))?;
        listing.status = ListingStatus::Rejected;
        listing.updated_at = Utc::now();
        tx.update_listing(listing.clone())?;
        tx.insert_audit_entry(
            NewAuditEntry::new("listing_rejected", "Listing")
                .by(actor.id)
                .entity(id.0)
                .details(json!({ "reason": reason })),
        )?;
        tx.commit()?;

        info!(listing_id = %id, admin_id = %actor.id, "listing rejected");
        Ok(listing)
    }

    pub fn create_policy_rule(
        &self,
        actor: &User,
        draft: PolicyRuleDraft,
    ) -> Result<PolicyRule, MarketplaceError> {
        authorize(actor.role, ADMIN_ONLY)?;
        let phrase = normalize_phrase(&draft.phrase)
            .ok_or_else(|| MarketplaceError::validation("phrase must not be empty"))?;

        let mut tx = self.store.begin()?;
        let rule = tx.insert_policy_rule(NewPolicyRule {
            phrase,
            severity: draft.severity,
            description: draft.description,
        })?;
        tx.insert_audit_entry(
            NewAuditEntry::new("policy_rule_created", "PolicyRule")
                .by(actor.id)
                .entity(rule.id.0)
                .details(json!({ "phrase": rule.phrase, "severity": rule.severity })),
        )?;
        tx.commit()?;

        info!(rule_id = %rule.id, severity = rule.severity.label(), "policy rule created");
        Ok(rule)
    }

    pub fn delete_policy_rule(
        &self,
        actor: &User,
        id: RuleId,
    ) -> Result<PolicyRule, MarketplaceError> {
        authorize(actor.role, ADMIN_ONLY)?;
        let mut tx = self.store.begin()?;
        let rule = tx.delete_policy_rule(id)?;
        tx.insert_audit_entry(
            NewAuditEntry::new("policy_rule_deleted", "PolicyRule")
                .by(actor.id)
                .entity(id.0)
                .details(json!({ "phrase": rule.phrase })),
        )?;
        tx.commit()?;

        info!(rule_id = %id, "policy rule deleted");
        Ok(rule)
    }

    pub fn list_policy_rules(&self, actor: &User) -> Result<Vec<PolicyRule>, MarketplaceError> {
        authorize(actor.role, ADMIN_ONLY)?;
        let tx = self.store.begin()?;
        Ok(tx.policy_rules()?)
    }

    /// Newest events first; `limit` is clamped to `1..=MAX_POLICY_EVENT_LIMIT`.
    pub fn policy_events(
        &self,
        actor: &User,
        limit: Option<usize>,
    ) -> Result<Vec<PolicyEvent>, MarketplaceError> {
        authorize(actor.role, ADMIN_ONLY)?;
        let limit = limit
            .unwrap_or(DEFAULT_POLICY_EVENT_LIMIT)
            .clamp(1, MAX_POLICY_EVENT_LIMIT);
        let tx = self.store.begin()?;
        Ok(tx.policy_events(limit)?)
    }

    /// Evaluate text against the merged rule set without recording anything.
    pub fn check_text(&self, _actor: &User, text: &str) -> Result<PolicyResult, MarketplaceError> {
        let tx = self.store.begin()?;
        Ok(self.policy.check(tx.as_ref(), text)?)
    }

    pub fn create_inquiry(
        &self,
        listing_id: ListingId,
        submission: InquirySubmission,
    ) -> Result<Inquiry, MarketplaceError> {
        if submission.contact_name.trim().is_empty() {
            return Err(MarketplaceError::validation("contact_name must not be empty"));
        }
        if submission.message.trim().is_empty() {
            return Err(MarketplaceError::validation("message must not be empty"));
        }

        let mut tx = self.store.begin()?;
        tx.listing(listing_id)?
            .filter(|listing| listing.status == ListingStatus::Approved)
            .ok_or(MarketplaceError::NotFound("listing"))?;

        let inquiry = tx.insert_inquiry(NewInquiry {
            listing_id,
            submission,
        })?;
        tx.insert_audit_entry(
            NewAuditEntry::new("inquiry_created", "Inquiry")
                .entity(inquiry.id.0)
                .details(json!({ "listing_id": listing_id, "source": inquiry.source })),
        )?;
        tx.commit()?;

        info!(inquiry_id = %inquiry.id, listing_id = %listing_id, "inquiry received");
        Ok(inquiry)
    }

    pub fn reward_pool(&self, actor: &User) -> Result<RewardPool, MarketplaceError> {
        authorize(actor.role, REWARD_VIEWERS)?;
        let mut tx = self.store.begin()?;
        let pool = self.ledger.get_or_create_pool(tx.as_mut())?;
        tx.commit()?;
        Ok(pool)
    }

    /// Agents only ever see their own payouts; admins may filter by agent.
    pub fn list_payouts(
        &self,
        actor: &User,
        agent_filter: Option<UserId>,
    ) -> Result<Vec<RewardPayout>, MarketplaceError> {
        authorize(actor.role, REWARD_VIEWERS)?;
        let agent = match actor.role {
            UserRole::Agent => Some(actor.id),
            _ => agent_filter,
        };
        let tx = self.store.begin()?;
        Ok(tx.reward_payouts(agent)?)
    }

    pub fn create_payout(
        &self,
        actor: &User,
        request: PayoutRequest,
    ) -> Result<RewardPayout, MarketplaceError> {
        authorize(actor.role, ADMIN_ONLY)?;
        if request.reason.trim().is_empty() {
            return Err(MarketplaceError::validation("reason must not be empty"));
        }

        let mut tx = self.store.begin()?;
        tx.user(request.agent_id)?
            .filter(|user| user.role == UserRole::Agent)
            .ok_or(MarketplaceError::NotFound("agent"))?;
        if let Some(listing_id) = request.listing_id {
            tx.listing(listing_id)?
                .ok_or(MarketplaceError::NotFound("listing"))?;
        }

        let pool = self.ledger.get_or_create_pool(tx.as_mut())?;
        let payout = match self
            .ledger
            .allocate_payout(tx.as_mut(), &pool, &request, Some(actor.id))
        {
            Ok(payout) => payout,
            Err(LedgerError::InsufficientFunds {
                requested,
                available,
            }) => {
                warn!(
                    agent_id = %request.agent_id,
                    %requested,
                    %available,
                    "payout rejected: insufficient reward pool balance"
                );
                return Err(MarketplaceError::InsufficientFunds {
                    requested,
                    available,
                });
            }
            Err(other) => return Err(other.into()),
        };
        tx.commit()?;

        info!(
            payout_id = %payout.id,
            agent_id = %payout.agent_id,
            amount = %payout.amount,
            "reward payout recorded"
        );
        Ok(payout)
    }

    pub fn create_announcement(
        &self,
        actor: &User,
        draft: AnnouncementDraft,
    ) -> Result<Announcement, MarketplaceError> {
        authorize(actor.role, ADMIN_ONLY)?;
        if draft.title.trim().is_empty() {
            return Err(MarketplaceError::validation("title must not be empty"));
        }
        if draft.body.trim().is_empty() {
            return Err(MarketplaceError::validation("body must not be empty"));
        }

        let mut tx = self.store.begin()?;
        let details = json!({
            "title": draft.title,
            "body": draft.body,
            "is_active": draft.is_active,
            "audience": draft.audience,
        });
        let announcement = tx.insert_announcement(draft)?;
        tx.insert_audit_entry(
            NewAuditEntry::new("announcement_created", "Announcement")
                .by(actor.id)
                .entity(announcement.id.0)
                .details(details),
        )?;
        tx.commit()?;

        info!(
            announcement_id = %announcement.id,
            audience = %announcement.audience,
            "announcement created"
        );
        Ok(announcement)
    }

    pub fn list_announcements(&self, actor: &User) -> Result<Vec<Announcement>, MarketplaceError> {
        authorize(actor.role, ADMIN_ONLY)?;
        let tx = self.store.begin()?;
        Ok(tx.announcements()?)
    }

    pub fn register_partner(
        &self,
        actor: &User,
        mut draft: PartnerDraft,
    ) -> Result<PartnerIntegration, MarketplaceError> {
        authorize(actor.role, ADMIN_ONLY)?;
        draft.name = draft.name.trim().to_string();
        if draft.name.chars().count() < MIN_PARTNER_NAME_CHARS {
            return Err(MarketplaceError::validation(format!(
                "partner name must be at least {MIN_PARTNER_NAME_CHARS} characters"
            )));
        }
        if let Some(email) = draft.contact_email.as_deref() {
            if !is_plausible_email(email) {
                return Err(MarketplaceError::validation("contact_email is not valid"));
            }
        }

        let mut tx = self.store.begin()?;
        let details = json!({
            "name": draft.name,
            "contact_email": draft.contact_email,
            "webhook_url": draft.webhook_url,
            "integration_metadata": draft.integration_metadata,
        });
        let partner = tx.insert_partner(draft)?;
        tx.insert_audit_entry(
            NewAuditEntry::new("partner_registered", "PartnerIntegration")
                .by(actor.id)
                .entity(partner.id.0)
                .details(details),
        )?;
        tx.commit()?;

        info!(partner_id = %partner.id, name = %partner.name, "partner registered");
        Ok(partner)
    }

    pub fn list_partners(
        &self,
        actor: &User,
    ) -> Result<Vec<PartnerIntegration>, MarketplaceError> {
        authorize(actor.role, ADMIN_ONLY)?;
        let tx = self.store.begin()?;
        Ok(tx.partners()?)
    }

    pub fn audit_log(&self, actor: &User) -> Result<Vec<AuditEntry>, MarketplaceError> {
        authorize(actor.role, ADMIN_ONLY)?;
        let tx = self.store.begin()?;
        Ok(tx.audit_entries(AUDIT_LOG_LIMIT)?)
    }

    /// Policy gate for listing text. A blocked result aborts the caller's transaction.
    fn screen(
        &self,
        tx: &dyn StoreTransaction,
        text: &str,
        listing_id: Option<ListingId>,
        actor: &User,
    ) -> Result<PolicyResult, MarketplaceError> {
        let result = self.policy.check(tx, text)?;
        if result.is_blocked() {
            warn!(
                actor_id = %actor.id,
                listing_id = ?listing_id,
                blocked = ?result.blocked,
                "listing rejected by policy"
            );
            return Err(MarketplaceError::PolicyBlocked {
                blocked: result.blocked,
            });
        }
        Ok(result)
    }
}

fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn validate_draft(draft: &ListingDraft) -> Result<(), MarketplaceError> {
    if draft.title.trim().is_empty() {
        return Err(MarketplaceError::validation("title must not be empty"));
    }
    if draft.description.trim().is_empty() {
        return Err(MarketplaceError::validation("description must not be empty"));
    }
    if draft.location_city.trim().is_empty() {
        return Err(MarketplaceError::validation("location_city must not be empty"));
    }
    if draft.price.is_negative() {
        return Err(MarketplaceError::validation("price must not be negative"));
    }
    Ok(())
}

fn validate_update(update: &ListingUpdate) -> Result<(), MarketplaceError> {
    let blank = |value: &Option<String>| value.as_deref().is_some_and(|v| v.trim().is_empty());
    if blank(&update.title) {
        return Err(MarketplaceError::validation("title must not be empty"));
    }
    if blank(&update.description) {
        return Err(MarketplaceError::validation("description must not be empty"));
    }
    if blank(&update.location_city) {
        return Err(MarketplaceError::validation("location_city must not be empty"));
    }
    if update.price.is_some_and(|price| price.is_negative()) {
        return Err(MarketplaceError::validation("price must not be negative"));
    }
    Ok(())
}
