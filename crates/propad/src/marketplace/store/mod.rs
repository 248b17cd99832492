//! Storage collaborator contract. Core components stage writes on a caller-owned
//! transaction and never commit on their own.

mod memory;

pub use memory::MemoryStore;

use super::audit::{AuditEntry, NewAuditEntry};
use super::domain::{
    Announcement, AnnouncementDraft, Inquiry, InquirySubmission, Listing, ListingDraft, ListingId,
    PartnerDraft, PartnerIntegration, PoolId, RuleId, User, UserId, UserRole,
};
use super::policy::{NewPolicyEvent, PolicyEvent, PolicyRule, PolicySeverity};
use super::rewards::{NewRewardPayout, NewRewardPool, RewardPayout, RewardPool};

/// Factory for transactions. Transactions against one store are mutually exclusive.
pub trait MarketplaceStore: Send + Sync {
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError>;
}

/// Unit of work. Dropping a transaction without calling `commit` discards its writes.
pub trait StoreTransaction {
    fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    fn users(&self) -> Result<Vec<User>, StoreError>;
    fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError>;

    fn listing(&self, id: ListingId) -> Result<Option<Listing>, StoreError>;
    fn listings(&self) -> Result<Vec<Listing>, StoreError>;
    fn insert_listing(&mut self, listing: NewListing) -> Result<Listing, StoreError>;
    fn update_listing(&mut self, listing: Listing) -> Result<(), StoreError>;

    fn inquiries(&self) -> Result<Vec<Inquiry>, StoreError>;
    fn insert_inquiry(&mut self, inquiry: NewInquiry) -> Result<Inquiry, StoreError>;

    fn policy_rules(&self) -> Result<Vec<PolicyRule>, StoreError>;
    fn insert_policy_rule(&mut self, rule: NewPolicyRule) -> Result<PolicyRule, StoreError>;
    fn delete_policy_rule(&mut self, id: RuleId) -> Result<PolicyRule, StoreError>;
    /// Newest first.
    fn policy_events(&self, limit: usize) -> Result<Vec<PolicyEvent>, StoreError>;
    /// Re-staging an identical hit for the same listing returns the existing event.
    fn insert_policy_event(&mut self, event: NewPolicyEvent) -> Result<PolicyEvent, StoreError>;

    /// Most recently created pool (creation time, then id, descending).
    fn latest_reward_pool(&self) -> Result<Option<RewardPool>, StoreError>;
    fn reward_pool(&self, id: PoolId) -> Result<Option<RewardPool>, StoreError>;
    fn insert_reward_pool(&mut self, pool: NewRewardPool) -> Result<RewardPool, StoreError>;
    fn update_reward_pool(&mut self, pool: RewardPool) -> Result<(), StoreError>;
    /// Newest first, optionally restricted to one agent.
    fn reward_payouts(&self, agent_id: Option<UserId>) -> Result<Vec<RewardPayout>, StoreError>;
    fn insert_reward_payout(&mut self, payout: NewRewardPayout)
        -> Result<RewardPayout, StoreError>;

    /// Newest first.
    fn announcements(&self) -> Result<Vec<Announcement>, StoreError>;
    fn insert_announcement(
        &mut self,
        announcement: AnnouncementDraft,
    ) -> Result<Announcement, StoreError>;
    /// Newest first.
    fn partners(&self) -> Result<Vec<PartnerIntegration>, StoreError>;
    /// Partner names are unique, compared case-insensitively.
    fn insert_partner(&mut self, partner: PartnerDraft) -> Result<PartnerIntegration, StoreError>;

    /// Newest first.
    fn audit_entries(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError>;
    fn insert_audit_entry(&mut self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
    fn rollback(self: Box<Self>);
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewListing {
    pub draft: ListingDraft,
    pub owner_id: UserId,
    pub agent_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInquiry {
    pub listing_id: ListingId,
    pub submission: InquirySubmission,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPolicyRule {
    pub phrase: String,
    pub severity: PolicySeverity,
    pub description: Option<String>,
}
