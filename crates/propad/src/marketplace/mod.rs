//! Property marketplace core: listings under a language policy gate, moderation,
//! inquiries, and an agent reward ledger.

pub mod access;
pub mod audit;
pub mod domain;
pub mod error;
pub mod money;
pub mod policy;
pub mod rewards;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use access::{authorize, AccessDenied};
pub use audit::AuditEntry;
pub use domain::{
    AgentDashboard, AgentMetrics, Announcement, AnnouncementDraft, Inquiry, InquirySubmission,
    Listing, ListingDraft, ListingId, ListingPurpose, ListingQuery, ListingStatus, ListingUpdate,
    MediaItem, MediaType, PartnerDraft, PartnerIntegration, PropertyType, RuleId, User, UserId,
    UserRegistration, UserRole,
};
pub use error::MarketplaceError;
pub use money::{Money, MoneyError};
pub use policy::{
    evaluate, PolicyEngine, PolicyEvent, PolicyResult, PolicyRule, PolicyRuleDraft,
    PolicySeverity,
};
pub use rewards::{LedgerError, PayoutRequest, RewardLedger, RewardPayout, RewardPool};
pub use router::{marketplace_router, ACTOR_HEADER};
pub use service::MarketplaceService;
pub use store::{MarketplaceStore, MemoryStore, StoreError, StoreTransaction};
