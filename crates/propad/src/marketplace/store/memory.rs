use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use super::{
    MarketplaceStore, NewInquiry, NewListing, NewPolicyRule, NewUser, StoreError,
    StoreTransaction,
};
use crate::marketplace::audit::{AuditEntry, NewAuditEntry};
use crate::marketplace::domain::{
    Announcement, AnnouncementDraft, AnnouncementId, AuditId, EventId, Inquiry, InquiryId,
    Listing, ListingId, ListingStatus, PartnerDraft, PartnerId, PartnerIntegration, PayoutId,
    PoolId, RuleId, User, UserId,
};
use crate::marketplace::policy::{NewPolicyEvent, PolicyEvent, PolicyRule};
use crate::marketplace::rewards::{NewRewardPayout, NewRewardPool, RewardPayout, RewardPool};

#[derive(Debug, Clone, Default)]
struct Sequences {
    user: u64,
    listing: u64,
    inquiry: u64,
    rule: u64,
    event: u64,
    pool: u64,
    payout: u64,
    announcement: u64,
    partner: u64,
    audit: u64,
}

fn next(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    sequences: Sequences,
    users: BTreeMap<UserId, User>,
    listings: BTreeMap<ListingId, Listing>,
    inquiries: Vec<Inquiry>,
    policy_rules: BTreeMap<RuleId, PolicyRule>,
    policy_events: Vec<PolicyEvent>,
    reward_pools: BTreeMap<PoolId, RewardPool>,
    reward_payouts: Vec<RewardPayout>,
    announcements: Vec<Announcement>,
    partners: Vec<PartnerIntegration>,
    audit_log: Vec<AuditEntry>,
}

/// In-process store. A transaction holds the lock for its whole lifetime. Reads go
/// straight to the shared state; the first write takes a private copy that replaces the
/// shared state only on commit, so a dropped transaction leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryStore {
    fn open(&self) -> MemoryTransaction<'_> {
        // Shared state is only ever replaced wholesale, so a poisoned lock still guards
        // a consistent snapshot.
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        MemoryTransaction {
            guard,
            working: None,
        }
    }
}

impl MarketplaceStore for MemoryStore {
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        Ok(Box::new(self.open()))
    }
}

struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, StoreState>,
    /// Private copy, taken on the first write.
    working: Option<StoreState>,
}

impl MemoryTransaction<'_> {
    fn state(&self) -> &StoreState {
        self.working.as_ref().unwrap_or(&*self.guard)
    }

    fn state_mut(&mut self) -> &mut StoreState {
        let MemoryTransaction { guard, working } = self;
        working.get_or_insert_with(|| (**guard).clone())
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.state().users.get(&id).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .state()
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.state().users.values().cloned().collect())
    }

    fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError> {
        if self.user_by_email(&user.email)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "email '{}' already registered",
                user.email
            )));
        }

        let state = self.state_mut();
        let record = User {
            id: UserId(next(&mut state.sequences.user)),
            email: user.email,
            full_name: user.full_name,
            phone_number: user.phone_number,
            role: user.role,
            is_active: true,
            created_at: Utc::now(),
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    fn listing(&self, id: ListingId) -> Result<Option<Listing>, StoreError> {
        Ok(self.state().listings.get(&id).cloned())
    }

    fn listings(&self) -> Result<Vec<Listing>, StoreError> {
        Ok(self.state().listings.values().cloned().collect())
    }

    fn insert_listing(&mut self, listing: NewListing) -> Result<Listing, StoreError> {
        let NewListing {
            draft,
            owner_id,
            agent_id,
        } = listing;
        let now = Utc::now();
        let state = self.state_mut();

        let record = Listing {
            id: ListingId(next(&mut state.sequences.listing)),
            title: draft.title,
            description: draft.description,
            price: draft.price,
            currency: draft.currency,
            location_city: draft.location_city,
            location_area: draft.location_area,
            bedrooms: draft.bedrooms,
            bathrooms: draft.bathrooms,
            property_type: draft.property_type,
            listing_purpose: draft.listing_purpose,
            status: ListingStatus::PendingReview,
            is_featured: false,
            tags: draft.tags,
            amenities: draft.amenities,
            media_items: draft.media_items,
            owner_id,
            agent_id,
            verified_at: None,
            created_at: now,
            updated_at: now,
        };
        state.listings.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_listing(&mut self, listing: Listing) -> Result<(), StoreError> {
        match self.state_mut().listings.get_mut(&listing.id) {
            Some(slot) => {
                *slot = listing;
                Ok(())
            }
            None => Err(StoreError::NotFound("listing")),
        }
    }

    fn inquiries(&self) -> Result<Vec<Inquiry>, StoreError> {
        Ok(self.state().inquiries.clone())
    }

    fn insert_inquiry(&mut self, inquiry: NewInquiry) -> Result<Inquiry, StoreError> {
        let NewInquiry {
            listing_id,
            submission,
        } = inquiry;

        let state = self.state_mut();
        let record = Inquiry {
            id: InquiryId(next(&mut state.sequences.inquiry)),
            listing_id,
            contact_name: submission.contact_name,
            contact_phone: submission.contact_phone,
            contact_email: submission.contact_email,
            message: submission.message,
            source: submission.source,
            created_at: Utc::now(),
        };
        state.inquiries.push(record.clone());
        Ok(record)
    }

    fn policy_rules(&self) -> Result<Vec<PolicyRule>, StoreError> {
        Ok(self.state().policy_rules.values().cloned().collect())
    }

    fn insert_policy_rule(&mut self, rule: NewPolicyRule) -> Result<PolicyRule, StoreError> {
        if self
            .state()
            .policy_rules
            .values()
            .any(|existing| existing.phrase == rule.phrase)
        {
            return Err(StoreError::Conflict(format!(
                "policy rule '{}' already exists",
                rule.phrase
            )));
        }

        let state = self.state_mut();
        let record = PolicyRule {
            id: RuleId(next(&mut state.sequences.rule)),
            phrase: rule.phrase,
            severity: rule.severity,
            description: rule.description,
            created_at: Utc::now(),
        };
        state.policy_rules.insert(record.id, record.clone());
        Ok(record)
    }

    fn delete_policy_rule(&mut self, id: RuleId) -> Result<PolicyRule, StoreError> {
        if !self.state().policy_rules.contains_key(&id) {
            return Err(StoreError::NotFound("policy rule"));
        }
        self.state_mut()
            .policy_rules
            .remove(&id)
            .ok_or(StoreError::NotFound("policy rule"))
    }

    fn policy_events(&self, limit: usize) -> Result<Vec<PolicyEvent>, StoreError> {
        Ok(self
            .state()
            .policy_events
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    fn insert_policy_event(&mut self, event: NewPolicyEvent) -> Result<PolicyEvent, StoreError> {
        if event.listing_id.is_some() {
            if let Some(existing) = self.state().policy_events.iter().find(|existing| {
                existing.listing_id == event.listing_id
                    && existing.phrase == event.phrase
                    && existing.severity == event.severity
            }) {
                return Ok(existing.clone());
            }
        }

        let state = self.state_mut();
        let record = PolicyEvent {
            id: EventId(next(&mut state.sequences.event)),
            listing_id: event.listing_id,
            user_id: event.user_id,
            phrase: event.phrase,
            severity: event.severity,
            text_excerpt: event.text_excerpt,
            created_at: Utc::now(),
        };
        state.policy_events.push(record.clone());
        Ok(record)
    }

    fn latest_reward_pool(&self) -> Result<Option<RewardPool>, StoreError> {
        Ok(self
            .state()
            .reward_pools
            .values()
            .max_by_key(|pool| (pool.created_at, pool.id))
            .cloned())
    }

    fn reward_pool(&self, id: PoolId) -> Result<Option<RewardPool>, StoreError> {
        Ok(self.state().reward_pools.get(&id).cloned())
    }

    fn insert_reward_pool(&mut self, pool: NewRewardPool) -> Result<RewardPool, StoreError> {
        let state = self.state_mut();
        let record = RewardPool {
            id: PoolId(next(&mut state.sequences.pool)),
            total_amount: pool.total_amount,
            available_amount: pool.available_amount,
            created_at: Utc::now(),
        };
        state.reward_pools.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_reward_pool(&mut self, pool: RewardPool) -> Result<(), StoreError> {
        match self.state_mut().reward_pools.get_mut(&pool.id) {
            Some(slot) => {
                *slot = pool;
                Ok(())
            }
            None => Err(StoreError::NotFound("reward pool")),
        }
    }

    fn reward_payouts(&self, agent_id: Option<UserId>) -> Result<Vec<RewardPayout>, StoreError> {
        Ok(self
            .state()
            .reward_payouts
            .iter()
            .rev()
            .filter(|payout| agent_id.map_or(true, |agent| payout.agent_id == agent))
            .cloned()
            .collect())
    }

    fn insert_reward_payout(
        &mut self,
        payout: NewRewardPayout,
    ) -> Result<RewardPayout, StoreError> {
        let state = self.state_mut();
        let record = RewardPayout {
            id: PayoutId(next(&mut state.sequences.payout)),
            reward_pool_id: payout.reward_pool_id,
            agent_id: payout.agent_id,
            listing_id: payout.listing_id,
            amount: payout.amount,
            reason: payout.reason,
            created_at: Utc::now(),
        };
        state.reward_payouts.push(record.clone());
        Ok(record)
    }

    fn announcements(&self) -> Result<Vec<Announcement>, StoreError> {
        Ok(self.state().announcements.iter().rev().cloned().collect())
    }

    fn insert_announcement(
        &mut self,
        announcement: AnnouncementDraft,
    ) -> Result<Announcement, StoreError> {
        let state = self.state_mut();
        let record = Announcement {
            id: AnnouncementId(next(&mut state.sequences.announcement)),
            title: announcement.title,
            body: announcement.body,
            is_active: announcement.is_active,
            audience: announcement.audience,
            created_at: Utc::now(),
        };
        state.announcements.push(record.clone());
        Ok(record)
    }

    fn partners(&self) -> Result<Vec<PartnerIntegration>, StoreError> {
        Ok(self.state().partners.iter().rev().cloned().collect())
    }

    fn insert_partner(&mut self, partner: PartnerDraft) -> Result<PartnerIntegration, StoreError> {
        let taken = self.state().partners.iter().any(|existing| {
            existing.name.to_lowercase() == partner.name.to_lowercase()
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "partner '{}' already registered",
                partner.name
            )));
        }

        let state = self.state_mut();
        let record = PartnerIntegration {
            id: PartnerId(next(&mut state.sequences.partner)),
            name: partner.name,
            contact_email: partner.contact_email,
            webhook_url: partner.webhook_url,
            integration_metadata: partner.integration_metadata,
            created_at: Utc::now(),
        };
        state.partners.push(record.clone());
        Ok(record)
    }

    fn audit_entries(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        Ok(self
            .state()
            .audit_log
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    fn insert_audit_entry(&mut self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError> {
        let state = self.state_mut();
        let record = AuditEntry {
            id: AuditId(next(&mut state.sequences.audit)),
            user_id: entry.user_id,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            details: entry.details,
            created_at: Utc::now(),
        };
        state.audit_log.push(record.clone());
        Ok(record)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, working } = *self;
        if let Some(working) = working {
            *guard = working;
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) {}
}
