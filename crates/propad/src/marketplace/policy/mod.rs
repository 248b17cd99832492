//! Listing language policy: phrase rules, evaluation, and event recording.

mod rules;

pub use rules::{evaluate, normalize_phrase, PolicyRule, PolicyRuleDraft, PolicySeverity, RuleSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{EventId, ListingId, UserId};
use super::store::{StoreError, StoreTransaction};
use crate::config::PolicyConfig;

/// Characters of source text kept on each policy event.
pub const EXCERPT_CHAR_LIMIT: usize = 250;

/// Phrases hit by a piece of text, each list sorted and de-duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyResult {
    pub blocked: Vec<String>,
    pub flagged: Vec<String>,
}

impl PolicyResult {
    pub fn is_blocked(&self) -> bool {
        !self.blocked.is_empty()
    }

    pub fn has_violations(&self) -> bool {
        self.is_blocked() || !self.flagged.is_empty()
    }
}

/// Immutable record of one phrase hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEvent {
    pub id: EventId,
    pub listing_id: Option<ListingId>,
    pub user_id: Option<UserId>,
    pub phrase: String,
    pub severity: PolicySeverity,
    pub text_excerpt: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPolicyEvent {
    pub listing_id: Option<ListingId>,
    pub user_id: Option<UserId>,
    pub phrase: String,
    pub severity: PolicySeverity,
    pub text_excerpt: String,
}

pub fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHAR_LIMIT).collect()
}

/// Evaluates listing text against the configured phrase lists merged with the
/// rules persisted in the caller's transaction.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    config: PolicyConfig,
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, text: &str, persisted: &[PolicyRule]) -> PolicyResult {
        evaluate(
            text,
            &self.config.block_list,
            &self.config.flag_list,
            persisted,
        )
    }

    /// Dry run against the rules visible in `tx`; nothing is staged.
    pub fn check(&self, tx: &dyn StoreTransaction, text: &str) -> Result<PolicyResult, StoreError> {
        let persisted = tx.policy_rules()?;
        Ok(self.evaluate(text, &persisted))
    }

    /// Evaluate and stage one event per hit on `tx`. The caller commits or discards.
    pub fn record(
        &self,
        tx: &mut dyn StoreTransaction,
        text: &str,
        listing_id: Option<ListingId>,
        user_id: Option<UserId>,
    ) -> Result<PolicyResult, StoreError> {
        let result = self.check(tx, text)?;
        if !result.has_violations() {
            return Ok(result);
        }

        let text_excerpt = excerpt(text);
        let hits = result
            .blocked
            .iter()
            .map(|phrase| (phrase, PolicySeverity::Block))
            .chain(
                result
                    .flagged
                    .iter()
                    .map(|phrase| (phrase, PolicySeverity::Flag)),
            );

        for (phrase, severity) in hits {
            tx.insert_policy_event(NewPolicyEvent {
                listing_id,
                user_id,
                phrase: phrase.clone(),
                severity,
                text_excerpt: text_excerpt.clone(),
            })?;
        }

        debug!(
            listing_id = ?listing_id,
            blocked = result.blocked.len(),
            flagged = result.flagged.len(),
            "staged policy events"
        );
        Ok(result)
    }
}
