use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::domain::RuleId;
use super::PolicyResult;

/// Whether a phrase hit rejects the text or is only recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicySeverity {
    Block,
    Flag,
}

impl PolicySeverity {
    pub const fn label(self) -> &'static str {
        match self {
            PolicySeverity::Block => "block",
            PolicySeverity::Flag => "flag",
        }
    }
}

/// Admin-managed phrase rule persisted alongside the configured lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: RuleId,
    pub phrase: String,
    pub severity: PolicySeverity,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Inbound rule definition from an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRuleDraft {
    pub phrase: String,
    pub severity: PolicySeverity,
    #[serde(default)]
    pub description: Option<String>,
}

/// Lowercased phrase with its whitespace intact; `None` for blank input.
///
/// Surrounding spaces are part of the phrase, so `" rent "` only matches the word
/// standing on its own.
pub fn normalize_phrase(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_lowercase())
    }
}

/// Candidate phrases after merging configured lists with persisted rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    blocked: BTreeSet<String>,
    flagged: BTreeSet<String>,
}

impl RuleSet {
    pub fn merge(
        configured_block: &[String],
        configured_flag: &[String],
        persisted: &[PolicyRule],
    ) -> Self {
        let persisted_with = |severity: PolicySeverity| {
            persisted
                .iter()
                .filter(move |rule| rule.severity == severity)
                .map(|rule| rule.phrase.as_str())
        };

        let blocked = configured_block
            .iter()
            .map(String::as_str)
            .chain(persisted_with(PolicySeverity::Block))
            .filter_map(normalize_phrase)
            .collect();
        let flagged = configured_flag
            .iter()
            .map(String::as_str)
            .chain(persisted_with(PolicySeverity::Flag))
            .filter_map(normalize_phrase)
            .collect();

        Self { blocked, flagged }
    }

    pub fn blocked(&self) -> impl Iterator<Item = &str> {
        self.blocked.iter().map(String::as_str)
    }

    pub fn flagged(&self) -> impl Iterator<Item = &str> {
        self.flagged.iter().map(String::as_str)
    }

    /// Scan text for literal, case-insensitive phrase hits. Block wins over flag.
    pub fn scan(&self, text: &str) -> PolicyResult {
        let haystack = text.to_lowercase();

        let blocked: Vec<String> = self
            .blocked
            .iter()
            .filter(|phrase| haystack.contains(phrase.as_str()))
            .cloned()
            .collect();
        let flagged = self
            .flagged
            .iter()
            .filter(|phrase| haystack.contains(phrase.as_str()) && !self.blocked.contains(*phrase))
            .cloned()
            .collect();

        PolicyResult { blocked, flagged }
    }
}

/// Evaluate text against the configured lists merged with persisted rules.
///
/// Both outputs are de-duplicated and sorted lexicographically, so repeated calls on
/// the same inputs are identical.
pub fn evaluate(
    text: &str,
    configured_block: &[String],
    configured_flag: &[String],
    persisted: &[PolicyRule],
) -> PolicyResult {
    RuleSet::merge(configured_block, configured_flag, persisted).scan(text)
}
