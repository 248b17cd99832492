use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{AuditId, UserId};

/// Append-only record of a committed marketplace write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditId,
    pub user_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<u64>,
    pub details: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Audit entry staged alongside the write it describes.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub user_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<u64>,
    pub details: Option<Value>,
}

impl NewAuditEntry {
    pub fn new(action: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            user_id: None,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: None,
            details: None,
        }
    }

    pub fn by(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn entity(mut self, entity_id: u64) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}
