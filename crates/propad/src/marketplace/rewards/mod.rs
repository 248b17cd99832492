//! Agent reward pool and payout ledger.

mod ledger;

pub use ledger::{LedgerError, RewardLedger};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ListingId, PayoutId, PoolId, UserId};
use super::money::Money;

/// Funds available for agent payouts. `available_amount` never drops below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPool {
    pub id: PoolId,
    pub total_amount: Money,
    pub available_amount: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewRewardPool {
    pub total_amount: Money,
    pub available_amount: Money,
}

/// Deduction from a pool attributed to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPayout {
    pub id: PayoutId,
    pub reward_pool_id: PoolId,
    pub agent_id: UserId,
    pub listing_id: Option<ListingId>,
    pub amount: Money,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRewardPayout {
    pub reward_pool_id: PoolId,
    pub agent_id: UserId,
    pub listing_id: Option<ListingId>,
    pub amount: Money,
    pub reason: String,
}

/// Payout instruction submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub agent_id: UserId,
    #[serde(default)]
    pub listing_id: Option<ListingId>,
    pub amount: Money,
    pub reason: String,
}
