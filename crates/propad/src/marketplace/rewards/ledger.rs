use serde_json::json;
use tracing::{debug, info};

use super::{NewRewardPayout, NewRewardPool, PayoutRequest, RewardPayout, RewardPool};
use crate::config::RewardConfig;
use crate::marketplace::audit::NewAuditEntry;
use crate::marketplace::domain::{PoolId, UserId};
use crate::marketplace::money::Money;
use crate::marketplace::store::{MarketplaceStore, StoreError, StoreTransaction};

/// Failures raised while allocating a payout.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("payout amount must be positive (got {0})")]
    NonPositiveAmount(Money),
    #[error("Insufficient reward pool balance (requested {requested}, available {available})")]
    InsufficientFunds { requested: Money, available: Money },
    #[error("reward pool {0} not found")]
    PoolNotFound(PoolId),
    #[error("reward pool seed must not be negative (got {0})")]
    NegativeSeed(Money),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns pool initialization and balance-checked payout allocation.
#[derive(Debug, Clone)]
pub struct RewardLedger {
    config: RewardConfig,
}

impl RewardLedger {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    /// Latest pool visible in `tx`, or a new one seeded from the configured amount.
    pub fn get_or_create_pool(
        &self,
        tx: &mut dyn StoreTransaction,
    ) -> Result<RewardPool, LedgerError> {
        if let Some(pool) = tx.latest_reward_pool()? {
            return Ok(pool);
        }

        let seed = self.config.default_pool_amount;
        if seed.is_negative() {
            return Err(LedgerError::NegativeSeed(seed));
        }
        let pool = tx.insert_reward_pool(NewRewardPool {
            total_amount: seed,
            available_amount: seed,
        })?;
        info!(pool_id = %pool.id, amount = %seed, "reward pool created");
        Ok(pool)
    }

    /// Ensure a pool exists before serving traffic, committing in its own transaction.
    pub fn bootstrap<S>(&self, store: &S) -> Result<RewardPool, LedgerError>
    where
        S: MarketplaceStore + ?Sized,
    {
        let mut tx = store.begin()?;
        let pool = self.get_or_create_pool(tx.as_mut())?;
        tx.commit()?;
        Ok(pool)
    }

    /// Deduct `request.amount` from the pool and stage the payout plus its audit entry.
    ///
    /// The pool is re-read inside `tx`, so the balance check never runs against a stale
    /// copy held by the caller. Amount and balance failures return before anything is
    /// staged; on a store failure the caller must discard `tx`.
    pub fn allocate_payout(
        &self,
        tx: &mut dyn StoreTransaction,
        pool: &RewardPool,
        request: &PayoutRequest,
        performed_by: Option<UserId>,
    ) -> Result<RewardPayout, LedgerError> {
        if !request.amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount(request.amount));
        }

        let mut current = tx
            .reward_pool(pool.id)?
            .ok_or(LedgerError::PoolNotFound(pool.id))?;

        let remaining = current
            .available_amount
            .checked_sub(request.amount)
            .filter(|remaining| !remaining.is_negative())
            .ok_or(LedgerError::InsufficientFunds {
                requested: request.amount,
                available: current.available_amount,
            })?;

        current.available_amount = remaining;
        tx.update_reward_pool(current.clone())?;

        let payout = tx.insert_reward_payout(NewRewardPayout {
            reward_pool_id: current.id,
            agent_id: request.agent_id,
            listing_id: request.listing_id,
            amount: request.amount,
            reason: request.reason.clone(),
        })?;

        let mut audit = NewAuditEntry::new("reward_payout", "RewardPayout")
            .entity(payout.id.0)
            .details(json!({
                "agent_id": request.agent_id,
                "amount": request.amount,
                "reason": request.reason,
                "reward_pool_id": current.id,
                "listing_id": request.listing_id,
            }));
        audit.user_id = performed_by;
        tx.insert_audit_entry(audit)?;

        debug!(
            pool_id = %current.id,
            payout_id = %payout.id,
            remaining = %current.available_amount,
            "staged reward payout"
        );
        Ok(payout)
    }
}
