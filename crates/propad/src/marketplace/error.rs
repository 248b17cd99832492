use super::access::AccessDenied;
use super::money::Money;
use super::rewards::LedgerError;
use super::store::StoreError;

/// Failures surfaced by marketplace operations.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("{0}")]
    Validation(String),
    #[error("Listing contains prohibited language")]
    PolicyBlocked { blocked: Vec<String> },
    #[error("Insufficient reward pool balance (requested {requested}, available {available})")]
    InsufficientFunds { requested: Money, available: Money },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(StoreError),
}

impl MarketplaceError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

impl From<AccessDenied> for MarketplaceError {
    fn from(value: AccessDenied) -> Self {
        Self::Forbidden(value.to_string())
    }
}

impl From<StoreError> for MarketplaceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::NotFound(entity) => Self::NotFound(entity),
            other => Self::Store(other),
        }
    }
}

impl From<LedgerError> for MarketplaceError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::NonPositiveAmount(amount) => {
                Self::Validation(format!("payout amount must be positive (got {amount})"))
            }
            LedgerError::InsufficientFunds {
                requested,
                available,
            } => Self::InsufficientFunds {
                requested,
                available,
            },
            LedgerError::PoolNotFound(_) => Self::NotFound("reward pool"),
            LedgerError::NegativeSeed(seed) => {
                Self::Validation(format!("reward pool seed must not be negative (got {seed})"))
            }
            LedgerError::Store(err) => err.into(),
        }
    }
}
