//! Error types for the settlement ledger

use crate::types::AccountId;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Two families matter downstream: business rejections (the event is
/// permanently unsatisfiable as sent, the dispatcher acks it) and
/// infrastructure/configuration faults (the dispatcher re-raises so the bus
/// redelivers). [`Error::is_rejection`] encodes the split.
#[derive(Error, Debug)]
pub enum Error {
    /// Settlement pool row is missing (must be provisioned out-of-band)
    #[error("Settlement pool not found: provision it before settling trades")]
    PoolNotFound,

    /// Pool provisioning attempted a second time
    #[error("Settlement pool already provisioned")]
    PoolAlreadyProvisioned,

    /// Pool balance cannot cover the requested debit
    #[error("Insufficient pool funds: required {required}, available {available}")]
    InsufficientPoolFunds {
        /// Amount the settlement needed
        required: Decimal,
        /// Pool balance at check time
        available: Decimal,
    },

    /// Account balance cannot cover the requested debit
    #[error("Insufficient funds in account {account}: required {required}, available {available}")]
    InsufficientAccountFunds {
        /// Account that was checked
        account: AccountId,
        /// Amount the cash-out needed
        required: Decimal,
        /// Account balance at check time
        available: Decimal,
    },

    /// Event carried a zero or negative amount
    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(Decimal),

    /// Event ID was already applied (at-least-once redelivery)
    #[error("Duplicate event: {0} already applied")]
    DuplicateEvent(Uuid),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for recognized business rejections: the dispatcher acknowledges
    /// these without redelivery. Everything else (including `PoolNotFound`,
    /// which signals misconfiguration) propagates.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InsufficientPoolFunds { .. }
                | Error::InsufficientAccountFunds { .. }
                | Error::InvalidAmount(_)
                | Error::DuplicateEvent(_)
        )
    }

    /// Stable snake_case name, used as a metric label and in structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::PoolNotFound => "pool_not_found",
            Error::PoolAlreadyProvisioned => "pool_already_provisioned",
            Error::InsufficientPoolFunds { .. } => "insufficient_pool_funds",
            Error::InsufficientAccountFunds { .. } => "insufficient_account_funds",
            Error::InvalidAmount(_) => "invalid_amount",
            Error::DuplicateEvent(_) => "duplicate_event",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_routing() {
        assert!(Error::InsufficientPoolFunds {
            required: Decimal::from(100),
            available: Decimal::from(50),
        }
        .is_rejection());
        assert!(Error::InvalidAmount(Decimal::ZERO).is_rejection());
        assert!(Error::DuplicateEvent(Uuid::now_v7()).is_rejection());

        // Misconfiguration and infrastructure are faults, not rejections
        assert!(!Error::PoolNotFound.is_rejection());
        assert!(!Error::Storage("db closed".to_string()).is_rejection());
    }
}
