//! Core types for the settlement ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable external identifier for a partner or user account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId::new(s)
    }
}

/// Partner or user balance row
///
/// Created lazily on first credit or debit with a zero balance; never deleted
/// by the ledger. The balance is checked before any debit commits, so a
/// committed `Account` never holds a negative balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// External identifier (unique, immutable once created)
    pub external_id: AccountId,

    /// Current balance (exact decimal, never negative)
    pub balance: Decimal,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last balance change timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Fresh account with zero balance
    pub fn new(external_id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            external_id,
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add to the balance
    pub fn credit(&mut self, amount: Decimal) {
        self.balance += amount;
        self.updated_at = Utc::now();
    }

    /// Subtract from the balance, failing before the balance can go negative
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        if self.balance < amount {
            return Err(Error::InsufficientAccountFunds {
                account: self.external_id.clone(),
                required: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// The operator's settlement pool
///
/// Exactly one instance, stored under a fixed key. Provisioned out-of-band;
/// the settlement paths never create it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    /// Current balance (never negative)
    pub balance: Decimal,

    /// Provisioning timestamp
    pub created_at: DateTime<Utc>,

    /// Last balance change timestamp
    pub updated_at: DateTime<Utc>,
}

impl Pool {
    /// Provision the pool with an opening balance
    pub fn new(opening_balance: Decimal) -> Self {
        let now = Utc::now();
        Self {
            balance: opening_balance,
            created_at: now,
            updated_at: now,
        }
    }

    /// Subtract from the pool, failing before the balance can go negative
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        if self.balance < amount {
            return Err(Error::InsufficientPoolFunds {
                required: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Kind of balance movement; direction is implied by the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransferKind {
    /// Pool → partner, triggered by a completed trade
    TradeSettlement = 1,
    /// Partner → external settlement
    PartnerCashout = 2,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::TradeSettlement => write!(f, "trade_settlement"),
            TransferKind::PartnerCashout => write!(f, "partner_cashout"),
        }
    }
}

/// Immutable audit entry, one per completed balance movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Record ID (UUIDv7 for time-ordering, storage key)
    pub record_id: Uuid,

    /// Kind of movement
    pub kind: TransferKind,

    /// Counterpart user (trade settlements only)
    pub user_id: Option<AccountId>,

    /// Partner credited or debited
    pub partner_id: AccountId,

    /// Amount moved (strictly positive)
    pub amount: Decimal,

    /// Source event ID (idempotency key)
    pub event_id: Uuid,

    /// Commit timestamp
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Record for a pool → partner trade settlement
    pub fn trade_settlement(
        event_id: Uuid,
        user_id: AccountId,
        partner_id: AccountId,
        amount: Decimal,
    ) -> Self {
        Self {
            record_id: Uuid::now_v7(),
            kind: TransferKind::TradeSettlement,
            user_id: Some(user_id),
            partner_id,
            amount,
            event_id,
            created_at: Utc::now(),
        }
    }

    /// Record for a partner cash-out (no user counterpart)
    pub fn partner_cashout(event_id: Uuid, partner_id: AccountId, amount: Decimal) -> Self {
        Self {
            record_id: Uuid::now_v7(),
            kind: TransferKind::PartnerCashout,
            user_id: None,
            partner_id,
            amount,
            event_id,
            created_at: Utc::now(),
        }
    }
}

/// Payment intake row (charge of an end user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Payment ID (UUIDv7, storage key)
    pub payment_id: Uuid,

    /// Gateway payment reference
    pub reference: String,

    /// Gateway status, stored verbatim
    pub status: String,

    /// Charged user
    pub user_id: AccountId,

    /// Charged amount
    pub amount: Decimal,

    /// Charge timestamp
    pub charged_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_credit_debit() {
        let mut account = Account::new(AccountId::new("partner-1"));
        assert_eq!(account.balance, Decimal::ZERO);

        account.credit(Decimal::from(300));
        assert_eq!(account.balance, Decimal::from(300));

        account.debit(Decimal::from(100)).unwrap();
        assert_eq!(account.balance, Decimal::from(200));
    }

    #[test]
    fn test_account_debit_insufficient() {
        let mut account = Account::new(AccountId::new("partner-1"));
        account.credit(Decimal::from(300));

        let err = account.debit(Decimal::from(500)).unwrap_err();
        assert!(matches!(err, Error::InsufficientAccountFunds { .. }));
        // Balance untouched after a failed debit
        assert_eq!(account.balance, Decimal::from(300));
    }

    #[test]
    fn test_pool_debit_insufficient() {
        let mut pool = Pool::new(Decimal::from(200));
        let err = pool.debit(Decimal::from(300)).unwrap_err();
        assert!(matches!(err, Error::InsufficientPoolFunds { .. }));
        assert_eq!(pool.balance, Decimal::from(200));
    }

    #[test]
    fn test_transfer_record_counterparts() {
        let trade = TransferRecord::trade_settlement(
            Uuid::now_v7(),
            AccountId::new("u1"),
            AccountId::new("p1"),
            Decimal::from(300),
        );
        assert_eq!(trade.kind, TransferKind::TradeSettlement);
        assert_eq!(trade.user_id, Some(AccountId::new("u1")));

        let cashout =
            TransferRecord::partner_cashout(Uuid::now_v7(), AccountId::new("p1"), Decimal::from(50));
        assert_eq!(cashout.kind, TransferKind::PartnerCashout);
        assert_eq!(cashout.user_id, None);
    }
}
