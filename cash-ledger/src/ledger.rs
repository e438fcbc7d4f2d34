//! Main settlement ledger orchestration layer
//!
//! Ties storage, row locks and metrics into the two settlement operations:
//! trade settlement (pool → partner) and partner cash-out. Each operation is
//! one unit of work: validate, take the row lock(s), check the applied-event
//! index, load working copies, check and move balances, then commit balances,
//! transfer record and applied-event marker in a single atomic write.
//!
//! # Example
//!
//! ```no_run
//! use cash_ledger::{Config, SettlementLedger};
//! use rust_decimal::Decimal;
//! use uuid::Uuid;
//!
//! fn main() -> cash_ledger::Result<()> {
//!     let ledger = SettlementLedger::open(Config::default())?;
//!     ledger.provision_pool(Decimal::from(1_000_000))?;
//!
//!     let record = ledger.settle_trade(
//!         Uuid::now_v7(),
//!         &"user-1".into(),
//!         &"partner-1".into(),
//!         Decimal::from(300),
//!     )?;
//!     println!("settled transfer {}", record.record_id);
//!     Ok(())
//! }
//! ```

use crate::{
    metrics::Metrics,
    types::{AccountId, Pool, TransferRecord},
    Config, Error, Result, Storage,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Main settlement ledger interface
#[derive(Debug)]
pub struct SettlementLedger {
    /// Storage with row locks
    storage: Arc<Storage>,

    /// Metrics collector
    metrics: Metrics,
}

impl SettlementLedger {
    /// Open ledger with configuration
    pub fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::default();

        Ok(Self { storage, metrics })
    }

    /// Shared storage handle (used by the payment glue)
    pub fn storage(&self) -> Arc<Storage> {
        self.storage.clone()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Settle a completed trade: move `amount` from the pool to the partner
    ///
    /// Single atomic unit of work under the pool lock, then the partner
    /// account lock. The pool must be provisioned; the partner account is
    /// created at zero if absent, but only materializes when the commit
    /// lands. Redelivered events are rejected via the applied-event index.
    pub fn settle_trade(
        &self,
        event_id: Uuid,
        user_id: &AccountId,
        partner_id: &AccountId,
        amount: Decimal,
    ) -> Result<TransferRecord> {
        Self::validate_amount(amount).map_err(|e| self.reject(e))?;

        // Lock order: pool before account, always
        let pool_lock = self.storage.pool_lock();
        let _pool_guard = pool_lock.lock();
        let account_lock = self.storage.account_lock(partner_id);
        let _account_guard = account_lock.lock();

        let start = Instant::now();

        self.check_not_applied(event_id).map_err(|e| self.reject(e))?;

        let mut pool = self.storage.get_pool()?.ok_or(Error::PoolNotFound)?;
        pool.debit(amount).map_err(|e| self.reject(e))?;

        let mut account = self.storage.get_or_create_account(partner_id)?;
        account.credit(amount);

        let record = TransferRecord::trade_settlement(
            event_id,
            user_id.clone(),
            partner_id.clone(),
            amount,
        );

        self.storage.commit_transfer(Some(&pool), &account, &record)?;

        self.metrics.record_trade_settled();
        self.metrics
            .record_commit_duration(start.elapsed().as_secs_f64());

        tracing::info!(
            record_id = %record.record_id,
            event_id = %event_id,
            user_id = %user_id,
            partner_id = %partner_id,
            %amount,
            pool_balance = %pool.balance,
            "Trade settlement committed"
        );

        Ok(record)
    }

    /// Settle a partner cash-out: move `amount` out of the partner account
    ///
    /// Single atomic unit of work under the partner account lock. A missing
    /// account is treated as a zero-balance account, so the cash-out fails
    /// for insufficiency, not for absence.
    pub fn settle_partner_cashout(
        &self,
        event_id: Uuid,
        partner_id: &AccountId,
        amount: Decimal,
    ) -> Result<TransferRecord> {
        Self::validate_amount(amount).map_err(|e| self.reject(e))?;

        let account_lock = self.storage.account_lock(partner_id);
        let _account_guard = account_lock.lock();

        let start = Instant::now();

        self.check_not_applied(event_id).map_err(|e| self.reject(e))?;

        let mut account = self.storage.get_or_create_account(partner_id)?;
        account.debit(amount).map_err(|e| self.reject(e))?;

        let record = TransferRecord::partner_cashout(event_id, partner_id.clone(), amount);

        self.storage.commit_transfer(None, &account, &record)?;

        self.metrics.record_cashout_settled();
        self.metrics
            .record_commit_duration(start.elapsed().as_secs_f64());

        tracing::info!(
            record_id = %record.record_id,
            event_id = %event_id,
            partner_id = %partner_id,
            %amount,
            account_balance = %account.balance,
            "Partner cash-out committed"
        );

        Ok(record)
    }

    /// Provision the settlement pool with an opening balance
    ///
    /// Fails with [`Error::PoolAlreadyProvisioned`] on a second call; the
    /// pool is a single row and is never re-created.
    pub fn provision_pool(&self, opening_balance: Decimal) -> Result<()> {
        if opening_balance < Decimal::ZERO {
            return Err(Error::InvalidAmount(opening_balance));
        }

        let pool_lock = self.storage.pool_lock();
        let _guard = pool_lock.lock();

        if self.storage.get_pool()?.is_some() {
            return Err(Error::PoolAlreadyProvisioned);
        }

        self.storage.put_pool(&Pool::new(opening_balance))?;
        tracing::info!(%opening_balance, "Settlement pool provisioned");
        Ok(())
    }

    /// Current pool balance
    pub fn pool_balance(&self) -> Result<Decimal> {
        Ok(self
            .storage
            .get_pool()?
            .ok_or(Error::PoolNotFound)?
            .balance)
    }

    /// Current account balance, zero when the account does not exist yet
    pub fn account_balance(&self, id: &AccountId) -> Result<Decimal> {
        Ok(self
            .storage
            .get_account(id)?
            .map(|a| a.balance)
            .unwrap_or(Decimal::ZERO))
    }

    /// Whether the account row has been materialized
    pub fn account_exists(&self, id: &AccountId) -> Result<bool> {
        Ok(self.storage.get_account(id)?.is_some())
    }

    /// Transfer record by ID
    pub fn get_transfer(&self, record_id: Uuid) -> Result<Option<TransferRecord>> {
        self.storage.get_transfer(record_id)
    }

    /// Transfer records involving one partner, oldest first
    pub fn partner_transfers(&self, partner_id: &AccountId) -> Result<Vec<TransferRecord>> {
        self.storage.get_partner_transfers(partner_id)
    }

    /// Total number of transfer records ever committed
    pub fn transfer_count(&self) -> Result<u64> {
        self.storage.transfer_count()
    }

    fn validate_amount(amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }
        Ok(())
    }

    fn check_not_applied(&self, event_id: Uuid) -> Result<()> {
        if self.storage.applied_event(event_id)?.is_some() {
            return Err(Error::DuplicateEvent(event_id));
        }
        Ok(())
    }

    /// Count the rejection before handing the error back
    fn reject(&self, err: Error) -> Error {
        if err.is_rejection() {
            self.metrics.record_rejection(err.kind());
        }
        err
    }
}
