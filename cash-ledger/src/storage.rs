//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Partner/user balance rows (key: external_id)
//! - `pool` - The settlement pool singleton (key: fixed)
//! - `transfers` - Append-only transfer records (key: record_id)
//! - `payments` - Payment intake rows (key: payment_id)
//! - `indices` - Secondary indices for listings (key: tag || len(id) || id || uuid)
//! - `applied_events` - event_id → record_id, makes redelivery idempotent
//!
//! # Row locks
//!
//! RocksDB gives durability and batch atomicity but no row-level isolation,
//! so the store owns the locks: one mutex for the pool and a per-account lock
//! registry. Callers take the lock for the whole unit of work; lock order is
//! always pool before account, so the two-lock trade path cannot deadlock
//! against single-lock paths.

use crate::{
    error::{Error, Result},
    types::{Account, AccountId, Payment, Pool, TransferRecord},
    Config,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_POOL: &str = "pool";
const CF_TRANSFERS: &str = "transfers";
const CF_PAYMENTS: &str = "payments";
const CF_INDICES: &str = "indices";
const CF_APPLIED_EVENTS: &str = "applied_events";

/// Fixed key of the pool singleton row
const POOL_KEY: &[u8] = b"settlement-pool";

/// Tag bytes separating the two index families in `indices`
const IDX_TRANSFER: u8 = b't';
const IDX_PAYMENT: u8 = b'p';

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,

    /// Serializes units of work touching the pool row
    pool_lock: Arc<Mutex<()>>,

    /// Per-account lock registry; entries are created on first touch and
    /// never removed (account rows are never deleted either)
    account_locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_balances()),
            ColumnFamilyDescriptor::new(CF_POOL, Self::cf_options_balances()),
            ColumnFamilyDescriptor::new(CF_TRANSFERS, Self::cf_options_append_only()),
            ColumnFamilyDescriptor::new(CF_PAYMENTS, Self::cf_options_append_only()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_APPLIED_EVENTS, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB with 6 column families");

        Ok(Self {
            db: Arc::new(db),
            pool_lock: Arc::new(Mutex::new(())),
            account_locks: DashMap::new(),
        })
    }

    // Column family options

    fn cf_options_balances() -> Options {
        let mut opts = Options::default();
        // Balance rows are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_append_only() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Point lookups on the applied-event index benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Row locks

    /// Lock serializing units of work against the pool row
    pub fn pool_lock(&self) -> Arc<Mutex<()>> {
        self.pool_lock.clone()
    }

    /// Lock serializing units of work against one account row
    pub fn account_lock(&self, id: &AccountId) -> Arc<Mutex<()>> {
        self.account_locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // Account operations

    /// Get account by external ID
    pub fn get_account(&self, id: &AccountId) -> Result<Option<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;

        match self.db.get_cf(&cf, id.as_str().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Get account, or a fresh zero-balance working copy when absent
    ///
    /// The fresh copy is not persisted here; it materializes only when the
    /// enclosing unit of work commits. A failed operation leaves no row.
    pub fn get_or_create_account(&self, id: &AccountId) -> Result<Account> {
        match self.get_account(id)? {
            Some(account) => Ok(account),
            None => Ok(Account::new(id.clone())),
        }
    }

    // Pool operations

    /// Get the settlement pool, if provisioned
    pub fn get_pool(&self) -> Result<Option<Pool>> {
        let cf = self.cf_handle(CF_POOL)?;

        match self.db.get_cf(&cf, POOL_KEY)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Write the pool row (provisioning only; settlement paths go through
    /// [`Storage::commit_transfer`])
    pub fn put_pool(&self, pool: &Pool) -> Result<()> {
        let cf = self.cf_handle(CF_POOL)?;
        let value = bincode::serialize(pool)?;
        self.db.put_cf(&cf, POOL_KEY, &value)?;
        Ok(())
    }

    // Idempotency

    /// Record ID of an already-applied event, if any
    pub fn applied_event(&self, event_id: Uuid) -> Result<Option<Uuid>> {
        let cf = self.cf_handle(CF_APPLIED_EVENTS)?;

        match self.db.get_cf(&cf, event_id.as_bytes())? {
            Some(value) => {
                let bytes: [u8; 16] = value
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Corrupt applied-event entry".to_string()))?;
                Ok(Some(Uuid::from_bytes(bytes)))
            }
            None => Ok(None),
        }
    }

    // Atomic commits

    /// Commit one settlement movement: balances, transfer record, partner
    /// index and applied-event marker land in a single WriteBatch
    ///
    /// `pool` is present for trade settlements (the pool was debited) and
    /// absent for cash-outs.
    pub fn commit_transfer(
        &self,
        pool: Option<&Pool>,
        account: &Account,
        record: &TransferRecord,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        // 1. Pool balance (trade settlements only)
        if let Some(pool) = pool {
            let cf_pool = self.cf_handle(CF_POOL)?;
            batch.put_cf(&cf_pool, POOL_KEY, &bincode::serialize(pool)?);
        }

        // 2. Account balance
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        batch.put_cf(
            &cf_accounts,
            account.external_id.as_str().as_bytes(),
            &bincode::serialize(account)?,
        );

        // 3. Transfer record
        let cf_transfers = self.cf_handle(CF_TRANSFERS)?;
        batch.put_cf(
            &cf_transfers,
            record.record_id.as_bytes(),
            &bincode::serialize(record)?,
        );

        // 4. Index: partner_id || record_id -> empty
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx_partner = Self::index_key(IDX_TRANSFER, &record.partner_id, record.record_id);
        batch.put_cf(&cf_indices, &idx_partner, &[]);

        // 5. Applied-event marker: event_id -> record_id
        let cf_applied = self.cf_handle(CF_APPLIED_EVENTS)?;
        batch.put_cf(
            &cf_applied,
            record.event_id.as_bytes(),
            record.record_id.as_bytes(),
        );

        self.db.write(batch)?;

        Ok(())
    }

    /// Commit one payment charge: payment row, credited account and user
    /// index in a single WriteBatch
    pub fn commit_charge(&self, account: &Account, payment: &Payment) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_payments = self.cf_handle(CF_PAYMENTS)?;
        batch.put_cf(
            &cf_payments,
            payment.payment_id.as_bytes(),
            &bincode::serialize(payment)?,
        );

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        batch.put_cf(
            &cf_accounts,
            account.external_id.as_str().as_bytes(),
            &bincode::serialize(account)?,
        );

        // Index: user_id || payment_id -> empty
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx_user = Self::index_key(IDX_PAYMENT, &payment.user_id, payment.payment_id);
        batch.put_cf(&cf_indices, &idx_user, &[]);

        self.db.write(batch)?;

        Ok(())
    }

    // Transfer log reads

    /// Get transfer record by ID
    pub fn get_transfer(&self, record_id: Uuid) -> Result<Option<TransferRecord>> {
        let cf = self.cf_handle(CF_TRANSFERS)?;

        match self.db.get_cf(&cf, record_id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Transfer records involving one partner, oldest first
    ///
    /// Record IDs are UUIDv7, so index order is commit order.
    pub fn get_partner_transfers(&self, partner_id: &AccountId) -> Result<Vec<TransferRecord>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let prefix = Self::index_prefix(IDX_TRANSFER, partner_id);
        let iter = self.db.prefix_iterator_cf(&cf_indices, &prefix);

        let mut records = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }

            // Suffix of the key (last 16 bytes) is the record_id
            if key.len() >= prefix.len() + 16 {
                let id_bytes: [u8; 16] = key[key.len() - 16..]
                    .try_into()
                    .map_err(|_| Error::Storage("Corrupt index entry".to_string()))?;
                let record_id = Uuid::from_bytes(id_bytes);

                if let Some(record) = self.get_transfer(record_id)? {
                    records.push(record);
                }
            }
        }

        Ok(records)
    }

    /// Exact count of transfer records (full scan; audit tests only)
    pub fn transfer_count(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_TRANSFERS)?;

        let mut count = 0u64;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            item?;
            count += 1;
        }

        Ok(count)
    }

    // Payment reads

    /// Payments charged by one user, oldest first
    pub fn get_user_payments(&self, user_id: &AccountId) -> Result<Vec<Payment>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let cf_payments = self.cf_handle(CF_PAYMENTS)?;

        let prefix = Self::index_prefix(IDX_PAYMENT, user_id);
        let iter = self.db.prefix_iterator_cf(&cf_indices, &prefix);

        let mut payments = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }

            if key.len() >= prefix.len() + 16 {
                let id_bytes: [u8; 16] = key[key.len() - 16..]
                    .try_into()
                    .map_err(|_| Error::Storage("Corrupt index entry".to_string()))?;
                let payment_id = Uuid::from_bytes(id_bytes);

                if let Some(value) = self.db.get_cf(&cf_payments, payment_id.as_bytes())? {
                    payments.push(bincode::deserialize(&value)?);
                }
            }
        }

        Ok(payments)
    }

    // Index key helpers
    //
    // Keys are tag || len(id) || id || uuid. The length prefix keeps one
    // account id from ranging over another's entries, and the tag byte
    // separates the transfer index from the payment index.

    fn index_prefix(tag: u8, id: &AccountId) -> Vec<u8> {
        let id_bytes = id.as_str().as_bytes();
        let mut prefix = Vec::with_capacity(3 + id_bytes.len());
        prefix.push(tag);
        prefix.extend_from_slice(&(id_bytes.len() as u16).to_be_bytes());
        prefix.extend_from_slice(id_bytes);
        prefix
    }

    fn index_key(tag: u8, id: &AccountId, suffix: Uuid) -> Vec<u8> {
        let mut key = Self::index_prefix(tag, id);
        key.extend_from_slice(suffix.as_bytes());
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    #[test]
    fn test_storage_open() {
        let (storage, _temp) = test_storage();
        assert!(storage.db.cf_handle(CF_ACCOUNTS).is_some());
        assert!(storage.db.cf_handle(CF_APPLIED_EVENTS).is_some());
    }

    #[test]
    fn test_pool_absent_until_provisioned() {
        let (storage, _temp) = test_storage();
        assert!(storage.get_pool().unwrap().is_none());

        storage.put_pool(&Pool::new(Decimal::from(1000))).unwrap();
        let pool = storage.get_pool().unwrap().unwrap();
        assert_eq!(pool.balance, Decimal::from(1000));
    }

    #[test]
    fn test_get_or_create_does_not_persist() {
        let (storage, _temp) = test_storage();

        let id = AccountId::new("p1");
        let account = storage.get_or_create_account(&id).unwrap();
        assert_eq!(account.balance, Decimal::ZERO);

        // The working copy is not a row until some unit of work commits it
        assert!(storage.get_account(&id).unwrap().is_none());
    }

    #[test]
    fn test_commit_transfer_atomic() {
        let (storage, _temp) = test_storage();

        let mut pool = Pool::new(Decimal::from(1000));
        pool.debit(Decimal::from(300)).unwrap();

        let partner = AccountId::new("p1");
        let mut account = storage.get_or_create_account(&partner).unwrap();
        account.credit(Decimal::from(300));

        let record = TransferRecord::trade_settlement(
            Uuid::now_v7(),
            AccountId::new("u1"),
            partner.clone(),
            Decimal::from(300),
        );

        storage
            .commit_transfer(Some(&pool), &account, &record)
            .unwrap();

        assert_eq!(
            storage.get_pool().unwrap().unwrap().balance,
            Decimal::from(700)
        );
        assert_eq!(
            storage.get_account(&partner).unwrap().unwrap().balance,
            Decimal::from(300)
        );
        assert!(storage.get_transfer(record.record_id).unwrap().is_some());
        assert_eq!(
            storage.applied_event(record.event_id).unwrap(),
            Some(record.record_id)
        );
    }

    #[test]
    fn test_partner_transfer_listing_in_commit_order() {
        let (storage, _temp) = test_storage();

        let partner = AccountId::new("p1");
        let mut amounts = Vec::new();
        for i in 1..=3 {
            let amount = Decimal::from(i * 100);
            let mut account = storage.get_or_create_account(&partner).unwrap();
            account.credit(amount);
            let record = TransferRecord::trade_settlement(
                Uuid::now_v7(),
                AccountId::new("u1"),
                partner.clone(),
                amount,
            );
            storage.commit_transfer(None, &account, &record).unwrap();
            amounts.push(amount);
        }

        let records = storage.get_partner_transfers(&partner).unwrap();
        assert_eq!(records.len(), 3);
        let listed: Vec<_> = records.iter().map(|r| r.amount).collect();
        assert_eq!(listed, amounts);
        assert_eq!(storage.transfer_count().unwrap(), 3);

        // Another partner's listing stays empty
        let other = storage
            .get_partner_transfers(&AccountId::new("p2"))
            .unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn test_index_families_stay_disjoint() {
        let (storage, _temp) = test_storage();

        // "a" and "a|b" must not range over each other, and a user's
        // payments must not leak into a same-named partner's transfers
        for partner in ["a", "a|b"] {
            let partner = AccountId::new(partner);
            let mut account = storage.get_or_create_account(&partner).unwrap();
            account.credit(Decimal::from(100));
            let record = TransferRecord::trade_settlement(
                Uuid::now_v7(),
                AccountId::new("u1"),
                partner.clone(),
                Decimal::from(100),
            );
            storage.commit_transfer(None, &account, &record).unwrap();
        }

        let user = AccountId::new("a");
        let mut account = storage.get_or_create_account(&user).unwrap();
        account.credit(Decimal::from(50));
        let payment = Payment {
            payment_id: Uuid::now_v7(),
            reference: "gw-50".to_string(),
            status: "DONE".to_string(),
            user_id: user.clone(),
            amount: Decimal::from(50),
            charged_at: chrono::Utc::now(),
        };
        storage.commit_charge(&account, &payment).unwrap();

        let a = storage.get_partner_transfers(&AccountId::new("a")).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].partner_id, AccountId::new("a"));

        let ab = storage
            .get_partner_transfers(&AccountId::new("a|b"))
            .unwrap();
        assert_eq!(ab.len(), 1);
        assert_eq!(ab[0].partner_id, AccountId::new("a|b"));

        let payments = storage.get_user_payments(&user).unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].payment_id, payment.payment_id);
    }

    #[test]
    fn test_account_lock_registry_reuses_entries() {
        let (storage, _temp) = test_storage();

        let id = AccountId::new("p1");
        let first = storage.account_lock(&id);
        let second = storage.account_lock(&id);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
