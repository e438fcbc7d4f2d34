//! CashRail Settlement Ledger
//!
//! Event-driven settlement ledger between the operator's pool and partner
//! accounts.
//!
//! # Architecture
//!
//! - **Single atomic commit**: Every balance movement lands in one RocksDB
//!   `WriteBatch` together with its audit record
//! - **Row locks**: Pool and per-account locks serialize same-key operations
//! - **Append-only audit**: Transfer records are never modified or deleted
//! - **Idempotent redelivery**: Applied event IDs are indexed atomically with
//!   the transfer, so a redelivered event is rejected instead of double-applied
//!
//! # Invariants
//!
//! - Non-negativity: no committed balance is ever below zero
//! - Conservation: a trade settlement moves exactly `amount` pool → partner
//! - Audit completeness: exactly one transfer record per committed movement
//! - Atomicity: a failed check leaves every balance untouched

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod payments;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::SettlementLedger;
pub use payments::{ChargeRequest, PaymentService};
pub use storage::Storage;
pub use types::{Account, AccountId, Payment, Pool, TransferKind, TransferRecord};
