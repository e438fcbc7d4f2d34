//! Settlement event dispatch
//!
//! Receives decoded settlement events from the message bus and invokes the
//! ledger, translating failures into observable outcomes: business rejections
//! are acknowledged and logged, infrastructure and configuration faults are
//! re-raised so the bus applies its redelivery policy.
//!
//! The bus itself (transport, partitioning, consumer groups) lives outside
//! this crate; the seam is the [`EventHandler`] trait over already-decoded
//! [`SettlementEvent`] values.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod dispatcher;
pub mod events;
pub mod metrics;

// Re-exports
pub use cash_ledger::{Error, Result};
pub use dispatcher::{DispatchOutcome, EventDispatcher, EventHandler};
pub use events::{SettlementCashRequest, SettlementEvent, TradeSettledEvent};
