//! Event dispatcher: failure routing between bus and ledger
//!
//! Per event: Received → Processing → {Committed, Rejected, Faulted}.
//! Committed and Rejected both return `Ok` so the consumer acknowledges the
//! message; a fault returns `Err` so the bus redelivers. Swallow business
//! errors, propagate infrastructure errors.

use crate::{
    events::SettlementEvent,
    metrics::{DISPATCH_DURATION, EVENTS_DISPATCHED_TOTAL},
};
use async_trait::async_trait;
use cash_ledger::{Result, SettlementLedger};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Terminal outcome of a dispatched event
///
/// Both variants acknowledge the message; a fault is an `Err` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Ledger operation committed
    Committed,
    /// Recognized business error; the event is permanently unsatisfiable
    /// as sent and must not be redelivered
    Rejected,
}

/// Handler seam for the (external) bus consumer loop
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one decoded settlement event
    async fn handle(&self, event: SettlementEvent) -> Result<DispatchOutcome>;
}

/// Dispatches decoded settlement events into the ledger
#[derive(Debug)]
pub struct EventDispatcher {
    ledger: Arc<SettlementLedger>,
}

impl EventDispatcher {
    /// Create new dispatcher over a shared ledger
    pub fn new(ledger: Arc<SettlementLedger>) -> Self {
        Self { ledger }
    }

    /// Dispatch one event and route its failure
    pub fn dispatch(&self, event: &SettlementEvent) -> Result<DispatchOutcome> {
        let start = Instant::now();
        let name = event.name();

        info!(event = name, event_id = %event.event_id(), "Received settlement event");

        let result = match event {
            SettlementEvent::TradeSettled(e) => {
                self.ledger
                    .settle_trade(e.event_id, &e.user_id, &e.partner_id, e.amount)
            }
            SettlementEvent::SettlementCash(e) => {
                self.ledger
                    .settle_partner_cashout(e.event_id, &e.partner_id, e.amount)
            }
        };

        DISPATCH_DURATION
            .with_label_values(&[name])
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(record) => {
                info!(
                    event = name,
                    event_id = %event.event_id(),
                    record_id = %record.record_id,
                    "Successfully processed settlement event"
                );
                EVENTS_DISPATCHED_TOTAL
                    .with_label_values(&[name, "committed"])
                    .inc();
                Ok(DispatchOutcome::Committed)
            }
            Err(e) if e.is_rejection() => {
                error!(
                    event = name,
                    event_id = %event.event_id(),
                    kind = e.kind(),
                    "Failed to process settlement event: {}",
                    e
                );
                EVENTS_DISPATCHED_TOTAL
                    .with_label_values(&[name, "rejected"])
                    .inc();
                Ok(DispatchOutcome::Rejected)
            }
            Err(e) => {
                error!(
                    event = name,
                    event_id = %event.event_id(),
                    kind = e.kind(),
                    "Unexpected error while processing settlement event: {}",
                    e
                );
                EVENTS_DISPATCHED_TOTAL
                    .with_label_values(&[name, "faulted"])
                    .inc();
                Err(e)
            }
        }
    }
}

#[async_trait]
impl EventHandler for EventDispatcher {
    async fn handle(&self, event: SettlementEvent) -> Result<DispatchOutcome> {
        self.dispatch(&event)
    }
}
