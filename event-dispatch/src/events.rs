//! Decoded settlement events
//!
//! Wire shape only; transport is the bus's concern. Every event carries a
//! producer-assigned `event_id` (UUIDv7) that doubles as the ledger's
//! idempotency key under at-least-once delivery.

use cash_ledger::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trade completed externally; settle pool → partner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSettledEvent {
    /// Producer-assigned event ID (idempotency key)
    pub event_id: Uuid,

    /// User whose trade completed (recorded as the counterpart)
    pub user_id: AccountId,

    /// Partner to credit
    pub partner_id: AccountId,

    /// Settlement amount
    pub amount: Decimal,
}

impl TradeSettledEvent {
    /// Create new event with a fresh ID
    pub fn new(user_id: AccountId, partner_id: AccountId, amount: Decimal) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            user_id,
            partner_id,
            amount,
        }
    }
}

/// A partner requested a cash-out of their balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementCashRequest {
    /// Producer-assigned event ID (idempotency key)
    pub event_id: Uuid,

    /// Partner to debit
    pub partner_id: AccountId,

    /// Cash-out amount
    pub amount: Decimal,
}

impl SettlementCashRequest {
    /// Create new request with a fresh ID
    pub fn new(partner_id: AccountId, amount: Decimal) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            partner_id,
            amount,
        }
    }
}

/// Union of all settlement events the dispatcher consumes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementEvent {
    /// Trade settlement (pool → partner)
    TradeSettled(TradeSettledEvent),
    /// Partner cash-out
    SettlementCash(SettlementCashRequest),
}

impl From<TradeSettledEvent> for SettlementEvent {
    fn from(event: TradeSettledEvent) -> Self {
        SettlementEvent::TradeSettled(event)
    }
}

impl From<SettlementCashRequest> for SettlementEvent {
    fn from(event: SettlementCashRequest) -> Self {
        SettlementEvent::SettlementCash(event)
    }
}

impl SettlementEvent {
    /// Producer-assigned event ID
    pub fn event_id(&self) -> Uuid {
        match self {
            SettlementEvent::TradeSettled(e) => e.event_id,
            SettlementEvent::SettlementCash(e) => e.event_id,
        }
    }

    /// Stable event name for logs and metric labels
    pub fn name(&self) -> &'static str {
        match self {
            SettlementEvent::TradeSettled(_) => "trade_settled",
            SettlementEvent::SettlementCash(_) => "settlement_cash",
        }
    }

    /// Serialize to wire bytes
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Deserialize from wire bytes
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_roundtrip() {
        let event = SettlementEvent::TradeSettled(TradeSettledEvent::new(
            AccountId::new("u1"),
            AccountId::new("p1"),
            Decimal::new(30000, 2),
        ));

        let bytes = event.to_bytes().unwrap();
        let decoded = SettlementEvent::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.event_id(), event.event_id());
        match decoded {
            SettlementEvent::TradeSettled(e) => {
                assert_eq!(e.partner_id, AccountId::new("p1"));
                assert_eq!(e.amount, Decimal::new(30000, 2));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_wire_shape_is_tagged() {
        let event = SettlementEvent::SettlementCash(SettlementCashRequest::new(
            AccountId::new("p1"),
            Decimal::from(500),
        ));

        let value: serde_json::Value = serde_json::from_slice(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(value["type"], "settlement_cash");
        assert!(value["event_id"].is_string());
    }

    #[test]
    fn test_event_names() {
        let trade = SettlementEvent::TradeSettled(TradeSettledEvent::new(
            AccountId::new("u1"),
            AccountId::new("p1"),
            Decimal::ONE,
        ));
        let cash = SettlementEvent::SettlementCash(SettlementCashRequest::new(
            AccountId::new("p1"),
            Decimal::ONE,
        ));

        assert_eq!(trade.name(), "trade_settled");
        assert_eq!(cash.name(), "settlement_cash");
    }
}
