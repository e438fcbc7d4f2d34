//! Payment intake and history (CRUD glue)
//!
//! Charging an end user persists the payment row and credits the user's
//! account in one atomic commit; history is a plain index read. No invariant
//! here beyond store-and-retrieve plus the atomic credit.

use crate::{
    metrics::Metrics,
    types::{AccountId, Payment},
    Error, Result, Storage,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// A charge reported by the payment gateway
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Gateway payment reference
    pub reference: String,

    /// Gateway status, stored verbatim
    pub status: String,

    /// Charged user
    pub user_id: AccountId,

    /// Charged amount
    pub amount: Decimal,

    /// Gateway-reported payment date, stored verbatim
    pub charged_at: DateTime<Utc>,
}

/// Payment intake service
#[derive(Debug)]
pub struct PaymentService {
    storage: Arc<Storage>,
    metrics: Metrics,
}

impl PaymentService {
    /// Create service over shared storage
    pub fn new(storage: Arc<Storage>, metrics: Metrics) -> Self {
        Self { storage, metrics }
    }

    /// Persist the charge and credit the user's account atomically
    pub fn charge(&self, request: ChargeRequest) -> Result<Payment> {
        if request.amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(request.amount));
        }

        let account_lock = self.storage.account_lock(&request.user_id);
        let _guard = account_lock.lock();

        let mut account = self.storage.get_or_create_account(&request.user_id)?;
        account.credit(request.amount);

        let payment = Payment {
            payment_id: Uuid::now_v7(),
            reference: request.reference,
            status: request.status,
            user_id: request.user_id,
            amount: request.amount,
            charged_at: request.charged_at,
        };

        self.storage.commit_charge(&account, &payment)?;
        self.metrics.record_charge();

        tracing::info!(
            payment_id = %payment.payment_id,
            user_id = %payment.user_id,
            amount = %payment.amount,
            "Payment charge committed"
        );

        Ok(payment)
    }

    /// Payments charged by one user, oldest first
    pub fn history(&self, user_id: &AccountId) -> Result<Vec<Payment>> {
        self.storage.get_user_payments(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn test_service() -> (PaymentService, Arc<Storage>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let storage = Arc::new(Storage::open(&config).unwrap());
        let service = PaymentService::new(storage.clone(), Metrics::default());
        (service, storage, temp_dir)
    }

    fn charge(user: &str, amount: i64) -> ChargeRequest {
        ChargeRequest {
            reference: format!("gw-{}", amount),
            status: "DONE".to_string(),
            user_id: AccountId::new(user),
            amount: Decimal::from(amount),
            charged_at: Utc::now(),
        }
    }

    #[test]
    fn test_charge_credits_account() {
        let (service, storage, _temp) = test_service();

        service.charge(charge("u1", 500)).unwrap();
        service.charge(charge("u1", 250)).unwrap();

        let account = storage
            .get_account(&AccountId::new("u1"))
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, Decimal::from(750));
    }

    #[test]
    fn test_history_oldest_first() {
        let (service, _storage, _temp) = test_service();

        service.charge(charge("u1", 500)).unwrap();
        service.charge(charge("u1", 250)).unwrap();
        service.charge(charge("u2", 100)).unwrap();

        let history = service.history(&AccountId::new("u1")).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount, Decimal::from(500));
        assert_eq!(history[1].amount, Decimal::from(250));

        assert!(service.history(&AccountId::new("u3")).unwrap().is_empty());
    }

    #[test]
    fn test_charge_keeps_gateway_payment_date() {
        let (service, _storage, _temp) = test_service();

        let reported = DateTime::parse_from_rfc3339("2026-01-15T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut request = charge("u1", 500);
        request.charged_at = reported;
        service.charge(request).unwrap();

        let history = service.history(&AccountId::new("u1")).unwrap();
        assert_eq!(history[0].charged_at, reported);
    }

    #[test]
    fn test_non_positive_charge_rejected() {
        let (service, storage, _temp) = test_service();

        let err = service.charge(charge("u1", 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
        assert!(storage.get_account(&AccountId::new("u1")).unwrap().is_none());
    }
}
