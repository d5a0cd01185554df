//! The PaymentAttempt entity.

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;
use crate::payment::idempotency::IdempotencyKey;
use crate::payment::method::PaymentMethod;
use crate::payment::state::PaymentStatus;
use crate::value_objects::{Currency, Money};

/// A single payment attempt for an order.
///
/// At most one attempt ever exists per idempotency key; the store's unique
/// constraint enforces this. The attempt is written in `Processing` state
/// before the gateway is called, so a crash mid-charge leaves a row that a
/// reconciliation pass can find.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub idempotency_key: IdempotencyKey,
    pub failure_reason: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentAttempt {
    /// Creates a new attempt in `Processing` state, ready to be written
    /// ahead of the gateway call.
    pub fn new_processing(
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
        currency: Currency,
        method: PaymentMethod,
        idempotency_key: IdempotencyKey,
    ) -> Result<Self, PaymentError> {
        if !amount.is_positive() {
            return Err(PaymentError::NonPositiveAmount);
        }

        let now = Utc::now();
        Ok(Self {
            id: PaymentId::new(),
            order_id,
            user_id,
            amount,
            currency,
            method,
            status: PaymentStatus::Processing,
            transaction_id: None,
            idempotency_key,
            failure_reason: None,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
        })
    }

    /// Records a successful charge. Legal only from `Processing`.
    pub fn complete(
        &mut self,
        transaction_id: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Processing {
            return Err(PaymentError::InvalidTransition {
                from: self.status,
                to: PaymentStatus::Completed,
            });
        }
        self.status = PaymentStatus::Completed;
        self.transaction_id = Some(transaction_id.into());
        self.metadata = metadata;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records a gateway-declared failure. Legal only from `Processing`.
    pub fn fail(
        &mut self,
        reason: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Processing {
            return Err(PaymentError::InvalidTransition {
                from: self.status,
                to: PaymentStatus::Failed,
            });
        }
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.metadata = metadata;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the attempt refunded. Legal only from `Completed`; refunding an
    /// already-refunded attempt is rejected, not retried.
    pub fn refund(&mut self, refund_metadata: serde_json::Value) -> Result<(), PaymentError> {
        if !self.status.can_refund() {
            return Err(PaymentError::InvalidTransition {
                from: self.status,
                to: PaymentStatus::Refunded,
            });
        }
        self.status = PaymentStatus::Refunded;
        if let serde_json::Value::Object(ref mut map) = self.metadata {
            map.insert("refund".to_string(), refund_metadata);
        } else {
            self.metadata = serde_json::json!({ "refund": refund_metadata });
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_attempt() -> PaymentAttempt {
        let order_id = OrderId::new();
        PaymentAttempt::new_processing(
            order_id,
            UserId::new(),
            Money::from_cents(2000),
            Currency::usd(),
            PaymentMethod::CreditCard,
            IdempotencyKey::for_order(order_id),
        )
        .unwrap()
    }

    #[test]
    fn test_new_attempt_is_processing() {
        let attempt = test_attempt();
        assert_eq!(attempt.status, PaymentStatus::Processing);
        assert!(attempt.transaction_id.is_none());
        assert!(attempt.failure_reason.is_none());
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let order_id = OrderId::new();
        let result = PaymentAttempt::new_processing(
            order_id,
            UserId::new(),
            Money::zero(),
            Currency::usd(),
            PaymentMethod::CreditCard,
            IdempotencyKey::for_order(order_id),
        );
        assert!(matches!(result, Err(PaymentError::NonPositiveAmount)));
    }

    #[test]
    fn test_complete_from_processing() {
        let mut attempt = test_attempt();
        attempt
            .complete("txn-0001", serde_json::json!({"ok": true}))
            .unwrap();
        assert_eq!(attempt.status, PaymentStatus::Completed);
        assert_eq!(attempt.transaction_id.as_deref(), Some("txn-0001"));
    }

    #[test]
    fn test_complete_twice_rejected() {
        let mut attempt = test_attempt();
        attempt.complete("txn-0001", serde_json::json!({})).unwrap();
        let result = attempt.complete("txn-0002", serde_json::json!({}));
        assert!(matches!(
            result,
            Err(PaymentError::InvalidTransition { .. })
        ));
        assert_eq!(attempt.transaction_id.as_deref(), Some("txn-0001"));
    }

    #[test]
    fn test_fail_records_reason() {
        let mut attempt = test_attempt();
        attempt
            .fail("Insufficient funds", serde_json::json!({}))
            .unwrap();
        assert_eq!(attempt.status, PaymentStatus::Failed);
        assert_eq!(attempt.failure_reason.as_deref(), Some("Insufficient funds"));
    }

    #[test]
    fn test_refund_only_from_completed() {
        let mut attempt = test_attempt();
        let result = attempt.refund(serde_json::json!({}));
        assert!(matches!(
            result,
            Err(PaymentError::InvalidTransition { .. })
        ));

        attempt.complete("txn-0001", serde_json::json!({})).unwrap();
        attempt.refund(serde_json::json!({"refund_id": "ref-0001"})).unwrap();
        assert_eq!(attempt.status, PaymentStatus::Refunded);
        assert_eq!(attempt.metadata["refund"]["refund_id"], "ref-0001");
    }

    #[test]
    fn test_refund_twice_rejected() {
        let mut attempt = test_attempt();
        attempt.complete("txn-0001", serde_json::json!({})).unwrap();
        attempt.refund(serde_json::json!({})).unwrap();
        let result = attempt.refund(serde_json::json!({}));
        assert!(matches!(
            result,
            Err(PaymentError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let attempt = test_attempt();
        let json = serde_json::to_string(&attempt).unwrap();
        let deserialized: PaymentAttempt = serde_json::from_str(&json).unwrap();
        assert_eq!(attempt, deserialized);
    }
}
