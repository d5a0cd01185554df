//! Payment gateway adapter trait and in-memory implementation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{Currency, Money, PaymentMethod};
use serde::Serialize;
use thiserror::Error;

/// A charge request submitted to the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub currency: Currency,
    pub method: PaymentMethod,
}

/// Outcome of a charge call.
///
/// A gateway-declared decline (`success == false`) is a business outcome,
/// not a transport error; it is never retried.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
}

/// Outcome of a refund call.
#[derive(Debug, Clone, Serialize)]
pub struct RefundOutcome {
    pub success: bool,
    pub refund_id: Option<String>,
}

/// Transport-level gateway errors. All variants are retryable.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("gateway connection refused")]
    ConnectionRefused,

    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway request throttled")]
    Throttled,

    #[error("gateway service unavailable")]
    Unavailable,
}

impl GatewayError {
    /// Transport errors are retryable by definition; declines are carried in
    /// [`ChargeOutcome`] instead.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

/// Trait for the payment gateway collaborator.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the given amount. Declines are reported in the outcome, not
    /// as errors.
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError>;

    /// Refunds a previously completed charge.
    async fn refund(
        &self,
        transaction_id: &str,
        amount: Money,
    ) -> Result<RefundOutcome, GatewayError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    charges: Vec<ChargeRequest>,
    refunds: Vec<(String, Money)>,
    next_id: u32,
    decline_with: Option<String>,
    fail_with: Option<GatewayError>,
    delay: Option<Duration>,
}

/// In-memory payment gateway for testing.
///
/// `charge_call_count` counts every invocation; `successful_charge_count`
/// counts only charges that completed and returned a transaction id. A call
/// abandoned by the caller's timeout records nothing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
    calls: Arc<RwLock<u32>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to decline charges with the given reason.
    pub fn set_decline(&self, reason: Option<&str>) {
        self.state.write().unwrap().decline_with = reason.map(str::to_string);
    }

    /// Configures the gateway to fail with a transport error.
    pub fn set_fail_with(&self, error: Option<GatewayError>) {
        self.state.write().unwrap().fail_with = error;
    }

    /// Configures a delay before the gateway responds.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().delay = delay;
    }

    /// Number of charge invocations, including abandoned ones.
    pub fn charge_call_count(&self) -> u32 {
        *self.calls.read().unwrap()
    }

    /// Number of charges that ran to completion successfully.
    pub fn successful_charge_count(&self) -> usize {
        self.state.read().unwrap().charges.len()
    }

    /// Number of refunds executed.
    pub fn refund_count(&self) -> usize {
        self.state.read().unwrap().refunds.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        *self.calls.write().unwrap() += 1;

        let (delay, fail_with, decline_with) = {
            let state = self.state.read().unwrap();
            (
                state.delay,
                state.fail_with.clone(),
                state.decline_with.clone(),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = fail_with {
            return Err(error);
        }
        if let Some(reason) = decline_with {
            return Ok(ChargeOutcome {
                success: false,
                transaction_id: None,
                failure_reason: Some(reason),
            });
        }

        let mut state = self.state.write().unwrap();
        state.next_id += 1;
        let transaction_id = format!("txn-{:04}", state.next_id);
        state.charges.push(request);

        Ok(ChargeOutcome {
            success: true,
            transaction_id: Some(transaction_id),
            failure_reason: None,
        })
    }

    async fn refund(
        &self,
        transaction_id: &str,
        amount: Money,
    ) -> Result<RefundOutcome, GatewayError> {
        let fail_with = self.state.read().unwrap().fail_with.clone();
        if let Some(error) = fail_with {
            return Err(error);
        }

        let mut state = self.state.write().unwrap();
        state.next_id += 1;
        let refund_id = format!("ref-{:04}", state.next_id);
        state.refunds.push((transaction_id.to_string(), amount));

        Ok(RefundOutcome {
            success: true,
            refund_id: Some(refund_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_request() -> ChargeRequest {
        ChargeRequest {
            order_id: OrderId::new(),
            user_id: UserId::new(),
            amount: Money::from_cents(2000),
            currency: Currency::usd(),
            method: PaymentMethod::CreditCard,
        }
    }

    #[tokio::test]
    async fn test_charge_assigns_transaction_ids() {
        let gateway = InMemoryPaymentGateway::new();

        let first = gateway.charge(test_request()).await.unwrap();
        let second = gateway.charge(test_request()).await.unwrap();

        assert!(first.success);
        assert_eq!(first.transaction_id.as_deref(), Some("txn-0001"));
        assert_eq!(second.transaction_id.as_deref(), Some("txn-0002"));
        assert_eq!(gateway.successful_charge_count(), 2);
        assert_eq!(gateway.charge_call_count(), 2);
    }

    #[tokio::test]
    async fn test_decline_is_an_outcome_not_an_error() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_decline(Some("Insufficient funds"));

        let outcome = gateway.charge(test_request()).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.failure_reason.as_deref(), Some("Insufficient funds"));
        assert!(outcome.transaction_id.is_none());
        assert_eq!(gateway.successful_charge_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_with(Some(GatewayError::Unavailable));

        let result = gateway.charge(test_request()).await;
        assert!(matches!(result, Err(GatewayError::Unavailable)));
        assert_eq!(gateway.charge_call_count(), 1);
        assert_eq!(gateway.successful_charge_count(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_slow_charge_records_nothing() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_delay(Some(Duration::from_secs(60)));

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), gateway.charge(test_request())).await;
        assert!(timed_out.is_err());
        assert_eq!(gateway.charge_call_count(), 1);
        assert_eq!(gateway.successful_charge_count(), 0);
    }

    #[tokio::test]
    async fn test_refund_records_transaction() {
        let gateway = InMemoryPaymentGateway::new();
        let outcome = gateway
            .refund("txn-0001", Money::from_cents(2000))
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.refund_id.is_some());
        assert_eq!(gateway.refund_count(), 1);
    }
}
