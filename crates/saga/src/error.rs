//! Saga error types and retry classification.

use std::time::Duration;

use common::{OrderId, PaymentId};
use domain::{DomainError, OrderStatus, PaymentStatus, ProductId};
use thiserror::Error;

use crate::services::gateway::GatewayError;
use crate::services::inventory::InventoryError;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The requested product id is unknown.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Requested quantity exceeds available stock.
    #[error("insufficient stock for product {0}")]
    OutOfStock(ProductId),

    /// The submission request failed validation before touching any store.
    #[error("invalid order request: {0}")]
    InvalidRequest(String),

    /// Order not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Payment not found.
    #[error("payment not found: {0}")]
    PaymentNotFound(PaymentId),

    /// The order is not in a status from which this operation is legal.
    #[error("invalid transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The event payload failed structural validation.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// Another delivery of the same idempotency key is currently in flight.
    #[error("payment attempt for key {0} is already in flight")]
    AttemptInFlight(domain::IdempotencyKey),

    /// The gateway call exceeded its bounded timeout.
    #[error("gateway call timed out after {0:?}")]
    GatewayTimeout(Duration),

    /// Transport-level gateway error.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Refund requested for an attempt that is not in Completed state.
    #[error("refund not allowed: payment {payment_id} is {status}")]
    RefundNotAllowed {
        payment_id: PaymentId,
        status: PaymentStatus,
    },

    /// The gateway declined the refund.
    #[error("refund declined by gateway for payment {0}")]
    RefundDeclined(PaymentId),

    /// A completed attempt is missing its gateway transaction id.
    #[error("payment {0} has no transaction id")]
    MissingTransactionId(PaymentId),

    /// Inventory restoration after cancellation was incomplete.
    #[error("compensation failed for order {order_id}: {failed} of {total} items not restored")]
    CompensationFailed {
        order_id: OrderId,
        failed: usize,
        total: usize,
    },

    /// Inventory collaborator error.
    #[error("inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Domain error.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    /// Channel error.
    #[error("channel error: {0}")]
    Channel(#[from] channel::ChannelError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<domain::OrderError> for SagaError {
    fn from(e: domain::OrderError) -> Self {
        SagaError::Domain(DomainError::Order(e))
    }
}

impl From<domain::PaymentError> for SagaError {
    fn from(e: domain::PaymentError) -> Self {
        SagaError::Domain(DomainError::Payment(e))
    }
}

/// Whether a failed message should be redelivered or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Leave the message unacknowledged; the channel redelivers it after the
    /// visibility timeout.
    Retryable,

    /// Acknowledge the message and route it to the error sink; retrying
    /// cannot help.
    Fatal,
}

impl SagaError {
    /// Classifies this error for the worker's ack/no-ack decision.
    ///
    /// Transport problems (connection refused, timeout, throttling,
    /// service-unavailable) and in-flight duplicates are retryable;
    /// everything else is a poison message or a terminal business outcome.
    pub fn classify(&self) -> ErrorClass {
        match self {
            SagaError::Gateway(e) if e.is_retryable() => ErrorClass::Retryable,
            SagaError::GatewayTimeout(_) => ErrorClass::Retryable,
            SagaError::AttemptInFlight(_) => ErrorClass::Retryable,
            SagaError::Inventory(InventoryError::Unavailable(_)) => ErrorClass::Retryable,
            SagaError::Channel(channel::ChannelError::Transport(_)) => ErrorClass::Retryable,
            SagaError::Store(store::StoreError::Database(_)) => ErrorClass::Retryable,
            _ => ErrorClass::Fatal,
        }
    }
}

/// Result type for saga operations.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        for error in [
            GatewayError::ConnectionRefused,
            GatewayError::Timeout,
            GatewayError::Throttled,
            GatewayError::Unavailable,
        ] {
            assert_eq!(
                SagaError::Gateway(error).classify(),
                ErrorClass::Retryable
            );
        }
        assert_eq!(
            SagaError::GatewayTimeout(Duration::from_secs(30)).classify(),
            ErrorClass::Retryable
        );
        assert_eq!(
            SagaError::Channel(channel::ChannelError::Transport("reset".into())).classify(),
            ErrorClass::Retryable
        );
    }

    #[test]
    fn test_in_flight_duplicate_is_retryable() {
        let key = domain::IdempotencyKey::for_order(OrderId::new());
        assert_eq!(
            SagaError::AttemptInFlight(key).classify(),
            ErrorClass::Retryable
        );
    }

    #[test]
    fn test_malformed_and_validation_errors_are_fatal() {
        assert_eq!(
            SagaError::MalformedEvent("bad payload".into()).classify(),
            ErrorClass::Fatal
        );
        assert_eq!(
            SagaError::OutOfStock(ProductId::new("SKU-001")).classify(),
            ErrorClass::Fatal
        );
        assert_eq!(
            SagaError::OrderNotFound(OrderId::new()).classify(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn test_unknown_event_type_is_fatal() {
        assert_eq!(
            SagaError::Channel(channel::ChannelError::UnknownEventType("X".into())).classify(),
            ErrorClass::Fatal
        );
    }
}
