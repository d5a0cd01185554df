//! Store error types.

use common::{OrderId, PaymentId};
use domain::{IdempotencyKey, OrderStatus, PaymentStatus};
use thiserror::Error;

/// Errors that can occur when interacting with the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order was not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The payment attempt was not found.
    #[error("payment not found: {0}")]
    PaymentNotFound(PaymentId),

    /// An order with this id already exists.
    #[error("order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// A payment attempt already exists for this idempotency key.
    ///
    /// This is the authoritative dedup signal: the unique constraint fired,
    /// so another delivery of the same event got there first.
    #[error("payment attempt already exists for idempotency key {0}")]
    DuplicateIdempotencyKey(IdempotencyKey),

    /// A payment attempt already carries this gateway transaction id.
    #[error("payment attempt already exists for transaction id {0}")]
    DuplicateTransactionId(String),

    /// The order is not in a status from which the requested transition is
    /// legal.
    #[error("order {order_id} cannot move from {from} to {to}")]
    InvalidOrderTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The payment attempt is not in a status from which the requested
    /// transition is legal.
    #[error("payment {payment_id} cannot move from {from} to {to}")]
    InvalidPaymentTransition {
        payment_id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
