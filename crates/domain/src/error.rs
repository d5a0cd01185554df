//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;
use crate::payment::PaymentStatus;
use crate::value_objects::ProductId;

/// Errors from order construction and state transitions.
#[derive(Debug, Error)]
pub enum OrderError {
    /// An order must contain at least one line item.
    #[error("order has no items")]
    NoItems,

    /// Line item quantity must be at least 1.
    #[error("invalid quantity for product {product_id}: must be at least 1")]
    InvalidQuantity { product_id: ProductId },

    /// Line item unit price must not be negative.
    #[error("invalid unit price for product {product_id}: must not be negative")]
    NegativePrice { product_id: ProductId },

    /// A required shipping address field is missing or blank.
    #[error("invalid shipping address: missing {field}")]
    MissingAddressField { field: &'static str },

    /// The requested status change is not a legal transition.
    #[error("invalid order status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

/// Errors from payment attempt construction and state transitions.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The requested status change is not a legal transition.
    #[error("invalid payment status transition: {from} -> {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Payment amount must be positive.
    #[error("payment amount must be positive")]
    NonPositiveAmount,
}

/// Top-level domain error.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Order error.
    #[error("order error: {0}")]
    Order(#[from] OrderError),

    /// Payment error.
    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),
}
