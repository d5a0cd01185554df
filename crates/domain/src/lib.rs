//! Domain layer for the order-to-payment saga.
//!
//! This crate provides the core domain model:
//! - Order entity with its line items and status state machines
//! - PaymentAttempt entity keyed by an idempotency key
//! - Value objects (Money, Currency, ProductId) shared by both
//!
//! Entities are only constructed through normalizing constructors; there is
//! no mutation hidden behind a generic save call.

pub mod error;
pub mod order;
pub mod payment;
pub mod value_objects;

pub use error::{DomainError, OrderError, PaymentError};
pub use order::{
    LineItem, Order, OrderNumber, OrderPaymentStatus, OrderStatus, ShippingAddress,
};
pub use payment::{IdempotencyKey, PaymentAttempt, PaymentMethod, PaymentStatus};
pub use value_objects::{Currency, Money, ParseMoneyError, ProductId};
