//! Durable stores for orders and payment attempts.
//!
//! Two independently-owned stores with no shared transaction: the order
//! store owns the order lifecycle, the payment store owns payment attempts
//! keyed by a unique idempotency key. Conditional state transitions are
//! atomic store operations so callers can use them as exactly-once guards.

pub mod error;
pub mod memory;
pub mod order;
pub mod payment;
pub mod postgres;

pub use error::{Result, StoreError};
pub use memory::{InMemoryOrderStore, InMemoryPaymentStore};
pub use order::OrderStore;
pub use payment::PaymentStore;
pub use postgres::{PostgresOrderStore, PostgresPaymentStore, ensure_schema};
