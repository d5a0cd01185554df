//! Idempotency keys for payment attempts.

use common::OrderId;
use serde::{Deserialize, Serialize};

/// Token ensuring repeated processing of the same order charges at most once.
///
/// Derived deterministically from the order id, so every redelivery of an
/// `OrderCreated` event carries the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Derives the payment idempotency key for an order.
    pub fn for_order(order_id: OrderId) -> Self {
        Self(format!("order-{order_id}-payment"))
    }

    /// Wraps an existing key (e.g. read back from a store).
    pub fn from_string(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
