//! Payment store trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId};
use domain::{IdempotencyKey, PaymentAttempt};

use crate::error::Result;

/// Durable record of payment attempts.
///
/// The idempotency key and the gateway transaction id are each unique across
/// all attempts. The unique constraint on the idempotency key — not any
/// pre-check — is the mechanism that guarantees at most one attempt per
/// order.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a new attempt, written ahead of the gateway call.
    ///
    /// Fails with `DuplicateIdempotencyKey` if an attempt with the same key
    /// already exists; callers treat that as a duplicate delivery.
    async fn insert_new(&self, attempt: PaymentAttempt) -> Result<()>;

    /// Retrieves an attempt by id.
    async fn get(&self, payment_id: PaymentId) -> Result<Option<PaymentAttempt>>;

    /// Retrieves the attempt for an idempotency key, if any.
    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<PaymentAttempt>>;

    /// Retrieves all attempts for an order, newest first.
    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<PaymentAttempt>>;

    /// Atomically moves a `Processing` attempt to `Completed`, recording the
    /// gateway transaction id and metadata.
    ///
    /// Fails with `InvalidPaymentTransition` if the attempt is not in
    /// `Processing`, and with `DuplicateTransactionId` if another attempt
    /// already carries the transaction id.
    async fn mark_completed(
        &self,
        payment_id: PaymentId,
        transaction_id: &str,
        metadata: serde_json::Value,
    ) -> Result<PaymentAttempt>;

    /// Atomically moves a `Processing` attempt to `Failed` with the
    /// gateway-declared reason.
    async fn mark_failed(
        &self,
        payment_id: PaymentId,
        reason: &str,
        metadata: serde_json::Value,
    ) -> Result<PaymentAttempt>;

    /// Atomically moves a `Completed` attempt to `Refunded`.
    ///
    /// Exactly one of any number of concurrent callers wins; the rest get
    /// `InvalidPaymentTransition`.
    async fn mark_refunded(
        &self,
        payment_id: PaymentId,
        refund_metadata: serde_json::Value,
    ) -> Result<PaymentAttempt>;

    /// Finds attempts stuck in `Processing` since before `older_than`.
    ///
    /// These are write-ahead rows orphaned by a crash between the gateway
    /// call and the terminal update; a reconciliation pass (or the worker on
    /// redelivery) picks them up.
    async fn find_stale_processing(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<PaymentAttempt>>;
}
