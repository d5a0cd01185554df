//! Event channel trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::SagaEvent;
use crate::message::{MessageId, QueueMessage, ReceiptHandle};

/// Maximum number of entries in one batch publish call; larger batches are
/// chunked.
pub const MAX_BATCH_ENTRIES: usize = 10;

/// Options for a receive call.
#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    /// Maximum messages returned by one call (at most [`MAX_BATCH_ENTRIES`]).
    pub max_messages: usize,

    /// Long-poll wait: how long the call may block waiting for a message.
    pub wait: Duration,

    /// How long each returned message stays invisible to other consumers
    /// before it becomes redeliverable. Must exceed the consumer's
    /// processing time (gateway timeout plus store writes) with margin.
    pub visibility_timeout: Duration,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: MAX_BATCH_ENTRIES,
            wait: Duration::from_secs(20),
            visibility_timeout: Duration::from_secs(300),
        }
    }
}

impl ReceiveOptions {
    /// Creates options with the default long-poll wait and visibility timeout.
    pub fn new() -> Self {
        Self::default()
    }
}

/// At-least-once queue carrying saga events.
///
/// Delivery semantics: a received message stays invisible for the visibility
/// timeout; if it is not acknowledged in time it is redelivered with a fresh
/// receipt handle and an incremented delivery count. Consumers must be
/// idempotent.
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Publishes a single event.
    async fn publish(&self, event: &SagaEvent) -> Result<MessageId>;

    /// Publishes several events, chunking into batch calls of at most
    /// [`MAX_BATCH_ENTRIES`] entries.
    async fn publish_batch(&self, events: &[SagaEvent]) -> Result<Vec<MessageId>>;

    /// Pulls up to `options.max_messages` visible messages, long-polling up
    /// to `options.wait`. Returns an empty batch on poll timeout.
    async fn receive(&self, options: ReceiveOptions) -> Result<Vec<QueueMessage>>;

    /// Deletes the message identified by this delivery's receipt handle.
    ///
    /// Fails with `UnknownReceipt` if the handle is stale (the message was
    /// redelivered or already acknowledged).
    async fn acknowledge(&self, receipt: &ReceiptHandle) -> Result<()>;

    /// Approximate number of messages in the channel (visible or in flight).
    async fn approximate_len(&self) -> Result<usize>;
}
