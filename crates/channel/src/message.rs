//! Queue message envelope.

use common::OrderId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::event::SagaEvent;

/// Unique identifier assigned to a message by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque token identifying one delivery of a message.
///
/// A new handle is issued on every delivery; acknowledging with a handle
/// from an earlier delivery fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub(crate) fn issue() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the handle as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata travelling alongside every message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Event type tag used for dispatch.
    pub event_type: String,

    /// The order the event belongs to.
    pub order_id: OrderId,

    /// Millisecond publish timestamp. Advisory only; never used for
    /// ordering guarantees.
    pub timestamp_ms: i64,
}

/// One delivery of a message pulled from the channel.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: MessageId,
    pub body: serde_json::Value,
    pub metadata: MessageMetadata,
    pub receipt_handle: ReceiptHandle,
    /// 1 on first delivery, incremented on each redelivery.
    pub delivery_count: u32,
}

impl QueueMessage {
    /// Parses the saga event out of this message.
    pub fn event(&self) -> Result<SagaEvent> {
        SagaEvent::from_parts(&self.metadata.event_type, &self.body)
    }
}
