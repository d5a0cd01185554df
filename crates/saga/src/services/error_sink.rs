//! Error sink for poison messages.
//!
//! Non-retryable failures are acknowledged (removed from the channel) and
//! recorded here for operator follow-up.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use channel::{MessageId, QueueMessage};
use chrono::{DateTime, Utc};

/// A message the worker gave up on, with the failure that killed it.
#[derive(Debug, Clone)]
pub struct FailedMessage {
    pub message_id: MessageId,
    pub body: serde_json::Value,
    pub error: String,
    pub occurred_at: DateTime<Utc>,
}

impl FailedMessage {
    /// Captures a failed message and its error.
    pub fn new(message: &QueueMessage, error: impl Into<String>) -> Self {
        Self {
            message_id: message.message_id,
            body: message.body.clone(),
            error: error.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Trait for the error sink. Recording never fails; a sink that cannot
/// persist should log instead.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    /// Records a message that was dropped as non-retryable.
    async fn record(&self, failure: FailedMessage);
}

/// In-memory error sink for testing and the demo binary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryErrorSink {
    failures: Arc<RwLock<Vec<FailedMessage>>>,
}

impl InMemoryErrorSink {
    /// Creates a new in-memory error sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of failures recorded.
    pub fn failure_count(&self) -> usize {
        self.failures.read().unwrap().len()
    }

    /// Returns a copy of all recorded failures.
    pub fn failures(&self) -> Vec<FailedMessage> {
        self.failures.read().unwrap().clone()
    }
}

#[async_trait]
impl ErrorSink for InMemoryErrorSink {
    async fn record(&self, failure: FailedMessage) {
        tracing::error!(
            message_id = %failure.message_id,
            error = %failure.error,
            "message routed to error sink"
        );
        self.failures.write().unwrap().push(failure);
    }
}
