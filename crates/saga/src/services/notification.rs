//! Notification sink trait and in-memory implementation.
//!
//! Notifications are fire-and-forget: delivery failures are logged by the
//! caller and never fail a saga step.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::UserId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PaymentSuccess,
    PaymentFailed,
    PaymentRefund,
    OrderCancelled,
}

/// A notification request for the notification collaborator.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: UserId,
    pub data: serde_json::Value,
}

/// Error from the notification collaborator.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotificationError(pub String);

/// Trait for the notification collaborator.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sends a notification.
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Default)]
struct InMemorySinkState {
    sent: Vec<Notification>,
    fail_on_notify: bool,
}

/// In-memory notification sink for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationSink {
    state: Arc<RwLock<InMemorySinkState>>,
}

impl InMemoryNotificationSink {
    /// Creates a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sink to fail the next notify calls.
    pub fn set_fail_on_notify(&self, fail: bool) {
        self.state.write().unwrap().fail_on_notify = fail;
    }

    /// Returns the number of notifications sent.
    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }

    /// Returns the kinds of all notifications sent, in order.
    pub fn sent_kinds(&self) -> Vec<NotificationKind> {
        self.state
            .read()
            .unwrap()
            .sent
            .iter()
            .map(|n| n.kind)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_notify {
            return Err(NotificationError("injected failure".to_string()));
        }
        state.sent.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_records_notification() {
        let sink = InMemoryNotificationSink::new();
        sink.notify(Notification {
            kind: NotificationKind::PaymentSuccess,
            recipient: UserId::new(),
            data: serde_json::json!({"orderId": "o-1"}),
        })
        .await
        .unwrap();

        assert_eq!(sink.sent_count(), 1);
        assert_eq!(sink.sent_kinds(), vec![NotificationKind::PaymentSuccess]);
    }

    #[tokio::test]
    async fn test_fail_on_notify() {
        let sink = InMemoryNotificationSink::new();
        sink.set_fail_on_notify(true);

        let result = sink
            .notify(Notification {
                kind: NotificationKind::PaymentFailed,
                recipient: UserId::new(),
                data: serde_json::Value::Null,
            })
            .await;
        assert!(result.is_err());
        assert_eq!(sink.sent_count(), 0);
    }
}
