//! In-memory event channel implementation.
//!
//! Provides the same delivery semantics as a real queue: long-poll receive,
//! per-delivery receipt handles, and visibility-timeout redelivery of
//! unacknowledged messages.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::{Instant, sleep_until};

use crate::error::{ChannelError, Result};
use crate::event::SagaEvent;
use crate::message::{MessageId, MessageMetadata, QueueMessage, ReceiptHandle};
use crate::queue::{EventChannel, MAX_BATCH_ENTRIES, ReceiveOptions};

struct StoredMessage {
    message_id: MessageId,
    body: serde_json::Value,
    metadata: MessageMetadata,
    delivery_count: u32,
    visible_at: Instant,
    receipt: Option<ReceiptHandle>,
}

/// In-memory at-least-once event channel.
#[derive(Clone, Default)]
pub struct InMemoryEventChannel {
    state: Arc<Mutex<Vec<StoredMessage>>>,
    notify: Arc<Notify>,
}

impl InMemoryEventChannel {
    /// Creates a new empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a raw body with explicit metadata, bypassing event
    /// serialization. Used to model external producers and malformed
    /// payloads.
    pub async fn publish_raw(
        &self,
        body: serde_json::Value,
        metadata: MessageMetadata,
    ) -> MessageId {
        let message_id = MessageId::new();
        let mut state = self.state.lock().await;
        state.push(StoredMessage {
            message_id,
            body,
            metadata,
            delivery_count: 0,
            visible_at: Instant::now(),
            receipt: None,
        });
        drop(state);
        self.notify.notify_one();
        message_id
    }

    /// Total number of messages held (visible or in flight).
    pub async fn message_count(&self) -> usize {
        self.state.lock().await.len()
    }
}

#[async_trait]
impl EventChannel for InMemoryEventChannel {
    async fn publish(&self, event: &SagaEvent) -> Result<MessageId> {
        let body = event.to_body()?;
        let metadata = event.metadata();
        tracing::debug!(
            event_type = %metadata.event_type,
            order_id = %metadata.order_id,
            "publishing saga event"
        );
        Ok(self.publish_raw(body, metadata).await)
    }

    async fn publish_batch(&self, events: &[SagaEvent]) -> Result<Vec<MessageId>> {
        let mut ids = Vec::with_capacity(events.len());
        for chunk in events.chunks(MAX_BATCH_ENTRIES) {
            let mut entries = Vec::with_capacity(chunk.len());
            for event in chunk {
                entries.push((event.to_body()?, event.metadata()));
            }

            let mut state = self.state.lock().await;
            for (body, metadata) in entries {
                let message_id = MessageId::new();
                state.push(StoredMessage {
                    message_id,
                    body,
                    metadata,
                    delivery_count: 0,
                    visible_at: Instant::now(),
                    receipt: None,
                });
                ids.push(message_id);
            }
            drop(state);
            self.notify.notify_one();
        }
        Ok(ids)
    }

    async fn receive(&self, options: ReceiveOptions) -> Result<Vec<QueueMessage>> {
        let max_messages = options.max_messages.min(MAX_BATCH_ENTRIES);
        let deadline = Instant::now() + options.wait;

        loop {
            let (batch, next_visible) = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let mut batch = Vec::new();

                for message in state.iter_mut() {
                    if batch.len() >= max_messages {
                        break;
                    }
                    if message.visible_at <= now {
                        message.delivery_count += 1;
                        message.visible_at = now + options.visibility_timeout;
                        let receipt = ReceiptHandle::issue();
                        message.receipt = Some(receipt.clone());
                        batch.push(QueueMessage {
                            message_id: message.message_id,
                            body: message.body.clone(),
                            metadata: message.metadata.clone(),
                            receipt_handle: receipt,
                            delivery_count: message.delivery_count,
                        });
                    }
                }

                let next_visible = state.iter().map(|m| m.visible_at).min();
                (batch, next_visible)
            };

            if !batch.is_empty() {
                return Ok(batch);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }

            let wake = match next_visible {
                Some(at) if at < deadline => at,
                _ => deadline,
            };

            tokio::select! {
                _ = self.notify.notified() => {}
                _ = sleep_until(wake) => {}
            }
        }
    }

    async fn acknowledge(&self, receipt: &ReceiptHandle) -> Result<()> {
        let mut state = self.state.lock().await;
        let position = state
            .iter()
            .position(|message| message.receipt.as_ref() == Some(receipt));

        match position {
            Some(index) => {
                state.swap_remove(index);
                Ok(())
            }
            None => Err(ChannelError::UnknownReceipt),
        }
    }

    async fn approximate_len(&self) -> Result<usize> {
        Ok(self.state.lock().await.len())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::UserId;
    use domain::{LineItem, Money, Order, PaymentMethod, ShippingAddress};

    use super::*;

    fn test_event() -> SagaEvent {
        let items = vec![LineItem::new("SKU-001", "Widget", 2, Money::from_cents(1000)).unwrap()];
        let order = Order::new(
            UserId::new(),
            items,
            ShippingAddress::new("1 Main St", "Springfield", "12345", "US").unwrap(),
            PaymentMethod::CreditCard,
        )
        .unwrap();
        SagaEvent::order_created(&order)
    }

    fn short_receive(visibility: Duration) -> ReceiveOptions {
        ReceiveOptions {
            max_messages: 10,
            wait: Duration::from_millis(50),
            visibility_timeout: visibility,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publish_receive_acknowledge() {
        let channel = InMemoryEventChannel::new();
        let event = test_event();

        channel.publish(&event).await.unwrap();
        assert_eq!(channel.approximate_len().await.unwrap(), 1);

        let batch = channel
            .receive(short_receive(Duration::from_secs(300)))
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].delivery_count, 1);
        assert_eq!(batch[0].event().unwrap(), event);

        channel.acknowledge(&batch[0].receipt_handle).await.unwrap();
        assert_eq!(channel.approximate_len().await.unwrap(), 0);

        let empty = channel
            .receive(short_receive(Duration::from_secs(300)))
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_message_is_invisible() {
        let channel = InMemoryEventChannel::new();
        channel.publish(&test_event()).await.unwrap();

        let first = channel
            .receive(short_receive(Duration::from_secs(300)))
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        let second = channel
            .receive(short_receive(Duration::from_secs(300)))
            .await
            .unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unacknowledged_message_redelivered_after_visibility_timeout() {
        let channel = InMemoryEventChannel::new();
        channel.publish(&test_event()).await.unwrap();

        let first = channel
            .receive(short_receive(Duration::from_millis(100)))
            .await
            .unwrap();
        assert_eq!(first[0].delivery_count, 1);

        // Not acknowledged; becomes visible again after the timeout.
        let redelivered = channel
            .receive(ReceiveOptions {
                max_messages: 10,
                wait: Duration::from_millis(500),
                visibility_timeout: Duration::from_millis(100),
            })
            .await
            .unwrap();
        assert_eq!(redelivered.len(), 1);
        assert_eq!(redelivered[0].delivery_count, 2);
        assert_ne!(redelivered[0].receipt_handle, first[0].receipt_handle);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_receipt_rejected_after_redelivery() {
        let channel = InMemoryEventChannel::new();
        channel.publish(&test_event()).await.unwrap();

        let first = channel
            .receive(short_receive(Duration::from_millis(50)))
            .await
            .unwrap();
        let redelivered = channel
            .receive(ReceiveOptions {
                max_messages: 10,
                wait: Duration::from_millis(500),
                visibility_timeout: Duration::from_secs(300),
            })
            .await
            .unwrap();
        assert_eq!(redelivered.len(), 1);

        let stale = channel.acknowledge(&first[0].receipt_handle).await;
        assert!(matches!(stale, Err(ChannelError::UnknownReceipt)));

        channel
            .acknowledge(&redelivered[0].receipt_handle)
            .await
            .unwrap();
        assert_eq!(channel.approximate_len().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn long_poll_wakes_on_publish() {
        let channel = InMemoryEventChannel::new();
        let publisher = channel.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            publisher.publish(&test_event()).await.unwrap();
        });

        let batch = channel
            .receive(ReceiveOptions {
                max_messages: 10,
                wait: Duration::from_secs(5),
                visibility_timeout: Duration::from_secs(300),
            })
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn receive_respects_batch_limit() {
        let channel = InMemoryEventChannel::new();
        for _ in 0..15 {
            channel.publish(&test_event()).await.unwrap();
        }

        let batch = channel
            .receive(ReceiveOptions {
                max_messages: 25,
                wait: Duration::from_millis(50),
                visibility_timeout: Duration::from_secs(300),
            })
            .await
            .unwrap();
        assert_eq!(batch.len(), MAX_BATCH_ENTRIES);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_batch_chunks_past_the_limit() {
        let channel = InMemoryEventChannel::new();
        let events: Vec<SagaEvent> = (0..25).map(|_| test_event()).collect();

        let ids = channel.publish_batch(&events).await.unwrap();
        assert_eq!(ids.len(), 25);
        assert_eq!(channel.approximate_len().await.unwrap(), 25);
    }
}
