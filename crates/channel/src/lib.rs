//! The saga event channel.
//!
//! An at-least-once queue carrying saga events between the order side and
//! the payment side. Delivered-but-unacknowledged messages become visible
//! again after a visibility timeout; consumers rely on idempotent handling,
//! not on the channel, for effective-once processing.

pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod queue;

pub use error::{ChannelError, Result};
pub use event::{EventLineItem, OrderCancelledData, OrderCreatedData, PaymentProcessedData, SagaEvent};
pub use memory::InMemoryEventChannel;
pub use message::{MessageId, MessageMetadata, QueueMessage, ReceiptHandle};
pub use queue::{EventChannel, MAX_BATCH_ENTRIES, ReceiveOptions};
