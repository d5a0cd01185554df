//! Channel error types.

use thiserror::Error;

/// Errors that can occur when interacting with the event channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The receipt handle does not match any in-flight delivery.
    ///
    /// Either the message was already acknowledged or its visibility timeout
    /// elapsed and it was redelivered under a fresh receipt.
    #[error("unknown or expired receipt handle")]
    UnknownReceipt,

    /// The message metadata carries an event type this consumer does not know.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A transport-level error occurred (connection refused, timeout,
    /// throttling). Retryable by classification.
    #[error("channel transport error: {0}")]
    Transport(String),
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
