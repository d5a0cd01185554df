//! Payment worker configuration.

use std::time::Duration;

use channel::ReceiveOptions;

/// Tunables for the payment worker's poll/dispatch loop.
///
/// The visibility timeout must exceed the gateway timeout plus store-write
/// latency with margin, or duplicate processing risk rises.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum messages pulled per poll (capped at the channel batch limit).
    pub max_batch: usize,

    /// Long-poll wait per receive call.
    pub poll_wait: Duration,

    /// How long a delivered message stays invisible before redelivery.
    pub visibility_timeout: Duration,

    /// Bound on concurrently processed messages.
    pub concurrency: usize,

    /// Bounded timeout on each gateway call; exceeding it is retryable.
    pub gateway_timeout: Duration,

    /// A `Processing` attempt older than this is treated as orphaned by a
    /// crash and resumed instead of waiting for reconciliation.
    pub stale_attempt_after: Duration,

    /// How long shutdown waits for in-flight handlers before giving up.
    pub drain_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_batch: 10,
            poll_wait: Duration::from_secs(20),
            visibility_timeout: Duration::from_secs(300),
            concurrency: 4,
            gateway_timeout: Duration::from_secs(30),
            stale_attempt_after: Duration::from_secs(600),
            drain_grace: Duration::from_secs(5),
        }
    }
}

impl WorkerConfig {
    /// Builds the receive options for one poll.
    pub fn receive_options(&self) -> ReceiveOptions {
        ReceiveOptions {
            max_messages: self.max_batch,
            wait: self.poll_wait,
            visibility_timeout: self.visibility_timeout,
        }
    }
}
