//! Payment attempts and their state machine.

pub mod attempt;
pub mod idempotency;
pub mod method;
pub mod state;

pub use attempt::PaymentAttempt;
pub use idempotency::IdempotencyKey;
pub use method::PaymentMethod;
pub use state::PaymentStatus;
