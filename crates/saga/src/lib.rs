//! The order-to-payment saga.
//!
//! Three locally-transactional steps coordinated via asynchronous events
//! instead of a distributed transaction:
//!
//! 1. [`submission::OrderSubmissionService`] validates an order request,
//!    reserves inventory, persists the order and publishes `OrderCreated`.
//! 2. [`worker::PaymentWorker`] polls the event channel, charges the
//!    gateway at most once per order (idempotency key) and publishes
//!    `PaymentProcessed`.
//! 3. [`compensation`] reverses reservations on cancellation or payment
//!    failure; refunds are an explicit, separately-gated operation.

pub mod compensation;
pub mod config;
pub mod error;
pub mod services;
pub mod submission;
pub mod worker;

pub use compensation::{CompensationService, RefundService};
pub use config::WorkerConfig;
pub use error::{ErrorClass, Result, SagaError};
pub use submission::{NewOrderItem, OrderSubmissionService, SubmitOrder};
pub use worker::PaymentWorker;
