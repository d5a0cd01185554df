//! Shared types for the order-to-payment saga.
//!
//! This crate provides the typed identifiers used across the workspace so
//! that an order id can never be confused with a user or payment id.

pub mod types;

pub use types::{OrderId, PaymentId, UserId};
