//! Collaborator interfaces consumed by the saga, with in-memory
//! implementations used by tests and the demo binary.

pub mod error_sink;
pub mod gateway;
pub mod inventory;
pub mod notification;

pub use error_sink::{ErrorSink, FailedMessage, InMemoryErrorSink};
pub use gateway::{
    ChargeOutcome, ChargeRequest, GatewayError, InMemoryPaymentGateway, PaymentGateway,
    RefundOutcome,
};
pub use inventory::{InMemoryInventory, InventoryAdapter, InventoryError, ProductInfo};
pub use notification::{
    InMemoryNotificationSink, Notification, NotificationError, NotificationKind, NotificationSink,
};
