//! Order lifecycle state machines.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// Status progresses monotonically forward:
/// ```text
/// Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered
///    │            │             │
///    └────────────┴─────────────┴──► Cancelled
/// ```
/// Cancellation is only legal from Pending, Confirmed or Processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order recorded, payment outcome not yet known.
    #[default]
    Pending,

    /// Payment confirmed.
    Confirmed,

    /// Order is being fulfilled.
    Processing,

    /// Order has been handed to the carrier.
    Shipped,

    /// Order reached the customer (terminal state).
    Delivered,

    /// Order was cancelled (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// The statuses from which an order may still be cancelled.
    pub const CANCELLABLE: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
    ];

    /// Returns true if the order can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        Self::CANCELLABLE.contains(self)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Returns true if `to` is a legal forward move from this state.
    ///
    /// Cancellation is not a forward move; it is checked via [`can_cancel`](Self::can_cancel).
    pub fn can_advance_to(&self, to: OrderStatus) -> bool {
        if to == OrderStatus::Cancelled {
            return false;
        }
        Self::rank(to) == Self::rank(*self) + 1
    }

    fn rank(status: OrderStatus) -> u8 {
        match status {
            OrderStatus::Pending => 0,
            OrderStatus::Confirmed => 1,
            OrderStatus::Processing => 2,
            OrderStatus::Shipped => 3,
            OrderStatus::Delivered => 4,
            OrderStatus::Cancelled => 5,
        }
    }

    /// Returns the status name as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Payment status of an order, advanced only by the payment worker
/// and the refund path, never by the client directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    /// Payment outcome not yet known.
    #[default]
    Pending,

    /// Payment completed.
    Paid,

    /// Payment failed.
    Failed,

    /// Payment was refunded.
    Refunded,
}

impl OrderPaymentStatus {
    /// Returns the status name as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderPaymentStatus::Pending => "pending",
            OrderPaymentStatus::Paid => "paid",
            OrderPaymentStatus::Failed => "failed",
            OrderPaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for OrderPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderPaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderPaymentStatus::Pending),
            "paid" => Ok(OrderPaymentStatus::Paid),
            "failed" => Ok(OrderPaymentStatus::Failed),
            "refunded" => Ok(OrderPaymentStatus::Refunded),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}
