//! The Order entity.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OrderError;
use crate::order::line_item::LineItem;
use crate::order::state::{OrderPaymentStatus, OrderStatus};
use crate::payment::PaymentMethod;
use crate::value_objects::{Currency, Money};

/// Human-readable order number, unique per order.
///
/// Format: `ORD-<millisecond timestamp>-<4 random digits>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Generates a new order number for the given creation time.
    pub fn generate(at: DateTime<Utc>) -> Self {
        let random = Uuid::new_v4().as_u128() % 10_000;
        Self(format!("ORD-{}-{:04}", at.timestamp_millis(), random))
    }

    /// Wraps an existing order number (e.g. read back from a store).
    pub fn from_string(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the order number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shipping address for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub line1: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Creates a shipping address, trimming whitespace and rejecting blank
    /// fields.
    pub fn new(
        line1: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Result<Self, OrderError> {
        let line1 = line1.into().trim().to_string();
        let city = city.into().trim().to_string();
        let postal_code = postal_code.into().trim().to_string();
        let country = country.into().trim().to_string();

        if line1.is_empty() {
            return Err(OrderError::MissingAddressField { field: "line1" });
        }
        if city.is_empty() {
            return Err(OrderError::MissingAddressField { field: "city" });
        }
        if postal_code.is_empty() {
            return Err(OrderError::MissingAddressField {
                field: "postal_code",
            });
        }
        if country.is_empty() {
            return Err(OrderError::MissingAddressField { field: "country" });
        }

        Ok(Self {
            line1,
            city,
            postal_code,
            country,
        })
    }
}

/// A customer order and its line items.
///
/// Construct only through [`Order::new`], which validates the line items and
/// computes the total from them. Orders are never physically deleted; they
/// end their life in `Delivered` or `Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub total_amount: Money,
    pub currency: Currency,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order.
    ///
    /// The total is the sum of the line item subtotals; the caller has no
    /// way to supply it.
    pub fn new(
        user_id: UserId,
        items: Vec<LineItem>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let total_amount: Money = items.iter().map(|item| item.subtotal).sum();
        let now = Utc::now();

        Ok(Self {
            id: OrderId::new(),
            order_number: OrderNumber::generate(now),
            user_id,
            items,
            total_amount,
            currency: Currency::usd(),
            shipping_address,
            payment_method,
            status: OrderStatus::Pending,
            payment_status: OrderPaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Moves the order one step forward in its lifecycle.
    ///
    /// Cancellation is not a forward move; use [`Order::cancel`].
    pub fn advance_status(&mut self, to: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_advance_to(to) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Cancels the order. Legal only from Pending, Confirmed or Processing.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Cancelled,
            });
        }
        self.status = OrderStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records the payment outcome reported by the payment worker or the
    /// refund path.
    pub fn set_payment_status(&mut self, payment_status: OrderPaymentStatus) {
        self.payment_status = payment_status;
        self.updated_at = Utc::now();
    }

    /// Returns true if the order's total equals the sum of its line item
    /// subtotals.
    pub fn total_is_consistent(&self) -> bool {
        let computed: Money = self.items.iter().map(|item| item.subtotal).sum();
        computed == self.total_amount
    }
}
