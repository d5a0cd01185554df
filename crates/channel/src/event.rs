//! Saga events and their wire representation.
//!
//! The message body is the flat JSON object of the event data; the event
//! type tag travels in the message metadata, mirroring how the queue
//! attributes carry routing information.

use common::{OrderId, PaymentId, UserId};
use domain::{
    Currency, IdempotencyKey, Money, Order, PaymentAttempt, PaymentMethod, PaymentStatus,
};
use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, Result};
use crate::message::MessageMetadata;

/// Serde codec rendering `Money` as a plain decimal string (`"20.00"`).
pub(crate) mod money_decimal {
    use domain::Money;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(money: &Money, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&money.to_decimal_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// A line item as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLineItem {
    pub product_id: domain::ProductId,
    pub quantity: u32,
    #[serde(with = "money_decimal")]
    pub price: Money,
}

/// Body of an `OrderCreated` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedData {
    pub order_id: OrderId,
    pub user_id: UserId,
    #[serde(with = "money_decimal")]
    pub amount: Money,
    pub currency: Currency,
    pub payment_method: PaymentMethod,
    pub items: Vec<EventLineItem>,
    /// Deterministic function of the order id, so redelivery is safe.
    pub idempotency_key: IdempotencyKey,
}

/// Body of a `PaymentProcessed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProcessedData {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
}

/// Body of an `OrderCancelled` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelledData {
    pub order_id: OrderId,
    pub items: Vec<EventLineItem>,
}

/// The closed set of saga events on the channel.
///
/// Consumers dispatch exhaustively over these variants; there is no
/// open-ended payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaEvent {
    /// An order was recorded and inventory reserved.
    OrderCreated(OrderCreatedData),

    /// A payment attempt reached a terminal state.
    PaymentProcessed(PaymentProcessedData),

    /// An order was cancelled and its reservations released.
    OrderCancelled(OrderCancelledData),
}

impl SagaEvent {
    /// Returns the event type tag carried in the message metadata.
    pub fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::OrderCreated(_) => "ORDER_CREATED",
            SagaEvent::PaymentProcessed(_) => "PAYMENT_PROCESSED",
            SagaEvent::OrderCancelled(_) => "ORDER_CANCELLED",
        }
    }

    /// Returns the order this event belongs to.
    pub fn order_id(&self) -> OrderId {
        match self {
            SagaEvent::OrderCreated(data) => data.order_id,
            SagaEvent::PaymentProcessed(data) => data.order_id,
            SagaEvent::OrderCancelled(data) => data.order_id,
        }
    }

    /// Serializes the event data into the flat wire body.
    pub fn to_body(&self) -> Result<serde_json::Value> {
        let body = match self {
            SagaEvent::OrderCreated(data) => serde_json::to_value(data)?,
            SagaEvent::PaymentProcessed(data) => serde_json::to_value(data)?,
            SagaEvent::OrderCancelled(data) => serde_json::to_value(data)?,
        };
        Ok(body)
    }

    /// Reconstructs an event from the metadata tag and wire body.
    pub fn from_parts(event_type: &str, body: &serde_json::Value) -> Result<Self> {
        match event_type {
            "ORDER_CREATED" => Ok(SagaEvent::OrderCreated(serde_json::from_value(
                body.clone(),
            )?)),
            "PAYMENT_PROCESSED" => Ok(SagaEvent::PaymentProcessed(serde_json::from_value(
                body.clone(),
            )?)),
            "ORDER_CANCELLED" => Ok(SagaEvent::OrderCancelled(serde_json::from_value(
                body.clone(),
            )?)),
            other => Err(ChannelError::UnknownEventType(other.to_string())),
        }
    }

    /// Builds the metadata for publishing this event now.
    pub fn metadata(&self) -> MessageMetadata {
        MessageMetadata {
            event_type: self.event_type().to_string(),
            order_id: self.order_id(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Builds the `OrderCreated` event for a freshly committed order.
    pub fn order_created(order: &Order) -> Self {
        SagaEvent::OrderCreated(OrderCreatedData {
            order_id: order.id,
            user_id: order.user_id,
            amount: order.total_amount,
            currency: order.currency.clone(),
            payment_method: order.payment_method,
            items: order.items.iter().map(event_line_item).collect(),
            idempotency_key: IdempotencyKey::for_order(order.id),
        })
    }

    /// Builds the `PaymentProcessed` event for a terminal payment attempt.
    pub fn payment_processed(attempt: &PaymentAttempt) -> Self {
        SagaEvent::PaymentProcessed(PaymentProcessedData {
            order_id: attempt.order_id,
            payment_id: attempt.id,
            status: attempt.status,
            transaction_id: attempt.transaction_id.clone(),
        })
    }

    /// Builds the `OrderCancelled` event for a cancelled order.
    pub fn order_cancelled(order: &Order) -> Self {
        SagaEvent::OrderCancelled(OrderCancelledData {
            order_id: order.id,
            items: order.items.iter().map(event_line_item).collect(),
        })
    }
}

fn event_line_item(item: &domain::LineItem) -> EventLineItem {
    EventLineItem {
        product_id: item.product_id.clone(),
        quantity: item.quantity,
        price: item.unit_price,
    }
}
