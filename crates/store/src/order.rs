//! Order store trait.

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{Order, OrderPaymentStatus, OrderStatus};

use crate::error::Result;

/// Durable record of orders and their line items.
///
/// All implementations must be thread-safe (Send + Sync). Orders are never
/// physically deleted; terminal orders stay queryable.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order together with its line items.
    ///
    /// Fails with `DuplicateOrder` if the id is already taken.
    async fn insert(&self, order: Order) -> Result<()>;

    /// Retrieves an order by id.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Retrieves all orders placed by a user, newest first.
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Atomically moves the order to `to` if its current status is one of
    /// `allowed_from`, returning the updated order.
    ///
    /// Exactly one concurrent caller can win a given transition; the others
    /// get `InvalidOrderTransition`. Callers use this as an exactly-once
    /// guard (e.g. for the move to Cancelled that precedes inventory
    /// restoration).
    async fn transition_status(
        &self,
        order_id: OrderId,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<Order>;

    /// Sets the order's payment status, returning the updated order.
    async fn set_payment_status(
        &self,
        order_id: OrderId,
        payment_status: OrderPaymentStatus,
    ) -> Result<Order>;
}
