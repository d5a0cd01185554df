//! Order submission: validate, price, reserve, persist, publish.

use channel::{EventChannel, MessageId, SagaEvent};
use common::{OrderId, UserId};
use domain::{LineItem, Order, PaymentMethod, ProductId, ShippingAddress};
use store::OrderStore;

use crate::error::{Result, SagaError};
use crate::services::inventory::InventoryAdapter;

/// A requested item as submitted by the client.
///
/// The client may send a price; it is ignored. Pricing always comes from the
/// catalog.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Option<domain::Money>,
}

/// An order submission request.
#[derive(Debug, Clone)]
pub struct SubmitOrder {
    pub user_id: UserId,
    pub items: Vec<NewOrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// Validates an incoming order request, reserves inventory, persists the
/// order, and publishes exactly one `OrderCreated` event after commit.
pub struct OrderSubmissionService<O, I, C>
where
    O: OrderStore,
    I: InventoryAdapter,
    C: EventChannel,
{
    orders: O,
    inventory: I,
    channel: C,
}

impl<O, I, C> OrderSubmissionService<O, I, C>
where
    O: OrderStore,
    I: InventoryAdapter,
    C: EventChannel,
{
    /// Creates a new submission service.
    pub fn new(orders: O, inventory: I, channel: C) -> Self {
        Self {
            orders,
            inventory,
            channel,
        }
    }

    /// Submits an order.
    ///
    /// Inventory is decremented before the event is published, so the
    /// payment worker never races with unreserved stock. If any step up to
    /// the order insert fails, every reservation made so far is released and
    /// nothing is published. A publish failure after the insert does not
    /// undo the order; it is logged and left to
    /// [`republish_order_created`](Self::republish_order_created).
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn submit(&self, request: SubmitOrder) -> Result<Order> {
        metrics::counter!("order_submissions_total").increment(1);

        if request.items.is_empty() {
            return Err(SagaError::InvalidRequest("order has no items".to_string()));
        }

        // Price every item from the catalog; client-submitted prices are
        // never trusted.
        let mut line_items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            if item.quantity == 0 {
                return Err(SagaError::InvalidRequest(format!(
                    "quantity for product {} must be at least 1",
                    item.product_id
                )));
            }

            let product = self
                .inventory
                .get_product(&item.product_id)
                .await?
                .ok_or_else(|| SagaError::ProductNotFound(item.product_id.clone()))?;

            if product.stock < item.quantity {
                return Err(SagaError::OutOfStock(item.product_id.clone()));
            }

            line_items.push(LineItem::new(
                product.product_id,
                product.name,
                item.quantity,
                product.price,
            )?);
        }

        let order = Order::new(
            request.user_id,
            line_items,
            request.shipping_address,
            request.payment_method,
        )?;

        // Reserve stock item by item; on any failure release what was
        // already reserved so no partial reservation survives.
        let mut reserved: Vec<(ProductId, u32)> = Vec::with_capacity(order.items.len());
        for item in &order.items {
            match self
                .inventory
                .adjust_stock(&item.product_id, -(item.quantity as i64))
                .await
            {
                Ok(()) => reserved.push((item.product_id.clone(), item.quantity)),
                Err(err) => {
                    self.release_reserved(&reserved).await;
                    return Err(match err {
                        crate::services::inventory::InventoryError::InsufficientStock(id) => {
                            SagaError::OutOfStock(id)
                        }
                        crate::services::inventory::InventoryError::NotFound(id) => {
                            SagaError::ProductNotFound(id)
                        }
                        other => other.into(),
                    });
                }
            }
        }

        if let Err(err) = self.orders.insert(order.clone()).await {
            self.release_reserved(&reserved).await;
            return Err(err.into());
        }

        // Committed. The event is published exactly once per submission; a
        // failure here is recoverable via republish, never a rollback.
        let event = SagaEvent::order_created(&order);
        match self.channel.publish(&event).await {
            Ok(message_id) => {
                tracing::info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    total = %order.total_amount,
                    %message_id,
                    "order created"
                );
            }
            Err(err) => {
                metrics::counter!("order_created_publish_failures_total").increment(1);
                tracing::warn!(
                    order_id = %order.id,
                    error = %err,
                    "order committed but OrderCreated publish failed; republish required"
                );
            }
        }

        Ok(order)
    }

    /// Re-derives and republishes the `OrderCreated` event for an order.
    ///
    /// Reconciliation hook for orders whose post-commit publish failed.
    /// Safe to call at any time: the worker's idempotency check makes a
    /// duplicate event harmless.
    #[tracing::instrument(skip(self))]
    pub async fn republish_order_created(&self, order_id: OrderId) -> Result<MessageId> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;

        let event = SagaEvent::order_created(&order);
        let message_id = self.channel.publish(&event).await?;
        tracing::info!(%order_id, %message_id, "republished OrderCreated");
        Ok(message_id)
    }

    async fn release_reserved(&self, reserved: &[(ProductId, u32)]) {
        for (product_id, quantity) in reserved {
            if let Err(err) = self
                .inventory
                .adjust_stock(product_id, *quantity as i64)
                .await
            {
                tracing::error!(
                    %product_id,
                    quantity,
                    error = %err,
                    "failed to release reservation during submit rollback"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use channel::InMemoryEventChannel;
    use domain::{Money, OrderPaymentStatus, OrderStatus};
    use store::{InMemoryOrderStore, OrderStore};

    use super::*;
    use crate::services::inventory::InMemoryInventory;

    fn setup() -> (
        OrderSubmissionService<InMemoryOrderStore, InMemoryInventory, InMemoryEventChannel>,
        InMemoryOrderStore,
        InMemoryInventory,
        InMemoryEventChannel,
    ) {
        let orders = InMemoryOrderStore::new();
        let inventory = InMemoryInventory::new()
            .with_product("SKU-001", "Widget", Money::from_cents(1000), 5)
            .with_product("SKU-002", "Gadget", Money::from_cents(2500), 3);
        let channel = InMemoryEventChannel::new();

        let service =
            OrderSubmissionService::new(orders.clone(), inventory.clone(), channel.clone());
        (service, orders, inventory, channel)
    }

    fn address() -> ShippingAddress {
        ShippingAddress::new("1 Main St", "Springfield", "12345", "US").unwrap()
    }

    fn request(items: Vec<NewOrderItem>) -> SubmitOrder {
        SubmitOrder {
            user_id: UserId::new(),
            items,
            shipping_address: address(),
            payment_method: PaymentMethod::CreditCard,
        }
    }

    fn item(product_id: &str, quantity: u32) -> NewOrderItem {
        NewOrderItem {
            product_id: ProductId::new(product_id),
            quantity,
            price: None,
        }
    }

    #[tokio::test]
    async fn test_submit_happy_path() {
        let (service, orders, inventory, channel) = setup();

        let order = service.submit(request(vec![item("SKU-001", 2)])).await.unwrap();

        assert_eq!(order.total_amount, Money::from_cents(2000));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, OrderPaymentStatus::Pending);
        assert_eq!(inventory.stock_of(&ProductId::new("SKU-001")), Some(3));

        let stored = orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored, order);

        // Exactly one OrderCreated with the wire shape.
        assert_eq!(channel.approximate_len().await.unwrap(), 1);
        let batch = channel
            .receive(channel::ReceiveOptions {
                max_messages: 10,
                wait: std::time::Duration::from_millis(10),
                visibility_timeout: std::time::Duration::from_secs(60),
            })
            .await
            .unwrap();
        let event = batch[0].event().unwrap();
        match event {
            SagaEvent::OrderCreated(data) => {
                assert_eq!(data.order_id, order.id);
                assert_eq!(data.amount, Money::from_cents(2000));
                assert_eq!(data.items.len(), 1);
                assert_eq!(
                    data.idempotency_key,
                    domain::IdempotencyKey::for_order(order.id)
                );
            }
            other => panic!("expected OrderCreated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_price_is_ignored() {
        let (service, _, _, _) = setup();

        let mut cheap = item("SKU-001", 2);
        cheap.price = Some(Money::from_cents(1));

        let order = service.submit(request(vec![cheap])).await.unwrap();
        assert_eq!(order.total_amount, Money::from_cents(2000));
        assert_eq!(order.items[0].unit_price, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn test_out_of_stock_makes_no_changes() {
        let (service, orders, inventory, channel) = setup();

        let result = service.submit(request(vec![item("SKU-001", 9)])).await;
        assert!(matches!(result, Err(SagaError::OutOfStock(_))));

        assert_eq!(inventory.stock_of(&ProductId::new("SKU-001")), Some(5));
        assert_eq!(orders.order_count().await, 0);
        assert_eq!(channel.approximate_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_product_rejected() {
        let (service, orders, _, channel) = setup();

        let result = service.submit(request(vec![item("SKU-404", 1)])).await;
        assert!(matches!(result, Err(SagaError::ProductNotFound(_))));
        assert_eq!(orders.order_count().await, 0);
        assert_eq!(channel.approximate_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_and_zero_quantity_rejected() {
        let (service, _, _, _) = setup();

        let result = service.submit(request(vec![])).await;
        assert!(matches!(result, Err(SagaError::InvalidRequest(_))));

        let result = service.submit(request(vec![item("SKU-001", 0)])).await;
        assert!(matches!(result, Err(SagaError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_reservations() {
        let (service, orders, inventory, channel) = setup();
        orders.set_fail_on_insert(true).await;

        let result = service
            .submit(request(vec![item("SKU-001", 2), item("SKU-002", 1)]))
            .await;
        assert!(result.is_err());

        assert_eq!(inventory.stock_of(&ProductId::new("SKU-001")), Some(5));
        assert_eq!(inventory.stock_of(&ProductId::new("SKU-002")), Some(3));
        assert_eq!(orders.order_count().await, 0);
        assert_eq!(channel.approximate_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partial_reservation_is_released() {
        let (service, _, inventory, channel) = setup();

        // Each line passes the stock pre-check (3 >= 2), but together they
        // exceed stock, so the second reservation fails and the first must
        // be released again.
        let result = service
            .submit(request(vec![item("SKU-002", 2), item("SKU-002", 2)]))
            .await;
        assert!(matches!(result, Err(SagaError::OutOfStock(_))));

        assert_eq!(inventory.stock_of(&ProductId::new("SKU-002")), Some(3));
        assert_eq!(channel.approximate_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_republish_order_created() {
        let (service, _, _, channel) = setup();

        let order = service.submit(request(vec![item("SKU-001", 1)])).await.unwrap();
        assert_eq!(channel.approximate_len().await.unwrap(), 1);

        service.republish_order_created(order.id).await.unwrap();
        assert_eq!(channel.approximate_len().await.unwrap(), 2);

        let missing = service.republish_order_created(OrderId::new()).await;
        assert!(matches!(missing, Err(SagaError::OrderNotFound(_))));
    }
}
