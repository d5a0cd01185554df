//! Compensation: order cancellation and explicit refunds.

use channel::{EventChannel, SagaEvent};
use common::{OrderId, PaymentId};
use domain::{Order, OrderPaymentStatus, OrderStatus, PaymentAttempt};
use store::{OrderStore, PaymentStore, StoreError};

use crate::error::{Result, SagaError};
use crate::services::inventory::InventoryAdapter;
use crate::services::notification::{Notification, NotificationKind, NotificationSink};
use crate::services::gateway::PaymentGateway;

/// Cancels orders, restoring their inventory reservations exactly once.
pub struct CompensationService<O, I, C>
where
    O: OrderStore,
    I: InventoryAdapter,
    C: EventChannel,
{
    orders: O,
    inventory: I,
    channel: C,
}

impl<O, I, C> CompensationService<O, I, C>
where
    O: OrderStore,
    I: InventoryAdapter,
    C: EventChannel,
{
    /// Creates a new compensation service.
    pub fn new(orders: O, inventory: I, channel: C) -> Self {
        Self {
            orders,
            inventory,
            channel,
        }
    }

    /// Cancels an order.
    ///
    /// Legal only while the order is Pending, Confirmed or Processing. The
    /// status move to Cancelled is claimed atomically in the order store
    /// first; whoever wins that claim — and only them — restores the ordered
    /// quantities, so concurrent cancels can never double-restore. A
    /// completed payment is not refunded here; refunds are explicit.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, order_id: OrderId) -> Result<Order> {
        let order = match self
            .orders
            .transition_status(order_id, &OrderStatus::CANCELLABLE, OrderStatus::Cancelled)
            .await
        {
            Ok(order) => order,
            Err(StoreError::OrderNotFound(id)) => return Err(SagaError::OrderNotFound(id)),
            Err(StoreError::InvalidOrderTransition { from, to, .. }) => {
                return Err(SagaError::InvalidTransition {
                    order_id,
                    from,
                    to,
                });
            }
            Err(other) => return Err(other.into()),
        };

        let mut failed = 0usize;
        for item in &order.items {
            if let Err(err) = self
                .inventory
                .adjust_stock(&item.product_id, item.quantity as i64)
                .await
            {
                tracing::error!(
                    %order_id,
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    error = %err,
                    "failed to restore inventory for cancelled order"
                );
                failed += 1;
            }
        }

        let event = SagaEvent::order_cancelled(&order);
        if let Err(err) = self.channel.publish(&event).await {
            tracing::warn!(%order_id, error = %err, "failed to publish OrderCancelled");
        }

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(%order_id, order_number = %order.order_number, "order cancelled");

        if failed > 0 {
            return Err(SagaError::CompensationFailed {
                order_id,
                failed,
                total: order.items.len(),
            });
        }
        Ok(order)
    }
}

/// Refunds completed payments, exactly once per attempt.
pub struct RefundService<P, O, G, N>
where
    P: PaymentStore,
    O: OrderStore,
    G: PaymentGateway,
    N: NotificationSink,
{
    payments: P,
    orders: O,
    gateway: G,
    notifications: N,
}

impl<P, O, G, N> RefundService<P, O, G, N>
where
    P: PaymentStore,
    O: OrderStore,
    G: PaymentGateway,
    N: NotificationSink,
{
    /// Creates a new refund service.
    pub fn new(payments: P, orders: O, gateway: G, notifications: N) -> Self {
        Self {
            payments,
            orders,
            gateway,
            notifications,
        }
    }

    /// Refunds a payment attempt.
    ///
    /// Gated on the attempt being Completed; refunding an already-refunded
    /// attempt is rejected, not retried. Concurrent duplicate calls may both
    /// reach the gateway, but the atomic Completed → Refunded transition in
    /// the payment store admits exactly one winner.
    #[tracing::instrument(skip(self))]
    pub async fn refund(&self, payment_id: PaymentId) -> Result<PaymentAttempt> {
        let attempt = self
            .payments
            .get(payment_id)
            .await?
            .ok_or(SagaError::PaymentNotFound(payment_id))?;

        if !attempt.status.can_refund() {
            return Err(SagaError::RefundNotAllowed {
                payment_id,
                status: attempt.status,
            });
        }

        let transaction_id = attempt
            .transaction_id
            .clone()
            .ok_or(SagaError::MissingTransactionId(payment_id))?;

        let outcome = self
            .gateway
            .refund(&transaction_id, attempt.amount)
            .await?;
        if !outcome.success {
            return Err(SagaError::RefundDeclined(payment_id));
        }

        let refunded = match self
            .payments
            .mark_refunded(payment_id, serde_json::json!({ "refund_id": outcome.refund_id }))
            .await
        {
            Ok(attempt) => attempt,
            Err(StoreError::InvalidPaymentTransition { from, to, .. }) => {
                // A concurrent refund won the transition.
                return Err(SagaError::RefundNotAllowed {
                    payment_id,
                    status: if from == domain::PaymentStatus::Refunded {
                        from
                    } else {
                        to
                    },
                });
            }
            Err(other) => return Err(other.into()),
        };

        self.orders
            .set_payment_status(refunded.order_id, OrderPaymentStatus::Refunded)
            .await?;

        let notification = Notification {
            kind: NotificationKind::PaymentRefund,
            recipient: refunded.user_id,
            data: serde_json::json!({
                "orderId": refunded.order_id,
                "paymentId": refunded.id,
                "amount": refunded.amount.to_decimal_string(),
            }),
        };
        if let Err(err) = self.notifications.notify(notification).await {
            tracing::warn!(%payment_id, error = %err, "refund notification failed");
        }

        metrics::counter!("payments_refunded_total").increment(1);
        tracing::info!(%payment_id, order_id = %refunded.order_id, "payment refunded");

        Ok(refunded)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use channel::InMemoryEventChannel;
    use common::UserId;
    use domain::{
        Currency, IdempotencyKey, LineItem, Money, PaymentMethod, PaymentStatus,
        ShippingAddress,
    };
    use store::{InMemoryOrderStore, InMemoryPaymentStore};

    use super::*;
    use crate::services::gateway::InMemoryPaymentGateway;
    use crate::services::inventory::InMemoryInventory;
    use crate::services::notification::InMemoryNotificationSink;

    fn cancel_setup() -> (
        CompensationService<InMemoryOrderStore, InMemoryInventory, InMemoryEventChannel>,
        InMemoryOrderStore,
        InMemoryInventory,
        InMemoryEventChannel,
    ) {
        let orders = InMemoryOrderStore::new();
        let inventory =
            InMemoryInventory::new().with_product("SKU-001", "Widget", Money::from_cents(1000), 3);
        let channel = InMemoryEventChannel::new();
        let service =
            CompensationService::new(orders.clone(), inventory.clone(), channel.clone());
        (service, orders, inventory, channel)
    }

    async fn seed_order(orders: &InMemoryOrderStore, quantity: u32) -> Order {
        let items =
            vec![LineItem::new("SKU-001", "Widget", quantity, Money::from_cents(1000)).unwrap()];
        let order = Order::new(
            UserId::new(),
            items,
            ShippingAddress::new("1 Main St", "Springfield", "12345", "US").unwrap(),
            PaymentMethod::CreditCard,
        )
        .unwrap();
        orders.insert(order.clone()).await.unwrap();
        order
    }

    #[tokio::test]
    async fn test_cancel_restores_exact_quantities() {
        let (service, orders, inventory, channel) = cancel_setup();
        let order = seed_order(&orders, 2).await;

        // Submission already reserved the stock.
        inventory
            .adjust_stock(&domain::ProductId::new("SKU-001"), -2)
            .await
            .unwrap();
        assert_eq!(inventory.stock_of(&domain::ProductId::new("SKU-001")), Some(1));

        let cancelled = service.cancel(order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(inventory.stock_of(&domain::ProductId::new("SKU-001")), Some(3));

        // One OrderCancelled event with the items to restore.
        assert_eq!(channel.approximate_len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancel_shipped_order_rejected() {
        let (service, orders, inventory, _) = cancel_setup();
        let order = seed_order(&orders, 1).await;

        orders
            .transition_status(order.id, &[OrderStatus::Pending], OrderStatus::Confirmed)
            .await
            .unwrap();
        orders
            .transition_status(order.id, &[OrderStatus::Confirmed], OrderStatus::Processing)
            .await
            .unwrap();
        orders
            .transition_status(order.id, &[OrderStatus::Processing], OrderStatus::Shipped)
            .await
            .unwrap();

        let before = inventory.stock_of(&domain::ProductId::new("SKU-001"));
        let result = service.cancel(order.id).await;
        assert!(matches!(result, Err(SagaError::InvalidTransition { .. })));
        assert_eq!(inventory.stock_of(&domain::ProductId::new("SKU-001")), before);
    }

    #[tokio::test]
    async fn test_double_cancel_restores_only_once() {
        let (service, orders, inventory, _) = cancel_setup();
        let order = seed_order(&orders, 2).await;
        inventory
            .adjust_stock(&domain::ProductId::new("SKU-001"), -2)
            .await
            .unwrap();

        service.cancel(order.id).await.unwrap();
        let second = service.cancel(order.id).await;
        assert!(matches!(second, Err(SagaError::InvalidTransition { .. })));

        assert_eq!(inventory.stock_of(&domain::ProductId::new("SKU-001")), Some(3));
    }

    #[tokio::test]
    async fn test_cancel_unknown_order() {
        let (service, _, _, _) = cancel_setup();
        let result = service.cancel(OrderId::new()).await;
        assert!(matches!(result, Err(SagaError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_surfaces_restore_failures() {
        let (service, orders, inventory, _) = cancel_setup();
        let order = seed_order(&orders, 2).await;
        inventory.set_fail_on_adjust(true);

        let result = service.cancel(order.id).await;
        assert!(matches!(
            result,
            Err(SagaError::CompensationFailed { failed: 1, total: 1, .. })
        ));

        // The claim stands; the order is cancelled even though restock needs
        // operator follow-up.
        let stored = orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }

    fn refund_setup() -> (
        RefundService<
            InMemoryPaymentStore,
            InMemoryOrderStore,
            InMemoryPaymentGateway,
            InMemoryNotificationSink,
        >,
        InMemoryPaymentStore,
        InMemoryOrderStore,
        InMemoryPaymentGateway,
        InMemoryNotificationSink,
    ) {
        let payments = InMemoryPaymentStore::new();
        let orders = InMemoryOrderStore::new();
        let gateway = InMemoryPaymentGateway::new();
        let notifications = InMemoryNotificationSink::new();
        let service = RefundService::new(
            payments.clone(),
            orders.clone(),
            gateway.clone(),
            notifications.clone(),
        );
        (service, payments, orders, gateway, notifications)
    }

    async fn seed_completed_attempt(
        payments: &InMemoryPaymentStore,
        orders: &InMemoryOrderStore,
    ) -> PaymentAttempt {
        let order = seed_order(orders, 1).await;
        let attempt = domain::PaymentAttempt::new_processing(
            order.id,
            order.user_id,
            order.total_amount,
            Currency::usd(),
            PaymentMethod::CreditCard,
            IdempotencyKey::for_order(order.id),
        )
        .unwrap();
        payments.insert_new(attempt.clone()).await.unwrap();
        payments
            .mark_completed(attempt.id, "txn-0001", serde_json::json!({}))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_refund_happy_path() {
        let (service, payments, orders, gateway, notifications) = refund_setup();
        let attempt = seed_completed_attempt(&payments, &orders).await;

        let refunded = service.refund(attempt.id).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        assert_eq!(gateway.refund_count(), 1);
        assert_eq!(notifications.sent_count(), 1);

        let order = orders.get(attempt.order_id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, OrderPaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_refund_requires_completed_status() {
        let (service, payments, orders, gateway, _) = refund_setup();
        let order = seed_order(&orders, 1).await;
        let attempt = domain::PaymentAttempt::new_processing(
            order.id,
            order.user_id,
            order.total_amount,
            Currency::usd(),
            PaymentMethod::CreditCard,
            IdempotencyKey::for_order(order.id),
        )
        .unwrap();
        payments.insert_new(attempt.clone()).await.unwrap();

        let result = service.refund(attempt.id).await;
        assert!(matches!(result, Err(SagaError::RefundNotAllowed { .. })));
        assert_eq!(gateway.refund_count(), 0);

        let unchanged = payments.get(attempt.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, PaymentStatus::Processing);
    }

    #[tokio::test]
    async fn test_refund_twice_rejected() {
        let (service, payments, orders, _, _) = refund_setup();
        let attempt = seed_completed_attempt(&payments, &orders).await;

        service.refund(attempt.id).await.unwrap();
        let second = service.refund(attempt.id).await;
        assert!(matches!(second, Err(SagaError::RefundNotAllowed { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_refunds_transition_exactly_once() {
        let (service, payments, orders, _, _) = refund_setup();
        let attempt = seed_completed_attempt(&payments, &orders).await;
        let service = Arc::new(service);

        let first = tokio::spawn({
            let service = Arc::clone(&service);
            let payment_id = attempt.id;
            async move { service.refund(payment_id).await }
        });
        let second = tokio::spawn({
            let service = Arc::clone(&service);
            let payment_id = attempt.id;
            async move { service.refund(payment_id).await }
        });

        let outcomes = [first.await.unwrap(), second.await.unwrap()];
        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        let stored = payments.get(attempt.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_refund_unknown_payment() {
        let (service, _, _, _, _) = refund_setup();
        let result = service.refund(PaymentId::new()).await;
        assert!(matches!(result, Err(SagaError::PaymentNotFound(_))));
    }
}
