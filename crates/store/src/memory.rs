//! In-memory store implementations for testing and the demo binary.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, UserId};
use domain::{
    IdempotencyKey, Order, OrderPaymentStatus, OrderStatus, PaymentAttempt, PaymentError,
};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::order::OrderStore;
use crate::payment::PaymentStore;

#[derive(Default)]
struct OrderState {
    orders: HashMap<OrderId, Order>,
    fail_on_insert: bool,
}

/// In-memory order store.
///
/// Provides the same interface as the PostgreSQL implementation; conditional
/// transitions are atomic because they run under a single write lock.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<OrderState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Configures the store to fail the next insert calls.
    pub async fn set_fail_on_insert(&self, fail: bool) {
        self.state.write().await.fail_on_insert = fail;
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut state = self.state.write().await;

        if state.fail_on_insert {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        if state.orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateOrder(order.id));
        }

        state.orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn transition_status(
        &self,
        order_id: OrderId,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        if !allowed_from.contains(&order.status) {
            return Err(StoreError::InvalidOrderTransition {
                order_id,
                from: order.status,
                to,
            });
        }

        let result = if to == OrderStatus::Cancelled {
            order.cancel()
        } else {
            order.advance_status(to)
        };
        result.map_err(|_| StoreError::InvalidOrderTransition {
            order_id,
            from: order.status,
            to,
        })?;

        Ok(order.clone())
    }

    async fn set_payment_status(
        &self,
        order_id: OrderId,
        payment_status: OrderPaymentStatus,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        order.set_payment_status(payment_status);
        Ok(order.clone())
    }
}

#[derive(Default)]
struct PaymentState {
    attempts: HashMap<PaymentId, PaymentAttempt>,
    by_key: HashMap<String, PaymentId>,
    by_transaction: HashMap<String, PaymentId>,
}

/// In-memory payment store.
///
/// The `by_key` and `by_transaction` maps simulate the unique constraints of
/// the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryPaymentStore {
    state: Arc<RwLock<PaymentState>>,
}

impl InMemoryPaymentStore {
    /// Creates a new empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of payment attempts stored.
    pub async fn attempt_count(&self) -> usize {
        self.state.read().await.attempts.len()
    }
}

fn invalid_payment_transition(
    payment_id: PaymentId,
    err: PaymentError,
) -> StoreError {
    match err {
        PaymentError::InvalidTransition { from, to } => StoreError::InvalidPaymentTransition {
            payment_id,
            from,
            to,
        },
        // new_processing validation never reaches the store
        PaymentError::NonPositiveAmount => StoreError::PaymentNotFound(payment_id),
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert_new(&self, attempt: PaymentAttempt) -> Result<()> {
        let mut state = self.state.write().await;

        let key = attempt.idempotency_key.as_str().to_string();
        if state.by_key.contains_key(&key) {
            return Err(StoreError::DuplicateIdempotencyKey(
                attempt.idempotency_key.clone(),
            ));
        }

        state.by_key.insert(key, attempt.id);
        if let Some(ref txn) = attempt.transaction_id {
            state.by_transaction.insert(txn.clone(), attempt.id);
        }
        state.attempts.insert(attempt.id, attempt);
        Ok(())
    }

    async fn get(&self, payment_id: PaymentId) -> Result<Option<PaymentAttempt>> {
        let state = self.state.read().await;
        Ok(state.attempts.get(&payment_id).cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<PaymentAttempt>> {
        let state = self.state.read().await;
        Ok(state
            .by_key
            .get(key.as_str())
            .and_then(|id| state.attempts.get(id))
            .cloned())
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<PaymentAttempt>> {
        let state = self.state.read().await;
        let mut attempts: Vec<PaymentAttempt> = state
            .attempts
            .values()
            .filter(|attempt| attempt.order_id == order_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(attempts)
    }

    async fn mark_completed(
        &self,
        payment_id: PaymentId,
        transaction_id: &str,
        metadata: serde_json::Value,
    ) -> Result<PaymentAttempt> {
        let mut state = self.state.write().await;

        if let Some(existing) = state.by_transaction.get(transaction_id)
            && *existing != payment_id
        {
            return Err(StoreError::DuplicateTransactionId(
                transaction_id.to_string(),
            ));
        }

        let attempt = state
            .attempts
            .get_mut(&payment_id)
            .ok_or(StoreError::PaymentNotFound(payment_id))?;
        attempt
            .complete(transaction_id, metadata)
            .map_err(|e| invalid_payment_transition(payment_id, e))?;
        let updated = attempt.clone();

        state
            .by_transaction
            .insert(transaction_id.to_string(), payment_id);
        Ok(updated)
    }

    async fn mark_failed(
        &self,
        payment_id: PaymentId,
        reason: &str,
        metadata: serde_json::Value,
    ) -> Result<PaymentAttempt> {
        let mut state = self.state.write().await;
        let attempt = state
            .attempts
            .get_mut(&payment_id)
            .ok_or(StoreError::PaymentNotFound(payment_id))?;
        attempt
            .fail(reason, metadata)
            .map_err(|e| invalid_payment_transition(payment_id, e))?;
        Ok(attempt.clone())
    }

    async fn mark_refunded(
        &self,
        payment_id: PaymentId,
        refund_metadata: serde_json::Value,
    ) -> Result<PaymentAttempt> {
        let mut state = self.state.write().await;
        let attempt = state
            .attempts
            .get_mut(&payment_id)
            .ok_or(StoreError::PaymentNotFound(payment_id))?;
        attempt
            .refund(refund_metadata)
            .map_err(|e| invalid_payment_transition(payment_id, e))?;
        Ok(attempt.clone())
    }

    async fn find_stale_processing(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<PaymentAttempt>> {
        let state = self.state.read().await;
        Ok(state
            .attempts
            .values()
            .filter(|attempt| {
                attempt.status == domain::PaymentStatus::Processing
                    && attempt.updated_at < older_than
            })
            .cloned()
            .collect())
    }
}
