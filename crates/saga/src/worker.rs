//! The payment worker: polls the event channel, charges each order at most
//! once, and acknowledges only after the outcome is durable and published.

use std::sync::Arc;

use channel::{EventChannel, OrderCancelledData, OrderCreatedData, PaymentProcessedData,
    QueueMessage, SagaEvent};
use chrono::Utc;
use domain::{OrderPaymentStatus, OrderStatus, PaymentAttempt, PaymentStatus};
use store::{OrderStore, PaymentStore, StoreError};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;

use crate::compensation::CompensationService;
use crate::config::WorkerConfig;
use crate::error::{ErrorClass, Result, SagaError};
use crate::services::error_sink::{ErrorSink, FailedMessage};
use crate::services::gateway::{ChargeRequest, PaymentGateway};
use crate::services::inventory::InventoryAdapter;
use crate::services::notification::{Notification, NotificationKind, NotificationSink};

/// Long-running consumer of the saga event channel.
///
/// Per message: parse and validate, check the idempotency key, write the
/// attempt ahead of the gateway call, charge under a bounded timeout,
/// persist the terminal state, publish `PaymentProcessed`, then acknowledge.
/// Retryable failures leave the message for redelivery; poison messages are
/// acknowledged and routed to the error sink.
pub struct PaymentWorker<C, P, O, I, G, N, E>
where
    C: EventChannel,
    P: PaymentStore,
    O: OrderStore,
    I: InventoryAdapter,
    G: PaymentGateway,
    N: NotificationSink,
    E: ErrorSink,
{
    channel: C,
    payments: P,
    orders: O,
    gateway: G,
    notifications: N,
    errors: E,
    compensation: CompensationService<O, I, C>,
    config: WorkerConfig,
}

impl<C, P, O, I, G, N, E> PaymentWorker<C, P, O, I, G, N, E>
where
    C: EventChannel + Clone + 'static,
    P: PaymentStore + 'static,
    O: OrderStore + Clone + 'static,
    I: InventoryAdapter + Clone + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
    E: ErrorSink + 'static,
{
    /// Creates a new payment worker.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel: C,
        payments: P,
        orders: O,
        inventory: I,
        gateway: G,
        notifications: N,
        errors: E,
        config: WorkerConfig,
    ) -> Self {
        let compensation =
            CompensationService::new(orders.clone(), inventory, channel.clone());
        Self {
            channel,
            payments,
            orders,
            gateway,
            notifications,
            errors,
            compensation,
            config,
        }
    }

    /// Runs the poll/dispatch loop until `shutdown` flips to true.
    ///
    /// The loop owns the single poll in flight; handlers run concurrently,
    /// bounded by a semaphore. On shutdown the loop stops polling and waits
    /// up to the drain grace for in-flight handlers; whatever is left
    /// unacknowledged returns to the channel after its visibility timeout.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            concurrency = self.config.concurrency,
            max_batch = self.config.max_batch,
            "payment worker started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut inflight: JoinSet<()> = JoinSet::new();

        loop {
            let batch = tokio::select! {
                changed = shutdown.changed() => {
                    let stop = changed.is_err() || *shutdown.borrow();
                    if stop {
                        break;
                    }
                    continue;
                }
                received = self.channel.receive(self.config.receive_options()) => {
                    match received {
                        Ok(batch) => batch,
                        Err(err) => {
                            tracing::error!(error = %err, "polling the event channel failed");
                            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                            continue;
                        }
                    }
                }
            };

            if !batch.is_empty() {
                tracing::debug!(count = batch.len(), "received batch");
            }

            for message in batch {
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let worker = Arc::clone(&self);
                inflight.spawn(async move {
                    worker.handle_message(message).await;
                    drop(permit);
                });
            }

            while inflight.try_join_next().is_some() {}
        }

        tracing::info!("payment worker draining");
        let drained = tokio::time::timeout(self.config.drain_grace, async {
            while inflight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                "drain grace elapsed; remaining messages will be redelivered after their visibility timeout"
            );
        }
        tracing::info!("payment worker stopped");
    }

    /// Processes one delivery end to end and decides its fate:
    /// acknowledge, leave for redelivery, or drop to the error sink.
    async fn handle_message(&self, message: QueueMessage) {
        let started = std::time::Instant::now();

        let event = match message.event() {
            Ok(event) => event,
            Err(err) => {
                metrics::counter!("worker_messages_poisoned_total").increment(1);
                tracing::error!(
                    message_id = %message.message_id,
                    error = %err,
                    "malformed event payload, dropping message"
                );
                self.errors
                    .record(FailedMessage::new(&message, err.to_string()))
                    .await;
                self.acknowledge(&message).await;
                return;
            }
        };

        let result = match &event {
            SagaEvent::OrderCreated(data) => self.process_order_created(data).await,
            SagaEvent::PaymentProcessed(data) => self.apply_payment_processed(data).await,
            SagaEvent::OrderCancelled(data) => self.handle_order_cancelled(data).await,
        };

        match result {
            Ok(()) => {
                self.acknowledge(&message).await;
                metrics::histogram!("worker_message_seconds")
                    .record(started.elapsed().as_secs_f64());
            }
            Err(err) => match err.classify() {
                ErrorClass::Retryable => {
                    metrics::counter!("worker_messages_retried_total").increment(1);
                    tracing::warn!(
                        message_id = %message.message_id,
                        delivery_count = message.delivery_count,
                        error = %err,
                        "retryable failure, leaving message for redelivery"
                    );
                }
                ErrorClass::Fatal => {
                    metrics::counter!("worker_messages_poisoned_total").increment(1);
                    tracing::error!(
                        message_id = %message.message_id,
                        error = %err,
                        "non-retryable failure, dropping message"
                    );
                    self.errors
                        .record(FailedMessage::new(&message, err.to_string()))
                        .await;
                    self.acknowledge(&message).await;
                }
            },
        }
    }

    async fn acknowledge(&self, message: &QueueMessage) {
        if let Err(err) = self.channel.acknowledge(&message.receipt_handle).await {
            // The idempotency check absorbs the resulting redelivery.
            tracing::warn!(
                message_id = %message.message_id,
                error = %err,
                "acknowledge failed; message will be redelivered"
            );
        }
    }

    /// Steps 1-7 of the per-message algorithm for `OrderCreated`.
    async fn process_order_created(&self, data: &OrderCreatedData) -> Result<()> {
        validate_order_created(data)?;

        // Fast-path duplicate check; the unique constraint on insert below
        // is the authoritative guard.
        if let Some(existing) = self
            .payments
            .find_by_idempotency_key(&data.idempotency_key)
            .await?
        {
            return self.converge_on_existing(existing).await;
        }

        let attempt = PaymentAttempt::new_processing(
            data.order_id,
            data.user_id,
            data.amount,
            data.currency.clone(),
            data.payment_method,
            data.idempotency_key.clone(),
        )
        .map_err(|e| SagaError::MalformedEvent(e.to_string()))?;

        match self.payments.insert_new(attempt.clone()).await {
            Ok(()) => {}
            Err(StoreError::DuplicateIdempotencyKey(key)) => {
                // Lost the race to a concurrent delivery of the same event.
                let existing = self
                    .payments
                    .find_by_idempotency_key(&key)
                    .await?
                    .ok_or_else(|| SagaError::AttemptInFlight(key))?;
                return self.converge_on_existing(existing).await;
            }
            Err(other) => return Err(other.into()),
        }

        metrics::counter!("payment_attempts_started_total").increment(1);
        self.execute_charge(attempt).await
    }

    /// A delivery found an existing attempt for its idempotency key.
    async fn converge_on_existing(&self, existing: PaymentAttempt) -> Result<()> {
        if existing.status.is_terminal() {
            metrics::counter!("worker_duplicate_deliveries_total").increment(1);
            tracing::info!(
                order_id = %existing.order_id,
                payment_id = %existing.id,
                status = %existing.status,
                "duplicate delivery, republishing existing outcome"
            );
            self.channel
                .publish(&SagaEvent::payment_processed(&existing))
                .await?;
            return Ok(());
        }

        let stale_cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.stale_attempt_after)
                .unwrap_or_else(|_| chrono::Duration::zero());
        if existing.updated_at < stale_cutoff {
            tracing::warn!(
                payment_id = %existing.id,
                order_id = %existing.order_id,
                "resuming stale in-flight attempt"
            );
            metrics::counter!("payment_attempts_resumed_total").increment(1);
            return self.execute_charge(existing).await;
        }

        // A younger Processing row means another delivery is mid-charge
        // right now; let the visibility timeout bring this one back.
        Err(SagaError::AttemptInFlight(existing.idempotency_key.clone()))
    }

    /// Charges the gateway and persists the terminal outcome for an attempt
    /// already written in `Processing` state.
    async fn execute_charge(&self, attempt: PaymentAttempt) -> Result<()> {
        let request = ChargeRequest {
            order_id: attempt.order_id,
            user_id: attempt.user_id,
            amount: attempt.amount,
            currency: attempt.currency.clone(),
            method: attempt.method,
        };

        let outcome =
            match tokio::time::timeout(self.config.gateway_timeout, self.gateway.charge(request))
                .await
            {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => return Err(SagaError::GatewayTimeout(self.config.gateway_timeout)),
            };

        let metadata = serde_json::to_value(&outcome)?;
        let persisted = if outcome.success {
            let transaction_id = outcome.transaction_id.clone().ok_or_else(|| {
                SagaError::MalformedEvent("gateway success without transaction id".to_string())
            })?;
            self.payments
                .mark_completed(attempt.id, &transaction_id, metadata)
                .await
        } else {
            let reason = outcome
                .failure_reason
                .clone()
                .unwrap_or_else(|| "payment declined".to_string());
            self.payments.mark_failed(attempt.id, &reason, metadata).await
        };

        let updated = match persisted {
            Ok(updated) => updated,
            Err(StoreError::InvalidPaymentTransition { .. }) => {
                // Another delivery finished this attempt while our charge
                // was in flight; converge on what it persisted.
                let current = self
                    .payments
                    .get(attempt.id)
                    .await?
                    .ok_or(SagaError::PaymentNotFound(attempt.id))?;
                if current.status.is_terminal() {
                    self.channel
                        .publish(&SagaEvent::payment_processed(&current))
                        .await?;
                    return Ok(());
                }
                return Err(SagaError::AttemptInFlight(current.idempotency_key.clone()));
            }
            Err(other) => return Err(other.into()),
        };

        metrics::counter!("payments_processed_total", "status" => updated.status.as_str())
            .increment(1);

        self.channel
            .publish(&SagaEvent::payment_processed(&updated))
            .await?;
        self.send_payment_notification(&updated).await;

        tracing::info!(
            payment_id = %updated.id,
            order_id = %updated.order_id,
            status = %updated.status,
            transaction_id = updated.transaction_id.as_deref().unwrap_or(""),
            "payment attempt finished"
        );
        Ok(())
    }

    /// Applies a `PaymentProcessed` outcome to the order side.
    async fn apply_payment_processed(&self, data: &PaymentProcessedData) -> Result<()> {
        match data.status {
            PaymentStatus::Completed => {
                self.orders
                    .set_payment_status(data.order_id, OrderPaymentStatus::Paid)
                    .await?;
                // A pending order is confirmed once paid; a redelivered
                // outcome finds it already advanced and changes nothing.
                match self
                    .orders
                    .transition_status(
                        data.order_id,
                        &[OrderStatus::Pending],
                        OrderStatus::Confirmed,
                    )
                    .await
                {
                    Ok(_) => {}
                    Err(StoreError::InvalidOrderTransition { .. }) => {}
                    Err(other) => return Err(other.into()),
                }
            }
            PaymentStatus::Failed => {
                self.orders
                    .set_payment_status(data.order_id, OrderPaymentStatus::Failed)
                    .await?;
                // Failed orders compensate: cancel and restore inventory.
                match self.compensation.cancel(data.order_id).await {
                    Ok(_) => {}
                    Err(SagaError::InvalidTransition { .. }) => {}
                    Err(other) => return Err(other),
                }
            }
            PaymentStatus::Refunded => {
                self.orders
                    .set_payment_status(data.order_id, OrderPaymentStatus::Refunded)
                    .await?;
            }
            PaymentStatus::Pending | PaymentStatus::Processing => {
                return Err(SagaError::MalformedEvent(format!(
                    "non-terminal status {} in PaymentProcessed",
                    data.status
                )));
            }
        }
        Ok(())
    }

    /// `OrderCancelled` is notification-only here: inventory was restored
    /// synchronously inside the cancellation transaction.
    async fn handle_order_cancelled(&self, data: &OrderCancelledData) -> Result<()> {
        match self.orders.get(data.order_id).await? {
            Some(order) => {
                let notification = Notification {
                    kind: NotificationKind::OrderCancelled,
                    recipient: order.user_id,
                    data: serde_json::json!({
                        "orderId": order.id,
                        "orderNumber": order.order_number,
                    }),
                };
                if let Err(err) = self.notifications.notify(notification).await {
                    tracing::warn!(
                        order_id = %data.order_id,
                        error = %err,
                        "cancellation notification failed"
                    );
                }
            }
            None => {
                tracing::warn!(order_id = %data.order_id, "OrderCancelled for unknown order");
            }
        }
        Ok(())
    }

    async fn send_payment_notification(&self, attempt: &PaymentAttempt) {
        let kind = if attempt.status == PaymentStatus::Completed {
            NotificationKind::PaymentSuccess
        } else {
            NotificationKind::PaymentFailed
        };
        let notification = Notification {
            kind,
            recipient: attempt.user_id,
            data: serde_json::json!({
                "orderId": attempt.order_id,
                "paymentId": attempt.id,
                "amount": attempt.amount.to_decimal_string(),
                "status": attempt.status,
                "transactionId": attempt.transaction_id,
            }),
        };
        if let Err(err) = self.notifications.notify(notification).await {
            tracing::warn!(
                payment_id = %attempt.id,
                error = %err,
                "payment notification failed"
            );
        }
    }
}

/// Structural validation of an `OrderCreated` payload. Failures are
/// non-retryable.
fn validate_order_created(data: &OrderCreatedData) -> Result<()> {
    if !data.amount.is_positive() {
        return Err(SagaError::MalformedEvent(
            "amount must be positive".to_string(),
        ));
    }
    if data.items.is_empty() {
        return Err(SagaError::MalformedEvent("event has no items".to_string()));
    }
    if data.items.iter().any(|item| item.quantity == 0) {
        return Err(SagaError::MalformedEvent(
            "item quantity must be at least 1".to_string(),
        ));
    }
    if data.currency.as_str().len() != 3 {
        return Err(SagaError::MalformedEvent(format!(
            "invalid currency code: {}",
            data.currency
        )));
    }
    if data.idempotency_key.as_str().is_empty() {
        return Err(SagaError::MalformedEvent(
            "missing idempotency key".to_string(),
        ));
    }
    Ok(())
}
