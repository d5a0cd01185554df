//! Payment worker entry point.
//!
//! Wires the saga together with in-memory collaborators, submits a couple of
//! demo orders so the full order → payment → notification flow is visible,
//! and runs the worker until SIGINT/SIGTERM.

mod config;

use std::sync::Arc;

use channel::InMemoryEventChannel;
use common::UserId;
use domain::{Money, PaymentMethod, ProductId, ShippingAddress};
use saga::services::{
    InMemoryErrorSink, InMemoryInventory, InMemoryNotificationSink, InMemoryPaymentGateway,
};
use saga::{NewOrderItem, OrderSubmissionService, PaymentWorker, SubmitOrder};
use store::{InMemoryOrderStore, InMemoryPaymentStore};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::Config;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    prometheus_builder
        .install()
        .expect("failed to install Prometheus recorder");

    // 3. Wire the saga with in-memory collaborators
    let channel = InMemoryEventChannel::new();
    let orders = InMemoryOrderStore::new();
    let payments = InMemoryPaymentStore::new();
    let inventory = InMemoryInventory::new()
        .with_product("SKU-001", "Widget", Money::from_cents(1000), 25)
        .with_product("SKU-002", "Gadget", Money::from_cents(2500), 10);
    let gateway = InMemoryPaymentGateway::new();
    let notifications = InMemoryNotificationSink::new();
    let errors = InMemoryErrorSink::new();

    let submission =
        OrderSubmissionService::new(orders.clone(), inventory.clone(), channel.clone());
    let worker = Arc::new(PaymentWorker::new(
        channel.clone(),
        payments.clone(),
        orders.clone(),
        inventory.clone(),
        gateway.clone(),
        notifications.clone(),
        errors.clone(),
        config.worker_config(),
    ));

    // 4. Start the worker
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    // 5. Submit demo orders so the saga is visible end to end
    let address = ShippingAddress::new("1 Main St", "Springfield", "12345", "US")
        .expect("demo address is valid");
    for (product, quantity) in [("SKU-001", 2), ("SKU-002", 1)] {
        let result = submission
            .submit(SubmitOrder {
                user_id: UserId::new(),
                items: vec![NewOrderItem {
                    product_id: ProductId::new(product),
                    quantity,
                    price: None,
                }],
                shipping_address: address.clone(),
                payment_method: PaymentMethod::CreditCard,
            })
            .await;
        match result {
            Ok(order) => tracing::info!(
                order_number = %order.order_number,
                total = %order.total_amount,
                "demo order submitted"
            ),
            Err(err) => tracing::error!(error = %err, "demo order rejected"),
        }
    }

    // 6. Run until a shutdown signal arrives
    shutdown_signal().await;
    shutdown_tx.send(true).expect("worker is still listening");
    worker_handle.await.expect("worker task panicked");

    tracing::info!(
        notifications = notifications.sent_count(),
        poisoned = errors.failure_count(),
        "worker shut down gracefully"
    );
}
