//! PostgreSQL-backed store implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, UserId};
use domain::{
    Currency, IdempotencyKey, Money, Order, OrderNumber, OrderPaymentStatus, OrderStatus,
    PaymentAttempt, PaymentMethod, PaymentStatus,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::order::OrderStore;
use crate::payment::PaymentStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id UUID PRIMARY KEY,
    order_number TEXT NOT NULL,
    user_id UUID NOT NULL,
    items JSONB NOT NULL,
    total_cents BIGINT NOT NULL,
    currency TEXT NOT NULL,
    shipping_address JSONB NOT NULL,
    payment_method TEXT NOT NULL,
    status TEXT NOT NULL,
    payment_status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT orders_order_number_unique UNIQUE (order_number)
);

CREATE INDEX IF NOT EXISTS idx_orders_user_id ON orders (user_id);
CREATE INDEX IF NOT EXISTS idx_orders_status ON orders (status);

CREATE TABLE IF NOT EXISTS payments (
    id UUID PRIMARY KEY,
    order_id UUID NOT NULL,
    user_id UUID NOT NULL,
    amount_cents BIGINT NOT NULL,
    currency TEXT NOT NULL,
    method TEXT NOT NULL,
    status TEXT NOT NULL,
    transaction_id TEXT,
    idempotency_key TEXT NOT NULL,
    failure_reason TEXT,
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT payments_idempotency_key_unique UNIQUE (idempotency_key),
    CONSTRAINT payments_transaction_id_unique UNIQUE (transaction_id)
);

CREATE INDEX IF NOT EXISTS idx_payments_order_id ON payments (order_id);
CREATE INDEX IF NOT EXISTS idx_payments_user_id ON payments (user_id);
CREATE INDEX IF NOT EXISTS idx_payments_status ON payments (status);
"#;

/// Creates the orders and payments tables if they do not exist.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

fn enum_from_str<T: serde::de::DeserializeOwned>(raw: String) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::String(raw))?)
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let items: serde_json::Value = row.try_get("items")?;
    let shipping_address: serde_json::Value = row.try_get("shipping_address")?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_number: OrderNumber::from_string(row.try_get::<String, _>("order_number")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        items: serde_json::from_value(items)?,
        total_amount: Money::from_cents(row.try_get("total_cents")?),
        currency: enum_from_str::<Currency>(row.try_get("currency")?)?,
        shipping_address: serde_json::from_value(shipping_address)?,
        payment_method: enum_from_str::<PaymentMethod>(row.try_get("payment_method")?)?,
        status: enum_from_str::<OrderStatus>(row.try_get("status")?)?,
        payment_status: enum_from_str::<OrderPaymentStatus>(row.try_get("payment_status")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_attempt(row: PgRow) -> Result<PaymentAttempt> {
    Ok(PaymentAttempt {
        id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        amount: Money::from_cents(row.try_get("amount_cents")?),
        currency: enum_from_str::<Currency>(row.try_get("currency")?)?,
        method: enum_from_str::<PaymentMethod>(row.try_get("method")?)?,
        status: enum_from_str::<PaymentStatus>(row.try_get("status")?)?,
        transaction_id: row.try_get("transaction_id")?,
        idempotency_key: IdempotencyKey::from_string(
            row.try_get::<String, _>("idempotency_key")?,
        ),
        failure_reason: row.try_get("failure_reason")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let items = serde_json::to_value(&order.items)?;
        let shipping_address = serde_json::to_value(&order.shipping_address)?;

        sqlx::query(
            r#"
            INSERT INTO orders
                (id, order_number, user_id, items, total_cents, currency,
                 shipping_address, payment_method, status, payment_status,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.order_number.as_str())
        .bind(order.user_id.as_uuid())
        .bind(items)
        .bind(order.total_amount.cents())
        .bind(order.currency.as_str())
        .bind(shipping_address)
        .bind(order.payment_method.as_str())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::DuplicateOrder(order.id);
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_order).transpose()
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows =
            sqlx::query("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id.as_uuid())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(row_to_order).collect()
    }

    async fn transition_status(
        &self,
        order_id: OrderId,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<Order> {
        let allowed: Vec<String> = allowed_from
            .iter()
            .map(|status| status.as_str().to_string())
            .collect();

        let row = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            RETURNING *
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(to.as_str())
        .bind(&allowed)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_order(row),
            None => {
                let current: Option<String> =
                    sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                        .bind(order_id.as_uuid())
                        .fetch_optional(&self.pool)
                        .await?;
                match current {
                    Some(status) => Err(StoreError::InvalidOrderTransition {
                        order_id,
                        from: enum_from_str(status)?,
                        to,
                    }),
                    None => Err(StoreError::OrderNotFound(order_id)),
                }
            }
        }
    }

    async fn set_payment_status(
        &self,
        order_id: OrderId,
        payment_status: OrderPaymentStatus,
    ) -> Result<Order> {
        let row = sqlx::query(
            r#"
            UPDATE orders
            SET payment_status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(payment_status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_order(row),
            None => Err(StoreError::OrderNotFound(order_id)),
        }
    }
}

/// PostgreSQL-backed payment store.
///
/// The unique constraints on `idempotency_key` and `transaction_id` are the
/// authoritative dedup mechanism; conflicts surface as typed errors.
#[derive(Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    /// Creates a new PostgreSQL payment store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn transition_error(
        &self,
        payment_id: PaymentId,
        to: PaymentStatus,
    ) -> StoreError {
        let current: std::result::Result<Option<String>, _> =
            sqlx::query_scalar("SELECT status FROM payments WHERE id = $1")
                .bind(payment_id.as_uuid())
                .fetch_optional(&self.pool)
                .await;

        match current {
            Ok(Some(status)) => match enum_from_str::<PaymentStatus>(status) {
                Ok(from) => StoreError::InvalidPaymentTransition {
                    payment_id,
                    from,
                    to,
                },
                Err(e) => e,
            },
            Ok(None) => StoreError::PaymentNotFound(payment_id),
            Err(e) => StoreError::Database(e),
        }
    }
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn insert_new(&self, attempt: PaymentAttempt) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments
                (id, order_id, user_id, amount_cents, currency, method, status,
                 transaction_id, idempotency_key, failure_reason, metadata,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(attempt.id.as_uuid())
        .bind(attempt.order_id.as_uuid())
        .bind(attempt.user_id.as_uuid())
        .bind(attempt.amount.cents())
        .bind(attempt.currency.as_str())
        .bind(attempt.method.as_str())
        .bind(attempt.status.as_str())
        .bind(&attempt.transaction_id)
        .bind(attempt.idempotency_key.as_str())
        .bind(&attempt.failure_reason)
        .bind(&attempt.metadata)
        .bind(attempt.created_at)
        .bind(attempt.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("payments_idempotency_key_unique") {
                    return StoreError::DuplicateIdempotencyKey(
                        attempt.idempotency_key.clone(),
                    );
                }
                if db_err.constraint() == Some("payments_transaction_id_unique") {
                    return StoreError::DuplicateTransactionId(
                        attempt.transaction_id.clone().unwrap_or_default(),
                    );
                }
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get(&self, payment_id: PaymentId) -> Result<Option<PaymentAttempt>> {
        let row = sqlx::query("SELECT * FROM payments WHERE id = $1")
            .bind(payment_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_attempt).transpose()
    }

    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<PaymentAttempt>> {
        let row = sqlx::query("SELECT * FROM payments WHERE idempotency_key = $1")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_attempt).transpose()
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<PaymentAttempt>> {
        let rows =
            sqlx::query("SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at DESC")
                .bind(order_id.as_uuid())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(row_to_attempt).collect()
    }

    async fn mark_completed(
        &self,
        payment_id: PaymentId,
        transaction_id: &str,
        metadata: serde_json::Value,
    ) -> Result<PaymentAttempt> {
        let row = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'completed', transaction_id = $2, metadata = $3,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            RETURNING *
            "#,
        )
        .bind(payment_id.as_uuid())
        .bind(transaction_id)
        .bind(&metadata)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("payments_transaction_id_unique")
            {
                return StoreError::DuplicateTransactionId(transaction_id.to_string());
            }
            StoreError::Database(e)
        })?;

        match row {
            Some(row) => row_to_attempt(row),
            None => Err(self
                .transition_error(payment_id, PaymentStatus::Completed)
                .await),
        }
    }

    async fn mark_failed(
        &self,
        payment_id: PaymentId,
        reason: &str,
        metadata: serde_json::Value,
    ) -> Result<PaymentAttempt> {
        let row = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed', failure_reason = $2, metadata = $3,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            RETURNING *
            "#,
        )
        .bind(payment_id.as_uuid())
        .bind(reason)
        .bind(&metadata)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_attempt(row),
            None => Err(self
                .transition_error(payment_id, PaymentStatus::Failed)
                .await),
        }
    }

    async fn mark_refunded(
        &self,
        payment_id: PaymentId,
        refund_metadata: serde_json::Value,
    ) -> Result<PaymentAttempt> {
        let row = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'refunded',
                metadata = metadata || jsonb_build_object('refund', $2::jsonb),
                updated_at = NOW()
            WHERE id = $1 AND status = 'completed'
            RETURNING *
            "#,
        )
        .bind(payment_id.as_uuid())
        .bind(&refund_metadata)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_attempt(row),
            None => Err(self
                .transition_error(payment_id, PaymentStatus::Refunded)
                .await),
        }
    }

    async fn find_stale_processing(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<PaymentAttempt>> {
        let rows = sqlx::query(
            "SELECT * FROM payments WHERE status = 'processing' AND updated_at < $1",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_attempt).collect()
    }
}
