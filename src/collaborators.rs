//! External collaborator contracts
//!
//! The order store and notification sink belong to subsystems outside the
//! settlement engine. They are consumed through these traits only; the
//! Postgres implementations here touch the shared tables the platform
//! already maintains.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CollaboratorError {
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for CollaboratorError {
    fn from(e: sqlx::Error) -> Self {
        CollaboratorError::Database(e.to_string())
    }
}

/// Order payment state as the settlement engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderPaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

#[derive(Debug, Clone)]
pub struct OrderSummary {
    pub order_id: i64,
    pub seller_id: i64,
    pub buyer_id: i64,
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub payment_status: OrderPaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order(&self, order_id: i64) -> Result<Option<OrderSummary>, CollaboratorError>;

    /// Mark the order paid and decrement stock. Idempotent on the order side.
    async fn mark_paid(&self, order_id: i64, amount: i64) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        user_id: i64,
        template_key: &str,
        params: serde_json::Value,
    ) -> Result<(), CollaboratorError>;
}

// ============================================================================
// Postgres implementations
// ============================================================================

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn get_order(&self, order_id: i64) -> Result<Option<OrderSummary>, CollaboratorError> {
        let row = sqlx::query(
            "SELECT id, seller_id, buyer_id, amount, currency, payment_status, paid_at
             FROM orders WHERE id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let status: String = r.get("payment_status");
            OrderSummary {
                order_id: r.get("id"),
                seller_id: r.get("seller_id"),
                buyer_id: r.get("buyer_id"),
                amount: r.get("amount"),
                currency: r.get("currency"),
                payment_status: match status.as_str() {
                    "paid" => OrderPaymentStatus::Paid,
                    "refunded" => OrderPaymentStatus::Refunded,
                    _ => OrderPaymentStatus::Unpaid,
                },
                paid_at: r.get("paid_at"),
            }
        }))
    }

    async fn mark_paid(&self, order_id: i64, amount: i64) -> Result<(), CollaboratorError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE orders SET payment_status = 'paid', paid_at = NOW()
             WHERE id = $1 AND payment_status = 'unpaid'",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        // Stock moves only on the first paid transition
        if updated.rows_affected() > 0 {
            sqlx::query(
                "UPDATE products SET stock = stock - oi.quantity
                 FROM order_items oi
                 WHERE oi.order_id = $1 AND products.id = oi.product_id",
            )
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(order_id, amount, "Order marked paid");
        Ok(())
    }
}

pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn notify(
        &self,
        user_id: i64,
        template_key: &str,
        params: serde_json::Value,
    ) -> Result<(), CollaboratorError> {
        sqlx::query(
            "INSERT INTO notifications (user_id, template_key, params)
             VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(template_key)
        .bind(params)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ============================================================================
// Mocks for tests
// ============================================================================


#[cfg(test)]
pub use mock::{MockNotificationSink, MockOrderStore};
