//! Payout transfer storage

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use super::error::TransferError;
use super::models::{PaymentTransfer, TransferStatus};
use crate::providers::PaymentMethod;

#[async_trait]
pub trait TransferStore: Send + Sync {
    async fn create(&self, transfer: &PaymentTransfer) -> Result<(), TransferError>;

    async fn get(&self, id: Uuid) -> Result<Option<PaymentTransfer>, TransferError>;

    /// Provider confirmed: mark completed and stamp transferred_at.
    async fn set_completed(&self, id: Uuid, transfer_ref: &str) -> Result<(), TransferError>;

    /// Manual channels: accepted, awaiting out-of-band confirmation.
    async fn set_pending(&self, id: Uuid, transfer_ref: &str) -> Result<(), TransferError>;

    /// Re-arm a failed transfer before another provider attempt.
    async fn set_processing(&self, id: Uuid) -> Result<(), TransferError>;

    /// Record a failed attempt: status Failed, retry_count incremented,
    /// last_retry_at stamped. Returns the new retry_count.
    async fn record_failure(&self, id: Uuid, error: &str) -> Result<i32, TransferError>;

    /// Permanently failed transfers tied to an order — compensation
    /// candidates.
    async fn find_exhausted_failed(
        &self,
        limit: i64,
    ) -> Result<Vec<PaymentTransfer>, TransferError>;
}

pub struct PgTransferStore {
    pool: PgPool,
}

impl PgTransferStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &sqlx::postgres::PgRow) -> Result<PaymentTransfer, TransferError> {
        let method: String = row.get("transfer_method");
        let status_id: i16 = row.get("status");
        Ok(PaymentTransfer {
            id: row.get("id"),
            seller_id: row.get("seller_id"),
            amount: row.get("amount"),
            currency: row.get("currency"),
            transfer_method: PaymentMethod::from_str(&method)
                .map_err(|_| TransferError::Database(format!("bad transfer_method {method}")))?,
            status: TransferStatus::from_id(status_id)
                .ok_or_else(|| TransferError::Database(format!("bad status {status_id}")))?,
            retry_count: row.get("retry_count"),
            max_retries: row.get("max_retries"),
            payment_transaction_id: row.get("payment_transaction_id"),
            order_id: row.get("order_id"),
            transfer_ref: row.get("transfer_ref"),
            error_message: row.get("error_message"),
            metadata: row.get("metadata"),
            created_at: row.get("created_at"),
            transferred_at: row.get("transferred_at"),
            last_retry_at: row.get("last_retry_at"),
        })
    }
}

const SELECT_COLS: &str = "id, seller_id, amount, currency, transfer_method, status, retry_count,
    max_retries, payment_transaction_id, order_id, transfer_ref, error_message,
    metadata, created_at, transferred_at, last_retry_at";

#[async_trait]
impl TransferStore for PgTransferStore {
    async fn create(&self, t: &PaymentTransfer) -> Result<(), TransferError> {
        sqlx::query(
            "INSERT INTO payment_transfers
               (id, seller_id, amount, currency, transfer_method, status, retry_count,
                max_retries, payment_transaction_id, order_id, transfer_ref,
                error_message, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(t.id)
        .bind(t.seller_id)
        .bind(t.amount)
        .bind(&t.currency)
        .bind(t.transfer_method.as_str())
        .bind(t.status.id())
        .bind(t.retry_count)
        .bind(t.max_retries)
        .bind(t.payment_transaction_id)
        .bind(t.order_id)
        .bind(&t.transfer_ref)
        .bind(&t.error_message)
        .bind(&t.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<PaymentTransfer>, TransferError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM payment_transfers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn set_completed(&self, id: Uuid, transfer_ref: &str) -> Result<(), TransferError> {
        sqlx::query(
            "UPDATE payment_transfers
             SET status = $1, transfer_ref = $2, transferred_at = NOW(), error_message = NULL
             WHERE id = $3",
        )
        .bind(TransferStatus::Completed.id())
        .bind(transfer_ref)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_pending(&self, id: Uuid, transfer_ref: &str) -> Result<(), TransferError> {
        sqlx::query(
            "UPDATE payment_transfers SET status = $1, transfer_ref = $2 WHERE id = $3",
        )
        .bind(TransferStatus::Pending.id())
        .bind(transfer_ref)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_processing(&self, id: Uuid) -> Result<(), TransferError> {
        sqlx::query("UPDATE payment_transfers SET status = $1 WHERE id = $2")
            .bind(TransferStatus::Processing.id())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, error: &str) -> Result<i32, TransferError> {
        let row = sqlx::query(
            "UPDATE payment_transfers
             SET status = $1, retry_count = retry_count + 1,
                 last_retry_at = NOW(), error_message = $2
             WHERE id = $3
             RETURNING retry_count",
        )
        .bind(TransferStatus::Failed.id())
        .bind(error)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TransferError::TransferNotFound(id))?;

        Ok(row.get("retry_count"))
    }

    async fn find_exhausted_failed(
        &self,
        limit: i64,
    ) -> Result<Vec<PaymentTransfer>, TransferError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM payment_transfers
             WHERE status = $1 AND retry_count >= max_retries AND order_id IS NOT NULL
             ORDER BY created_at
             LIMIT $2"
        ))
        .bind(TransferStatus::Failed.id())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }
}


#[cfg(test)]
pub use mock::MemoryTransferStore;
