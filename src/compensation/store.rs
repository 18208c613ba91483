//! Compensation record storage
//!
//! Idempotency lives on the UNIQUE (order_id, transfer_id) constraint:
//! `create_if_absent` either inserts or returns the already-existing
//! record, so repeated scans never duplicate.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use super::models::{CompensationRecord, CompensationStatus};

#[derive(Debug, Error, Clone)]
pub enum CompensationStoreError {
    #[error("Compensation record not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for CompensationStoreError {
    fn from(e: sqlx::Error) -> Self {
        CompensationStoreError::Database(e.to_string())
    }
}

#[async_trait]
pub trait CompensationStore: Send + Sync {
    /// Insert the record, or return the existing one for the same
    /// (order_id, transfer_id).
    async fn create_if_absent(
        &self,
        record: &CompensationRecord,
    ) -> Result<CompensationRecord, CompensationStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<CompensationRecord>, CompensationStoreError>;

    async fn list_pending(
        &self,
        limit: i64,
    ) -> Result<Vec<CompensationRecord>, CompensationStoreError>;

    /// Pending -> processing. Returns true only for the caller that won
    /// the claim; a record already in flight yields false.
    async fn set_processing(&self, id: Uuid) -> Result<bool, CompensationStoreError>;

    async fn set_completed(&self, id: Uuid) -> Result<(), CompensationStoreError>;

    async fn set_failed(&self, id: Uuid, error: &str) -> Result<(), CompensationStoreError>;
}

pub struct PgCompensationStore {
    pool: PgPool,
}

impl PgCompensationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &sqlx::postgres::PgRow) -> Result<CompensationRecord, CompensationStoreError> {
        let status: String = row.get("status");
        Ok(CompensationRecord {
            id: row.get("id"),
            order_id: row.get("order_id"),
            transfer_id: row.get("transfer_id"),
            seller_id: row.get("seller_id"),
            amount: row.get("amount"),
            currency: row.get("currency"),
            reason: row.get("reason"),
            status: CompensationStatus::from_str_opt(&status)
                .ok_or_else(|| CompensationStoreError::Database(format!("bad status {status}")))?,
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            resolved_at: row.get("resolved_at"),
        })
    }
}

const SELECT_COLS: &str = "id, order_id, transfer_id, seller_id, amount, currency, reason,
    status, error_message, created_at, resolved_at";

#[async_trait]
impl CompensationStore for PgCompensationStore {
    async fn create_if_absent(
        &self,
        record: &CompensationRecord,
    ) -> Result<CompensationRecord, CompensationStoreError> {
        sqlx::query(
            "INSERT INTO compensation_records
               (id, order_id, transfer_id, seller_id, amount, currency, reason, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (order_id, transfer_id) DO NOTHING",
        )
        .bind(record.id)
        .bind(record.order_id)
        .bind(record.transfer_id)
        .bind(record.seller_id)
        .bind(record.amount)
        .bind(&record.currency)
        .bind(&record.reason)
        .bind(CompensationStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        // Winner or loser, the row for this pair now exists
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM compensation_records
             WHERE order_id = $1 AND transfer_id = $2"
        ))
        .bind(record.order_id)
        .bind(record.transfer_id)
        .fetch_one(&self.pool)
        .await?;

        Self::from_row(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<CompensationRecord>, CompensationStoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM compensation_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_pending(
        &self,
        limit: i64,
    ) -> Result<Vec<CompensationRecord>, CompensationStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM compensation_records
             WHERE status = 'pending'
             ORDER BY created_at
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn set_processing(&self, id: Uuid) -> Result<bool, CompensationStoreError> {
        let result = sqlx::query(
            "UPDATE compensation_records
             SET status = 'processing'
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_completed(&self, id: Uuid) -> Result<(), CompensationStoreError> {
        sqlx::query(
            "UPDATE compensation_records
             SET status = 'completed', error_message = NULL, resolved_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_failed(&self, id: Uuid, error: &str) -> Result<(), CompensationStoreError> {
        sqlx::query(
            "UPDATE compensation_records
             SET status = 'failed', error_message = $1, resolved_at = NOW()
             WHERE id = $2",
        )
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}


#[cfg(test)]
pub use mock::MemoryCompensationStore;
