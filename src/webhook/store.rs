//! Payment transaction storage
//!
//! The UNIQUE (provider, provider_ref) constraint is the serialization
//! point for at-least-once delivery: concurrent deliveries of the same
//! event race on `insert_pending` / `mark_paid`, and exactly one caller
//! observes the winning transition.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::error::WebhookError;
use super::models::{EventKind, PaymentTransaction, TransactionStatus};
use crate::providers::PaymentMethod;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn find(
        &self,
        provider: PaymentMethod,
        provider_ref: &str,
    ) -> Result<Option<PaymentTransaction>, WebhookError>;

    /// Insert a pending transaction; false when (provider, provider_ref)
    /// already exists.
    async fn insert_pending(&self, tx: &PaymentTransaction) -> Result<bool, WebhookError>;

    /// Pending -> paid. Returns true only for the caller that won the
    /// transition; every other caller sees false.
    async fn mark_paid(
        &self,
        provider: PaymentMethod,
        provider_ref: &str,
    ) -> Result<bool, WebhookError>;

    /// Paid -> refunded/partially_refunded. False unless currently paid.
    async fn mark_refunded(
        &self,
        provider: PaymentMethod,
        provider_ref: &str,
        partial: bool,
    ) -> Result<bool, WebhookError>;
}

pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &sqlx::postgres::PgRow) -> Result<PaymentTransaction, WebhookError> {
        let provider: String = row.get("provider");
        let kind: String = row.get("kind");
        let status: String = row.get("status");
        Ok(PaymentTransaction {
            id: row.get("id"),
            provider: provider
                .parse()
                .map_err(|_| WebhookError::Database(format!("bad provider {provider}")))?,
            provider_ref: row.get("provider_ref"),
            kind: parse_kind(&kind)?,
            amount: row.get("amount"),
            currency: row.get("currency"),
            payer_id: row.get("payer_id"),
            payee_id: row.get("payee_id"),
            order_id: row.get("order_id"),
            status: TransactionStatus::from_str_opt(&status)
                .ok_or_else(|| WebhookError::Database(format!("bad status {status}")))?,
            created_at: row.get("created_at"),
            paid_at: row.get("paid_at"),
        })
    }
}

fn parse_kind(s: &str) -> Result<EventKind, WebhookError> {
    match s {
        "order" => Ok(EventKind::Order),
        "subscription" => Ok(EventKind::Subscription),
        "tip" => Ok(EventKind::Tip),
        "user_tip" => Ok(EventKind::UserTip),
        "platform_fee" => Ok(EventKind::PlatformFee),
        "deposit" => Ok(EventKind::Deposit),
        _ => Err(WebhookError::Database(format!("bad kind {s}"))),
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn find(
        &self,
        provider: PaymentMethod,
        provider_ref: &str,
    ) -> Result<Option<PaymentTransaction>, WebhookError> {
        let row = sqlx::query(
            "SELECT id, provider, provider_ref, kind, amount, currency, payer_id,
                    payee_id, order_id, status, created_at, paid_at
             FROM payment_transactions
             WHERE provider = $1 AND provider_ref = $2",
        )
        .bind(provider.as_str())
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn insert_pending(&self, tx: &PaymentTransaction) -> Result<bool, WebhookError> {
        let result = sqlx::query(
            "INSERT INTO payment_transactions
               (id, provider, provider_ref, kind, amount, currency, payer_id,
                payee_id, order_id, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (provider, provider_ref) DO NOTHING",
        )
        .bind(tx.id)
        .bind(tx.provider.as_str())
        .bind(&tx.provider_ref)
        .bind(tx.kind.as_str())
        .bind(tx.amount)
        .bind(&tx.currency)
        .bind(tx.payer_id)
        .bind(tx.payee_id)
        .bind(tx.order_id)
        .bind(TransactionStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_paid(
        &self,
        provider: PaymentMethod,
        provider_ref: &str,
    ) -> Result<bool, WebhookError> {
        let result = sqlx::query(
            "UPDATE payment_transactions SET status = 'paid', paid_at = NOW()
             WHERE provider = $1 AND provider_ref = $2 AND status = 'pending'",
        )
        .bind(provider.as_str())
        .bind(provider_ref)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_refunded(
        &self,
        provider: PaymentMethod,
        provider_ref: &str,
        partial: bool,
    ) -> Result<bool, WebhookError> {
        let next = if partial {
            TransactionStatus::PartiallyRefunded
        } else {
            TransactionStatus::Refunded
        };
        let result = sqlx::query(
            "UPDATE payment_transactions SET status = $1
             WHERE provider = $2 AND provider_ref = $3 AND status = 'paid'",
        )
        .bind(next.as_str())
        .bind(provider.as_str())
        .bind(provider_ref)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}


#[cfg(test)]
pub use mock::MemoryTransactionStore;

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(provider_ref: &str) -> PaymentTransaction {
        PaymentTransaction {
            id: Uuid::new_v4(),
            provider: PaymentMethod::Stripe,
            provider_ref: provider_ref.to_string(),
            kind: EventKind::Order,
            amount: 10_000,
            currency: "USD".into(),
            payer_id: Some(1),
            payee_id: Some(2),
            order_id: Some(100),
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
            paid_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_is_unique_per_provider_ref() {
        let store = MemoryTransactionStore::new();
        assert!(store.insert_pending(&tx("evt_1")).await.unwrap());
        assert!(!store.insert_pending(&tx("evt_1")).await.unwrap());
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn test_mark_paid_won_exactly_once() {
        let store = MemoryTransactionStore::new();
        store.insert_pending(&tx("evt_1")).await.unwrap();

        assert!(store.mark_paid(PaymentMethod::Stripe, "evt_1").await.unwrap());
        assert!(!store.mark_paid(PaymentMethod::Stripe, "evt_1").await.unwrap());

        let found = store
            .find(PaymentMethod::Stripe, "evt_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.status, TransactionStatus::Paid);
        assert!(found.paid_at.is_some());
    }

    #[tokio::test]
    async fn test_refund_requires_paid() {
        let store = MemoryTransactionStore::new();
        store.insert_pending(&tx("evt_1")).await.unwrap();

        assert!(!store
            .mark_refunded(PaymentMethod::Stripe, "evt_1", false)
            .await
            .unwrap());

        store.mark_paid(PaymentMethod::Stripe, "evt_1").await.unwrap();
        assert!(store
            .mark_refunded(PaymentMethod::Stripe, "evt_1", true)
            .await
            .unwrap());

        let found = store
            .find(PaymentMethod::Stripe, "evt_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.status, TransactionStatus::PartiallyRefunded);
    }
}
