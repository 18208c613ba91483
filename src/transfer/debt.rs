//! Seller debt offsetting
//!
//! Outstanding seller debt (refund advances, chargeback fees) is deducted
//! from a payout before any provider is contacted. The arithmetic is a pure
//! function; the store only reads and settles balances.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use thiserror::Error;

/// Result of offsetting `debt` against a requested payout `amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebtOffset {
    /// What actually goes to the provider
    pub payout: i64,
    /// How much debt this payout settles
    pub deducted: i64,
    /// Debt still outstanding afterwards
    pub remaining_debt: i64,
}

/// (amount, debt) -> (payout, deducted, remaining_debt).
///
/// Negative debt is treated as zero.
pub fn offset_debt(amount: i64, debt: i64) -> DebtOffset {
    let debt = debt.max(0);
    let deducted = debt.min(amount);
    DebtOffset {
        payout: amount - deducted,
        deducted,
        remaining_debt: debt - deducted,
    }
}

#[derive(Debug, Error, Clone)]
pub enum DebtStoreError {
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for DebtStoreError {
    fn from(e: sqlx::Error) -> Self {
        DebtStoreError::Database(e.to_string())
    }
}

#[async_trait]
pub trait DebtStore: Send + Sync {
    /// Total outstanding debt for (seller, currency), minor units.
    async fn outstanding_debt(&self, seller_id: i64, currency: &str)
    -> Result<i64, DebtStoreError>;

    /// Settle `amount` of debt after it was deducted from a payout.
    async fn record_deduction(
        &self,
        seller_id: i64,
        currency: &str,
        amount: i64,
    ) -> Result<(), DebtStoreError>;
}

pub struct PgDebtStore {
    pool: PgPool,
}

impl PgDebtStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DebtStore for PgDebtStore {
    async fn outstanding_debt(
        &self,
        seller_id: i64,
        currency: &str,
    ) -> Result<i64, DebtStoreError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount - settled_amount), 0) AS outstanding
             FROM seller_debts
             WHERE seller_id = $1 AND currency = $2 AND amount > settled_amount",
        )
        .bind(seller_id)
        .bind(currency)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("outstanding"))
    }

    async fn record_deduction(
        &self,
        seller_id: i64,
        currency: &str,
        amount: i64,
    ) -> Result<(), DebtStoreError> {
        // Settle oldest debts first
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(
            "SELECT id, amount, settled_amount FROM seller_debts
             WHERE seller_id = $1 AND currency = $2 AND amount > settled_amount
             ORDER BY created_at
             FOR UPDATE",
        )
        .bind(seller_id)
        .bind(currency)
        .fetch_all(&mut *tx)
        .await?;

        let mut left = amount;
        for row in rows {
            if left == 0 {
                break;
            }
            let id: i64 = row.get("id");
            let open = row.get::<i64, _>("amount") - row.get::<i64, _>("settled_amount");
            let take = open.min(left);
            sqlx::query(
                "UPDATE seller_debts SET settled_amount = settled_amount + $1, updated_at = NOW()
                 WHERE id = $2",
            )
            .bind(take)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            left -= take;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockDebtStore {
        debts: Mutex<HashMap<(i64, String), i64>>,
    }

    impl MockDebtStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_debt(&self, seller_id: i64, currency: &str, amount: i64) {
            self.debts
                .lock()
                .unwrap()
                .insert((seller_id, currency.to_string()), amount);
        }

        pub fn debt_of(&self, seller_id: i64, currency: &str) -> i64 {
            *self
                .debts
                .lock()
                .unwrap()
                .get(&(seller_id, currency.to_string()))
                .unwrap_or(&0)
        }
    }

    #[async_trait]
    impl DebtStore for MockDebtStore {
        async fn outstanding_debt(
            &self,
            seller_id: i64,
            currency: &str,
        ) -> Result<i64, DebtStoreError> {
            Ok(self.debt_of(seller_id, currency))
        }

        async fn record_deduction(
            &self,
            seller_id: i64,
            currency: &str,
            amount: i64,
        ) -> Result<(), DebtStoreError> {
            let mut debts = self.debts.lock().unwrap();
            let entry = debts.entry((seller_id, currency.to_string())).or_insert(0);
            *entry = (*entry - amount).max(0);
            Ok(())
        }
    }
}

#[cfg(test)]
pub use mock::MockDebtStore;
