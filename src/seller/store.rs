//! Seller profile store collaborator
//!
//! The seller profile lives with the (out-of-scope) profile subsystem; the
//! settlement engine only reads payout state and writes back the cached
//! provider flags reported by payout-account webhooks.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use thiserror::Error;

use super::models::{PayoutConfig, PayoutEligibility, PayoutProfile, PayoutStatusUpdate};
use crate::providers::PaymentMethod;

#[derive(Debug, Error, Clone)]
pub enum ProfileStoreError {
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for ProfileStoreError {
    fn from(e: sqlx::Error) -> Self {
        ProfileStoreError::Database(e.to_string())
    }
}

#[async_trait]
pub trait SellerProfileStore: Send + Sync {
    async fn get_payout_profile(
        &self,
        seller_id: i64,
    ) -> Result<Option<PayoutProfile>, ProfileStoreError>;

    async fn update_payout_status(
        &self,
        seller_id: i64,
        update: PayoutStatusUpdate,
    ) -> Result<(), ProfileStoreError>;
}

pub struct PgSellerProfileStore {
    pool: PgPool,
}

impl PgSellerProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SellerProfileStore for PgSellerProfileStore {
    async fn get_payout_profile(
        &self,
        seller_id: i64,
    ) -> Result<Option<PayoutProfile>, ProfileStoreError> {
        let row = sqlx::query(
            "SELECT seller_id, seller_class, subscription_active, subscription_expires_at,
                    payment_provider, payment_account_id, payout_eligibility,
                    charges_enabled, payouts_enabled
             FROM seller_profiles WHERE seller_id = $1",
        )
        .bind(seller_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let class: String = row.get("seller_class");
        let config = if class == "direct" {
            PayoutConfig::Direct
        } else {
            let provider: Option<String> = row.get("payment_provider");
            let eligibility: String = row.get("payout_eligibility");
            PayoutConfig::External {
                subscription_active: row.get("subscription_active"),
                subscription_expires_at: row.get("subscription_expires_at"),
                provider: provider.as_deref().and_then(|p| PaymentMethod::from_str(p).ok()),
                payment_account_id: row.get("payment_account_id"),
                eligibility: PayoutEligibility::from_str(&eligibility)
                    .unwrap_or(PayoutEligibility::PendingReview),
            }
        };

        Ok(Some(PayoutProfile {
            seller_id,
            config,
            charges_enabled: row.get("charges_enabled"),
            payouts_enabled: row.get("payouts_enabled"),
        }))
    }

    async fn update_payout_status(
        &self,
        seller_id: i64,
        update: PayoutStatusUpdate,
    ) -> Result<(), ProfileStoreError> {
        sqlx::query(
            "UPDATE seller_profiles
             SET charges_enabled = COALESCE($1, charges_enabled),
                 payouts_enabled = COALESCE($2, payouts_enabled),
                 payout_eligibility = COALESCE($3, payout_eligibility),
                 updated_at = NOW()
             WHERE seller_id = $4",
        )
        .bind(update.charges_enabled)
        .bind(update.payouts_enabled)
        .bind(update.eligibility.map(|e| e.as_str()))
        .bind(seller_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}


#[cfg(test)]
pub use mock::MockSellerProfileStore;
