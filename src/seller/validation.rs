//! Seller readiness validation
//!
//! The gate deciding whether a seller may receive money at all. Each link of
//! the external-seller chain short-circuits with its own reason string; the
//! eligibility carried in the result is best-effort for caller display.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use super::models::{PayoutConfig, PayoutEligibility, SellerReadiness};
use super::store::{ProfileStoreError, SellerProfileStore};
use crate::providers::{PaymentMethod, PlatformAccountRegistry};

pub struct SellerValidator {
    profiles: Arc<dyn SellerProfileStore>,
    platform_accounts: Arc<PlatformAccountRegistry>,
    base_currency_fallback: Vec<String>,
}

impl SellerValidator {
    pub fn new(
        profiles: Arc<dyn SellerProfileStore>,
        platform_accounts: Arc<PlatformAccountRegistry>,
        base_currency_fallback: Vec<String>,
    ) -> Self {
        Self {
            profiles,
            platform_accounts,
            base_currency_fallback,
        }
    }

    /// Decide whether `seller_id` may accept a payment via `payment_method`
    /// in `currency`. Business rejections come back as a readiness result,
    /// not an error; `Err` means the profile store itself failed.
    pub async fn validate_seller_payment_ready(
        &self,
        seller_id: i64,
        payment_method: Option<PaymentMethod>,
        currency: &str,
    ) -> Result<SellerReadiness, ProfileStoreError> {
        let Some(profile) = self.profiles.get_payout_profile(seller_id).await? else {
            return Ok(SellerReadiness::rejected(
                format!("seller {seller_id} not found"),
                PayoutEligibility::PendingReview,
            ));
        };

        let readiness = match &profile.config {
            PayoutConfig::Direct => {
                // Platform-settled: readiness is having a platform account
                // for the requested provider/currency (with base-currency
                // conversion fallback).
                let provider = payment_method.unwrap_or(PaymentMethod::Stripe);
                match self.platform_accounts.resolve(
                    provider,
                    currency,
                    &self.base_currency_fallback,
                ) {
                    Some(_) => SellerReadiness::ready(),
                    None => SellerReadiness::rejected(
                        format!(
                            "no platform account for provider {provider} in {currency} or any base currency"
                        ),
                        PayoutEligibility::PendingReview,
                    ),
                }
            }
            PayoutConfig::External {
                subscription_active,
                subscription_expires_at,
                provider,
                payment_account_id,
                eligibility,
            } => Self::check_external(
                seller_id,
                *subscription_active,
                subscription_expires_at.as_ref(),
                *provider,
                payment_account_id.as_deref(),
                *eligibility,
                payment_method,
            ),
        };

        debug!(
            seller_id,
            can_accept = readiness.can_accept_payment,
            eligibility = %readiness.eligibility,
            reason = readiness.reason.as_deref().unwrap_or(""),
            "Seller readiness check"
        );
        Ok(readiness)
    }

    fn check_external(
        seller_id: i64,
        subscription_active: bool,
        subscription_expires_at: Option<&chrono::DateTime<Utc>>,
        provider: Option<PaymentMethod>,
        payment_account_id: Option<&str>,
        eligibility: PayoutEligibility,
        requested_method: Option<PaymentMethod>,
    ) -> SellerReadiness {
        if !subscription_active {
            return SellerReadiness::rejected(
                format!("seller {seller_id} has no active seller subscription"),
                eligibility,
            );
        }
        if let Some(expires) = subscription_expires_at
            && *expires < Utc::now()
        {
            return SellerReadiness::rejected(
                format!("seller {seller_id} subscription expired at {expires}"),
                eligibility,
            );
        }

        let Some(bound_provider) = provider else {
            return SellerReadiness::rejected(
                format!("seller {seller_id} has no bound payment provider"),
                eligibility,
            );
        };
        if payment_account_id.is_none_or(str::is_empty) {
            return SellerReadiness::rejected(
                format!("seller {seller_id} has no bound payment account"),
                eligibility,
            );
        }

        // A requested method that differs from the bound provider is a hard
        // reject, never silently upgraded.
        if let Some(requested) = requested_method
            && requested != bound_provider
        {
            return SellerReadiness::rejected(
                format!(
                    "requested method {requested} does not match bound provider {bound_provider}"
                ),
                eligibility,
            );
        }

        if !eligibility.permits_payment() {
            return SellerReadiness::rejected(
                format!("seller {seller_id} payout eligibility is {eligibility}"),
                eligibility,
            );
        }

        SellerReadiness::ready()
    }
}
