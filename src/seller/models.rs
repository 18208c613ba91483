//! Seller payout profile models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::providers::PaymentMethod;

/// Three-state payout gate. Only `Eligible` permits payment creation;
/// `Blocked` and `PendingReview` both reject, they are not interchangeable
/// for operator display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutEligibility {
    Eligible,
    Blocked,
    PendingReview,
}

impl PayoutEligibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutEligibility::Eligible => "eligible",
            PayoutEligibility::Blocked => "blocked",
            PayoutEligibility::PendingReview => "pending_review",
        }
    }

    #[inline]
    pub fn permits_payment(&self) -> bool {
        matches!(self, PayoutEligibility::Eligible)
    }
}

impl FromStr for PayoutEligibility {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eligible" => Ok(PayoutEligibility::Eligible),
            "blocked" => Ok(PayoutEligibility::Blocked),
            "pending_review" => Ok(PayoutEligibility::PendingReview),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PayoutEligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Seller payout configuration as a tagged variant, dispatched on by the
/// validator and the orchestrator.
#[derive(Debug, Clone)]
pub enum PayoutConfig {
    /// Platform-settled: no personal payout account, money stays on a
    /// platform merchant account
    Direct,
    /// Seller-owned payout account at an external provider
    External {
        subscription_active: bool,
        subscription_expires_at: Option<DateTime<Utc>>,
        provider: Option<PaymentMethod>,
        payment_account_id: Option<String>,
        eligibility: PayoutEligibility,
    },
}

/// Cached seller payout state, owned by the profile store collaborator.
#[derive(Debug, Clone)]
pub struct PayoutProfile {
    pub seller_id: i64,
    pub config: PayoutConfig,
    /// Provider-reported flags, refreshed by payout-account webhooks
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
}

/// Result of a readiness check, including a best-effort eligibility for
/// caller display when a link in the chain fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerReadiness {
    pub can_accept_payment: bool,
    pub reason: Option<String>,
    pub eligibility: PayoutEligibility,
}

impl SellerReadiness {
    pub fn ready() -> Self {
        Self {
            can_accept_payment: true,
            reason: None,
            eligibility: PayoutEligibility::Eligible,
        }
    }

    pub fn rejected(reason: impl Into<String>, eligibility: PayoutEligibility) -> Self {
        Self {
            can_accept_payment: false,
            reason: Some(reason.into()),
            eligibility,
        }
    }
}

/// Fields a payout-account status webhook may update.
#[derive(Debug, Clone, Default)]
pub struct PayoutStatusUpdate {
    pub charges_enabled: Option<bool>,
    pub payouts_enabled: Option<bool>,
    pub eligibility: Option<PayoutEligibility>,
}
