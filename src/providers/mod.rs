//! Payment provider integration
//!
//! One capability per provider: attempt a payout transfer. Adapters are
//! polymorphic over [`ProviderAdapter`] and selected purely by
//! [`PaymentMethod`]. Timeouts and HTTP failures surface as ordinary
//! `Failed` outcomes feeding the retry-budget path.

pub mod alipay;
pub mod bank;
pub mod paypal;
pub mod stripe;
pub mod wechat;

pub use alipay::AlipayAdapter;
pub use bank::ManualBankAdapter;
pub use paypal::PaypalAdapter;
pub use stripe::StripeAdapter;
pub use wechat::WechatAdapter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{PlatformAccountConfig, ProviderCredentials};

// ============================================================================
// Payment methods
// ============================================================================

/// Payout channel / webhook source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Stripe,
    Paypal,
    Alipay,
    Wechat,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Alipay => "alipay",
            PaymentMethod::Wechat => "wechat",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(PaymentMethod::Stripe),
            "paypal" => Ok(PaymentMethod::Paypal),
            "alipay" => Ok(PaymentMethod::Alipay),
            "wechat" => Ok(PaymentMethod::Wechat),
            "bank_transfer" | "bank" => Ok(PaymentMethod::BankTransfer),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Adapter capability
// ============================================================================

/// One payout attempt against an external provider.
#[derive(Debug, Clone)]
pub struct TransferAttempt {
    pub transfer_id: Uuid,
    /// Minor units
    pub amount: i64,
    pub currency: String,
    /// Provider-side destination (connected account, payout receiver, card)
    pub destination_account: String,
    pub description: String,
}

/// Outcome of one provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Provider confirmed the transfer
    Completed { transfer_ref: String },
    /// Accepted at the orchestration layer, settled out-of-band
    /// (manual bank transfers)
    PendingManual { transfer_ref: String },
    /// Explicit or transport failure; eligible for the retry budget
    Failed { error: String },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, AttemptOutcome::Failed { .. })
    }

    pub fn transfer_ref(&self) -> Option<&str> {
        match self {
            AttemptOutcome::Completed { transfer_ref }
            | AttemptOutcome::PendingManual { transfer_ref } => Some(transfer_ref),
            AttemptOutcome::Failed { .. } => None,
        }
    }
}

/// Provider-specific transfer capability.
///
/// Implementations must be safe to re-invoke with the same `transfer_id`;
/// the orchestrator passes it as the provider-side idempotency key.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt_transfer(&self, req: &TransferAttempt) -> AttemptOutcome;
}

/// Missing or inconsistent provider credentials. Fatal at startup,
/// never retried.
#[derive(Debug, Error)]
pub enum ProviderConfigError {
    #[error("Missing credentials for provider '{0}'")]
    MissingCredentials(&'static str),
}

/// Adapter lookup by payment method.
pub struct AdapterRegistry {
    adapters: HashMap<PaymentMethod, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    /// Build adapters for every provider with configured credentials.
    /// The manual bank channel needs no credentials and is always present.
    pub fn from_credentials(creds: &ProviderCredentials) -> Self {
        let mut adapters: HashMap<PaymentMethod, Arc<dyn ProviderAdapter>> = HashMap::new();

        if let Some(key) = &creds.stripe_secret_key {
            adapters.insert(
                PaymentMethod::Stripe,
                Arc::new(StripeAdapter::new(key.clone())),
            );
        }
        if let (Some(id), Some(secret)) = (&creds.paypal_client_id, &creds.paypal_secret) {
            adapters.insert(
                PaymentMethod::Paypal,
                Arc::new(PaypalAdapter::new(id.clone(), secret.clone())),
            );
        }
        if let Some(key) = &creds.alipay_private_key {
            adapters.insert(
                PaymentMethod::Alipay,
                Arc::new(AlipayAdapter::new(
                    creds.alipay_app_id.clone().unwrap_or_default(),
                    key.clone(),
                )),
            );
        }
        if let Some(key) = &creds.wechat_api_key {
            adapters.insert(
                PaymentMethod::Wechat,
                Arc::new(WechatAdapter::new(
                    creds.wechat_mch_id.clone().unwrap_or_default(),
                    key.clone(),
                )),
            );
        }
        adapters.insert(PaymentMethod::BankTransfer, Arc::new(ManualBankAdapter));

        Self { adapters }
    }

    pub fn get(
        &self,
        method: PaymentMethod,
    ) -> Result<Arc<dyn ProviderAdapter>, ProviderConfigError> {
        self.adapters
            .get(&method)
            .cloned()
            .ok_or(ProviderConfigError::MissingCredentials(method.as_str()))
    }

    /// Registry for tests, bypassing credential wiring.
    pub fn with_adapters(
        adapters: HashMap<PaymentMethod, Arc<dyn ProviderAdapter>>,
    ) -> Self {
        Self { adapters }
    }
}

// ============================================================================
// Platform account registry
// ============================================================================

/// One candidate webhook signing secret, scoped to a currency when it
/// belongs to a currency-scoped platform account.
#[derive(Debug, Clone)]
pub struct CandidateSecret {
    pub currency: Option<String>,
    pub secret: String,
}

/// Currency-scoped platform merchant accounts per provider.
///
/// Supplies payout destinations for direct (platform-settled) sellers and
/// the candidate signing-secret set for webhook verification.
#[derive(Debug, Clone, Default)]
pub struct PlatformAccountRegistry {
    accounts: Vec<PlatformAccountConfig>,
    fallback_secret: Option<String>,
}

impl PlatformAccountRegistry {
    pub fn new(accounts: Vec<PlatformAccountConfig>, fallback_secret: Option<String>) -> Self {
        Self {
            accounts,
            fallback_secret,
        }
    }

    /// Resolve a platform account for (provider, currency), falling back
    /// through `base_currencies` (currencies that support conversion)
    /// before giving up.
    pub fn resolve(
        &self,
        provider: PaymentMethod,
        currency: &str,
        base_currencies: &[String],
    ) -> Option<&PlatformAccountConfig> {
        if let Some(exact) = self
            .accounts
            .iter()
            .find(|a| a.provider == provider && a.currency == currency)
        {
            return Some(exact);
        }
        base_currencies.iter().find_map(|base| {
            self.accounts
                .iter()
                .find(|a| a.provider == provider && &a.currency == base)
        })
    }

    /// Ordered candidate secrets for a provider: every currency-scoped
    /// account secret first, then the global fallback.
    pub fn webhook_secrets(&self, provider: PaymentMethod) -> Vec<CandidateSecret> {
        let mut out: Vec<CandidateSecret> = self
            .accounts
            .iter()
            .filter(|a| a.provider == provider)
            .map(|a| CandidateSecret {
                currency: Some(a.currency.clone()),
                secret: a.webhook_secret.clone(),
            })
            .collect();
        if let Some(fallback) = &self.fallback_secret {
            out.push(CandidateSecret {
                currency: None,
                secret: fallback.clone(),
            });
        }
        out
    }
}

// ============================================================================
// Mock adapter for tests
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct MockProviderAdapter {
        name: &'static str,
        call_count: AtomicUsize,
        fail: Mutex<bool>,
        /// Fail the first N calls, then succeed
        fail_first: Mutex<usize>,
        last_attempt: Mutex<Option<TransferAttempt>>,
    }

    impl MockProviderAdapter {
        pub fn new(name: &'static str) -> Self {
            Self {
                name,
                call_count: AtomicUsize::new(0),
                fail: Mutex::new(false),
                fail_first: Mutex::new(0),
                last_attempt: Mutex::new(None),
            }
        }

        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        pub fn set_fail_first(&self, n: usize) {
            *self.fail_first.lock().unwrap() = n;
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        pub fn last_attempt(&self) -> Option<TransferAttempt> {
            self.last_attempt.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProviderAdapter for MockProviderAdapter {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn attempt_transfer(&self, req: &TransferAttempt) -> AttemptOutcome {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst);
            *self.last_attempt.lock().unwrap() = Some(req.clone());

            if *self.fail.lock().unwrap() || call < *self.fail_first.lock().unwrap() {
                AttemptOutcome::Failed {
                    error: "mock provider failure".to_string(),
                }
            } else {
                AttemptOutcome::Completed {
                    transfer_ref: format!("mock_tr_{}", req.transfer_id),
                }
            }
        }
    }
}

#[cfg(test)]
pub use mock::MockProviderAdapter;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_roundtrip() {
        for m in [
            PaymentMethod::Stripe,
            PaymentMethod::Paypal,
            PaymentMethod::Alipay,
            PaymentMethod::Wechat,
            PaymentMethod::BankTransfer,
        ] {
            assert_eq!(m.as_str().parse::<PaymentMethod>().unwrap(), m);
        }
        assert_eq!("bank".parse::<PaymentMethod>(), Ok(PaymentMethod::BankTransfer));
        assert!("venmo".parse::<PaymentMethod>().is_err());
    }

    fn registry() -> PlatformAccountRegistry {
        PlatformAccountRegistry::new(
            vec![
                PlatformAccountConfig {
                    provider: PaymentMethod::Stripe,
                    currency: "USD".into(),
                    account_id: "acct_usd".into(),
                    webhook_secret: "whsec_usd".into(),
                },
                PlatformAccountConfig {
                    provider: PaymentMethod::Stripe,
                    currency: "EUR".into(),
                    account_id: "acct_eur".into(),
                    webhook_secret: "whsec_eur".into(),
                },
            ],
            Some("whsec_global".into()),
        )
    }

    #[test]
    fn test_resolve_exact_currency() {
        let r = registry();
        let hit = r
            .resolve(PaymentMethod::Stripe, "EUR", &["USD".into()])
            .unwrap();
        assert_eq!(hit.account_id, "acct_eur");
    }

    #[test]
    fn test_resolve_falls_back_through_base_currencies() {
        let r = registry();
        let hit = r
            .resolve(
                PaymentMethod::Stripe,
                "SEK",
                &["GBP".into(), "USD".into()],
            )
            .unwrap();
        assert_eq!(hit.account_id, "acct_usd");
    }

    #[test]
    fn test_resolve_no_match() {
        let r = registry();
        assert!(
            r.resolve(PaymentMethod::Paypal, "USD", &["USD".into()])
                .is_none()
        );
    }

    #[test]
    fn test_webhook_secrets_order_and_fallback() {
        let r = registry();
        let secrets = r.webhook_secrets(PaymentMethod::Stripe);
        assert_eq!(secrets.len(), 3);
        assert_eq!(secrets[0].currency.as_deref(), Some("USD"));
        assert_eq!(secrets[2].currency, None);
        assert_eq!(secrets[2].secret, "whsec_global");
    }
}
