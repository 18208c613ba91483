//! Stripe Connect transfer adapter
//!
//! POSTs to /v1/transfers with the seller's connected account as the
//! destination. The PaymentTransfer id doubles as the Stripe idempotency
//! key, so a re-driven attempt cannot double-pay.

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use super::{AttemptOutcome, ProviderAdapter, TransferAttempt};

const STRIPE_API_BASE: &str = "https://api.stripe.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub struct StripeAdapter {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeAdapter {
    pub fn new(secret_key: String) -> Self {
        Self::with_base_url(secret_key, STRIPE_API_BASE.to_string())
    }

    pub fn with_base_url(secret_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("reqwest client"),
            secret_key,
            base_url,
        }
    }
}

#[async_trait]
impl ProviderAdapter for StripeAdapter {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn attempt_transfer(&self, req: &TransferAttempt) -> AttemptOutcome {
        let params = [
            ("amount", req.amount.to_string()),
            ("currency", req.currency.to_lowercase()),
            ("destination", req.destination_account.clone()),
            ("description", req.description.clone()),
        ];

        let response = self
            .http
            .post(format!("{}/v1/transfers", self.base_url))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", req.transfer_id.to_string())
            .form(&params)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!(transfer_id = %req.transfer_id, error = %e, "Stripe transfer call failed");
                return AttemptOutcome::Failed {
                    error: format!("stripe request error: {e}"),
                };
            }
        };

        let status = response.status();
        let body: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                return AttemptOutcome::Failed {
                    error: format!("stripe response decode error: {e}"),
                };
            }
        };

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown stripe error")
                .to_string();
            return AttemptOutcome::Failed {
                error: format!("stripe {status}: {message}"),
            };
        }

        match body["id"].as_str() {
            Some(id) => AttemptOutcome::Completed {
                transfer_ref: id.to_string(),
            },
            None => AttemptOutcome::Failed {
                error: "stripe response missing transfer id".to_string(),
            },
        }
    }
}
