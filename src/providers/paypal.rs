//! PayPal Payouts adapter
//!
//! Single-item payout batch per transfer; the PaymentTransfer id is used as
//! `sender_batch_id` which PayPal deduplicates server-side.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

use super::{AttemptOutcome, ProviderAdapter, TransferAttempt};
use crate::money::format_minor_units;

const PAYPAL_API_BASE: &str = "https://api-m.paypal.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub struct PaypalAdapter {
    http: reqwest::Client,
    client_id: String,
    secret: String,
    base_url: String,
}

impl PaypalAdapter {
    pub fn new(client_id: String, secret: String) -> Self {
        Self::with_base_url(client_id, secret, PAYPAL_API_BASE.to_string())
    }

    pub fn with_base_url(client_id: String, secret: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("reqwest client"),
            client_id,
            secret,
            base_url,
        }
    }

    async fn access_token(&self) -> Result<String, String> {
        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| format!("paypal token request error: {e}"))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("paypal token decode error: {e}"))?;

        body["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "paypal token response missing access_token".to_string())
    }
}

#[async_trait]
impl ProviderAdapter for PaypalAdapter {
    fn name(&self) -> &'static str {
        "paypal"
    }

    async fn attempt_transfer(&self, req: &TransferAttempt) -> AttemptOutcome {
        let token = match self.access_token().await {
            Ok(t) => t,
            Err(e) => {
                warn!(transfer_id = %req.transfer_id, error = %e, "PayPal auth failed");
                return AttemptOutcome::Failed { error: e };
            }
        };

        let payload = json!({
            "sender_batch_header": {
                "sender_batch_id": req.transfer_id.to_string(),
                "email_subject": req.description,
            },
            "items": [{
                "recipient_type": "EMAIL",
                "receiver": req.destination_account,
                "amount": {
                    "value": format_minor_units(req.amount, &req.currency),
                    "currency": req.currency,
                },
                "sender_item_id": req.transfer_id.to_string(),
            }]
        });

        let response = self
            .http
            .post(format!("{}/v1/payments/payouts", self.base_url))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                return AttemptOutcome::Failed {
                    error: format!("paypal payout request error: {e}"),
                };
            }
        };

        let status = response.status();
        let body: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                return AttemptOutcome::Failed {
                    error: format!("paypal response decode error: {e}"),
                };
            }
        };

        if !status.is_success() {
            let message = body["message"].as_str().unwrap_or("unknown paypal error");
            return AttemptOutcome::Failed {
                error: format!("paypal {status}: {message}"),
            };
        }

        match body["batch_header"]["payout_batch_id"].as_str() {
            Some(id) => AttemptOutcome::Completed {
                transfer_ref: id.to_string(),
            },
            None => AttemptOutcome::Failed {
                error: "paypal response missing payout_batch_id".to_string(),
            },
        }
    }
}
