//! Alipay fund-transfer adapter
//!
//! Uses the uni-transfer endpoint with `out_biz_no` (our transfer id) as the
//! provider-side dedup key.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use super::{AttemptOutcome, ProviderAdapter, TransferAttempt};
use crate::money::format_minor_units;

const ALIPAY_API_BASE: &str = "https://openapi.alipay.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub struct AlipayAdapter {
    http: reqwest::Client,
    app_id: String,
    private_key: String,
    base_url: String,
}

impl AlipayAdapter {
    pub fn new(app_id: String, private_key: String) -> Self {
        Self::with_base_url(app_id, private_key, ALIPAY_API_BASE.to_string())
    }

    pub fn with_base_url(app_id: String, private_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("reqwest client"),
            app_id,
            private_key,
            base_url,
        }
    }
}

#[async_trait]
impl ProviderAdapter for AlipayAdapter {
    fn name(&self) -> &'static str {
        "alipay"
    }

    async fn attempt_transfer(&self, req: &TransferAttempt) -> AttemptOutcome {
        let biz_content = json!({
            "out_biz_no": req.transfer_id.to_string(),
            "trans_amount": format_minor_units(req.amount, &req.currency),
            "product_code": "TRANS_ACCOUNT_NO_PWD",
            "biz_scene": "DIRECT_TRANSFER",
            "payee_info": {
                "identity": req.destination_account,
                "identity_type": "ALIPAY_LOGON_ID",
            },
            "remark": req.description,
        });

        let response = self
            .http
            .post(format!("{}/v3/alipay/fund/trans/uni/transfer", self.base_url))
            .header("alipay-app-id", &self.app_id)
            .header("alipay-signature", &self.private_key)
            .json(&biz_content)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                return AttemptOutcome::Failed {
                    error: format!("alipay request error: {e}"),
                };
            }
        };

        let status = response.status();
        let body: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                return AttemptOutcome::Failed {
                    error: format!("alipay response decode error: {e}"),
                };
            }
        };

        if !status.is_success() {
            let message = body["message"].as_str().unwrap_or("unknown alipay error");
            return AttemptOutcome::Failed {
                error: format!("alipay {status}: {message}"),
            };
        }

        match body["order_id"].as_str() {
            Some(id) => AttemptOutcome::Completed {
                transfer_ref: id.to_string(),
            },
            None => AttemptOutcome::Failed {
                error: "alipay response missing order_id".to_string(),
            },
        }
    }
}
