//! WeChat Pay transfer-to-balance adapter

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use super::{AttemptOutcome, ProviderAdapter, TransferAttempt};

const WECHAT_API_BASE: &str = "https://api.mch.weixin.qq.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub struct WechatAdapter {
    http: reqwest::Client,
    mch_id: String,
    api_key: String,
    base_url: String,
}

impl WechatAdapter {
    pub fn new(mch_id: String, api_key: String) -> Self {
        Self::with_base_url(mch_id, api_key, WECHAT_API_BASE.to_string())
    }

    pub fn with_base_url(mch_id: String, api_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("reqwest client"),
            mch_id,
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl ProviderAdapter for WechatAdapter {
    fn name(&self) -> &'static str {
        "wechat"
    }

    async fn attempt_transfer(&self, req: &TransferAttempt) -> AttemptOutcome {
        // WeChat amounts are already minor units (fen)
        let payload = json!({
            "out_batch_no": req.transfer_id.to_string(),
            "batch_name": req.description,
            "batch_remark": req.description,
            "total_amount": req.amount,
            "total_num": 1,
            "transfer_detail_list": [{
                "out_detail_no": req.transfer_id.to_string(),
                "transfer_amount": req.amount,
                "transfer_remark": req.description,
                "openid": req.destination_account,
            }]
        });

        let response = self
            .http
            .post(format!("{}/v3/transfer/batches", self.base_url))
            .header("Wechatpay-Mchid", &self.mch_id)
            .header("Authorization", format!("WECHATPAY2-SHA256-RSA2048 {}", self.api_key))
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                return AttemptOutcome::Failed {
                    error: format!("wechat request error: {e}"),
                };
            }
        };

        let status = response.status();
        let body: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                return AttemptOutcome::Failed {
                    error: format!("wechat response decode error: {e}"),
                };
            }
        };

        if !status.is_success() {
            let message = body["message"].as_str().unwrap_or("unknown wechat error");
            return AttemptOutcome::Failed {
                error: format!("wechat {status}: {message}"),
            };
        }

        match body["batch_id"].as_str() {
            Some(id) => AttemptOutcome::Completed {
                transfer_ref: id.to_string(),
            },
            None => AttemptOutcome::Failed {
                error: "wechat response missing batch_id".to_string(),
            },
        }
    }
}
