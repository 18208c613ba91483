use serde::{Deserialize, Serialize};
use std::fs;

use crate::providers::PaymentMethod;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub server: ServerConfig,
    /// PostgreSQL connection URL for settlement state
    pub postgres_url: String,
    #[serde(default)]
    pub settlement: SettlementConfig,
    /// Currency-scoped platform merchant accounts (payout destination for
    /// direct sellers + webhook signing secret per account)
    #[serde(default)]
    pub platform_accounts: Vec<PlatformAccountConfig>,
    /// Optional global webhook secret tried after the per-account ones
    #[serde(default)]
    pub fallback_webhook_secret: Option<String>,
    #[serde(default)]
    pub providers: ProviderCredentials,
    #[serde(default)]
    pub scanner: ScannerConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SettlementConfig {
    /// Platform commission on order/tip payments, basis points
    pub commission_bps: u32,
    /// Payout retry budget per transfer
    pub max_retries: i32,
    /// Currencies that support conversion, tried in order when no platform
    /// account exists for a direct seller's requested currency
    pub base_currency_fallback: Vec<String>,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            commission_bps: 1000,
            max_retries: 3,
            base_currency_fallback: vec!["USD".into(), "EUR".into(), "GBP".into()],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlatformAccountConfig {
    pub provider: PaymentMethod,
    pub currency: String,
    pub account_id: String,
    pub webhook_secret: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProviderCredentials {
    pub stripe_secret_key: Option<String>,
    pub paypal_client_id: Option<String>,
    pub paypal_secret: Option<String>,
    pub alipay_app_id: Option<String>,
    pub alipay_private_key: Option<String>,
    pub wechat_mch_id: Option<String>,
    pub wechat_api_key: Option<String>,
}

/// Compensation scanner worker settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScannerConfig {
    pub scan_interval_secs: u64,
    pub batch_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 60,
            batch_size: 50,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
