//! Settlement Engine entry point
//!
//! Wires config -> logging -> Postgres -> stores -> services, then runs
//! the webhook gateway and the compensation scanner side by side.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use settlement_engine::collaborators::{PgNotificationSink, PgOrderStore};
use settlement_engine::compensation::{CompensationScanner, PgCompensationStore, ScannerConfig};
use settlement_engine::config::AppConfig;
use settlement_engine::db::Database;
use settlement_engine::ledger::{LedgerService, PgLedgerStore};
use settlement_engine::logging::init_logging;
use settlement_engine::providers::{AdapterRegistry, PlatformAccountRegistry};
use settlement_engine::seller::{PgSellerProfileStore, SellerValidator};
use settlement_engine::transfer::{PgDebtStore, PgTransferStore, TransferOrchestrator};
use settlement_engine::webhook::{EventProcessor, GatewayState, PgTransactionStore, router};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _log_guard = init_logging(&config);
    info!(env = %env, "Starting settlement engine");

    let db = Database::connect(&config.postgres_url)
        .await
        .context("PostgreSQL connection failed")?;
    db.health_check().await.context("PostgreSQL health check failed")?;
    let pool = db.pool().clone();

    // Stores
    let ledger_store = Arc::new(PgLedgerStore::new(pool.clone()));
    let transaction_store = Arc::new(PgTransactionStore::new(pool.clone()));
    let transfer_store = Arc::new(PgTransferStore::new(pool.clone()));
    let debt_store = Arc::new(PgDebtStore::new(pool.clone()));
    let profile_store = Arc::new(PgSellerProfileStore::new(pool.clone()));
    let compensation_store = Arc::new(PgCompensationStore::new(pool.clone()));
    let order_store = Arc::new(PgOrderStore::new(pool.clone()));
    let notification_sink = Arc::new(PgNotificationSink::new(pool.clone()));

    // Registries and services
    let platform_accounts = Arc::new(PlatformAccountRegistry::new(
        config.platform_accounts.clone(),
        config.fallback_webhook_secret.clone(),
    ));
    let adapters = Arc::new(AdapterRegistry::from_credentials(&config.providers));
    let validator = Arc::new(SellerValidator::new(
        profile_store.clone(),
        platform_accounts.clone(),
        config.settlement.base_currency_fallback.clone(),
    ));
    let ledger = Arc::new(LedgerService::new(ledger_store));
    let orchestrator = Arc::new(TransferOrchestrator::new(
        transfer_store.clone(),
        debt_store,
        profile_store.clone(),
        validator,
        adapters,
        platform_accounts.clone(),
        config.settlement.base_currency_fallback.clone(),
        config.settlement.max_retries,
    ));

    let processor = EventProcessor::new(
        transaction_store,
        ledger,
        order_store.clone(),
        notification_sink,
        profile_store,
        orchestrator.clone(),
        config.settlement.commission_bps,
    );

    // Compensation scanner runs beside the gateway
    let scanner = CompensationScanner::new(
        transfer_store,
        order_store,
        compensation_store,
        orchestrator,
        ScannerConfig {
            scan_interval: Duration::from_secs(config.scanner.scan_interval_secs),
            batch_size: config.scanner.batch_size as i64,
        },
    );
    tokio::spawn(async move { scanner.run().await });

    let app = router(Arc::new(GatewayState {
        processor,
        platform_accounts,
    }));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Webhook gateway listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
