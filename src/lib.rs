//! Settlement Engine
//!
//! Payment settlement and double-entry ledger engine for the marketplace
//! platform.
//!
//! # Modules
//!
//! - [`ledger`] - Double-entry bookkeeping (accounts, balanced journals)
//! - [`webhook`] - Event Ingestion Gateway for provider webhooks
//! - [`transfer`] - Payout transfer orchestration with bounded retries
//! - [`seller`] - Seller payout readiness validation
//! - [`compensation`] - Recovery scanner for exhausted payouts
//! - [`providers`] - Payment provider adapters and platform accounts
//! - [`money`] - Minor-unit amount parsing and formatting
//! - [`collaborators`] - Contracts to external subsystems (orders, notifications)

pub mod collaborators;
pub mod compensation;
pub mod config;
pub mod db;
pub mod ledger;
pub mod logging;
pub mod money;
pub mod providers;
pub mod seller;
pub mod transfer;
pub mod webhook;

// Convenient re-exports at crate root
pub use compensation::{CompensationScanner, ScannerConfig};
pub use config::AppConfig;
pub use db::Database;
pub use ledger::{LedgerService, LegSpec, PostJournalRequest};
pub use providers::{AdapterRegistry, PaymentMethod, PlatformAccountRegistry};
pub use seller::SellerValidator;
pub use transfer::{TransferOrchestrator, TransferOutcome, TransferRequest};
pub use webhook::{EventProcessor, GatewayState};
