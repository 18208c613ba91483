//! Compensation Recovery Scanner
//!
//! The deliberate give-up-gracefully path: payouts that exhausted their
//! retry budget for a paid order become visible compensation records,
//! periodically re-driven through the Transfer Orchestrator or left for
//! manual ops intervention with the failure retained.

pub mod models;
pub mod scanner;
pub mod store;

pub use models::{CompensationRecord, CompensationStatus};
pub use scanner::{CompensationError, CompensationScanner, ScannerConfig};
pub use store::{CompensationStore, CompensationStoreError, PgCompensationStore};
