//! Payout transfer orchestration
//!
//! Moves seller earnings out through payment providers with three layers of
//! protection:
//!
//! - outstanding debt is offset before any provider call
//! - every attempt is persisted before the provider is contacted
//! - failures draw down an explicit, bounded retry budget; exhausted
//!   transfers are handed to the compensation scanner

pub mod debt;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod store;

pub use debt::{DebtOffset, DebtStore, DebtStoreError, PgDebtStore, offset_debt};
pub use error::TransferError;
pub use models::{
    DEBT_DEDUCTION_ONLY_REF, PaymentTransfer, TransferOutcome, TransferRequest, TransferStatus,
};
pub use orchestrator::TransferOrchestrator;
pub use store::{PgTransferStore, TransferStore};
