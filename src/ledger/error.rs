//! Ledger error types

use thiserror::Error;
use uuid::Uuid;

/// Errors from journal posting and audit reads.
///
/// Any error aborts the entire posting; partial state is prevented by the
/// storage transaction boundary.
#[derive(Debug, Error, Clone)]
pub enum LedgerError {
    #[error("Journal must contain at least one leg")]
    EmptyEntries,

    #[error("Leg amounts must be greater than zero")]
    NonPositiveAmount,

    #[error("Unbalanced journal for {currency}: debits={debits} credits={credits}")]
    UnbalancedEntry {
        currency: String,
        debits: i64,
        credits: i64,
    },

    #[error("Account resolution failed: {0}")]
    AccountResolution(String),

    #[error("Journal not found: {0}")]
    JournalNotFound(Uuid),

    #[error("No journal for transaction_id '{0}'")]
    TransactionNotFound(String),

    #[error("Journal {id} is '{state}', only posted journals can be reversed")]
    NotReversible { id: Uuid, state: String },

    #[error("Journal already posted for transaction_id '{0}'")]
    DuplicateTransaction(String),

    #[error("Refund portion {portion} outside (0, {total})")]
    InvalidRefundPortion { portion: i64, total: i64 },

    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    /// Stable code for logs and API envelopes
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::EmptyEntries => "EMPTY_ENTRIES",
            LedgerError::NonPositiveAmount => "NON_POSITIVE_AMOUNT",
            LedgerError::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            LedgerError::AccountResolution(_) => "ACCOUNT_RESOLUTION",
            LedgerError::JournalNotFound(_) => "JOURNAL_NOT_FOUND",
            LedgerError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            LedgerError::NotReversible { .. } => "NOT_REVERSIBLE",
            LedgerError::DuplicateTransaction(_) => "DUPLICATE_TRANSACTION",
            LedgerError::InvalidRefundPortion { .. } => "INVALID_REFUND_PORTION",
            LedgerError::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Database(e.to_string())
    }
}
