//! Transfer orchestration error types

use thiserror::Error;
use uuid::Uuid;

/// Transfer error taxonomy.
///
/// Configuration and validation errors are never retried; provider errors
/// feed the bounded retry budget.
#[derive(Error, Debug, Clone)]
pub enum TransferError {
    // === Validation ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Seller not found: {0}")]
    SellerNotFound(i64),

    #[error("Seller not ready for payouts: {0}")]
    SellerNotReady(String),

    #[error("Seller {0} has no payout account bound for this method/currency")]
    NoPayoutAccount(i64),

    // === Configuration ===
    #[error("Provider configuration error: {0}")]
    Configuration(String),

    // === Transient ===
    #[error("Provider error: {0}")]
    Provider(String),

    // === Record state ===
    #[error("Transfer not found: {0}")]
    TransferNotFound(Uuid),

    #[error("Transfer {0} is not in a retryable state")]
    NotRetryable(Uuid),

    // === System ===
    #[error("Database error: {0}")]
    Database(String),
}

impl TransferError {
    /// Stable error code for API responses and transfer records
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::SellerNotFound(_) => "SELLER_NOT_FOUND",
            TransferError::SellerNotReady(_) => "SELLER_NOT_READY",
            TransferError::NoPayoutAccount(_) => "NO_PAYOUT_ACCOUNT",
            TransferError::Configuration(_) => "CONFIGURATION_ERROR",
            TransferError::Provider(_) => "PROVIDER_ERROR",
            TransferError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            TransferError::NotRetryable(_) => "NOT_RETRYABLE",
            TransferError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Whether this failure class is eligible for the retry budget
    pub fn is_transient(&self) -> bool {
        matches!(self, TransferError::Provider(_))
    }
}

impl From<sqlx::Error> for TransferError {
    fn from(e: sqlx::Error) -> Self {
        TransferError::Database(e.to_string())
    }
}

impl From<crate::transfer::debt::DebtStoreError> for TransferError {
    fn from(e: crate::transfer::debt::DebtStoreError) -> Self {
        TransferError::Database(e.to_string())
    }
}

impl From<crate::seller::ProfileStoreError> for TransferError {
    fn from(e: crate::seller::ProfileStoreError) -> Self {
        TransferError::Database(e.to_string())
    }
}

impl From<crate::providers::ProviderConfigError> for TransferError {
    fn from(e: crate::providers::ProviderConfigError) -> Self {
        TransferError::Configuration(e.to_string())
    }
}
