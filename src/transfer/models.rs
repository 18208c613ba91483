//! Payout transfer records
//!
//! Status ids are stored as SMALLINT; retry state is explicit on the record
//! so retries survive process restarts (re-invocation is read state, decide,
//! act — no in-memory timers).

use chrono::{DateTime, Utc};
use serde_json::json;
use std::fmt;
use uuid::Uuid;

use crate::providers::PaymentMethod;

/// Transfer ref recorded when debt offsetting consumed the whole amount and
/// no provider was contacted.
pub const DEBT_DEDUCTION_ONLY_REF: &str = "debt_deduction_only";

/// Payout transfer states
///
/// `Failed` is terminal only once the retry budget is exhausted; below the
/// budget it means failed-but-retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum TransferStatus {
    /// Awaiting out-of-band confirmation (manual bank) or unresolvable
    /// configuration (no payout account)
    Pending = 0,
    /// Provider call in flight (persist-before-call)
    Processing = 10,
    /// Terminal: provider confirmed
    Completed = 20,
    /// Provider attempt failed; retryable while retry_count < max_retries
    Failed = -10,
}

impl TransferStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransferStatus::Pending),
            10 => Some(TransferStatus::Processing),
            20 => Some(TransferStatus::Completed),
            -10 => Some(TransferStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Processing => "PROCESSING",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One payout attempt record.
#[derive(Debug, Clone)]
pub struct PaymentTransfer {
    pub id: Uuid,
    pub seller_id: i64,
    /// Amount actually sent to the provider (after debt offsetting),
    /// minor units
    pub amount: i64,
    pub currency: String,
    pub transfer_method: PaymentMethod,
    pub status: TransferStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub payment_transaction_id: Option<Uuid>,
    pub order_id: Option<i64>,
    pub transfer_ref: Option<String>,
    pub error_message: Option<String>,
    /// original_amount, deducted_debt, remaining_debt and friends
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub transferred_at: Option<DateTime<Utc>>,
    pub last_retry_at: Option<DateTime<Utc>>,
}

impl PaymentTransfer {
    /// Failed but still inside the retry budget.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        self.status == TransferStatus::Failed && self.retry_count < self.max_retries
    }

    /// Failed with the budget exhausted — compensation territory.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.status == TransferStatus::Failed && self.retry_count >= self.max_retries
    }
}

/// Input to `transfer_to_seller`.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub seller_id: i64,
    /// Minor units, before debt offsetting
    pub amount: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_transaction_id: Option<Uuid>,
    pub order_id: Option<i64>,
}

/// Caller-facing result of one orchestration pass.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub success: bool,
    pub transfer_id: Option<Uuid>,
    pub transfer_ref: Option<String>,
    pub error: Option<String>,
    pub retryable: bool,
    pub retry_count: i32,
    /// Debt still outstanding after offsetting, minor units
    pub remaining_debt: i64,
}

impl TransferOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            transfer_id: None,
            transfer_ref: None,
            error: Some(error.into()),
            retryable: false,
            retry_count: 0,
            remaining_debt: 0,
        }
    }
}

/// Metadata stamped on every persisted transfer row.
pub fn transfer_metadata(
    original_amount: i64,
    deducted_debt: i64,
    remaining_debt: i64,
    order_id: Option<i64>,
) -> serde_json::Value {
    json!({
        "original_amount": original_amount,
        "deducted_debt": deducted_debt,
        "remaining_debt": remaining_debt,
        "order_id": order_id,
    })
}
