//! Compensation records
//!
//! A compensation record makes a stuck payout visible: the buyer paid, the
//! seller payout exhausted its retry budget. One record per
//! (order_id, transfer_id), created idempotently by the scanner.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Record lifecycle: `pending -> processing -> {completed | failed}`.
///
/// The pending -> processing claim is the serialization point between
/// concurrent scanner workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationStatus {
    /// Awaiting automated re-drive or manual intervention
    Pending,
    /// Claimed by a worker, re-drive in flight
    Processing,
    /// Re-drive succeeded
    Completed,
    /// Re-drive failed; error retained for ops review
    Failed,
}

impl CompensationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompensationStatus::Pending => "pending",
            CompensationStatus::Processing => "processing",
            CompensationStatus::Completed => "completed",
            CompensationStatus::Failed => "failed",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CompensationStatus::Pending),
            "processing" => Some(CompensationStatus::Processing),
            "completed" => Some(CompensationStatus::Completed),
            "failed" => Some(CompensationStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for CompensationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CompensationRecord {
    pub id: Uuid,
    pub order_id: i64,
    pub transfer_id: Uuid,
    pub seller_id: i64,
    /// Minor units, the amount the failed transfer was trying to move
    pub amount: i64,
    pub currency: String,
    pub reason: String,
    pub status: CompensationStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}
