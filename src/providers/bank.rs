//! Manual bank transfer marker
//!
//! No external call: the transfer is accepted at the orchestration layer and
//! left pending for out-of-band confirmation by the finance team.

use async_trait::async_trait;
use tracing::info;

use super::{AttemptOutcome, ProviderAdapter, TransferAttempt};

pub struct ManualBankAdapter;

#[async_trait]
impl ProviderAdapter for ManualBankAdapter {
    fn name(&self) -> &'static str {
        "manual_bank"
    }

    async fn attempt_transfer(&self, req: &TransferAttempt) -> AttemptOutcome {
        let transfer_ref = format!("bank_{}", req.transfer_id);
        info!(
            transfer_id = %req.transfer_id,
            amount = req.amount,
            currency = %req.currency,
            "Manual bank transfer queued for out-of-band confirmation"
        );
        AttemptOutcome::PendingManual { transfer_ref }
    }
}
