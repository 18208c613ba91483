//! Compensation Recovery Scanner
//!
//! Background worker behind the "give up gracefully" guarantee: once a
//! payout exhausts its retry budget for a paid order, money must never be
//! silently stuck. The scanner turns every such transfer into a visible
//! compensation record, then re-drives it through the orchestrator's
//! adapter path.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::models::{CompensationRecord, CompensationStatus};
use super::store::{CompensationStore, CompensationStoreError};
use crate::collaborators::{CollaboratorError, OrderPaymentStatus, OrderStore};
use crate::transfer::{TransferError, TransferOrchestrator, TransferStore};

#[derive(Debug, Error)]
pub enum CompensationError {
    #[error("Compensation record not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] CompensationStoreError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// How often to scan for exhausted transfers
    pub scan_interval: Duration,
    /// Maximum transfers to examine per scan
    pub batch_size: i64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(60),
            batch_size: 50,
        }
    }
}

pub struct CompensationScanner {
    transfers: Arc<dyn TransferStore>,
    orders: Arc<dyn OrderStore>,
    compensations: Arc<dyn CompensationStore>,
    orchestrator: Arc<TransferOrchestrator>,
    config: ScannerConfig,
}

impl CompensationScanner {
    pub fn new(
        transfers: Arc<dyn TransferStore>,
        orders: Arc<dyn OrderStore>,
        compensations: Arc<dyn CompensationStore>,
        orchestrator: Arc<TransferOrchestrator>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            transfers,
            orders,
            compensations,
            orchestrator,
            config,
        }
    }

    /// Run the scanner loop forever.
    pub async fn run(&self) -> ! {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            batch_size = self.config.batch_size,
            "Starting compensation scanner"
        );

        loop {
            if let Err(e) = self.scan_once().await {
                error!(error = %e, "Compensation scan failed");
            }

            tokio::time::sleep(self.config.scan_interval).await;
        }
    }

    /// One full cycle: detect, then process everything pending.
    pub async fn scan_once(&self) -> Result<usize, CompensationError> {
        let detected = self.detect_compensation_needed(self.config.batch_size).await?;
        if !detected.is_empty() {
            info!(count = detected.len(), "Detected payouts needing compensation");
        }

        let pending = self.compensations.list_pending(self.config.batch_size).await?;
        let mut processed = 0;
        for record in pending {
            match self.process_compensation(record.id).await {
                Ok(true) => processed += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(compensation_id = %record.id, error = %e, "Compensation processing failed");
                }
            }
        }

        if processed > 0 {
            info!(count = processed, "Compensations resolved this scan");
        }
        Ok(processed)
    }

    /// Orders whose payment succeeded but whose payout transfer exhausted
    /// its retry budget. Each gets an idempotent compensation record.
    pub async fn detect_compensation_needed(
        &self,
        limit: i64,
    ) -> Result<Vec<CompensationRecord>, CompensationError> {
        let exhausted = self.transfers.find_exhausted_failed(limit).await?;
        let mut detected = Vec::new();

        for transfer in exhausted {
            // find_exhausted_failed only returns transfers with an order
            let Some(order_id) = transfer.order_id else {
                continue;
            };
            let order = match self.orders.get_order(order_id).await? {
                Some(o) => o,
                None => {
                    warn!(order_id, transfer_id = %transfer.id, "Exhausted transfer references unknown order");
                    continue;
                }
            };
            if order.payment_status != OrderPaymentStatus::Paid {
                debug!(order_id, "Order not paid, no compensation needed");
                continue;
            }

            let record = self
                .create_compensation_record(
                    order_id,
                    transfer.id,
                    &format!(
                        "payout failed after {} attempts: {}",
                        transfer.retry_count,
                        transfer.error_message.as_deref().unwrap_or("unknown error")
                    ),
                    transfer.seller_id,
                    transfer.amount,
                    &transfer.currency,
                )
                .await?;
            if record.status == CompensationStatus::Pending {
                detected.push(record);
            }
        }
        Ok(detected)
    }

    /// Idempotent per (order_id, transfer_id): re-invocation returns the
    /// existing record.
    pub async fn create_compensation_record(
        &self,
        order_id: i64,
        transfer_id: Uuid,
        reason: &str,
        seller_id: i64,
        amount: i64,
        currency: &str,
    ) -> Result<CompensationRecord, CompensationError> {
        let record = CompensationRecord {
            id: Uuid::new_v4(),
            order_id,
            transfer_id,
            seller_id,
            amount,
            currency: currency.to_string(),
            reason: reason.to_string(),
            status: CompensationStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        Ok(self.compensations.create_if_absent(&record).await?)
    }

    /// Re-attempt the underlying transfer. Returns true when the payout
    /// went through and the record closed as completed.
    pub async fn process_compensation(
        &self,
        compensation_id: Uuid,
    ) -> Result<bool, CompensationError> {
        let record = self
            .compensations
            .get(compensation_id)
            .await?
            .ok_or(CompensationError::NotFound(compensation_id))?;
        if record.status != CompensationStatus::Pending {
            return Ok(false);
        }
        // Claim pending -> processing before touching the provider, so a
        // record is only ever re-driven by the worker that won the claim.
        if !self.compensations.set_processing(record.id).await? {
            debug!(compensation_id = %record.id, "Lost claim to a concurrent worker");
            return Ok(false);
        }

        match self.orchestrator.redrive_transfer(record.transfer_id).await {
            Ok(outcome) if outcome.success => {
                self.compensations.set_completed(record.id).await?;
                info!(
                    compensation_id = %record.id,
                    transfer_id = %record.transfer_id,
                    order_id = record.order_id,
                    "Compensation re-drive succeeded"
                );
                Ok(true)
            }
            Ok(outcome) => {
                let error = outcome.error.unwrap_or_else(|| "unknown error".to_string());
                self.compensations.set_failed(record.id, &error).await?;
                warn!(
                    compensation_id = %record.id,
                    transfer_id = %record.transfer_id,
                    error = %error,
                    "Compensation re-drive failed, retained for ops review"
                );
                Ok(false)
            }
            Err(e) => {
                self.compensations.set_failed(record.id, &e.to_string()).await?;
                warn!(
                    compensation_id = %record.id,
                    transfer_id = %record.transfer_id,
                    error = %e,
                    "Compensation re-drive errored, retained for ops review"
                );
                Ok(false)
            }
        }
    }
}
