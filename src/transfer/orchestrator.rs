//! Transfer Orchestrator
//!
//! Drives one payout to a seller: readiness gate, debt offsetting, provider
//! adapter dispatch, persisted outcome, explicit retry budget.
//!
//! # Safety invariants
//!
//! 1. **Persist-before-call**: the transfer row is written `processing`
//!    before any provider is contacted.
//! 2. **No synchronous retry**: a failed attempt re-arms the record; the
//!    next attempt is a separate `retry_transfer` invocation, so a slow
//!    provider never blocks the webhook path.
//! 3. Provider failures are captured into the record, not thrown to the
//!    payment acknowledgment path.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::debt::{DebtStore, offset_debt};
use super::error::TransferError;
use super::models::{
    DEBT_DEDUCTION_ONLY_REF, PaymentTransfer, TransferOutcome, TransferRequest, TransferStatus,
    transfer_metadata,
};
use super::store::TransferStore;
use crate::providers::{
    AdapterRegistry, AttemptOutcome, PaymentMethod, PlatformAccountRegistry, TransferAttempt,
};
use crate::seller::{PayoutConfig, SellerProfileStore, SellerValidator};

pub struct TransferOrchestrator {
    transfers: Arc<dyn TransferStore>,
    debts: Arc<dyn DebtStore>,
    profiles: Arc<dyn SellerProfileStore>,
    validator: Arc<SellerValidator>,
    adapters: Arc<AdapterRegistry>,
    platform_accounts: Arc<PlatformAccountRegistry>,
    base_currency_fallback: Vec<String>,
    max_retries: i32,
}

impl TransferOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transfers: Arc<dyn TransferStore>,
        debts: Arc<dyn DebtStore>,
        profiles: Arc<dyn SellerProfileStore>,
        validator: Arc<SellerValidator>,
        adapters: Arc<AdapterRegistry>,
        platform_accounts: Arc<PlatformAccountRegistry>,
        base_currency_fallback: Vec<String>,
        max_retries: i32,
    ) -> Self {
        Self {
            transfers,
            debts,
            profiles,
            validator,
            adapters,
            platform_accounts,
            base_currency_fallback,
            max_retries,
        }
    }

    /// Orchestrate one payout. Business failures come back inside the
    /// outcome (and on the persisted row); `Err` is reserved for storage
    /// failures and caller bugs.
    pub async fn transfer_to_seller(
        &self,
        req: TransferRequest,
    ) -> Result<TransferOutcome, TransferError> {
        if req.amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }

        // Readiness gate before anything moves
        let readiness = self
            .validator
            .validate_seller_payment_ready(req.seller_id, Some(req.payment_method), &req.currency)
            .await?;
        if !readiness.can_accept_payment {
            let reason = readiness
                .reason
                .unwrap_or_else(|| "seller not ready".to_string());
            self.persist_unroutable(&req, &reason).await?;
            return Ok(TransferOutcome::failure(reason));
        }

        // Step 1: resolve the payout destination. A missing account is a
        // configuration gap, not a transient fault: persist and stop.
        let destination = match self.resolve_destination(&req).await? {
            Some(d) => d,
            None => {
                let reason = format!(
                    "no payout account for seller {} ({}/{})",
                    req.seller_id, req.payment_method, req.currency
                );
                self.persist_unroutable(&req, &reason).await?;
                return Ok(TransferOutcome::failure(reason));
            }
        };

        // Step 2: debt offsetting before any provider contact
        let debt = self
            .debts
            .outstanding_debt(req.seller_id, &req.currency)
            .await?;
        let offset = offset_debt(req.amount, debt);

        if offset.deducted > 0 {
            self.debts
                .record_deduction(req.seller_id, &req.currency, offset.deducted)
                .await?;
        }

        if offset.payout == 0 {
            // Debt consumed the whole amount; no provider call
            let transfer = self
                .persist_transfer(
                    &req,
                    0,
                    offset.deducted,
                    offset.remaining_debt,
                    TransferStatus::Completed,
                    Some(DEBT_DEDUCTION_ONLY_REF),
                )
                .await?;
            info!(
                transfer_id = %transfer.id,
                seller_id = req.seller_id,
                deducted = offset.deducted,
                remaining_debt = offset.remaining_debt,
                "Payout fully consumed by debt offsetting"
            );
            return Ok(TransferOutcome {
                success: true,
                transfer_id: Some(transfer.id),
                transfer_ref: Some(DEBT_DEDUCTION_ONLY_REF.to_string()),
                error: None,
                retryable: false,
                retry_count: 0,
                remaining_debt: offset.remaining_debt,
            });
        }

        // Step 3: persist `processing` before calling out
        let transfer = self
            .persist_transfer(
                &req,
                offset.payout,
                offset.deducted,
                offset.remaining_debt,
                TransferStatus::Processing,
                None,
            )
            .await?;

        // Steps 4-6: adapter dispatch and outcome recording
        let mut outcome = self.attempt(&transfer, &destination).await?;
        outcome.remaining_debt = offset.remaining_debt;
        Ok(outcome)
    }

    /// Separately invoked retry for a failed-but-retryable transfer.
    pub async fn retry_transfer(&self, transfer_id: Uuid) -> Result<TransferOutcome, TransferError> {
        self.redrive(transfer_id, true).await
    }

    /// Compensation path: re-attempt regardless of the exhausted budget.
    pub async fn redrive_transfer(
        &self,
        transfer_id: Uuid,
    ) -> Result<TransferOutcome, TransferError> {
        self.redrive(transfer_id, false).await
    }

    async fn redrive(
        &self,
        transfer_id: Uuid,
        enforce_budget: bool,
    ) -> Result<TransferOutcome, TransferError> {
        let transfer = self
            .transfers
            .get(transfer_id)
            .await?
            .ok_or(TransferError::TransferNotFound(transfer_id))?;

        if transfer.status != TransferStatus::Failed {
            return Err(TransferError::NotRetryable(transfer_id));
        }
        if enforce_budget && !transfer.is_retryable() {
            return Err(TransferError::NotRetryable(transfer_id));
        }

        let req = TransferRequest {
            seller_id: transfer.seller_id,
            amount: transfer.amount,
            currency: transfer.currency.clone(),
            payment_method: transfer.transfer_method,
            payment_transaction_id: transfer.payment_transaction_id,
            order_id: transfer.order_id,
        };
        let destination = self
            .resolve_destination(&req)
            .await?
            .ok_or(TransferError::NoPayoutAccount(transfer.seller_id))?;

        self.transfers.set_processing(transfer_id).await?;
        self.attempt(&transfer, &destination).await
    }

    /// Payout destination by seller class: platform merchant account for
    /// direct sellers, the bound account for external sellers.
    async fn resolve_destination(
        &self,
        req: &TransferRequest,
    ) -> Result<Option<String>, TransferError> {
        let profile = self
            .profiles
            .get_payout_profile(req.seller_id)
            .await?
            .ok_or(TransferError::SellerNotFound(req.seller_id))?;

        Ok(match profile.config {
            PayoutConfig::Direct => self
                .platform_accounts
                .resolve(req.payment_method, &req.currency, &self.base_currency_fallback)
                .map(|a| a.account_id.clone()),
            PayoutConfig::External {
                payment_account_id, ..
            } => payment_account_id.filter(|s| !s.is_empty()),
        })
    }

    async fn persist_transfer(
        &self,
        req: &TransferRequest,
        payout: i64,
        deducted: i64,
        remaining_debt: i64,
        status: TransferStatus,
        transfer_ref: Option<&str>,
    ) -> Result<PaymentTransfer, TransferError> {
        let now = Utc::now();
        let transfer = PaymentTransfer {
            id: Uuid::new_v4(),
            seller_id: req.seller_id,
            amount: payout,
            currency: req.currency.clone(),
            transfer_method: req.payment_method,
            status,
            retry_count: 0,
            max_retries: self.max_retries,
            payment_transaction_id: req.payment_transaction_id,
            order_id: req.order_id,
            transfer_ref: transfer_ref.map(str::to_string),
            error_message: None,
            metadata: transfer_metadata(req.amount, deducted, remaining_debt, req.order_id),
            created_at: now,
            transferred_at: if status == TransferStatus::Completed {
                Some(now)
            } else {
                None
            },
            last_retry_at: None,
        };
        self.transfers.create(&transfer).await?;
        Ok(transfer)
    }

    /// Unroutable payout (config gap): a `pending` row carrying the
    /// diagnostic, so money never goes silently missing.
    async fn persist_unroutable(
        &self,
        req: &TransferRequest,
        reason: &str,
    ) -> Result<(), TransferError> {
        let transfer = PaymentTransfer {
            id: Uuid::new_v4(),
            seller_id: req.seller_id,
            amount: req.amount,
            currency: req.currency.clone(),
            transfer_method: req.payment_method,
            status: TransferStatus::Pending,
            retry_count: 0,
            max_retries: self.max_retries,
            payment_transaction_id: req.payment_transaction_id,
            order_id: req.order_id,
            transfer_ref: None,
            error_message: Some(reason.to_string()),
            metadata: json!({
                "original_amount": req.amount,
                "order_id": req.order_id,
                "unroutable": true,
            }),
            created_at: Utc::now(),
            transferred_at: None,
            last_retry_at: None,
        };
        self.transfers.create(&transfer).await?;
        warn!(
            transfer_id = %transfer.id,
            seller_id = req.seller_id,
            reason,
            "Payout unroutable, persisted pending for ops"
        );
        Ok(())
    }

    /// One provider attempt against an already-persisted transfer row.
    async fn attempt(
        &self,
        transfer: &PaymentTransfer,
        destination: &str,
    ) -> Result<TransferOutcome, TransferError> {
        let adapter = self.adapters.get(transfer.transfer_method)?;
        let attempt = TransferAttempt {
            transfer_id: transfer.id,
            amount: transfer.amount,
            currency: transfer.currency.clone(),
            destination_account: destination.to_string(),
            description: match transfer.order_id {
                Some(order_id) => format!("payout for order {order_id}"),
                None => format!("payout to seller {}", transfer.seller_id),
            },
        };

        match adapter.attempt_transfer(&attempt).await {
            AttemptOutcome::Completed { transfer_ref } => {
                self.transfers
                    .set_completed(transfer.id, &transfer_ref)
                    .await?;
                info!(
                    transfer_id = %transfer.id,
                    provider = adapter.name(),
                    transfer_ref = %transfer_ref,
                    amount = transfer.amount,
                    "Transfer completed"
                );
                Ok(TransferOutcome {
                    success: true,
                    transfer_id: Some(transfer.id),
                    transfer_ref: Some(transfer_ref),
                    error: None,
                    retryable: false,
                    retry_count: transfer.retry_count,
                    remaining_debt: 0,
                })
            }
            AttemptOutcome::PendingManual { transfer_ref } => {
                self.transfers
                    .set_pending(transfer.id, &transfer_ref)
                    .await?;
                info!(
                    transfer_id = %transfer.id,
                    transfer_ref = %transfer_ref,
                    "Transfer accepted, pending out-of-band confirmation"
                );
                Ok(TransferOutcome {
                    success: true,
                    transfer_id: Some(transfer.id),
                    transfer_ref: Some(transfer_ref),
                    error: None,
                    retryable: false,
                    retry_count: transfer.retry_count,
                    remaining_debt: 0,
                })
            }
            AttemptOutcome::Failed { error } => {
                let retry_count = self.transfers.record_failure(transfer.id, &error).await?;
                let retryable = retry_count < transfer.max_retries;
                warn!(
                    transfer_id = %transfer.id,
                    provider = adapter.name(),
                    retry_count,
                    max_retries = transfer.max_retries,
                    retryable,
                    error = %error,
                    "Transfer attempt failed"
                );
                Ok(TransferOutcome {
                    success: false,
                    transfer_id: Some(transfer.id),
                    transfer_ref: None,
                    error: Some(error),
                    retryable,
                    retry_count,
                    remaining_debt: 0,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformAccountConfig;
    use crate::providers::MockProviderAdapter;
    use crate::seller::store::MockSellerProfileStore;
    use crate::seller::{PayoutEligibility, PayoutProfile};
    use crate::transfer::debt::MockDebtStore;
    use crate::transfer::store::MemoryTransferStore;
    use chrono::Duration;
    use std::collections::HashMap;

    struct Harness {
        orchestrator: TransferOrchestrator,
        transfers: Arc<MemoryTransferStore>,
        debts: Arc<MockDebtStore>,
        stripe: Arc<MockProviderAdapter>,
    }

    fn harness() -> Harness {
        let transfers = Arc::new(MemoryTransferStore::new());
        let debts = Arc::new(MockDebtStore::new());
        let profiles = Arc::new(MockSellerProfileStore::new());
        profiles.insert(external_seller(1));
        profiles.insert(PayoutProfile {
            seller_id: 2,
            config: PayoutConfig::Direct,
            charges_enabled: true,
            payouts_enabled: true,
        });

        let registry = Arc::new(PlatformAccountRegistry::new(
            vec![PlatformAccountConfig {
                provider: PaymentMethod::Stripe,
                currency: "USD".into(),
                account_id: "acct_platform_usd".into(),
                webhook_secret: "whsec".into(),
            }],
            None,
        ));
        let fallback = vec!["USD".to_string()];
        let validator = Arc::new(SellerValidator::new(
            profiles.clone(),
            registry.clone(),
            fallback.clone(),
        ));

        let stripe = Arc::new(MockProviderAdapter::new("stripe"));
        let mut adapters: HashMap<PaymentMethod, Arc<dyn crate::providers::ProviderAdapter>> =
            HashMap::new();
        adapters.insert(PaymentMethod::Stripe, stripe.clone());
        adapters.insert(
            PaymentMethod::BankTransfer,
            Arc::new(crate::providers::ManualBankAdapter),
        );

        let orchestrator = TransferOrchestrator::new(
            transfers.clone(),
            debts.clone(),
            profiles,
            validator,
            Arc::new(AdapterRegistry::with_adapters(adapters)),
            registry,
            fallback,
            3,
        );

        Harness {
            orchestrator,
            transfers,
            debts,
            stripe,
        }
    }

    fn external_seller(seller_id: i64) -> PayoutProfile {
        PayoutProfile {
            seller_id,
            config: PayoutConfig::External {
                subscription_active: true,
                subscription_expires_at: Some(Utc::now() + Duration::days(30)),
                provider: Some(PaymentMethod::Stripe),
                payment_account_id: Some("acct_seller_1".to_string()),
                eligibility: PayoutEligibility::Eligible,
            },
            charges_enabled: true,
            payouts_enabled: true,
        }
    }

    fn request(seller_id: i64, amount: i64) -> TransferRequest {
        TransferRequest {
            seller_id,
            amount,
            currency: "USD".into(),
            payment_method: PaymentMethod::Stripe,
            payment_transaction_id: None,
            order_id: Some(100),
        }
    }

    #[tokio::test]
    async fn test_happy_path_completes_transfer() {
        let h = harness();
        let outcome = h.orchestrator.transfer_to_seller(request(1, 10_000)).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.remaining_debt, 0);
        let transfer = h
            .transfers
            .get(outcome.transfer_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transfer.status, TransferStatus::Completed);
        assert_eq!(transfer.amount, 10_000);
        assert!(transfer.transferred_at.is_some());
        assert_eq!(h.stripe.call_count(), 1);
    }

    #[tokio::test]
    async fn test_partial_debt_offsets_payout() {
        // 100.00 order, 30.00 debt -> 70.00 paid out, debt cleared
        let h = harness();
        h.debts.set_debt(1, "USD", 3_000);

        let outcome = h.orchestrator.transfer_to_seller(request(1, 10_000)).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.remaining_debt, 0);
        let transfer_ref = outcome.transfer_ref.unwrap();
        assert_ne!(transfer_ref, DEBT_DEDUCTION_ONLY_REF);

        let attempt = h.stripe.last_attempt().unwrap();
        assert_eq!(attempt.amount, 7_000);

        let transfer = h
            .transfers
            .get(outcome.transfer_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transfer.metadata["original_amount"], 10_000);
        assert_eq!(transfer.metadata["deducted_debt"], 3_000);
        assert_eq!(h.debts.debt_of(1, "USD"), 0);
    }

    #[tokio::test]
    async fn test_debt_consumes_whole_amount() {
        // 50.00 order, 80.00 debt -> no provider call, 30.00 debt remains
        let h = harness();
        h.debts.set_debt(1, "USD", 8_000);

        let outcome = h.orchestrator.transfer_to_seller(request(1, 5_000)).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.transfer_ref.as_deref(), Some(DEBT_DEDUCTION_ONLY_REF));
        assert_eq!(outcome.remaining_debt, 3_000);
        assert_eq!(h.stripe.call_count(), 0);
        assert_eq!(h.debts.debt_of(1, "USD"), 3_000);

        let transfer = h
            .transfers
            .get(outcome.transfer_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transfer.status, TransferStatus::Completed);
        assert_eq!(transfer.amount, 0);
    }

    #[tokio::test]
    async fn test_failure_is_retryable_within_budget() {
        let h = harness();
        h.stripe.set_fail(true);

        let outcome = h.orchestrator.transfer_to_seller(request(1, 10_000)).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.retryable);
        assert_eq!(outcome.retry_count, 1);

        let transfer = h
            .transfers
            .get(outcome.transfer_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transfer.status, TransferStatus::Failed);
        assert!(transfer.is_retryable());
        assert!(transfer.last_retry_at.is_some());
        assert!(transfer.error_message.is_some());
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion() {
        let h = harness();
        h.stripe.set_fail(true);

        let outcome = h.orchestrator.transfer_to_seller(request(1, 10_000)).await.unwrap();
        let id = outcome.transfer_id.unwrap();

        let second = h.orchestrator.retry_transfer(id).await.unwrap();
        assert!(second.retryable);
        assert_eq!(second.retry_count, 2);

        let third = h.orchestrator.retry_transfer(id).await.unwrap();
        assert!(!third.retryable);
        assert_eq!(third.retry_count, 3);

        // Budget exhausted: retry is refused, transfer visible to compensation
        let err = h.orchestrator.retry_transfer(id).await.unwrap_err();
        assert!(matches!(err, TransferError::NotRetryable(_)));

        let exhausted = h.transfers.find_exhausted_failed(10).await.unwrap();
        assert_eq!(exhausted.len(), 1);
        assert_eq!(exhausted[0].id, id);
    }

    #[tokio::test]
    async fn test_fail_once_then_recover_never_reaches_compensation() {
        let h = harness();
        h.stripe.set_fail_first(1);

        let outcome = h.orchestrator.transfer_to_seller(request(1, 10_000)).await.unwrap();
        assert!(!outcome.success);
        let id = outcome.transfer_id.unwrap();

        let retried = h.orchestrator.retry_transfer(id).await.unwrap();
        assert!(retried.success);

        let transfer = h.transfers.get(id).await.unwrap().unwrap();
        assert_eq!(transfer.status, TransferStatus::Completed);
        assert!(h.transfers.find_exhausted_failed(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_method_mismatch_persists_pending_diagnostic() {
        let h = harness();
        // Seller 1 is bound to stripe; a paypal payout cannot be routed
        let mut req = request(1, 10_000);
        req.payment_method = PaymentMethod::Paypal;

        let outcome = h.orchestrator.transfer_to_seller(req).await.unwrap();
        assert!(!outcome.success);
        assert!(!outcome.retryable);
        assert_eq!(h.stripe.call_count(), 0);

        // A pending diagnostic row exists
        let all = h.transfers.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, TransferStatus::Pending);
        assert!(all[0].error_message.is_some());
    }

    #[tokio::test]
    async fn test_direct_seller_pays_to_platform_account() {
        let h = harness();
        let outcome = h.orchestrator.transfer_to_seller(request(2, 4_000)).await.unwrap();
        assert!(outcome.success);
        let attempt = h.stripe.last_attempt().unwrap();
        assert_eq!(attempt.destination_account, "acct_platform_usd");
    }

    #[tokio::test]
    async fn test_manual_bank_stays_pending() {
        let h = harness();
        let profiles = Arc::new(MockSellerProfileStore::new());
        let mut p = external_seller(5);
        if let PayoutConfig::External { provider, .. } = &mut p.config {
            *provider = Some(PaymentMethod::BankTransfer);
        }
        profiles.insert(p);

        let registry = Arc::new(PlatformAccountRegistry::new(vec![], None));
        let validator = Arc::new(SellerValidator::new(
            profiles.clone(),
            registry.clone(),
            vec![],
        ));
        let mut adapters: HashMap<PaymentMethod, Arc<dyn crate::providers::ProviderAdapter>> =
            HashMap::new();
        adapters.insert(
            PaymentMethod::BankTransfer,
            Arc::new(crate::providers::ManualBankAdapter),
        );
        let orchestrator = TransferOrchestrator::new(
            h.transfers.clone(),
            h.debts.clone(),
            profiles,
            validator,
            Arc::new(AdapterRegistry::with_adapters(adapters)),
            registry,
            vec![],
            3,
        );

        let mut req = request(5, 10_000);
        req.payment_method = PaymentMethod::BankTransfer;
        let outcome = orchestrator.transfer_to_seller(req).await.unwrap();

        assert!(outcome.success);
        let transfer = h
            .transfers
            .get(outcome.transfer_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transfer.status, TransferStatus::Pending);
        assert!(transfer.transfer_ref.unwrap().starts_with("bank_"));
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let h = harness();
        let err = h
            .orchestrator
            .transfer_to_seller(request(1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidAmount));
    }
}
