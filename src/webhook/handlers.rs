//! Payment-type event handlers
//!
//! One processor behind the gateway: dedupe the delivery, win the
//! pending->paid transition, then apply business effects for the event's
//! declared kind. Everything downstream of the winning transition (ledger
//! posting, stock, notifications, payout) happens exactly once per
//! (provider, provider_ref).
//!
//! Payout problems never propagate to the webhook response: the buyer's
//! payment acknowledgment is independent of the seller's payout outcome.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::WebhookError;
use super::models::{EventKind, PaymentTransaction, TransactionStatus, WebhookEvent};
use super::store::TransactionStore;
use crate::collaborators::{NotificationSink, OrderStore, OrderSummary};
use crate::ledger::{
    AccountRef, AccountType, JournalType, LedgerService, LegSpec, PostJournalRequest,
};
use crate::money::{format_minor_units, parse_minor_units};
use crate::providers::PaymentMethod;
use crate::seller::{PayoutConfig, PayoutEligibility, PayoutStatusUpdate, SellerProfileStore};
use crate::transfer::{TransferOrchestrator, TransferRequest};

pub struct EventProcessor {
    transactions: Arc<dyn TransactionStore>,
    ledger: Arc<LedgerService>,
    orders: Arc<dyn OrderStore>,
    notifications: Arc<dyn NotificationSink>,
    profiles: Arc<dyn SellerProfileStore>,
    orchestrator: Arc<TransferOrchestrator>,
    /// Platform commission on order/tip payments, basis points
    commission_bps: u32,
}

impl EventProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        ledger: Arc<LedgerService>,
        orders: Arc<dyn OrderStore>,
        notifications: Arc<dyn NotificationSink>,
        profiles: Arc<dyn SellerProfileStore>,
        orchestrator: Arc<TransferOrchestrator>,
        commission_bps: u32,
    ) -> Self {
        Self {
            transactions,
            ledger,
            orders,
            notifications,
            profiles,
            orchestrator,
            commission_bps,
        }
    }

    /// Apply one verified event. `default_currency` is the currency hint
    /// from the signing secret that verified; the payload's own currency
    /// wins when present.
    pub async fn process_event(
        &self,
        provider: PaymentMethod,
        event: WebhookEvent,
        default_currency: Option<String>,
    ) -> Result<(), WebhookError> {
        if event.kind == EventKind::Refund {
            return self.handle_refund(provider, &event).await;
        }
        if !event.kind.is_monetary() {
            return self.handle_payout_account_update(&event).await;
        }

        let currency = event
            .currency
            .clone()
            .or(default_currency)
            .ok_or_else(|| WebhookError::MalformedPayload("missing currency".to_string()))?;
        let amount = match event.amount {
            Some(a) => Some(a),
            None => event
                .amount_decimal
                .as_deref()
                .map(|s| parse_minor_units(s, &currency))
                .transpose()
                .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?,
        };
        let amount = amount
            .filter(|a| *a > 0)
            .ok_or_else(|| WebhookError::MalformedPayload("missing or non-positive amount".to_string()))?;

        // Dedupe before any side effect. A transaction already past
        // `pending` means a duplicate delivery: acknowledge and stop.
        if let Some(existing) = self.transactions.find(provider, &event.event_ref).await?
            && existing.status != TransactionStatus::Pending
        {
            info!(
                provider = %provider,
                provider_ref = %event.event_ref,
                status = %existing.status,
                "Duplicate delivery, no-op"
            );
            return Ok(());
        }

        let tx = PaymentTransaction {
            id: Uuid::new_v4(),
            provider,
            provider_ref: event.event_ref.clone(),
            kind: event.kind,
            amount,
            currency: currency.clone(),
            payer_id: event.user_id,
            payee_id: event.seller_id,
            order_id: event.order_id,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
            paid_at: None,
        };
        // Losing the insert race is fine; the winner's row is the one
        // we transition below.
        self.transactions.insert_pending(&tx).await?;

        // The unique-constraint-backed transition is the serialization
        // point: exactly one concurrent delivery wins it.
        if !self.transactions.mark_paid(provider, &event.event_ref).await? {
            info!(
                provider = %provider,
                provider_ref = %event.event_ref,
                "Lost paid transition to a concurrent delivery, no-op"
            );
            return Ok(());
        }

        let tx_id = tx.id;
        match event.kind {
            EventKind::Order => self.handle_order(provider, &event, amount, &currency, tx_id).await,
            EventKind::Subscription => {
                self.handle_to_platform(
                    provider,
                    &event,
                    amount,
                    &currency,
                    AccountType::PlatformRevenue,
                    "subscription",
                )
                .await
            }
            EventKind::PlatformFee => {
                self.handle_to_platform(
                    provider,
                    &event,
                    amount,
                    &currency,
                    AccountType::PlatformFeePayable,
                    "platform_fee",
                )
                .await
            }
            EventKind::Tip => self.handle_tip(provider, &event, amount, &currency, tx_id).await,
            EventKind::UserTip => self.handle_user_tip(provider, &event, amount, &currency).await,
            EventKind::Deposit => self.handle_deposit(provider, &event, amount, &currency).await,
            EventKind::Refund | EventKind::PayoutAccountUpdate => unreachable!("handled above"),
        }
    }

    fn journal_txn_id(provider: PaymentMethod, event_ref: &str) -> String {
        format!("{provider}:{event_ref}")
    }

    fn commission_of(&self, amount: i64) -> i64 {
        amount * self.commission_bps as i64 / 10_000
    }

    /// Order paid: ledger split, stock decrement, notifications, and (for
    /// externally-settled sellers) the payout itself.
    async fn handle_order(
        &self,
        provider: PaymentMethod,
        event: &WebhookEvent,
        amount: i64,
        currency: &str,
        tx_id: Uuid,
    ) -> Result<(), WebhookError> {
        let order_id = event
            .order_id
            .ok_or_else(|| WebhookError::MalformedPayload("order event without order_id".to_string()))?;
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| WebhookError::Validation(format!("unknown order {order_id}")))?;
        if order.amount != amount {
            return Err(WebhookError::Validation(format!(
                "amount mismatch for order {order_id}: event {amount}, order {}",
                order.amount
            )));
        }

        let commission = self.commission_of(amount);
        let net = amount - commission;

        let mut legs = vec![
            LegSpec::debit(
                AccountRef::owned(AccountType::BuyerClearing, order.buyer_id, currency),
                amount,
            ),
            LegSpec::credit(
                AccountRef::owned(AccountType::SellerPayable, order.seller_id, currency),
                net,
            ),
        ];
        if commission > 0 {
            legs.push(LegSpec::credit(
                AccountRef::platform(AccountType::PlatformRevenue, currency),
                commission,
            ));
        }
        self.ledger
            .post_journal_entry(PostJournalRequest {
                transaction_id: Self::journal_txn_id(provider, &event.event_ref),
                journal_type: JournalType::Payment,
                reference_id: Some(order_id.to_string()),
                reference_type: Some("order".to_string()),
                legs,
            })
            .await?;

        self.orders.mark_paid(order_id, amount).await?;

        self.notify_quietly(
            order.buyer_id,
            "order.payment_confirmed",
            json!({ "order_id": order_id }),
        )
        .await;
        self.notify_quietly(
            order.seller_id,
            "order.paid",
            json!({ "order_id": order_id, "net_amount": net, "currency": currency }),
        )
        .await;

        self.maybe_transfer_payout(provider, &order, net, currency, tx_id)
            .await;
        Ok(())
    }

    /// Subscription and platform-fee payments both settle straight into a
    /// platform account.
    async fn handle_to_platform(
        &self,
        provider: PaymentMethod,
        event: &WebhookEvent,
        amount: i64,
        currency: &str,
        credit_to: AccountType,
        reference_type: &str,
    ) -> Result<(), WebhookError> {
        let payer = event
            .user_id
            .ok_or_else(|| WebhookError::MalformedPayload("event without user_id".to_string()))?;

        self.ledger
            .post_journal_entry(PostJournalRequest {
                transaction_id: Self::journal_txn_id(provider, &event.event_ref),
                journal_type: JournalType::Payment,
                reference_id: Some(payer.to_string()),
                reference_type: Some(reference_type.to_string()),
                legs: vec![
                    LegSpec::debit(
                        AccountRef::owned(AccountType::BuyerClearing, payer, currency),
                        amount,
                    ),
                    LegSpec::credit(AccountRef::platform(credit_to, currency), amount),
                ],
            })
            .await?;
        Ok(())
    }

    /// Tip to a seller: commission applies, same split as an order but
    /// without an order row.
    async fn handle_tip(
        &self,
        provider: PaymentMethod,
        event: &WebhookEvent,
        amount: i64,
        currency: &str,
        tx_id: Uuid,
    ) -> Result<(), WebhookError> {
        let payer = event
            .user_id
            .ok_or_else(|| WebhookError::MalformedPayload("tip without user_id".to_string()))?;
        let seller_id = event
            .seller_id
            .ok_or_else(|| WebhookError::MalformedPayload("tip without seller_id".to_string()))?;

        let commission = self.commission_of(amount);
        let net = amount - commission;

        let mut legs = vec![
            LegSpec::debit(
                AccountRef::owned(AccountType::BuyerClearing, payer, currency),
                amount,
            ),
            LegSpec::credit(
                AccountRef::owned(AccountType::SellerPayable, seller_id, currency),
                net,
            ),
        ];
        if commission > 0 {
            legs.push(LegSpec::credit(
                AccountRef::platform(AccountType::PlatformRevenue, currency),
                commission,
            ));
        }
        self.ledger
            .post_journal_entry(PostJournalRequest {
                transaction_id: Self::journal_txn_id(provider, &event.event_ref),
                journal_type: JournalType::Payment,
                reference_id: Some(seller_id.to_string()),
                reference_type: Some("tip".to_string()),
                legs,
            })
            .await?;

        self.notify_quietly(
            seller_id,
            "tip.received",
            json!({ "net_amount": net, "currency": currency }),
        )
        .await;

        let recipient = OrderSummary {
            order_id: 0,
            seller_id,
            buyer_id: payer,
            amount,
            currency: currency.to_string(),
            payment_status: crate::collaborators::OrderPaymentStatus::Paid,
            paid_at: None,
        };
        self.maybe_transfer_payout(provider, &recipient, net, currency, tx_id)
            .await;
        Ok(())
    }

    /// User-to-user tip: full amount into the recipient wallet, no
    /// commission, no payout.
    async fn handle_user_tip(
        &self,
        provider: PaymentMethod,
        event: &WebhookEvent,
        amount: i64,
        currency: &str,
    ) -> Result<(), WebhookError> {
        let payer = event
            .user_id
            .ok_or_else(|| WebhookError::MalformedPayload("user_tip without user_id".to_string()))?;
        let recipient = event
            .seller_id
            .ok_or_else(|| WebhookError::MalformedPayload("user_tip without seller_id".to_string()))?;

        self.ledger
            .post_journal_entry(PostJournalRequest {
                transaction_id: Self::journal_txn_id(provider, &event.event_ref),
                journal_type: JournalType::Payment,
                reference_id: Some(recipient.to_string()),
                reference_type: Some("user_tip".to_string()),
                legs: vec![
                    LegSpec::debit(
                        AccountRef::owned(AccountType::BuyerClearing, payer, currency),
                        amount,
                    ),
                    LegSpec::credit(
                        AccountRef::owned(AccountType::UserWallet, recipient, currency),
                        amount,
                    ),
                ],
            })
            .await?;

        self.notify_quietly(
            recipient,
            "tip.received",
            json!({ "net_amount": amount, "currency": currency }),
        )
        .await;
        Ok(())
    }

    /// Wallet top-up: the payer's own wallet is credited in full.
    async fn handle_deposit(
        &self,
        provider: PaymentMethod,
        event: &WebhookEvent,
        amount: i64,
        currency: &str,
    ) -> Result<(), WebhookError> {
        let payer = event
            .user_id
            .ok_or_else(|| WebhookError::MalformedPayload("deposit without user_id".to_string()))?;

        self.ledger
            .post_journal_entry(PostJournalRequest {
                transaction_id: Self::journal_txn_id(provider, &event.event_ref),
                journal_type: JournalType::Payment,
                reference_id: Some(payer.to_string()),
                reference_type: Some("deposit".to_string()),
                legs: vec![
                    LegSpec::debit(
                        AccountRef::owned(AccountType::BuyerClearing, payer, currency),
                        amount,
                    ),
                    LegSpec::credit(
                        AccountRef::owned(AccountType::UserWallet, payer, currency),
                        amount,
                    ),
                ],
            })
            .await?;
        Ok(())
    }

    /// Provider reported a refund against an earlier payment. The winning
    /// paid -> refunded transition dedupes concurrent deliveries, same as
    /// pending -> paid on the way in. A full refund reverses the payment
    /// journal; a partial refund posts a prorated refund journal against it
    /// and leaves the original reversible.
    async fn handle_refund(
        &self,
        provider: PaymentMethod,
        event: &WebhookEvent,
    ) -> Result<(), WebhookError> {
        let original_ref = event.original_ref.as_deref().ok_or_else(|| {
            WebhookError::MalformedPayload("refund without original_ref".to_string())
        })?;
        let tx = self
            .transactions
            .find(provider, original_ref)
            .await?
            .ok_or_else(|| {
                WebhookError::Validation(format!("refund for unknown payment {original_ref}"))
            })?;

        // No amount means the provider refunded the payment in full
        let amount = match (event.amount, event.amount_decimal.as_deref()) {
            (Some(a), _) => a,
            (None, Some(s)) => parse_minor_units(s, &tx.currency)
                .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?,
            (None, None) => tx.amount,
        };
        if amount <= 0 || amount > tx.amount {
            return Err(WebhookError::Validation(format!(
                "refund amount {amount} exceeds payment amount {} or is non-positive",
                tx.amount
            )));
        }
        let partial = amount < tx.amount;

        if !self
            .transactions
            .mark_refunded(provider, original_ref, partial)
            .await?
        {
            info!(
                provider = %provider,
                provider_ref = %original_ref,
                "Refund lost its transition (not paid or already refunded), no-op"
            );
            return Ok(());
        }

        let original_txn = Self::journal_txn_id(provider, original_ref);
        if partial {
            self.ledger
                .refund_journal_portion(
                    &original_txn,
                    Self::journal_txn_id(provider, &event.event_ref),
                    amount,
                    "provider refund",
                )
                .await?;
        } else {
            self.ledger
                .reverse_by_transaction_id(&original_txn, "provider refund")
                .await?;
        }

        let buyer = match tx.payer_id {
            Some(id) => Some(id),
            None => match tx.order_id {
                Some(order_id) => self.orders.get_order(order_id).await?.map(|o| o.buyer_id),
                None => None,
            },
        };
        if let Some(buyer) = buyer {
            self.notify_quietly(
                buyer,
                "payment.refunded",
                json!({
                    "amount": amount,
                    "amount_display": format_minor_units(amount, &tx.currency),
                    "currency": tx.currency,
                    "partial": partial,
                }),
            )
            .await;
        }

        info!(
            provider = %provider,
            provider_ref = %original_ref,
            amount,
            partial,
            "Refund applied"
        );
        Ok(())
    }

    /// Provider reported charges/payouts flags changed. Webhook job is
    /// acknowledging receipt: the recompute is best-effort, failures are
    /// logged and never surface to the response.
    async fn handle_payout_account_update(
        &self,
        event: &WebhookEvent,
    ) -> Result<(), WebhookError> {
        let seller_id = event.seller_id.ok_or_else(|| {
            WebhookError::MalformedPayload("account update without seller_id".to_string())
        })?;

        let eligibility = if event.account_disabled_reason.is_some() {
            Some(PayoutEligibility::Blocked)
        } else {
            match (event.charges_enabled, event.payouts_enabled) {
                (Some(true), Some(true)) => Some(PayoutEligibility::Eligible),
                (Some(false), _) | (_, Some(false)) => Some(PayoutEligibility::PendingReview),
                _ => None,
            }
        };

        let update = PayoutStatusUpdate {
            charges_enabled: event.charges_enabled,
            payouts_enabled: event.payouts_enabled,
            eligibility,
        };
        if let Err(e) = self.profiles.update_payout_status(seller_id, update).await {
            warn!(seller_id, error = %e, "Payout status recompute failed, acknowledging anyway");
        } else {
            info!(
                seller_id,
                charges_enabled = ?event.charges_enabled,
                payouts_enabled = ?event.payouts_enabled,
                eligibility = ?eligibility,
                "Payout account status updated"
            );
        }
        Ok(())
    }

    /// Kick off the payout for externally-settled sellers. Any failure is
    /// captured into the transfer record by the orchestrator; here it only
    /// gets logged.
    async fn maybe_transfer_payout(
        &self,
        provider: PaymentMethod,
        order: &OrderSummary,
        net: i64,
        currency: &str,
        tx_id: Uuid,
    ) {
        let profile = match self.profiles.get_payout_profile(order.seller_id).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                warn!(seller_id = order.seller_id, "No payout profile, skipping payout");
                return;
            }
            Err(e) => {
                warn!(seller_id = order.seller_id, error = %e, "Profile lookup failed, skipping payout");
                return;
            }
        };
        // Direct sellers settle through the platform account; money is
        // already where it belongs.
        if !matches!(profile.config, PayoutConfig::External { .. }) {
            return;
        }

        let request = TransferRequest {
            seller_id: order.seller_id,
            amount: net,
            currency: currency.to_string(),
            payment_method: provider,
            payment_transaction_id: Some(tx_id),
            order_id: (order.order_id != 0).then_some(order.order_id),
        };
        match self.orchestrator.transfer_to_seller(request).await {
            Ok(outcome) if outcome.success => {}
            Ok(outcome) => {
                warn!(
                    seller_id = order.seller_id,
                    retryable = outcome.retryable,
                    error = ?outcome.error,
                    "Payout failed; captured on the transfer record"
                );
            }
            Err(e) => {
                warn!(seller_id = order.seller_id, error = %e, "Payout errored; payment acknowledgment unaffected");
            }
        }
    }

    async fn notify_quietly(&self, user_id: i64, template_key: &str, params: serde_json::Value) {
        if let Err(e) = self.notifications.notify(user_id, template_key, params).await {
            warn!(user_id, template_key, error = %e, "Notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MockNotificationSink, MockOrderStore, OrderPaymentStatus};
    use crate::config::PlatformAccountConfig;
    use crate::ledger::store::MemoryLedgerStore;
    use crate::providers::{
        AdapterRegistry, MockProviderAdapter, PlatformAccountRegistry, ProviderAdapter,
    };
    use crate::seller::store::MockSellerProfileStore;
    use crate::seller::{PayoutProfile, SellerValidator};
    use crate::transfer::debt::MockDebtStore;
    use crate::transfer::store::MemoryTransferStore;
    use chrono::Duration;
    use std::collections::HashMap;

    struct Harness {
        processor: EventProcessor,
        ledger_store: Arc<MemoryLedgerStore>,
        transactions: Arc<super::super::store::MemoryTransactionStore>,
        orders: Arc<MockOrderStore>,
        notifications: Arc<MockNotificationSink>,
        profiles: Arc<MockSellerProfileStore>,
        transfers: Arc<MemoryTransferStore>,
        stripe: Arc<MockProviderAdapter>,
    }

    fn harness() -> Harness {
        let ledger_store = Arc::new(MemoryLedgerStore::new());
        let transactions = Arc::new(super::super::store::MemoryTransactionStore::new());
        let orders = Arc::new(MockOrderStore::new());
        let notifications = Arc::new(MockNotificationSink::new());
        let profiles = Arc::new(MockSellerProfileStore::new());
        let transfers = Arc::new(MemoryTransferStore::new());
        let debts = Arc::new(MockDebtStore::new());

        let registry = Arc::new(PlatformAccountRegistry::new(
            vec![PlatformAccountConfig {
                provider: PaymentMethod::Stripe,
                currency: "USD".into(),
                account_id: "acct_platform".into(),
                webhook_secret: "whsec".into(),
            }],
            None,
        ));
        let validator = Arc::new(SellerValidator::new(
            profiles.clone(),
            registry.clone(),
            vec!["USD".into()],
        ));
        let stripe = Arc::new(MockProviderAdapter::new("stripe"));
        let mut adapters: HashMap<PaymentMethod, Arc<dyn ProviderAdapter>> = HashMap::new();
        adapters.insert(PaymentMethod::Stripe, stripe.clone());

        let orchestrator = Arc::new(TransferOrchestrator::new(
            transfers.clone(),
            debts,
            profiles.clone(),
            validator,
            Arc::new(AdapterRegistry::with_adapters(adapters)),
            registry,
            vec!["USD".into()],
            3,
        ));

        let processor = EventProcessor::new(
            transactions.clone(),
            Arc::new(LedgerService::new(ledger_store.clone())),
            orders.clone(),
            notifications.clone(),
            profiles.clone(),
            orchestrator,
            1_000, // 10%
        );

        Harness {
            processor,
            ledger_store,
            transactions,
            orders,
            notifications,
            profiles,
            transfers,
            stripe,
        }
    }

    fn seed_order(h: &Harness, order_id: i64, seller_id: i64, amount: i64) {
        h.orders.insert(OrderSummary {
            order_id,
            seller_id,
            buyer_id: 42,
            amount,
            currency: "USD".into(),
            payment_status: OrderPaymentStatus::Unpaid,
            paid_at: None,
        });
    }

    fn external_seller(seller_id: i64) -> PayoutProfile {
        PayoutProfile {
            seller_id,
            config: PayoutConfig::External {
                subscription_active: true,
                subscription_expires_at: Some(Utc::now() + Duration::days(30)),
                provider: Some(PaymentMethod::Stripe),
                payment_account_id: Some("acct_seller".to_string()),
                eligibility: PayoutEligibility::Eligible,
            },
            charges_enabled: true,
            payouts_enabled: true,
        }
    }

    fn direct_seller(seller_id: i64) -> PayoutProfile {
        PayoutProfile {
            seller_id,
            config: PayoutConfig::Direct,
            charges_enabled: true,
            payouts_enabled: true,
        }
    }

    fn order_event(event_ref: &str, order_id: i64, amount: i64) -> WebhookEvent {
        serde_json::from_value(json!({
            "event_ref": event_ref,
            "kind": "order",
            "amount": amount,
            "currency": "USD",
            "order_id": order_id,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_order_payment_splits_commission() {
        let h = harness();
        seed_order(&h, 100, 7, 10_000);
        h.profiles.insert(direct_seller(7));

        h.processor
            .process_event(PaymentMethod::Stripe, order_event("evt_1", 100, 10_000), None)
            .await
            .unwrap();

        // 10% commission: buyer -100.00, seller +90.00, platform +10.00
        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::owned(AccountType::BuyerClearing, 42, "USD")),
            -10_000
        );
        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::owned(AccountType::SellerPayable, 7, "USD")),
            9_000
        );
        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::platform(AccountType::PlatformRevenue, "USD")),
            1_000
        );
        assert_eq!(h.orders.mark_paid_count(), 1);
        assert_eq!(h.notifications.sent_count(), 2);
        // Direct seller: no payout transfer
        assert_eq!(h.transfers.count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_single_effect() {
        let h = harness();
        seed_order(&h, 100, 7, 10_000);
        h.profiles.insert(direct_seller(7));

        for _ in 0..3 {
            h.processor
                .process_event(PaymentMethod::Stripe, order_event("evt_1", 100, 10_000), None)
                .await
                .unwrap();
        }

        assert_eq!(h.transactions.count(), 1);
        assert_eq!(h.ledger_store.journal_count(), 1);
        assert_eq!(h.orders.mark_paid_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_deliveries() {
        let h = harness();
        seed_order(&h, 100, 7, 10_000);
        h.profiles.insert(direct_seller(7));

        let (a, b) = tokio::join!(
            h.processor.process_event(
                PaymentMethod::Stripe,
                order_event("evt_123", 100, 10_000),
                None
            ),
            h.processor.process_event(
                PaymentMethod::Stripe,
                order_event("evt_123", 100, 10_000),
                None
            ),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(h.transactions.count(), 1);
        assert_eq!(h.ledger_store.journal_count(), 1);
        assert_eq!(h.orders.mark_paid_count(), 1);
    }

    #[tokio::test]
    async fn test_external_seller_gets_payout() {
        let h = harness();
        seed_order(&h, 100, 7, 10_000);
        h.profiles.insert(external_seller(7));

        h.processor
            .process_event(PaymentMethod::Stripe, order_event("evt_1", 100, 10_000), None)
            .await
            .unwrap();

        assert_eq!(h.transfers.count(), 1);
        let transfer = &h.transfers.all()[0];
        // Net of commission
        assert_eq!(transfer.amount, 9_000);
        assert_eq!(h.stripe.call_count(), 1);
    }

    #[tokio::test]
    async fn test_payout_failure_never_fails_acknowledgment() {
        let h = harness();
        seed_order(&h, 100, 7, 10_000);
        h.profiles.insert(external_seller(7));
        h.stripe.set_fail(true);

        h.processor
            .process_event(PaymentMethod::Stripe, order_event("evt_1", 100, 10_000), None)
            .await
            .unwrap();

        // Failure captured on the transfer record, payment still acked
        assert_eq!(h.transfers.count(), 1);
        let transfer = &h.transfers.all()[0];
        assert!(transfer.error_message.is_some());
        assert_eq!(h.orders.mark_paid_count(), 1);
    }

    fn refund_event(event_ref: &str, original_ref: &str, amount: Option<i64>) -> WebhookEvent {
        let mut body = json!({
            "event_ref": event_ref,
            "kind": "refund",
            "original_ref": original_ref,
        });
        if let Some(amount) = amount {
            body["amount"] = json!(amount);
        }
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn test_full_refund_reverses_payment() {
        let h = harness();
        seed_order(&h, 100, 7, 10_000);
        h.profiles.insert(direct_seller(7));

        h.processor
            .process_event(PaymentMethod::Stripe, order_event("evt_1", 100, 10_000), None)
            .await
            .unwrap();
        h.processor
            .process_event(PaymentMethod::Stripe, refund_event("evt_rf", "evt_1", None), None)
            .await
            .unwrap();

        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::owned(AccountType::BuyerClearing, 42, "USD")),
            0
        );
        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::owned(AccountType::SellerPayable, 7, "USD")),
            0
        );
        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::platform(AccountType::PlatformRevenue, "USD")),
            0
        );

        let tx = h
            .transactions
            .find(PaymentMethod::Stripe, "evt_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Refunded);
        // Payment confirmation x2 + refund notification
        assert_eq!(h.notifications.sent_count(), 3);
    }

    #[tokio::test]
    async fn test_partial_refund_prorates_split() {
        let h = harness();
        seed_order(&h, 100, 7, 10_000);
        h.profiles.insert(direct_seller(7));

        h.processor
            .process_event(PaymentMethod::Stripe, order_event("evt_1", 100, 10_000), None)
            .await
            .unwrap();
        h.processor
            .process_event(
                PaymentMethod::Stripe,
                refund_event("evt_rf", "evt_1", Some(5_000)),
                None,
            )
            .await
            .unwrap();

        // Half refunded: seller and platform each give back their share
        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::owned(AccountType::BuyerClearing, 42, "USD")),
            -5_000
        );
        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::owned(AccountType::SellerPayable, 7, "USD")),
            4_500
        );
        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::platform(AccountType::PlatformRevenue, "USD")),
            500
        );

        let tx = h
            .transactions
            .find(PaymentMethod::Stripe, "evt_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::PartiallyRefunded);
    }

    #[tokio::test]
    async fn test_duplicate_refund_delivery_is_single_effect() {
        let h = harness();
        seed_order(&h, 100, 7, 10_000);
        h.profiles.insert(direct_seller(7));

        h.processor
            .process_event(PaymentMethod::Stripe, order_event("evt_1", 100, 10_000), None)
            .await
            .unwrap();
        for _ in 0..3 {
            h.processor
                .process_event(PaymentMethod::Stripe, refund_event("evt_rf", "evt_1", None), None)
                .await
                .unwrap();
        }

        // One payment journal + one reversal, not three
        assert_eq!(h.ledger_store.journal_count(), 2);
        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::owned(AccountType::SellerPayable, 7, "USD")),
            0
        );
    }

    #[tokio::test]
    async fn test_refund_validation() {
        let h = harness();
        seed_order(&h, 100, 7, 10_000);
        h.profiles.insert(direct_seller(7));

        // Unknown original payment
        let err = h
            .processor
            .process_event(PaymentMethod::Stripe, refund_event("evt_rf", "evt_nope", None), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Validation(_)));

        h.processor
            .process_event(PaymentMethod::Stripe, order_event("evt_1", 100, 10_000), None)
            .await
            .unwrap();

        // Refund above the paid amount
        let err = h
            .processor
            .process_event(
                PaymentMethod::Stripe,
                refund_event("evt_rf", "evt_1", Some(10_001)),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Validation(_)));

        // Missing original_ref
        let event: WebhookEvent =
            serde_json::from_value(json!({ "event_ref": "evt_rf", "kind": "refund" })).unwrap();
        let err = h
            .processor
            .process_event(PaymentMethod::Stripe, event, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn test_decimal_amount_is_parsed_to_minor_units() {
        let h = harness();
        let event: WebhookEvent = serde_json::from_value(json!({
            "event_ref": "evt_dep",
            "kind": "deposit",
            "amount_decimal": "25.00",
            "currency": "USD",
            "user_id": 9,
        }))
        .unwrap();

        h.processor
            .process_event(PaymentMethod::Stripe, event, None)
            .await
            .unwrap();

        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::owned(AccountType::UserWallet, 9, "USD")),
            2_500
        );
    }

    #[tokio::test]
    async fn test_amount_mismatch_rejected() {
        let h = harness();
        seed_order(&h, 100, 7, 10_000);

        let err = h
            .processor
            .process_event(PaymentMethod::Stripe, order_event("evt_1", 100, 9_999), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Validation(_)));
    }

    #[tokio::test]
    async fn test_currency_defaults_from_secret_hint() {
        let h = harness();
        let event: WebhookEvent = serde_json::from_value(json!({
            "event_ref": "evt_dep",
            "kind": "deposit",
            "amount": 2_500,
            "user_id": 9,
        }))
        .unwrap();

        h.processor
            .process_event(PaymentMethod::Stripe, event.clone(), Some("EUR".into()))
            .await
            .unwrap();

        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::owned(AccountType::UserWallet, 9, "EUR")),
            2_500
        );

        // No currency anywhere: malformed
        let err = h
            .processor
            .process_event(
                PaymentMethod::Stripe,
                WebhookEvent {
                    event_ref: "evt_dep2".into(),
                    ..event
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn test_subscription_credits_platform_revenue() {
        let h = harness();
        let event: WebhookEvent = serde_json::from_value(json!({
            "event_ref": "evt_sub",
            "kind": "subscription",
            "amount": 1_999,
            "currency": "USD",
            "user_id": 7,
        }))
        .unwrap();

        h.processor
            .process_event(PaymentMethod::Stripe, event, None)
            .await
            .unwrap();

        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::platform(AccountType::PlatformRevenue, "USD")),
            1_999
        );
    }

    #[tokio::test]
    async fn test_user_tip_has_no_commission() {
        let h = harness();
        let event: WebhookEvent = serde_json::from_value(json!({
            "event_ref": "evt_tip",
            "kind": "user_tip",
            "amount": 500,
            "currency": "USD",
            "user_id": 1,
            "seller_id": 2,
        }))
        .unwrap();

        h.processor
            .process_event(PaymentMethod::Stripe, event, None)
            .await
            .unwrap();

        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::owned(AccountType::UserWallet, 2, "USD")),
            500
        );
        assert_eq!(
            h.ledger_store
                .balance_of(&AccountRef::platform(AccountType::PlatformRevenue, "USD")),
            0
        );
    }

    #[tokio::test]
    async fn test_payout_account_update_recomputes_eligibility() {
        let h = harness();
        h.profiles.insert(external_seller(7));

        let event: WebhookEvent = serde_json::from_value(json!({
            "event_ref": "evt_acct",
            "kind": "payout_account_update",
            "seller_id": 7,
            "charges_enabled": false,
            "payouts_enabled": true,
        }))
        .unwrap();

        h.processor
            .process_event(PaymentMethod::Stripe, event, None)
            .await
            .unwrap();

        assert_eq!(h.profiles.update_count(), 1);
        // No transaction row for non-monetary events
        assert_eq!(h.transactions.count(), 0);
    }

    #[tokio::test]
    async fn test_payout_account_update_without_seller_is_malformed() {
        let h = harness();
        let event: WebhookEvent = serde_json::from_value(json!({
            "event_ref": "evt_acct",
            "kind": "payout_account_update",
        }))
        .unwrap();

        let err = h
            .processor
            .process_event(PaymentMethod::Stripe, event, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload(_)));
    }
}
