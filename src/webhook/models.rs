//! Payment transaction records and inbound event payloads

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use uuid::Uuid;

use crate::providers::PaymentMethod;

/// Payment transaction lifecycle.
///
/// `pending -> paid -> {partially_refunded | refunded}`; only `paid` may
/// move into a refund state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Paid,
    PartiallyRefunded,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Paid => "paid",
            TransactionStatus::PartiallyRefunded => "partially_refunded",
            TransactionStatus::Refunded => "refunded",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "paid" => Some(TransactionStatus::Paid),
            "partially_refunded" => Some(TransactionStatus::PartiallyRefunded),
            "refunded" => Some(TransactionStatus::Refunded),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Paid)
                | (TransactionStatus::Paid, TransactionStatus::PartiallyRefunded)
                | (TransactionStatus::Paid, TransactionStatus::Refunded)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Business type of an inbound payment event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Buyer paid for an order
    Order,
    /// Seller subscription payment to the platform
    Subscription,
    /// Tip to a seller (commission applies)
    Tip,
    /// Tip between users (no commission)
    UserTip,
    /// Standalone platform fee collection
    PlatformFee,
    /// User wallet top-up
    Deposit,
    /// Provider reporting a refund of an earlier payment
    Refund,
    /// Provider reporting seller account status flags changed
    PayoutAccountUpdate,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Order => "order",
            EventKind::Subscription => "subscription",
            EventKind::Tip => "tip",
            EventKind::UserTip => "user_tip",
            EventKind::PlatformFee => "platform_fee",
            EventKind::Deposit => "deposit",
            EventKind::Refund => "refund",
            EventKind::PayoutAccountUpdate => "payout_account_update",
        }
    }

    /// Whether events of this kind record a new PaymentTransaction.
    /// Refunds mutate the transaction of the original payment instead.
    pub fn is_monetary(&self) -> bool {
        !matches!(self, EventKind::PayoutAccountUpdate | EventKind::Refund)
    }
}

/// Verified inbound webhook payload.
///
/// Field presence depends on `kind`; handlers validate what they need.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Provider-side event reference, half of the idempotency key
    pub event_ref: String,
    pub kind: EventKind,
    #[serde(default)]
    pub amount: Option<i64>,
    /// Decimal-string amount, for providers that do not send minor units
    #[serde(default)]
    pub amount_decimal: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    /// For refunds: provider_ref of the payment being refunded
    #[serde(default)]
    pub original_ref: Option<String>,
    #[serde(default)]
    pub order_id: Option<i64>,
    /// Payee for order/tip events, subject for account updates
    #[serde(default)]
    pub seller_id: Option<i64>,
    /// Payer
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub charges_enabled: Option<bool>,
    #[serde(default)]
    pub payouts_enabled: Option<bool>,
    #[serde(default)]
    pub account_disabled_reason: Option<String>,
}

/// One recorded inbound payment, keyed by (provider, provider_ref).
#[derive(Debug, Clone)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub provider: PaymentMethod,
    pub provider_ref: String,
    pub kind: EventKind,
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub payer_id: Option<i64>,
    pub payee_id: Option<i64>,
    pub order_id: Option<i64>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Refunded));
        assert!(Paid.can_transition_to(PartiallyRefunded));

        assert!(!Pending.can_transition_to(Refunded));
        assert!(!Refunded.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Pending));
        assert!(!PartiallyRefunded.can_transition_to(Refunded));
    }

    #[test]
    fn test_status_string_roundtrip() {
        for s in [
            TransactionStatus::Pending,
            TransactionStatus::Paid,
            TransactionStatus::PartiallyRefunded,
            TransactionStatus::Refunded,
        ] {
            assert_eq!(TransactionStatus::from_str_opt(s.as_str()).unwrap(), s);
        }
        assert!(TransactionStatus::from_str_opt("declined").is_none());
    }

    #[test]
    fn test_event_kind_parsing() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"event_ref":"evt_1","kind":"user_tip","amount":500,"user_id":1,"seller_id":2}"#,
        )
        .unwrap();
        assert_eq!(event.kind, EventKind::UserTip);
        assert!(event.kind.is_monetary());
        assert_eq!(event.currency, None);

        let update: WebhookEvent = serde_json::from_str(
            r#"{"event_ref":"evt_2","kind":"payout_account_update","seller_id":2,"charges_enabled":false}"#,
        )
        .unwrap();
        assert!(!update.kind.is_monetary());

        let refund: WebhookEvent = serde_json::from_str(
            r#"{"event_ref":"evt_3","kind":"refund","original_ref":"evt_1","amount":250}"#,
        )
        .unwrap();
        assert_eq!(refund.kind, EventKind::Refund);
        assert_eq!(refund.original_ref.as_deref(), Some("evt_1"));
        assert!(!refund.kind.is_monetary());
    }
}
