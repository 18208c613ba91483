//! Independent QA pass over the pure settlement logic: balance checking,
//! debt arithmetic, signature verification, money handling. Everything here
//! goes through the public API only.

use settlement_engine::ledger::{AccountRef, AccountType, LegSpec, check_balanced};
use settlement_engine::money::{format_minor_units, parse_minor_units};
use settlement_engine::providers::{CandidateSecret, PaymentMethod, PlatformAccountRegistry};
use settlement_engine::transfer::offset_debt;
use settlement_engine::webhook::signature::{SignatureScheme, sign, verify_signature};
use settlement_engine::webhook::TransactionStatus;

fn buyer(currency: &str) -> AccountRef {
    AccountRef::owned(AccountType::BuyerClearing, 42, currency)
}

fn seller(currency: &str) -> AccountRef {
    AccountRef::owned(AccountType::SellerPayable, 7, currency)
}

#[test]
fn qa_balanced_journal_accepted() {
    let legs = vec![
        LegSpec::debit(buyer("USD"), 10_000),
        LegSpec::credit(seller("USD"), 9_000),
        LegSpec::credit(
            AccountRef::platform(AccountType::PlatformRevenue, "USD"),
            1_000,
        ),
    ];
    assert!(check_balanced(&legs).is_ok());
}

#[test]
fn qa_unbalanced_journal_rejected() {
    let legs = vec![
        LegSpec::debit(buyer("USD"), 10_000),
        LegSpec::credit(seller("USD"), 9_999),
    ];
    assert!(check_balanced(&legs).is_err());
}

#[test]
fn qa_balance_is_per_currency() {
    // Each currency must balance independently; equal totals across
    // currencies are not enough.
    let crossed = vec![
        LegSpec::debit(buyer("USD"), 5_000),
        LegSpec::credit(seller("EUR"), 5_000),
    ];
    assert!(check_balanced(&crossed).is_err());

    let parallel = vec![
        LegSpec::debit(buyer("USD"), 5_000),
        LegSpec::credit(seller("USD"), 5_000),
        LegSpec::debit(buyer("EUR"), 700),
        LegSpec::credit(seller("EUR"), 700),
    ];
    assert!(check_balanced(&parallel).is_ok());
}

#[test]
fn qa_empty_and_nonpositive_legs_rejected() {
    assert!(check_balanced(&[]).is_err());
    let legs = vec![
        LegSpec::debit(buyer("USD"), 0),
        LegSpec::credit(seller("USD"), 0),
    ];
    assert!(check_balanced(&legs).is_err());
}

#[test]
fn qa_debt_offsetting_scenarios() {
    // 100.00 payout against 30.00 debt: 70.00 goes out, debt cleared
    let partial = offset_debt(10_000, 3_000);
    assert_eq!(partial.payout, 7_000);
    assert_eq!(partial.deducted, 3_000);
    assert_eq!(partial.remaining_debt, 0);

    // 50.00 payout against 80.00 debt: nothing goes out, 30.00 remains
    let swallowed = offset_debt(5_000, 8_000);
    assert_eq!(swallowed.payout, 0);
    assert_eq!(swallowed.deducted, 5_000);
    assert_eq!(swallowed.remaining_debt, 3_000);
}

#[test]
fn qa_multi_secret_verification_short_circuits() {
    let candidates = vec![
        CandidateSecret {
            currency: Some("USD".into()),
            secret: "whsec_usd".into(),
        },
        CandidateSecret {
            currency: Some("EUR".into()),
            secret: "whsec_eur".into(),
        },
    ];
    let body = br#"{"event_ref":"evt_9","kind":"order"}"#;

    let header = sign(SignatureScheme::Timestamped, body, "whsec_eur", "1700000000");
    let hint = verify_signature(
        SignatureScheme::Timestamped,
        Some(&header),
        body,
        &candidates,
    )
    .unwrap();
    assert_eq!(hint.as_deref(), Some("EUR"));

    let bad = sign(SignatureScheme::Timestamped, body, "whsec_other", "1700000000");
    assert!(
        verify_signature(SignatureScheme::Timestamped, Some(&bad), body, &candidates).is_err()
    );
}

#[test]
fn qa_money_roundtrip_per_currency_exponent() {
    assert_eq!(parse_minor_units("100.00", "USD").unwrap(), 10_000);
    assert_eq!(parse_minor_units("100", "JPY").unwrap(), 100);
    assert_eq!(format_minor_units(10_000, "USD"), "100.00");
    assert_eq!(format_minor_units(100, "JPY"), "100");
    // Sub-minor precision is a hard error, not silent rounding
    assert!(parse_minor_units("1.001", "USD").is_err());
}

#[test]
fn qa_platform_account_fallback_chain() {
    let registry = PlatformAccountRegistry::new(
        vec![settlement_engine::config::PlatformAccountConfig {
            provider: PaymentMethod::Stripe,
            currency: "USD".into(),
            account_id: "acct_usd".into(),
            webhook_secret: "whsec".into(),
        }],
        None,
    );

    // SEK has no account; falls through the base currency list
    let hit = registry
        .resolve(PaymentMethod::Stripe, "SEK", &["EUR".into(), "USD".into()])
        .unwrap();
    assert_eq!(hit.account_id, "acct_usd");

    assert!(registry.resolve(PaymentMethod::Paypal, "USD", &[]).is_none());
}

#[test]
fn qa_transaction_state_machine() {
    use TransactionStatus::*;
    assert!(Pending.can_transition_to(Paid));
    assert!(Paid.can_transition_to(Refunded));
    assert!(!Pending.can_transition_to(Refunded));
    assert!(!Refunded.can_transition_to(Paid));
}
