//! Ledger data models
//!
//! Double-entry primitives: accounts, journal entries (one balanced financial
//! event) and ledger entries (one account-side leg of a journal).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Account types
// ============================================================================

/// Balance bucket classification.
///
/// Platform-wide buckets (`owner_id = NULL`) vs per-owner buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    PlatformEscrow,
    PlatformRevenue,
    PlatformFeePayable,
    SellerPayable,
    AffiliatePayable,
    BuyerClearing,
    InternalWallet,
    UserWallet,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::PlatformEscrow => "platform_escrow",
            AccountType::PlatformRevenue => "platform_revenue",
            AccountType::PlatformFeePayable => "platform_fee_payable",
            AccountType::SellerPayable => "seller_payable",
            AccountType::AffiliatePayable => "affiliate_payable",
            AccountType::BuyerClearing => "buyer_clearing",
            AccountType::InternalWallet => "internal_wallet",
            AccountType::UserWallet => "user_wallet",
        }
    }
}

impl FromStr for AccountType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "platform_escrow" => Ok(AccountType::PlatformEscrow),
            "platform_revenue" => Ok(AccountType::PlatformRevenue),
            "platform_fee_payable" => Ok(AccountType::PlatformFeePayable),
            "seller_payable" => Ok(AccountType::SellerPayable),
            "affiliate_payable" => Ok(AccountType::AffiliatePayable),
            "buyer_clearing" => Ok(AccountType::BuyerClearing),
            "internal_wallet" => Ok(AccountType::InternalWallet),
            "user_wallet" => Ok(AccountType::UserWallet),
            _ => Err(()),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Idempotent account key: accounts are created lazily on first reference
/// and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountRef {
    pub account_type: AccountType,
    /// None for platform-wide accounts
    pub owner_id: Option<i64>,
    pub currency: String,
}

impl AccountRef {
    pub fn platform(account_type: AccountType, currency: &str) -> Self {
        Self {
            account_type,
            owner_id: None,
            currency: currency.to_string(),
        }
    }

    pub fn owned(account_type: AccountType, owner_id: i64, currency: &str) -> Self {
        Self {
            account_type,
            owner_id: Some(owner_id),
            currency: currency.to_string(),
        }
    }
}

/// An owner's balance bucket for one currency.
///
/// Invariant: `balance == available_balance + frozen_balance` at all times.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub account_type: AccountType,
    pub owner_id: Option<i64>,
    pub currency: String,
    pub balance: i64,
    pub available_balance: i64,
    pub frozen_balance: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Check the balance composition invariant.
    pub fn is_consistent(&self) -> bool {
        self.balance == self.available_balance + self.frozen_balance
    }
}

// ============================================================================
// Journal / ledger entries
// ============================================================================

/// Classification of one logical financial event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalType {
    Payment,
    Commission,
    Refund,
    Withdrawal,
    Transfer,
    CommissionReversal,
    PaymentReversal,
}

impl JournalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalType::Payment => "payment",
            JournalType::Commission => "commission",
            JournalType::Refund => "refund",
            JournalType::Withdrawal => "withdrawal",
            JournalType::Transfer => "transfer",
            JournalType::CommissionReversal => "commission_reversal",
            JournalType::PaymentReversal => "payment_reversal",
        }
    }

    /// Journal type used when this journal is reversed.
    pub fn reversal(&self) -> JournalType {
        match self {
            JournalType::Payment => JournalType::PaymentReversal,
            JournalType::Commission => JournalType::CommissionReversal,
            _ => JournalType::PaymentReversal,
        }
    }
}

impl FromStr for JournalType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(JournalType::Payment),
            "commission" => Ok(JournalType::Commission),
            "refund" => Ok(JournalType::Refund),
            "withdrawal" => Ok(JournalType::Withdrawal),
            "transfer" => Ok(JournalType::Transfer),
            "commission_reversal" => Ok(JournalType::CommissionReversal),
            "payment_reversal" => Ok(JournalType::PaymentReversal),
            _ => Err(()),
        }
    }
}

/// Posting lifecycle: pending -> posted | failed; posted -> reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingState {
    Pending,
    Posted,
    Failed,
    Reversed,
}

impl PostingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostingState::Pending => "pending",
            PostingState::Posted => "posted",
            PostingState::Failed => "failed",
            PostingState::Reversed => "reversed",
        }
    }
}

impl FromStr for PostingState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PostingState::Pending),
            "posted" => Ok(PostingState::Posted),
            "failed" => Ok(PostingState::Failed),
            "reversed" => Ok(PostingState::Reversed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PostingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Debit/credit side of a leg.
///
/// Credit increases an account balance, debit decreases it. A balanced
/// journal therefore sums to zero across all legs of one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "debit",
            EntryType::Credit => "credit",
        }
    }

    /// Signed balance delta for an `amount` on this side.
    #[inline]
    pub fn signed(&self, amount: i64) -> i64 {
        match self {
            EntryType::Debit => -amount,
            EntryType::Credit => amount,
        }
    }

    pub fn flipped(&self) -> EntryType {
        match self {
            EntryType::Debit => EntryType::Credit,
            EntryType::Credit => EntryType::Debit,
        }
    }
}

impl FromStr for EntryType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(EntryType::Debit),
            "credit" => Ok(EntryType::Credit),
            _ => Err(()),
        }
    }
}

/// One logical financial event. Immutable once posted except for the
/// reversal transition.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub id: Uuid,
    /// Caller-supplied idempotency key
    pub transaction_id: String,
    pub journal_type: JournalType,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub posting_state: PostingState,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub reversed_at: Option<DateTime<Utc>>,
}

/// One account-side leg of a journal as requested by a caller,
/// before account resolution.
#[derive(Debug, Clone)]
pub struct LegSpec {
    pub account: AccountRef,
    pub entry_type: EntryType,
    pub amount: i64,
}

impl LegSpec {
    pub fn debit(account: AccountRef, amount: i64) -> Self {
        Self {
            account,
            entry_type: EntryType::Debit,
            amount,
        }
    }

    pub fn credit(account: AccountRef, amount: i64) -> Self {
        Self {
            account,
            entry_type: EntryType::Credit,
            amount,
        }
    }
}

/// A leg with its account resolved, ready for atomic posting.
#[derive(Debug, Clone)]
pub struct ResolvedLeg {
    pub account_id: i64,
    pub entry_type: EntryType,
    pub amount: i64,
    pub currency: String,
    /// Monotonic per journal, for replay ordering
    pub entry_sequence: i32,
}

/// One persisted account-side leg, carrying the running balance.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: i64,
    pub journal_id: Uuid,
    pub account_id: i64,
    pub entry_type: EntryType,
    pub amount: i64,
    pub currency: String,
    pub balance_before: i64,
    pub balance_after: i64,
    pub entry_sequence: i32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_roundtrip() {
        let all = [
            AccountType::PlatformEscrow,
            AccountType::PlatformRevenue,
            AccountType::PlatformFeePayable,
            AccountType::SellerPayable,
            AccountType::AffiliatePayable,
            AccountType::BuyerClearing,
            AccountType::InternalWallet,
            AccountType::UserWallet,
        ];
        for t in all {
            assert_eq!(t.as_str().parse::<AccountType>().unwrap(), t);
        }
        assert!("bogus".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_entry_type_signed() {
        assert_eq!(EntryType::Credit.signed(100), 100);
        assert_eq!(EntryType::Debit.signed(100), -100);
    }

    #[test]
    fn test_entry_type_flipped() {
        assert_eq!(EntryType::Debit.flipped(), EntryType::Credit);
        assert_eq!(EntryType::Credit.flipped(), EntryType::Debit);
    }

    #[test]
    fn test_journal_reversal_types() {
        assert_eq!(JournalType::Payment.reversal(), JournalType::PaymentReversal);
        assert_eq!(
            JournalType::Commission.reversal(),
            JournalType::CommissionReversal
        );
    }

    #[test]
    fn test_account_consistency() {
        let acct = Account {
            id: 1,
            account_type: AccountType::SellerPayable,
            owner_id: Some(42),
            currency: "USD".to_string(),
            balance: 100,
            available_balance: 70,
            frozen_balance: 30,
            created_at: Utc::now(),
        };
        assert!(acct.is_consistent());
    }
}
