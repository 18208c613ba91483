//! Ledger storage trait
//!
//! The store is the atomicity boundary: `post_journal` writes the journal,
//! all of its legs and the balance updates in one transaction, or nothing.
//! Balance fields are mutated nowhere else in the system.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::LedgerError;
use super::models::{Account, AccountRef, JournalEntry, LedgerEntry, ResolvedLeg};

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Idempotent get-or-create keyed by (account_type, owner_id, currency).
    async fn get_or_create_account(&self, r: &AccountRef) -> Result<Account, LedgerError>;

    async fn get_account(&self, account_id: i64) -> Result<Option<Account>, LedgerError>;

    /// Idempotency lookup by the caller-supplied transaction id.
    async fn find_journal_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<JournalEntry>, LedgerError>;

    async fn get_journal(&self, journal_id: Uuid) -> Result<Option<JournalEntry>, LedgerError>;

    async fn legs_of(&self, journal_id: Uuid) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Atomically write `journal` + `legs` and apply every leg's signed
    /// amount to its account balance. `reversal_of` marks that original
    /// journal `reversed` within the same transaction.
    async fn post_journal(
        &self,
        journal: &JournalEntry,
        legs: &[ResolvedLeg],
        reversal_of: Option<Uuid>,
    ) -> Result<(), LedgerError>;

    /// Ordered (entry_sequence within journal, oldest journal first) slice of
    /// an account's ledger entries. Read-only.
    async fn ledger_trail(
        &self,
        account_id: i64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, LedgerError>;
}


#[cfg(test)]
pub use mock::MemoryLedgerStore;
