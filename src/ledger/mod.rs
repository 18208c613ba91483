//! Ledger Core
//!
//! Double-entry bookkeeping: accounts, journal entries, balanced postings.
//! Knows nothing about payment providers.
//!
//! # Invariants
//!
//! 1. **Balanced books**: for every journal, sum(debits) == sum(credits)
//!    per currency.
//! 2. **Atomic posting**: a journal and all of its legs are written in one
//!    storage transaction, or not at all.
//! 3. **Balance composition**: `balance == available_balance + frozen_balance`
//!    for every account after every posting.
//! 4. Balances are mutated only inside a posting transaction; no component
//!    outside this module writes balance fields.

pub mod error;
pub mod models;
pub mod pg;
pub mod service;
pub mod store;

pub use error::LedgerError;
pub use models::{
    Account, AccountRef, AccountType, EntryType, JournalEntry, JournalType, LedgerEntry, LegSpec,
    PostingState,
};
pub use pg::PgLedgerStore;
pub use service::{LedgerService, PostJournalRequest, check_balanced};
pub use store::LedgerStore;
