//! Journal posting service
//!
//! Validates and posts balanced journals. The service holds the business
//! rules (balance check, idempotency, reversal); atomicity lives in the
//! store.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::LedgerError;
use super::models::{
    EntryType, JournalEntry, JournalType, LedgerEntry, LegSpec, PostingState, ResolvedLeg,
};
use super::store::LedgerStore;

/// A posting request: one balanced financial event.
#[derive(Debug, Clone)]
pub struct PostJournalRequest {
    /// Caller-supplied idempotency key
    pub transaction_id: String,
    pub journal_type: JournalType,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub legs: Vec<LegSpec>,
}

/// Verify every leg is positive and debits equal credits per currency.
///
/// Pure; exercised directly by tests and by `post_journal_entry`.
pub fn check_balanced(legs: &[LegSpec]) -> Result<(), LedgerError> {
    if legs.is_empty() {
        return Err(LedgerError::EmptyEntries);
    }

    let mut sums: HashMap<&str, (i64, i64)> = HashMap::new();
    for leg in legs {
        if leg.amount <= 0 {
            return Err(LedgerError::NonPositiveAmount);
        }
        let entry = sums.entry(leg.account.currency.as_str()).or_insert((0, 0));
        match leg.entry_type {
            EntryType::Debit => entry.0 += leg.amount,
            EntryType::Credit => entry.1 += leg.amount,
        }
    }

    for (currency, (debits, credits)) in sums {
        if debits != credits {
            return Err(LedgerError::UnbalancedEntry {
                currency: currency.to_string(),
                debits,
                credits,
            });
        }
    }
    Ok(())
}

/// Scale every leg of `legs` by `portion / total` and flip debit/credit.
///
/// Floor rounding per leg; the per-side, per-currency remainder goes to the
/// largest leg of that side, so each side sums to the same prorated target
/// and the result stays balanced. Legs that scale to zero are dropped.
fn prorate_flipped(legs: &[LedgerEntry], portion: i64, total: i64) -> Vec<ResolvedLeg> {
    let mut out = Vec::new();
    for entry_type in [EntryType::Debit, EntryType::Credit] {
        let mut by_currency: HashMap<&str, Vec<&LedgerEntry>> = HashMap::new();
        for e in legs.iter().filter(|e| e.entry_type == entry_type) {
            by_currency.entry(e.currency.as_str()).or_default().push(e);
        }

        for group in by_currency.values() {
            let side_total: i64 = group.iter().map(|e| e.amount).sum();
            let target = side_total * portion / total;
            if target == 0 {
                continue;
            }

            let mut scaled: Vec<i64> = group.iter().map(|e| e.amount * portion / total).collect();
            let deficit = target - scaled.iter().sum::<i64>();
            if deficit > 0
                && let Some(largest) = group
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, e)| e.amount)
                    .map(|(i, _)| i)
            {
                scaled[largest] += deficit;
            }

            for (e, amount) in group.iter().zip(scaled) {
                if amount > 0 {
                    out.push(ResolvedLeg {
                        account_id: e.account_id,
                        entry_type: e.entry_type.flipped(),
                        amount,
                        currency: e.currency.clone(),
                        entry_sequence: 0,
                    });
                }
            }
        }
    }
    for (i, leg) in out.iter_mut().enumerate() {
        leg.entry_sequence = i as i32 + 1;
    }
    out
}

pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Post one balanced journal atomically. Returns the journal id.
    ///
    /// A transaction_id that already has a posted journal is an idempotent
    /// no-op returning the existing id.
    pub async fn post_journal_entry(
        &self,
        req: PostJournalRequest,
    ) -> Result<Uuid, LedgerError> {
        check_balanced(&req.legs)?;

        if let Some(existing) = self
            .store
            .find_journal_by_transaction_id(&req.transaction_id)
            .await?
        {
            debug!(
                transaction_id = %req.transaction_id,
                journal_id = %existing.id,
                "Duplicate transaction_id, returning existing journal"
            );
            return Ok(existing.id);
        }

        // Resolve accounts lazily; sequence legs for replay ordering.
        let mut resolved = Vec::with_capacity(req.legs.len());
        for (i, leg) in req.legs.iter().enumerate() {
            let account = self.store.get_or_create_account(&leg.account).await?;
            resolved.push(ResolvedLeg {
                account_id: account.id,
                entry_type: leg.entry_type,
                amount: leg.amount,
                currency: leg.account.currency.clone(),
                entry_sequence: i as i32 + 1,
            });
        }

        let now = Utc::now();
        let journal = JournalEntry {
            id: Uuid::new_v4(),
            transaction_id: req.transaction_id.clone(),
            journal_type: req.journal_type,
            reference_id: req.reference_id,
            reference_type: req.reference_type,
            posting_state: PostingState::Posted,
            created_at: now,
            posted_at: Some(now),
            failed_at: None,
            reversed_at: None,
        };

        // Two concurrent posters can both miss the lookup above; the
        // unique constraint rejects the loser, whose answer is then the
        // winner's journal.
        if let Err(e) = self.store.post_journal(&journal, &resolved, None).await {
            if matches!(e, LedgerError::DuplicateTransaction(_))
                && let Some(existing) = self
                    .store
                    .find_journal_by_transaction_id(&req.transaction_id)
                    .await?
            {
                debug!(
                    transaction_id = %req.transaction_id,
                    journal_id = %existing.id,
                    "Lost posting race, returning the winner's journal"
                );
                return Ok(existing.id);
            }
            return Err(e);
        }

        info!(
            journal_id = %journal.id,
            journal_type = journal.journal_type.as_str(),
            legs = resolved.len(),
            "Journal posted"
        );
        Ok(journal.id)
    }

    /// Post a mirror journal with debit/credit flipped and mark the original
    /// `reversed`. Used for refund flows.
    pub async fn reverse_journal_entry(
        &self,
        journal_id: Uuid,
        reason: &str,
    ) -> Result<Uuid, LedgerError> {
        let original = self
            .store
            .get_journal(journal_id)
            .await?
            .ok_or(LedgerError::JournalNotFound(journal_id))?;

        if original.posting_state != PostingState::Posted {
            return Err(LedgerError::NotReversible {
                id: journal_id,
                state: original.posting_state.as_str().to_string(),
            });
        }

        let legs = self.store.legs_of(journal_id).await?;
        let mirrored: Vec<ResolvedLeg> = legs
            .iter()
            .map(|e| ResolvedLeg {
                account_id: e.account_id,
                entry_type: e.entry_type.flipped(),
                amount: e.amount,
                currency: e.currency.clone(),
                entry_sequence: e.entry_sequence,
            })
            .collect();

        let now = Utc::now();
        let mirror = JournalEntry {
            id: Uuid::new_v4(),
            transaction_id: format!("reversal:{journal_id}"),
            journal_type: original.journal_type.reversal(),
            reference_id: Some(journal_id.to_string()),
            reference_type: Some("journal_reversal".to_string()),
            posting_state: PostingState::Posted,
            created_at: now,
            posted_at: Some(now),
            failed_at: None,
            reversed_at: None,
        };

        self.store
            .post_journal(&mirror, &mirrored, Some(journal_id))
            .await?;

        info!(
            original = %journal_id,
            mirror = %mirror.id,
            reason,
            "Journal reversed"
        );
        Ok(mirror.id)
    }

    /// Reverse the journal posted under `transaction_id`. Convenience for
    /// callers that only hold the idempotency key, not the journal id.
    pub async fn reverse_by_transaction_id(
        &self,
        transaction_id: &str,
        reason: &str,
    ) -> Result<Uuid, LedgerError> {
        let journal = self
            .store
            .find_journal_by_transaction_id(transaction_id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.to_string()))?;
        self.reverse_journal_entry(journal.id, reason).await
    }

    /// Post a prorated mirror of the journal behind `original_transaction_id`
    /// for a partial refund.
    ///
    /// Every leg is scaled by `portion / total` (total = the journal's debit
    /// sum per currency) with floor rounding; each side's remainder lands on
    /// its largest leg so the mirror stays balanced. Legs that scale to zero
    /// are dropped. The original journal stays `posted` and can still be
    /// reversed in full later. Idempotent on `refund_transaction_id`.
    pub async fn refund_journal_portion(
        &self,
        original_transaction_id: &str,
        refund_transaction_id: String,
        portion: i64,
        reason: &str,
    ) -> Result<Uuid, LedgerError> {
        if let Some(existing) = self
            .store
            .find_journal_by_transaction_id(&refund_transaction_id)
            .await?
        {
            debug!(
                transaction_id = %refund_transaction_id,
                journal_id = %existing.id,
                "Duplicate refund transaction_id, returning existing journal"
            );
            return Ok(existing.id);
        }

        let original = self
            .store
            .find_journal_by_transaction_id(original_transaction_id)
            .await?
            .ok_or_else(|| {
                LedgerError::TransactionNotFound(original_transaction_id.to_string())
            })?;
        if original.posting_state != PostingState::Posted {
            return Err(LedgerError::NotReversible {
                id: original.id,
                state: original.posting_state.as_str().to_string(),
            });
        }

        let legs = self.store.legs_of(original.id).await?;
        let total: i64 = legs
            .iter()
            .filter(|e| e.entry_type == EntryType::Debit)
            .map(|e| e.amount)
            .sum();
        if portion <= 0 || portion >= total {
            return Err(LedgerError::InvalidRefundPortion { portion, total });
        }

        let mirrored = prorate_flipped(&legs, portion, total);
        let now = Utc::now();
        let mirror = JournalEntry {
            id: Uuid::new_v4(),
            transaction_id: refund_transaction_id,
            journal_type: JournalType::Refund,
            reference_id: Some(original.id.to_string()),
            reference_type: Some("journal_refund".to_string()),
            posting_state: PostingState::Posted,
            created_at: now,
            posted_at: Some(now),
            failed_at: None,
            reversed_at: None,
        };

        self.store.post_journal(&mirror, &mirrored, None).await?;

        info!(
            original = %original.id,
            mirror = %mirror.id,
            portion,
            total,
            reason,
            "Partial refund posted"
        );
        Ok(mirror.id)
    }

    /// Ordered audit slice of one account's ledger entries.
    pub async fn get_ledger_trail(
        &self,
        account_id: i64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.store.ledger_trail(account_id, from, to, limit).await
    }
}
