//! Match lifecycle of statement lines
//!
//! Matching a line to an internal bank transaction also marks that transaction
//! reconciled against the line; every path that moves a line off such a match
//! reverses it. Receipts, payments and journal entries are never mutated.
//!
//! The line is always written before a replaced transaction is released. If
//! either write fails, the stored line and both transaction flags are put back
//! the way they were.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::time::Instant;

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{validate_notes, validate_user};

/// Point in time by which external calls must finish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub at: Instant,
    /// Budget the deadline was derived from, reported in [`ReconError::Timeout`]
    pub budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    pub fn has_passed(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Run `fut`, failing with [`ReconError::Timeout`] once the deadline passes
    pub async fn bound<T, F>(self, fut: F) -> ReconResult<T>
    where
        F: Future<Output = ReconResult<T>>,
    {
        tokio::time::timeout_at(self.at, fut)
            .await
            .map_err(|_| ReconError::Timeout(self.budget))?
    }
}

async fn bounded<T, F>(deadline: Option<Deadline>, fut: F) -> ReconResult<T>
where
    F: Future<Output = ReconResult<T>>,
{
    match deadline {
        Some(deadline) => deadline.bound(fut).await,
        None => fut.await,
    }
}

/// Applies and reverses matches on statement lines
pub struct MatchStateManager<S: ReconciliationStorage> {
    storage: S,
}

impl<S: ReconciliationStorage> MatchStateManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Point `line` at `target`.
    ///
    /// The target must exist. If the line was matched to a different internal
    /// transaction, that transaction is released.
    pub async fn apply(
        &self,
        line: BankStatementLine,
        target: MatchTarget,
        matched_by: &str,
        mode: MatchMode,
        notes: Option<String>,
    ) -> ReconResult<BankStatementLine> {
        self.apply_before(line, target, matched_by, mode, notes, None)
            .await
    }

    /// [`apply`](Self::apply) with the target lookup and the reconciled flag
    /// bounded by `deadline`. The line write is not bounded.
    pub async fn apply_before(
        &self,
        mut line: BankStatementLine,
        target: MatchTarget,
        matched_by: &str,
        mode: MatchMode,
        notes: Option<String>,
        deadline: Option<Deadline>,
    ) -> ReconResult<BankStatementLine> {
        validate_user(matched_by)?;
        validate_notes(notes.as_deref())?;
        bounded(deadline, self.ensure_target_exists(&target)).await?;

        let original = line.clone();
        let now = now();
        let acquired = match &target {
            MatchTarget::Transaction(id) if line.matched_target() != Some(&target) => {
                Some(id.clone())
            }
            _ => None,
        };

        if let MatchTarget::Transaction(id) = &target {
            let reconciled = self.storage.set_reconciled(id, &line.id, matched_by, now);
            if let Err(err) = bounded(deadline, reconciled).await {
                // The write may have landed after we stopped waiting
                if let (ReconError::Timeout(_), Some(id)) = (&err, &acquired) {
                    let grace = deadline.map(|d| Deadline::after(d.budget));
                    self.rollback_reconciled(id, &line.id, grace).await;
                }
                return Err(err);
            }
        }

        let released = replaced_transaction(line.matched_target(), Some(&target));
        line.apply_match(target.clone(), mode, matched_by, now, notes);
        self.commit(&original, &line, acquired.as_deref(), released.as_deref())
            .await?;

        tracing::debug!(
            line_id = %line.id,
            match_type = %target.match_type(),
            target_id = %target.id(),
            status = ?line.match_status(),
            "Line matched"
        );

        Ok(line)
    }

    /// Return `line` to `Unmatched`. A line that is already unmatched is
    /// returned untouched.
    pub async fn clear(
        &self,
        mut line: BankStatementLine,
        unmatched_by: &str,
    ) -> ReconResult<BankStatementLine> {
        validate_user(unmatched_by)?;
        if line.match_status() == MatchStatus::Unmatched {
            return Ok(line);
        }

        let original = line.clone();
        let released = replaced_transaction(line.matched_target(), None);
        let previous = line.clear_match();
        self.commit(&original, &line, None, released.as_deref())
            .await?;

        tracing::debug!(
            line_id = %line.id,
            released = ?previous,
            unmatched_by,
            "Line unmatched"
        );

        Ok(line)
    }

    /// Record that a journal entry was raised to explain `line`
    pub async fn mark_created(
        &self,
        mut line: BankStatementLine,
        journal_id: &str,
        created_by: &str,
    ) -> ReconResult<BankStatementLine> {
        validate_user(created_by)?;
        let target = MatchTarget::Journal(journal_id.to_string());
        self.ensure_target_exists(&target).await?;

        let original = line.clone();
        let released = replaced_transaction(line.matched_target(), Some(&target));
        line.mark_created(journal_id.to_string(), created_by, now());
        self.commit(&original, &line, None, released.as_deref())
            .await?;
        Ok(line)
    }

    /// Take `line` out of reconciliation
    pub async fn exclude(
        &self,
        mut line: BankStatementLine,
        excluded_by: &str,
        reason: Option<String>,
    ) -> ReconResult<BankStatementLine> {
        validate_user(excluded_by)?;
        validate_notes(reason.as_deref())?;

        let original = line.clone();
        let released = replaced_transaction(line.matched_target(), None);
        line.exclude(excluded_by, now(), reason);
        self.commit(&original, &line, None, released.as_deref())
            .await?;
        Ok(line)
    }

    async fn ensure_target_exists(&self, target: &MatchTarget) -> ReconResult<()> {
        let exists = match target {
            MatchTarget::Receipt(id) => self.storage.get_receipt(id).await?.is_some(),
            MatchTarget::Payment(id) => self.storage.get_payment(id).await?.is_some(),
            MatchTarget::Transaction(id) => self.storage.get_transaction(id).await?.is_some(),
            MatchTarget::Journal(id) => self.storage.journal_entry_exists(id).await?,
        };

        if exists {
            Ok(())
        } else {
            Err(ReconError::TargetNotFound {
                match_type: target.match_type(),
                target_id: target.id().to_string(),
            })
        }
    }

    /// Write `updated`, then release the transaction it no longer points at.
    ///
    /// `acquired` is a transaction newly reconciled against the line; it is
    /// released again if the line cannot be committed.
    async fn commit(
        &self,
        original: &BankStatementLine,
        updated: &BankStatementLine,
        acquired: Option<&str>,
        released: Option<&str>,
    ) -> ReconResult<()> {
        if let Err(err) = self.storage.update_line(updated).await {
            if let Some(id) = acquired {
                self.rollback_reconciled(id, &updated.id, None).await;
            }
            return Err(err);
        }

        let Some(released) = released else {
            return Ok(());
        };
        if let Err(err) = self.storage.clear_reconciled(released).await {
            if let Err(restore) = self.storage.update_line(original).await {
                tracing::warn!(
                    line_id = %original.id,
                    error = %restore,
                    "Failed to restore line after release failure"
                );
            }
            if let Some(id) = acquired {
                self.rollback_reconciled(id, &updated.id, None).await;
            }
            return Err(err);
        }
        Ok(())
    }

    /// Clear the reconciled flag of `transaction_id` if it is held by `line_id`
    async fn rollback_reconciled(
        &self,
        transaction_id: &str,
        line_id: &str,
        deadline: Option<Deadline>,
    ) {
        let rollback = async {
            match self.storage.get_transaction(transaction_id).await? {
                Some(txn) if txn.reconciled_statement_line_id.as_deref() == Some(line_id) => {
                    self.storage.clear_reconciled(transaction_id).await
                }
                _ => Ok(()),
            }
        };

        if let Err(err) = bounded(deadline, rollback).await {
            tracing::warn!(
                transaction_id,
                line_id,
                error = %err,
                "Failed to roll back reconciled flag"
            );
        }
    }
}

/// The transaction `previous` pointed at, unless the line keeps pointing at it
fn replaced_transaction(
    previous: Option<&MatchTarget>,
    next: Option<&MatchTarget>,
) -> Option<String> {
    match previous {
        Some(MatchTarget::Transaction(id)) if previous != next => Some(id.clone()),
        _ => None,
    }
}

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    async fn setup() -> (MemoryStorage, BankStatementLine) {
        let storage = MemoryStorage::new();
        let line = BankStatementLine::new(
            "l1".to_string(),
            "s1".to_string(),
            1,
            NewStatementLine::debit(date(), BigDecimal::from(750)),
        );
        storage.save_line(&line).await.unwrap();
        for id in ["t1", "t2"] {
            storage.add_transaction(BankTransaction::new(
                id.to_string(),
                "hdfc".to_string(),
                date(),
                TransactionType::Debit,
                BigDecimal::from(750),
                "CHQ-001".to_string(),
            ));
        }
        storage.add_journal_entry("j1");
        (storage, line)
    }

    #[tokio::test]
    async fn test_transaction_match_sets_and_clears_flag() {
        let (storage, line) = setup().await;
        let manager = MatchStateManager::new(storage.clone());

        let line = manager
            .apply(
                line,
                MatchTarget::Transaction("t1".to_string()),
                "alice",
                MatchMode::Manual,
                Some("cheque 001".to_string()),
            )
            .await
            .unwrap();
        let txn = storage.get_transaction("t1").await.unwrap().unwrap();
        assert!(txn.is_reconciled);
        assert_eq!(txn.reconciled_statement_line_id.as_deref(), Some("l1"));
        assert_eq!(txn.reconciled_by.as_deref(), Some("alice"));
        assert_eq!(line.user_notes.as_deref(), Some("cheque 001"));

        let line = manager.clear(line, "alice").await.unwrap();
        let txn = storage.get_transaction("t1").await.unwrap().unwrap();
        assert!(!txn.is_reconciled);
        assert!(txn.reconciled_statement_line_id.is_none());
        assert!(txn.reconciled_at.is_none());
        assert_eq!(line.match_status(), MatchStatus::Unmatched);
    }

    #[tokio::test]
    async fn test_rematch_releases_previous_transaction() {
        let (storage, line) = setup().await;
        let manager = MatchStateManager::new(storage.clone());

        let line = manager
            .apply(
                line,
                MatchTarget::Transaction("t1".to_string()),
                "alice",
                MatchMode::Manual,
                None,
            )
            .await
            .unwrap();
        manager
            .apply(
                line,
                MatchTarget::Transaction("t2".to_string()),
                "alice",
                MatchMode::Manual,
                None,
            )
            .await
            .unwrap();

        assert!(!storage.get_transaction("t1").await.unwrap().unwrap().is_reconciled);
        assert!(storage.get_transaction("t2").await.unwrap().unwrap().is_reconciled);
    }

    #[tokio::test]
    async fn test_missing_target_is_rejected_before_mutation() {
        let (storage, line) = setup().await;
        let manager = MatchStateManager::new(storage.clone());

        let err = manager
            .apply(
                line,
                MatchTarget::Payment("nope".to_string()),
                "alice",
                MatchMode::Manual,
                None,
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let stored = storage.get_line("l1").await.unwrap().unwrap();
        assert_eq!(stored.match_status(), MatchStatus::Unmatched);
    }

    #[tokio::test]
    async fn test_exclude_and_created_release_transaction() {
        let (storage, line) = setup().await;
        let manager = MatchStateManager::new(storage.clone());

        let line = manager
            .apply(
                line,
                MatchTarget::Transaction("t1".to_string()),
                "alice",
                MatchMode::Auto,
                None,
            )
            .await
            .unwrap();
        let line = manager.mark_created(line, "j1", "bob").await.unwrap();
        assert_eq!(line.match_status(), MatchStatus::Created);
        assert!(!storage.get_transaction("t1").await.unwrap().unwrap().is_reconciled);

        let line = manager
            .exclude(line, "bob", Some("duplicate bank entry".to_string()))
            .await
            .unwrap();
        assert_eq!(line.match_status(), MatchStatus::Excluded);
        assert!(line.matched_target().is_none());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (storage, line) = setup().await;
        let manager = MatchStateManager::new(storage);

        let once = manager.clear(line.clone(), "alice").await.unwrap();
        assert_eq!(once, line);
        let twice = manager.clear(once.clone(), "alice").await.unwrap();
        assert_eq!(twice, once);
    }
}
