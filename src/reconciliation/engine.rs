//! Main reconciliation orchestrator that coordinates the matching components

use std::time::Duration;

use crate::config::MatchingPolicy;
use crate::reconciliation::aggregate::StatementAggregator;
use crate::reconciliation::auto_match::{AutoMatchReport, AutoMatcher};
use crate::reconciliation::candidates::CandidateFinder;
use crate::reconciliation::locks::StatementLocks;
use crate::reconciliation::scoring::ConfidenceScorer;
use crate::reconciliation::state::MatchStateManager;
use crate::reconciliation::summary::SummaryCalculator;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_line_amounts;

/// Bank reconciliation engine.
///
/// All operations take `&self`; share one engine behind an `Arc` so every
/// caller goes through the same [`StatementLocks`].
pub struct ReconciliationEngine<S: ReconciliationStorage> {
    storage: S,
    policy: MatchingPolicy,
    finder: CandidateFinder<S>,
    scorer: ConfidenceScorer,
    state: MatchStateManager<S>,
    aggregator: StatementAggregator<S>,
    summaries: SummaryCalculator<S>,
    locks: StatementLocks,
    validator: Box<dyn LineValidator>,
}

impl<S: ReconciliationStorage + Clone> ReconciliationEngine<S> {
    /// Create an engine with the default matching policy
    pub fn new(storage: S) -> Self {
        Self::build(storage, MatchingPolicy::default(), Box::new(DefaultLineValidator))
    }

    /// Create an engine with a custom matching policy
    pub fn with_policy(storage: S, policy: MatchingPolicy) -> ReconResult<Self> {
        policy.validate()?;
        Ok(Self::build(storage, policy, Box::new(DefaultLineValidator)))
    }

    /// Replace the line validator used during ingestion
    pub fn with_validator(mut self, validator: Box<dyn LineValidator>) -> Self {
        self.validator = validator;
        self
    }

    fn build(storage: S, policy: MatchingPolicy, validator: Box<dyn LineValidator>) -> Self {
        Self {
            finder: CandidateFinder::new(storage.clone(), policy.date_window_days),
            scorer: ConfidenceScorer::new(&policy),
            state: MatchStateManager::new(storage.clone()),
            aggregator: StatementAggregator::new(storage.clone()),
            summaries: SummaryCalculator::new(storage.clone()),
            storage,
            policy,
            locks: StatementLocks::new(),
            validator,
        }
    }

    pub fn policy(&self) -> &MatchingPolicy {
        &self.policy
    }

    // Statement and line lifecycle
    /// Register a statement for a bank account
    pub async fn create_statement(&self, new: NewStatement) -> ReconResult<BankStatement> {
        if new.period_from > new.period_to {
            return Err(ReconError::Validation(format!(
                "Statement period starts after it ends: {} > {}",
                new.period_from, new.period_to
            )));
        }
        if self
            .storage
            .get_bank_account(&new.bank_account_id)
            .await?
            .is_none()
        {
            return Err(ReconError::AccountNotFound(new.bank_account_id));
        }

        let statement = BankStatement::new(uuid::Uuid::new_v4().to_string(), new);
        self.storage.save_statement(&statement).await?;

        tracing::info!(
            statement_id = %statement.id,
            bank_account_id = %statement.bank_account_id,
            "Statement registered"
        );
        Ok(statement)
    }

    /// Append lines to a statement as `Unmatched`, numbered after any existing
    /// lines. Nothing is stored if any line fails validation.
    pub async fn create_statement_lines(
        &self,
        statement_id: &str,
        lines: Vec<NewStatementLine>,
    ) -> ReconResult<Vec<BankStatementLine>> {
        let _guard = self.locks.acquire(statement_id).await;
        let statement = self.require_statement(statement_id).await?;

        for line in &lines {
            self.validator.validate_line(&statement, line)?;
        }

        let existing = self.storage.list_lines(statement_id).await?;
        let next_number = existing.iter().map(|l| l.line_number).max().unwrap_or(0) + 1;

        let created: Vec<BankStatementLine> = (0u32..)
            .zip(lines)
            .map(|(offset, input)| {
                BankStatementLine::new(
                    uuid::Uuid::new_v4().to_string(),
                    statement_id.to_string(),
                    next_number + offset,
                    input,
                )
            })
            .collect();
        for line in &created {
            validate_line_amounts(line)?;
        }
        for line in &created {
            self.storage.save_line(line).await?;
        }

        self.aggregator.recount(statement_id).await?;
        tracing::info!(statement_id, lines = created.len(), "Statement lines ingested");
        Ok(created)
    }

    /// Get a statement by ID
    pub async fn get_statement(&self, statement_id: &str) -> ReconResult<Option<BankStatement>> {
        self.storage.get_statement(statement_id).await
    }

    /// Get a line by ID
    pub async fn get_line(&self, line_id: &str) -> ReconResult<Option<BankStatementLine>> {
        self.storage.get_line(line_id).await
    }

    /// All lines of a statement, ordered by line number
    pub async fn list_lines(&self, statement_id: &str) -> ReconResult<Vec<BankStatementLine>> {
        self.require_statement(statement_id).await?;
        self.storage.list_lines(statement_id).await
    }

    // Matching
    /// Candidates for a line, highest confidence first
    pub async fn find_candidates(&self, line_id: &str) -> ReconResult<Vec<MatchCandidate>> {
        let line = self.require_line(line_id).await?;
        let statement = self.require_statement(&line.statement_id).await?;
        let records = self
            .finder
            .find(&statement.bank_account_id, &line)
            .await?;
        Ok(self.scorer.rank(&line, records))
    }

    /// Match every unmatched line of a statement that has a candidate at or
    /// above the auto-match threshold, within the policy's batch timeout
    pub async fn auto_match(&self, statement_id: &str) -> ReconResult<AutoMatchReport> {
        self.auto_match_with_timeout(statement_id, self.policy.auto_match_timeout)
            .await
    }

    /// [`auto_match`](Self::auto_match) with a caller-supplied timeout
    pub async fn auto_match_with_timeout(
        &self,
        statement_id: &str,
        timeout: Duration,
    ) -> ReconResult<AutoMatchReport> {
        let _guard = self.locks.acquire(statement_id).await;
        let statement = self.require_statement(statement_id).await?;
        let lines = self.storage.list_lines(statement_id).await?;

        let matcher = AutoMatcher::new(
            &self.finder,
            &self.scorer,
            &self.state,
            self.policy.auto_match_threshold,
        );
        let report = matcher.run(&statement, lines, timeout).await;

        self.aggregator.recount(statement_id).await?;

        tracing::info!(
            statement_id,
            examined = report.examined,
            matched = report.matched_count(),
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            timed_out = report.timed_out,
            "Auto-match finished"
        );
        Ok(report)
    }

    /// Manually match a line to a receipt, payment, internal transaction or
    /// journal entry. No confidence threshold applies.
    pub async fn match_line(
        &self,
        line_id: &str,
        match_type: MatchType,
        target_id: &str,
        matched_by: &str,
        notes: Option<String>,
    ) -> ReconResult<BankStatementLine> {
        let target = match_type.target(target_id);
        self.with_line(line_id, |state, line| async move {
            state
                .apply(line, target, matched_by, MatchMode::Manual, notes)
                .await
        })
        .await
    }

    /// Return a line to `Unmatched`, reversing any transaction side effect
    pub async fn unmatch_line(
        &self,
        line_id: &str,
        unmatched_by: &str,
    ) -> ReconResult<BankStatementLine> {
        self.with_line(line_id, |state, line| async move {
            state.clear(line, unmatched_by).await
        })
        .await
    }

    /// Record that a journal entry was raised for a line
    pub async fn mark_line_created(
        &self,
        line_id: &str,
        journal_id: &str,
        created_by: &str,
    ) -> ReconResult<BankStatementLine> {
        self.with_line(line_id, |state, line| async move {
            state.mark_created(line, journal_id, created_by).await
        })
        .await
    }

    /// Exclude a line from reconciliation
    pub async fn exclude_line(
        &self,
        line_id: &str,
        excluded_by: &str,
        reason: Option<String>,
    ) -> ReconResult<BankStatementLine> {
        self.with_line(line_id, |state, line| async move {
            state.exclude(line, excluded_by, reason).await
        })
        .await
    }

    // Aggregates and reporting
    /// Recompute a statement's counters and status from its lines
    pub async fn recount(&self, statement_id: &str) -> ReconResult<BankStatement> {
        let _guard = self.locks.acquire(statement_id).await;
        self.aggregator.recount(statement_id).await
    }

    /// Statement versus book balance report
    pub async fn get_summary(&self, statement_id: &str) -> ReconResult<ReconciliationSummary> {
        self.summaries.summarize(statement_id).await
    }

    /// Run one line transition under its statement's lock, then recount
    async fn with_line<'a, F, Fut>(&'a self, line_id: &str, op: F) -> ReconResult<BankStatementLine>
    where
        F: FnOnce(&'a MatchStateManager<S>, BankStatementLine) -> Fut,
        Fut: std::future::Future<Output = ReconResult<BankStatementLine>>,
    {
        let statement_id = self.require_line(line_id).await?.statement_id;
        let _guard = self.locks.acquire(&statement_id).await;

        // Re-read under the lock; the line may have changed while we waited
        let line = self.require_line(line_id).await?;
        let line = op(&self.state, line).await?;
        self.aggregator.recount(&statement_id).await?;
        Ok(line)
    }

    async fn require_statement(&self, statement_id: &str) -> ReconResult<BankStatement> {
        self.storage
            .get_statement(statement_id)
            .await?
            .ok_or_else(|| ReconError::StatementNotFound(statement_id.to_string()))
    }

    async fn require_line(&self, line_id: &str) -> ReconResult<BankStatementLine> {
        self.storage
            .get_line(line_id)
            .await?
            .ok_or_else(|| ReconError::LineNotFound(line_id.to_string()))
    }
}
