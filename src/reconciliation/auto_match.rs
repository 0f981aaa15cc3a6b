//! Unattended matching of a statement's unmatched lines

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reconciliation::candidates::CandidateFinder;
use crate::reconciliation::scoring::ConfidenceScorer;
use crate::reconciliation::state::{Deadline, MatchStateManager};
use crate::traits::*;
use crate::types::*;

/// Recorded as `matched_by` on lines matched by a batch
pub const AUTO_MATCH_ACTOR: &str = "auto-match";

/// A line the batch matched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineMatch {
    pub line_id: String,
    pub match_type: MatchType,
    pub target_id: String,
    pub confidence: f64,
}

/// A line the batch could not process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineFailure {
    pub line_id: String,
    pub reason: String,
}

/// Outcome of one auto-match run, line by line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoMatchReport {
    pub statement_id: String,
    /// Unmatched lines the batch started work on
    pub examined: usize,
    pub matched: Vec<LineMatch>,
    /// Lines left for manual review: no candidate cleared the threshold
    pub below_threshold: Vec<String>,
    pub failures: Vec<LineFailure>,
    /// Lines never started because the batch ran out of time
    pub skipped: Vec<String>,
    pub timed_out: bool,
}

impl AutoMatchReport {
    pub fn new(statement_id: &str) -> Self {
        Self {
            statement_id: statement_id.to_string(),
            examined: 0,
            matched: Vec::new(),
            below_threshold: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            timed_out: false,
        }
    }

    /// Number of lines newly matched by this run
    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Walks unmatched lines and commits the best candidate at or above the
/// threshold
pub struct AutoMatcher<'a, S: ReconciliationStorage> {
    finder: &'a CandidateFinder<S>,
    scorer: &'a ConfidenceScorer,
    state: &'a MatchStateManager<S>,
    threshold: f64,
}

impl<'a, S: ReconciliationStorage> AutoMatcher<'a, S> {
    pub fn new(
        finder: &'a CandidateFinder<S>,
        scorer: &'a ConfidenceScorer,
        state: &'a MatchStateManager<S>,
        threshold: f64,
    ) -> Self {
        Self {
            finder,
            scorer,
            state,
            threshold,
        }
    }

    /// Process `lines` of `statement` in order, one at a time.
    ///
    /// A failing line is recorded and the batch moves on. Candidate searches,
    /// target lookups and reconciled-flag writes share one deadline; once it
    /// passes, the current line is recorded as failed and the rest as skipped.
    /// Line writes already started are never cut short.
    pub async fn run(
        &self,
        statement: &BankStatement,
        lines: Vec<BankStatementLine>,
        budget: Duration,
    ) -> AutoMatchReport {
        let deadline = Deadline::after(budget);
        let mut report = AutoMatchReport::new(&statement.id);
        let mut claimed = HashSet::new();
        let mut pending = lines
            .into_iter()
            .filter(|line| line.match_status() == MatchStatus::Unmatched);

        while let Some(line) = pending.next() {
            if deadline.has_passed() {
                report.timed_out = true;
                report.skipped.push(line.id);
                report.skipped.extend(pending.by_ref().map(|line| line.id));
                break;
            }

            report.examined += 1;
            let line_id = line.id.clone();
            match self
                .match_line(&statement.bank_account_id, line, deadline, &claimed)
                .await
            {
                Ok(Some(matched)) => {
                    claimed.insert(matched.match_type.target(matched.target_id.clone()));
                    report.matched.push(matched);
                }
                Ok(None) => report.below_threshold.push(line_id),
                Err(err) => {
                    tracing::warn!(
                        statement_id = %statement.id,
                        line_id = %line_id,
                        error = %err,
                        "Auto-match failed for line"
                    );
                    let timed_out = matches!(err, ReconError::Timeout(_));
                    report.failures.push(LineFailure {
                        line_id,
                        reason: err.to_string(),
                    });
                    if timed_out {
                        report.timed_out = true;
                        report.skipped.extend(pending.by_ref().map(|line| line.id));
                        break;
                    }
                }
            }
        }

        report
    }

    async fn match_line(
        &self,
        account_id: &str,
        line: BankStatementLine,
        deadline: Deadline,
        claimed: &HashSet<MatchTarget>,
    ) -> ReconResult<Option<LineMatch>> {
        let records = deadline.bound(self.finder.find(account_id, &line)).await?;

        // Ranked highest first, so the first eligible candidate is the best one
        let best = self
            .scorer
            .rank(&line, records)
            .into_iter()
            .filter(|candidate| !claimed.contains(&candidate.target()))
            .find(|candidate| candidate.confidence >= self.threshold);
        let Some(best) = best else {
            return Ok(None);
        };

        let line = self
            .state
            .apply_before(
                line,
                best.target(),
                AUTO_MATCH_ACTOR,
                MatchMode::Auto,
                None,
                Some(deadline),
            )
            .await?;

        Ok(Some(LineMatch {
            line_id: line.id,
            match_type: best.match_type,
            target_id: best.target_id,
            confidence: best.confidence,
        }))
    }
}
