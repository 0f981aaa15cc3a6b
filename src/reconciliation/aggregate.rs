//! Statement counters and status, recomputed from line states

use crate::traits::*;
use crate::types::*;

/// Line counts of one statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
}

impl LineCounts {
    pub fn from_lines(lines: &[BankStatementLine]) -> Self {
        let total = lines.len();
        let matched = lines
            .iter()
            .filter(|line| line.match_status().is_matched())
            .count();
        Self {
            total,
            matched,
            unmatched: total - matched,
        }
    }
}

/// Next statement status. Never falls back to `Uploaded` once matching has
/// started.
pub fn derive_status(current: StatementStatus, counts: LineCounts) -> StatementStatus {
    if counts.total > 0 && counts.unmatched == 0 {
        StatementStatus::FullyReconciled
    } else if counts.matched > 0 {
        StatementStatus::PartiallyReconciled
    } else {
        current
    }
}

/// Keeps statement-level aggregates in step with its lines
pub struct StatementAggregator<S: ReconciliationStorage> {
    storage: S,
}

impl<S: ReconciliationStorage> StatementAggregator<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Recount lines and re-derive the statement status
    pub async fn recount(&self, statement_id: &str) -> ReconResult<BankStatement> {
        let mut statement = self
            .storage
            .get_statement(statement_id)
            .await?
            .ok_or_else(|| ReconError::StatementNotFound(statement_id.to_string()))?;

        let lines = self.storage.list_lines(statement_id).await?;
        let counts = LineCounts::from_lines(&lines);

        statement.total_lines = counts.total;
        statement.matched_lines = counts.matched;
        statement.unmatched_lines = counts.unmatched;
        statement.status = derive_status(statement.status, counts);
        statement.updated_at = chrono::Utc::now().naive_utc();

        self.storage.update_statement(&statement).await?;
        Ok(statement)
    }
}
