//! Statement versus book balance reporting

use bigdecimal::BigDecimal;

use crate::traits::*;
use crate::types::*;

/// Builds [`ReconciliationSummary`] reports
pub struct SummaryCalculator<S: ReconciliationStorage> {
    storage: S,
}

impl<S: ReconciliationStorage> SummaryCalculator<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Summarize a statement against the account's current book balance
    pub async fn summarize(&self, statement_id: &str) -> ReconResult<ReconciliationSummary> {
        let statement = self
            .storage
            .get_statement(statement_id)
            .await?
            .ok_or_else(|| ReconError::StatementNotFound(statement_id.to_string()))?;
        let lines = self.storage.list_lines(statement_id).await?;
        let book_balance = self
            .storage
            .get_current_balance(&statement.bank_account_id)
            .await?;

        Ok(build_summary(&statement, &lines, book_balance))
    }
}

/// Pure summary computation over a statement and all of its lines
pub fn build_summary(
    statement: &BankStatement,
    lines: &[BankStatementLine],
    book_balance: BigDecimal,
) -> ReconciliationSummary {
    let mut total_credits = BigDecimal::from(0);
    let mut total_debits = BigDecimal::from(0);
    let (mut auto_matched, mut manually_matched, mut created, mut excluded) = (0, 0, 0, 0);

    for line in lines {
        match line.transaction_type {
            TransactionType::Credit => total_credits += &line.credit_amount,
            TransactionType::Debit => total_debits += &line.debit_amount,
        }
        match line.match_status() {
            MatchStatus::AutoMatched => auto_matched += 1,
            MatchStatus::ManuallyMatched => manually_matched += 1,
            MatchStatus::Created => created += 1,
            MatchStatus::Excluded => excluded += 1,
            MatchStatus::Unmatched => {}
        }
    }

    let statement_balance = &statement.opening_balance + &total_credits - &total_debits;
    let difference = &statement_balance - &book_balance;
    let closing_variance = &statement.closing_balance - &statement_balance;

    ReconciliationSummary {
        statement_id: statement.id.clone(),
        bank_account_id: statement.bank_account_id.clone(),
        status: statement.status,
        opening_balance: statement.opening_balance.clone(),
        closing_balance: statement.closing_balance.clone(),
        total_credits,
        total_debits,
        statement_balance,
        book_balance,
        difference,
        closing_variance,
        total_lines: statement.total_lines,
        matched_lines: statement.matched_lines,
        unmatched_lines: statement.unmatched_lines,
        auto_matched,
        manually_matched,
        created,
        excluded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_balances_ignore_match_status() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let statement = BankStatement::new(
            "s1".to_string(),
            NewStatement {
                bank_account_id: "hdfc".to_string(),
                statement_number: None,
                period_from: from,
                period_to: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
                opening_balance: BigDecimal::from(1000),
                closing_balance: BigDecimal::from(1300),
            },
        );

        let mut excluded = BankStatementLine::new(
            "l2".to_string(),
            "s1".to_string(),
            2,
            NewStatementLine::debit(from, BigDecimal::from(200)),
        );
        excluded.exclude("ops", chrono::Utc::now().naive_utc(), None);
        let lines = vec![
            BankStatementLine::new(
                "l1".to_string(),
                "s1".to_string(),
                1,
                NewStatementLine::credit(from, BigDecimal::from(500)),
            ),
            excluded,
        ];

        let summary = build_summary(&statement, &lines, BigDecimal::from(1250));
        assert_eq!(summary.total_credits, BigDecimal::from(500));
        assert_eq!(summary.total_debits, BigDecimal::from(200));
        assert_eq!(summary.statement_balance, BigDecimal::from(1300));
        assert_eq!(summary.difference, BigDecimal::from(50));
        assert_eq!(summary.closing_variance, BigDecimal::from(0));
        assert_eq!(summary.excluded, 1);
        assert!(!summary.is_balanced());
    }
}
