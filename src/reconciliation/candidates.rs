//! Candidate search across receipts, payments and internal transactions

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate};

use crate::traits::*;
use crate::types::*;

/// An unscored record that could explain a statement line
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateRecord {
    Receipt(Receipt),
    Payment(Payment),
    Transaction(BankTransaction),
}

impl CandidateRecord {
    pub fn match_type(&self) -> MatchType {
        match self {
            CandidateRecord::Receipt(_) => MatchType::Receipt,
            CandidateRecord::Payment(_) => MatchType::Payment,
            CandidateRecord::Transaction(_) => MatchType::Transaction,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            CandidateRecord::Receipt(r) => &r.id,
            CandidateRecord::Payment(p) => &p.id,
            CandidateRecord::Transaction(t) => &t.id,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            CandidateRecord::Receipt(r) => r.date,
            CandidateRecord::Payment(p) => p.date,
            CandidateRecord::Transaction(t) => t.date,
        }
    }

    pub fn amount(&self) -> &BigDecimal {
        match self {
            CandidateRecord::Receipt(r) => &r.amount,
            CandidateRecord::Payment(p) => &p.amount,
            CandidateRecord::Transaction(t) => &t.amount,
        }
    }

    pub fn reference(&self) -> &str {
        match self {
            CandidateRecord::Receipt(r) => &r.reference,
            CandidateRecord::Payment(p) => &p.reference,
            CandidateRecord::Transaction(t) => &t.reference,
        }
    }

    /// Receipts and payments are confirmed by a customer or vendor
    pub fn is_external(&self) -> bool {
        !matches!(self, CandidateRecord::Transaction(_))
    }
}

/// Finds records that could explain a statement line
pub struct CandidateFinder<S: ReconciliationStorage> {
    storage: S,
    window_days: i64,
}

impl<S: ReconciliationStorage> CandidateFinder<S> {
    /// Create a finder searching `window_days` either side of the line date
    pub fn new(storage: S, window_days: i64) -> Self {
        Self {
            storage,
            window_days,
        }
    }

    /// Search window for a line date
    pub fn window(&self, date: NaiveDate) -> (NaiveDate, NaiveDate) {
        let span = Duration::try_days(self.window_days).unwrap_or(Duration::MAX);
        let from = date.checked_sub_signed(span).unwrap_or(NaiveDate::MIN);
        let to = date.checked_add_signed(span).unwrap_or(NaiveDate::MAX);
        (from, to)
    }

    /// All eligible records for `line` on `account_id`, in discovery order:
    /// receipts or payments first, then internal transactions.
    pub async fn find(
        &self,
        account_id: &str,
        line: &BankStatementLine,
    ) -> ReconResult<Vec<CandidateRecord>> {
        let amount = line.amount();
        let (from, to) = self.window(line.transaction_date);
        let mut records = Vec::new();

        match line.transaction_type {
            TransactionType::Credit => {
                let receipts = self
                    .storage
                    .find_confirmed_receipts(account_id, amount, from, to)
                    .await?;
                records.extend(receipts.into_iter().map(CandidateRecord::Receipt));
            }
            TransactionType::Debit => {
                let payments = self
                    .storage
                    .find_confirmed_payments(account_id, amount, from, to)
                    .await?;
                records.extend(payments.into_iter().map(CandidateRecord::Payment));
            }
        }

        let transactions = self
            .storage
            .find_unreconciled_transactions(account_id, line.transaction_type, amount, from, to)
            .await?;
        records.extend(transactions.into_iter().map(CandidateRecord::Transaction));

        tracing::debug!(
            line_id = %line.id,
            %from,
            %to,
            found = records.len(),
            "Candidate search finished"
        );

        Ok(records)
    }
}
