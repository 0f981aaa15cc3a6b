//! Core types and data structures for bank reconciliation

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Direction of a cash movement as reported by the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money received into the account
    Credit,
    /// Money paid out of the account
    Debit,
}

/// Reconciliation state of a single statement line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    /// Not yet explained by any internal record
    Unmatched,
    /// Matched by the auto-matcher
    AutoMatched,
    /// Matched by a user
    ManuallyMatched,
    /// A journal entry was raised for the line
    Created,
    /// Deliberately left out of reconciliation
    Excluded,
}

impl MatchStatus {
    /// Whether the line counts towards `matched_lines`
    pub fn is_matched(&self) -> bool {
        !matches!(self, MatchStatus::Unmatched)
    }
}

/// Aggregate state of a bank statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementStatus {
    Uploaded,
    PartiallyReconciled,
    FullyReconciled,
}

/// Lifecycle status of receipts and payments owned by other modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,
    Confirmed,
    Cancelled,
}

/// Kind of record a statement line can be matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Receipt,
    Payment,
    Transaction,
    Journal,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Receipt => "receipt",
            MatchType::Payment => "payment",
            MatchType::Transaction => "transaction",
            MatchType::Journal => "journal",
        }
    }

    /// Build the target this match type points at
    pub fn target(self, target_id: impl Into<String>) -> MatchTarget {
        let id = target_id.into();
        match self {
            MatchType::Receipt => MatchTarget::Receipt(id),
            MatchType::Payment => MatchTarget::Payment(id),
            MatchType::Transaction => MatchTarget::Transaction(id),
            MatchType::Journal => MatchTarget::Journal(id),
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "receipt" => Ok(MatchType::Receipt),
            "payment" => Ok(MatchType::Payment),
            "transaction" => Ok(MatchType::Transaction),
            "journal" => Ok(MatchType::Journal),
            _ => Err(ReconError::InvalidMatchType(s.to_string())),
        }
    }
}

/// The single record a matched line points at
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "match_type", content = "target_id", rename_all = "snake_case")]
pub enum MatchTarget {
    Receipt(String),
    Payment(String),
    Transaction(String),
    Journal(String),
}

impl MatchTarget {
    pub fn match_type(&self) -> MatchType {
        match self {
            MatchTarget::Receipt(_) => MatchType::Receipt,
            MatchTarget::Payment(_) => MatchType::Payment,
            MatchTarget::Transaction(_) => MatchType::Transaction,
            MatchTarget::Journal(_) => MatchType::Journal,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            MatchTarget::Receipt(id)
            | MatchTarget::Payment(id)
            | MatchTarget::Transaction(id)
            | MatchTarget::Journal(id) => id,
        }
    }
}

/// How a match was committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Auto,
    Manual,
}

impl MatchMode {
    fn status(self) -> MatchStatus {
        match self {
            MatchMode::Auto => MatchStatus::AutoMatched,
            MatchMode::Manual => MatchStatus::ManuallyMatched,
        }
    }
}

/// Bank account as seen by the reconciliation engine
///
/// The running balance belongs to the transaction-recording module and is
/// only ever read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: String,
    pub name: String,
    pub currency: String,
    pub current_balance: BigDecimal,
}

impl BankAccount {
    pub fn new(id: String, name: String, currency: String, current_balance: BigDecimal) -> Self {
        Self {
            id,
            name,
            currency,
            current_balance,
        }
    }
}

/// A bank-issued statement for one account and period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankStatement {
    /// Unique identifier for the statement
    pub id: String,
    /// Account the statement was issued for
    pub bank_account_id: String,
    /// Bank-side statement number, if any
    pub statement_number: Option<String>,
    /// First day covered by the statement
    pub period_from: NaiveDate,
    /// Last day covered by the statement
    pub period_to: NaiveDate,
    /// Opening balance as reported by the bank
    pub opening_balance: BigDecimal,
    /// Closing balance as reported by the bank
    pub closing_balance: BigDecimal,
    pub total_lines: usize,
    pub matched_lines: usize,
    pub unmatched_lines: usize,
    pub status: StatementStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Input for registering a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStatement {
    pub bank_account_id: String,
    pub statement_number: Option<String>,
    pub period_from: NaiveDate,
    pub period_to: NaiveDate,
    pub opening_balance: BigDecimal,
    pub closing_balance: BigDecimal,
}

impl BankStatement {
    /// Create an empty statement in `Uploaded` state
    pub fn new(id: String, new: NewStatement) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            bank_account_id: new.bank_account_id,
            statement_number: new.statement_number,
            period_from: new.period_from,
            period_to: new.period_to,
            opening_balance: new.opening_balance,
            closing_balance: new.closing_balance,
            total_lines: 0,
            matched_lines: 0,
            unmatched_lines: 0,
            status: StatementStatus::Uploaded,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a date falls inside the statement period
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.period_from <= date && date <= self.period_to
    }
}

/// Input for ingesting one statement line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStatementLine {
    pub transaction_date: NaiveDate,
    pub transaction_type: TransactionType,
    /// Unsigned amount; the direction comes from `transaction_type`
    pub amount: BigDecimal,
    pub description: Option<String>,
    pub reference: Option<String>,
}

impl NewStatementLine {
    pub fn credit(transaction_date: NaiveDate, amount: BigDecimal) -> Self {
        Self {
            transaction_date,
            transaction_type: TransactionType::Credit,
            amount,
            description: None,
            reference: None,
        }
    }

    pub fn debit(transaction_date: NaiveDate, amount: BigDecimal) -> Self {
        Self {
            transaction_type: TransactionType::Debit,
            ..Self::credit(transaction_date, amount)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// One bank-reported cash movement within a statement
///
/// `match_status` and the match target are only changed through the methods
/// below, so a line is `Unmatched`/`Excluded` exactly when it has no target.
/// Deserialization rejects lines that break this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredLine")]
pub struct BankStatementLine {
    pub id: String,
    pub statement_id: String,
    pub line_number: u32,
    pub transaction_date: NaiveDate,
    pub transaction_type: TransactionType,
    pub credit_amount: BigDecimal,
    pub debit_amount: BigDecimal,
    pub description: Option<String>,
    pub reference: Option<String>,
    match_status: MatchStatus,
    matched: Option<MatchTarget>,
    pub matched_at: Option<NaiveDateTime>,
    pub matched_by: Option<String>,
    pub user_notes: Option<String>,
}

impl BankStatementLine {
    /// Create an unmatched line from ingestion input
    pub fn new(id: String, statement_id: String, line_number: u32, input: NewStatementLine) -> Self {
        let zero = BigDecimal::from(0);
        let (credit_amount, debit_amount) = match input.transaction_type {
            TransactionType::Credit => (input.amount, zero),
            TransactionType::Debit => (zero, input.amount),
        };
        Self {
            id,
            statement_id,
            line_number,
            transaction_date: input.transaction_date,
            transaction_type: input.transaction_type,
            credit_amount,
            debit_amount,
            description: input.description,
            reference: input.reference,
            match_status: MatchStatus::Unmatched,
            matched: None,
            matched_at: None,
            matched_by: None,
            user_notes: None,
        }
    }

    /// The amount on the side given by `transaction_type`
    pub fn amount(&self) -> &BigDecimal {
        match self.transaction_type {
            TransactionType::Credit => &self.credit_amount,
            TransactionType::Debit => &self.debit_amount,
        }
    }

    pub fn match_status(&self) -> MatchStatus {
        self.match_status
    }

    pub fn matched_target(&self) -> Option<&MatchTarget> {
        self.matched.as_ref()
    }

    pub fn matched_receipt_id(&self) -> Option<&str> {
        match &self.matched {
            Some(MatchTarget::Receipt(id)) => Some(id),
            _ => None,
        }
    }

    pub fn matched_payment_id(&self) -> Option<&str> {
        match &self.matched {
            Some(MatchTarget::Payment(id)) => Some(id),
            _ => None,
        }
    }

    pub fn matched_transaction_id(&self) -> Option<&str> {
        match &self.matched {
            Some(MatchTarget::Transaction(id)) => Some(id),
            _ => None,
        }
    }

    pub fn matched_journal_id(&self) -> Option<&str> {
        match &self.matched {
            Some(MatchTarget::Journal(id)) => Some(id),
            _ => None,
        }
    }

    /// Point the line at `target` and stamp who matched it
    pub(crate) fn apply_match(
        &mut self,
        target: MatchTarget,
        mode: MatchMode,
        matched_by: &str,
        at: NaiveDateTime,
        notes: Option<String>,
    ) {
        self.set_target(target, mode.status(), matched_by, at);
        if notes.is_some() {
            self.user_notes = notes;
        }
    }

    /// Record that a journal entry was raised for the line
    pub(crate) fn mark_created(&mut self, journal_id: String, created_by: &str, at: NaiveDateTime) {
        self.set_target(MatchTarget::Journal(journal_id), MatchStatus::Created, created_by, at);
    }

    /// Take the line out of reconciliation
    pub(crate) fn exclude(&mut self, excluded_by: &str, at: NaiveDateTime, reason: Option<String>) {
        self.matched = None;
        self.match_status = MatchStatus::Excluded;
        self.matched_at = Some(at);
        self.matched_by = Some(excluded_by.to_string());
        if reason.is_some() {
            self.user_notes = reason;
        }
    }

    /// Return the line to `Unmatched`, handing back whatever it pointed at
    pub(crate) fn clear_match(&mut self) -> Option<MatchTarget> {
        self.match_status = MatchStatus::Unmatched;
        self.matched_at = None;
        self.matched_by = None;
        self.matched.take()
    }

    fn set_target(
        &mut self,
        target: MatchTarget,
        status: MatchStatus,
        by: &str,
        at: NaiveDateTime,
    ) {
        self.matched = Some(target);
        self.match_status = status;
        self.matched_at = Some(at);
        self.matched_by = Some(by.to_string());
    }
}

/// Serialized form of [`BankStatementLine`], checked before it becomes a line
#[derive(Deserialize)]
struct StoredLine {
    id: String,
    statement_id: String,
    line_number: u32,
    transaction_date: NaiveDate,
    transaction_type: TransactionType,
    credit_amount: BigDecimal,
    debit_amount: BigDecimal,
    description: Option<String>,
    reference: Option<String>,
    match_status: MatchStatus,
    matched: Option<MatchTarget>,
    matched_at: Option<NaiveDateTime>,
    matched_by: Option<String>,
    user_notes: Option<String>,
}

impl TryFrom<StoredLine> for BankStatementLine {
    type Error = ReconError;

    fn try_from(stored: StoredLine) -> ReconResult<Self> {
        let consistent = matches!(
            (stored.match_status, &stored.matched),
            (MatchStatus::Unmatched | MatchStatus::Excluded, None)
                | (MatchStatus::Created, Some(MatchTarget::Journal(_)))
                | (MatchStatus::AutoMatched | MatchStatus::ManuallyMatched, Some(_))
        );
        if !consistent {
            return Err(ReconError::Validation(format!(
                "Line {} is {:?} with target {:?}",
                stored.id, stored.match_status, stored.matched
            )));
        }

        let line = Self {
            id: stored.id,
            statement_id: stored.statement_id,
            line_number: stored.line_number,
            transaction_date: stored.transaction_date,
            transaction_type: stored.transaction_type,
            credit_amount: stored.credit_amount,
            debit_amount: stored.debit_amount,
            description: stored.description,
            reference: stored.reference,
            match_status: stored.match_status,
            matched: stored.matched,
            matched_at: stored.matched_at,
            matched_by: stored.matched_by,
            user_notes: stored.user_notes,
        };
        crate::utils::validation::validate_line_amounts(&line)?;
        Ok(line)
    }
}

/// Customer receipt deposited into a bank account (credit side only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub bank_account_id: String,
    pub date: NaiveDate,
    pub amount: BigDecimal,
    pub reference: String,
    pub status: DocumentStatus,
}

/// Vendor payment made from a bank account (debit side only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub bank_account_id: String,
    pub date: NaiveDate,
    pub amount: BigDecimal,
    pub reference: String,
    pub status: DocumentStatus,
}

/// Internally recorded bank transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: String,
    pub bank_account_id: String,
    pub date: NaiveDate,
    pub transaction_type: TransactionType,
    pub amount: BigDecimal,
    pub reference: String,
    pub is_reconciled: bool,
    pub reconciled_statement_line_id: Option<String>,
    pub reconciled_at: Option<NaiveDateTime>,
    pub reconciled_by: Option<String>,
}

impl BankTransaction {
    /// Create an unreconciled transaction
    pub fn new(
        id: String,
        bank_account_id: String,
        date: NaiveDate,
        transaction_type: TransactionType,
        amount: BigDecimal,
        reference: String,
    ) -> Self {
        Self {
            id,
            bank_account_id,
            date,
            transaction_type,
            amount,
            reference,
            is_reconciled: false,
            reconciled_statement_line_id: None,
            reconciled_at: None,
            reconciled_by: None,
        }
    }
}

/// A record offered as an explanation for a statement line, with its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub match_type: MatchType,
    pub target_id: String,
    pub reference: String,
    pub date: NaiveDate,
    pub amount: BigDecimal,
    pub confidence: f64,
}

impl MatchCandidate {
    pub fn target(&self) -> MatchTarget {
        self.match_type.target(self.target_id.clone())
    }
}

/// Statement-level reconciliation report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub statement_id: String,
    pub bank_account_id: String,
    pub status: StatementStatus,
    pub opening_balance: BigDecimal,
    pub closing_balance: BigDecimal,
    pub total_credits: BigDecimal,
    pub total_debits: BigDecimal,
    /// Opening balance plus credits minus debits
    pub statement_balance: BigDecimal,
    /// Account running balance at the time the summary was computed
    pub book_balance: BigDecimal,
    /// Statement balance minus book balance
    pub difference: BigDecimal,
    /// Declared closing balance minus computed statement balance
    pub closing_variance: BigDecimal,
    pub total_lines: usize,
    pub matched_lines: usize,
    pub unmatched_lines: usize,
    pub auto_matched: usize,
    pub manually_matched: usize,
    pub created: usize,
    pub excluded: usize,
}

impl ReconciliationSummary {
    /// Statement and books agree
    pub fn is_balanced(&self) -> bool {
        self.difference == BigDecimal::from(0)
    }
}

/// Errors that can occur during reconciliation
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Statement not found: {0}")]
    StatementNotFound(String),
    #[error("Statement line not found: {0}")]
    LineNotFound(String),
    #[error("Bank account not found: {0}")]
    AccountNotFound(String),
    #[error("{match_type} not found: {target_id}")]
    TargetNotFound {
        match_type: MatchType,
        target_id: String,
    },
    #[error("Invalid match type: {0}")]
    InvalidMatchType(String),
    #[error("Transaction {transaction_id} is already reconciled against line {line_id}")]
    AlreadyReconciled {
        transaction_id: String,
        line_id: String,
    },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl ReconError {
    /// Statement, line, account or match target does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ReconError::StatementNotFound(_)
                | ReconError::LineNotFound(_)
                | ReconError::AccountNotFound(_)
                | ReconError::TargetNotFound { .. }
        )
    }
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn line(kind: TransactionType) -> BankStatementLine {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let input = match kind {
            TransactionType::Credit => NewStatementLine::credit(date, BigDecimal::from(5000)),
            TransactionType::Debit => NewStatementLine::debit(date, BigDecimal::from(5000)),
        };
        BankStatementLine::new("l1".to_string(), "s1".to_string(), 1, input)
    }

    #[test]
    fn test_line_amount_follows_type() {
        let credit = line(TransactionType::Credit);
        assert_eq!(credit.credit_amount, BigDecimal::from(5000));
        assert_eq!(credit.debit_amount, BigDecimal::from(0));
        assert_eq!(credit.amount(), &BigDecimal::from(5000));

        let debit = line(TransactionType::Debit);
        assert_eq!(debit.credit_amount, BigDecimal::from(0));
        assert_eq!(debit.amount(), &BigDecimal::from(5000));
    }

    #[test]
    fn test_match_type_parsing() {
        assert_eq!("receipt".parse::<MatchType>().unwrap(), MatchType::Receipt);
        assert_eq!(" Journal ".parse::<MatchType>().unwrap(), MatchType::Journal);
        let err = "invoice".parse::<MatchType>().unwrap_err();
        assert!(matches!(err, ReconError::InvalidMatchType(ref s) if s == "invoice"));
    }

    #[test]
    fn test_line_target_slots() {
        let mut l = line(TransactionType::Credit);
        let now = chrono::Utc::now().naive_utc();
        l.apply_match(
            MatchTarget::Transaction("t1".to_string()),
            MatchMode::Manual,
            "alice",
            now,
            None,
        );
        assert_eq!(l.match_status(), MatchStatus::ManuallyMatched);
        assert_eq!(l.matched_transaction_id(), Some("t1"));
        assert_eq!(l.matched_receipt_id(), None);
        assert_eq!(l.matched_journal_id(), None);

        let released = l.clear_match();
        assert_eq!(released, Some(MatchTarget::Transaction("t1".to_string())));
        assert_eq!(l.match_status(), MatchStatus::Unmatched);
        assert!(l.matched_target().is_none());
        assert!(l.matched_by.is_none());
    }

    #[test]
    fn test_exclude_has_no_target() {
        let mut l = line(TransactionType::Debit);
        let now = chrono::Utc::now().naive_utc();
        l.mark_created("j1".to_string(), "bob", now);
        assert_eq!(l.match_status(), MatchStatus::Created);
        assert_eq!(l.matched_journal_id(), Some("j1"));

        l.exclude("bob", now, Some("bank charge".to_string()));
        assert_eq!(l.match_status(), MatchStatus::Excluded);
        assert!(l.matched_target().is_none());
        assert_eq!(l.user_notes.as_deref(), Some("bank charge"));
        assert!(l.match_status().is_matched());
    }

    #[test]
    fn test_line_serialization_shape() {
        let mut l = line(TransactionType::Credit);
        l.apply_match(
            MatchTarget::Receipt("r1".to_string()),
            MatchMode::Auto,
            "system",
            chrono::Utc::now().naive_utc(),
            None,
        );
        let json = serde_json::to_value(&l).unwrap();
        assert_eq!(json["match_status"], "AUTO_MATCHED");
        assert_eq!(json["transaction_type"], "CREDIT");
        assert_eq!(json["matched"]["match_type"], "receipt");
        assert_eq!(json["matched"]["target_id"], "r1");

        let back: BankStatementLine = serde_json::from_value(json).unwrap();
        assert_eq!(back, l);
    }

    #[test]
    fn test_deserialization_rejects_inconsistent_lines() {
        let mut l = line(TransactionType::Credit);
        l.apply_match(
            MatchTarget::Receipt("r1".to_string()),
            MatchMode::Manual,
            "alice",
            chrono::Utc::now().naive_utc(),
            None,
        );
        let matched = serde_json::to_value(&l).unwrap();

        let mut excluded_with_target = matched.clone();
        excluded_with_target["match_status"] = "EXCLUDED".into();
        assert!(serde_json::from_value::<BankStatementLine>(excluded_with_target).is_err());

        let mut matched_without_target = matched.clone();
        matched_without_target["matched"] = serde_json::Value::Null;
        assert!(serde_json::from_value::<BankStatementLine>(matched_without_target).is_err());

        let mut created_on_receipt = matched.clone();
        created_on_receipt["match_status"] = "CREATED".into();
        assert!(serde_json::from_value::<BankStatementLine>(created_on_receipt).is_err());

        let mut both_sides = matched;
        both_sides["debit_amount"] = serde_json::to_value(BigDecimal::from(10)).unwrap();
        assert!(serde_json::from_value::<BankStatementLine>(both_sides).is_err());
    }
}
