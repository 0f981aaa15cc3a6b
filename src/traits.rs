//! Traits for storage abstraction at the collaborator seams
//!
//! The reconciliation engine owns statements and their lines. Everything else
//! (bank accounts, receipts, payments, internal bank transactions, journal
//! entries) lives in other modules and is reached through these traits, so the
//! engine can run against any backend (PostgreSQL, SQLite, in-memory, etc.).

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};

use crate::types::*;

/// Storage for statements and statement lines
#[async_trait]
pub trait StatementStorage: Send + Sync {
    /// Save a new statement
    async fn save_statement(&self, statement: &BankStatement) -> ReconResult<()>;

    /// Get a statement by ID
    async fn get_statement(&self, statement_id: &str) -> ReconResult<Option<BankStatement>>;

    /// Replace an existing statement
    async fn update_statement(&self, statement: &BankStatement) -> ReconResult<()>;

    /// Save a new line
    async fn save_line(&self, line: &BankStatementLine) -> ReconResult<()>;

    /// Get a line by ID
    async fn get_line(&self, line_id: &str) -> ReconResult<Option<BankStatementLine>>;

    /// Replace an existing line
    async fn update_line(&self, line: &BankStatementLine) -> ReconResult<()>;

    /// All lines of a statement, ordered by `line_number`
    async fn list_lines(&self, statement_id: &str) -> ReconResult<Vec<BankStatementLine>>;
}

/// Read access to bank accounts
#[async_trait]
pub trait BankAccountProvider: Send + Sync {
    async fn get_bank_account(&self, account_id: &str) -> ReconResult<Option<BankAccount>>;

    /// Current running (book) balance of the account
    async fn get_current_balance(&self, account_id: &str) -> ReconResult<BigDecimal> {
        self.get_bank_account(account_id)
            .await?
            .map(|account| account.current_balance)
            .ok_or_else(|| ReconError::AccountNotFound(account_id.to_string()))
    }
}

/// Read access to customer receipts
#[async_trait]
pub trait ReceiptProvider: Send + Sync {
    async fn get_receipt(&self, receipt_id: &str) -> ReconResult<Option<Receipt>>;

    /// Confirmed receipts into `account_id` for exactly `amount`, dated within
    /// `[date_from, date_to]`
    async fn find_confirmed_receipts(
        &self,
        account_id: &str,
        amount: &BigDecimal,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> ReconResult<Vec<Receipt>>;
}

/// Read access to vendor payments
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn get_payment(&self, payment_id: &str) -> ReconResult<Option<Payment>>;

    /// Confirmed payments from `account_id` for exactly `amount`, dated within
    /// `[date_from, date_to]`
    async fn find_confirmed_payments(
        &self,
        account_id: &str,
        amount: &BigDecimal,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> ReconResult<Vec<Payment>>;
}

/// Access to internally recorded bank transactions
#[async_trait]
pub trait BankTransactionProvider: Send + Sync {
    async fn get_transaction(&self, transaction_id: &str) -> ReconResult<Option<BankTransaction>>;

    /// Unreconciled transactions of `transaction_type` for exactly `amount`,
    /// dated within `[date_from, date_to]`
    async fn find_unreconciled_transactions(
        &self,
        account_id: &str,
        transaction_type: TransactionType,
        amount: &BigDecimal,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> ReconResult<Vec<BankTransaction>>;

    /// Tie a transaction to a statement line.
    ///
    /// Must be atomic: fails with [`ReconError::AlreadyReconciled`] when the
    /// transaction is already reconciled against a different line. Setting it
    /// again for the same line succeeds.
    async fn set_reconciled(
        &self,
        transaction_id: &str,
        line_id: &str,
        reconciled_by: &str,
        reconciled_at: NaiveDateTime,
    ) -> ReconResult<()>;

    /// Undo [`set_reconciled`](Self::set_reconciled); a no-op for an
    /// unreconciled or unknown transaction
    async fn clear_reconciled(&self, transaction_id: &str) -> ReconResult<()>;
}

/// Lookup of journal entries raised by the accounting module
#[async_trait]
pub trait JournalProvider: Send + Sync {
    async fn journal_entry_exists(&self, journal_id: &str) -> ReconResult<bool>;
}

/// Everything the reconciliation engine needs from its backend
pub trait ReconciliationStorage:
    StatementStorage
    + BankAccountProvider
    + ReceiptProvider
    + PaymentProvider
    + BankTransactionProvider
    + JournalProvider
{
}

impl<T> ReconciliationStorage for T where
    T: StatementStorage
        + BankAccountProvider
        + ReceiptProvider
        + PaymentProvider
        + BankTransactionProvider
        + JournalProvider
{
}

/// Trait for implementing custom statement line validation rules
pub trait LineValidator: Send + Sync {
    /// Validate a line before it is ingested into `statement`
    fn validate_line(&self, statement: &BankStatement, line: &NewStatementLine)
        -> ReconResult<()>;
}

/// Default line validator: positive amount inside the statement period
pub struct DefaultLineValidator;

impl LineValidator for DefaultLineValidator {
    fn validate_line(
        &self,
        statement: &BankStatement,
        line: &NewStatementLine,
    ) -> ReconResult<()> {
        crate::utils::validation::validate_positive_amount(&line.amount)?;

        if !statement.covers(line.transaction_date) {
            return Err(ReconError::Validation(format!(
                "Line dated {} is outside statement period {} to {}",
                line.transaction_date, statement.period_from, statement.period_to
            )));
        }

        Ok(())
    }
}
