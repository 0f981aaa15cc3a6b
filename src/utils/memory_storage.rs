//! In-memory storage implementation for testing

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

/// In-memory storage implementation for testing and development.
///
/// Implements every collaborator trait the engine needs. Clones share the
/// same data.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    accounts: Arc<RwLock<HashMap<String, BankAccount>>>,
    statements: Arc<RwLock<HashMap<String, BankStatement>>>,
    lines: Arc<RwLock<HashMap<String, BankStatementLine>>>,
    receipts: Arc<RwLock<HashMap<String, Receipt>>>,
    payments: Arc<RwLock<HashMap<String, Payment>>>,
    transactions: Arc<RwLock<HashMap<String, BankTransaction>>>,
    journals: Arc<RwLock<HashSet<String>>>,
}

fn read<T>(lock: &RwLock<T>) -> ReconResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| ReconError::Storage(format!("lock poisoned: {}", e)))
}

fn write<T>(lock: &RwLock<T>) -> ReconResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| ReconError::Storage(format!("lock poisoned: {}", e)))
}

fn in_window(date: NaiveDate, from: NaiveDate, to: NaiveDate) -> bool {
    from <= date && date <= to
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            statements: Arc::new(RwLock::new(HashMap::new())),
            lines: Arc::new(RwLock::new(HashMap::new())),
            receipts: Arc::new(RwLock::new(HashMap::new())),
            payments: Arc::new(RwLock::new(HashMap::new())),
            transactions: Arc::new(RwLock::new(HashMap::new())),
            journals: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Add or replace a bank account
    pub fn add_bank_account(&self, account: BankAccount) {
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account.id.clone(), account);
    }

    /// Overwrite an account's running balance, as the transaction-recording
    /// module would
    pub fn set_balance(&self, account_id: &str, balance: BigDecimal) -> ReconResult<()> {
        let mut accounts = write(&self.accounts)?;
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| ReconError::AccountNotFound(account_id.to_string()))?;
        account.current_balance = balance;
        Ok(())
    }

    /// Add or replace a receipt
    pub fn add_receipt(&self, receipt: Receipt) {
        self.receipts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(receipt.id.clone(), receipt);
    }

    /// Add or replace a payment
    pub fn add_payment(&self, payment: Payment) {
        self.payments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(payment.id.clone(), payment);
    }

    /// Add or replace an internal bank transaction
    pub fn add_transaction(&self, transaction: BankTransaction) {
        self.transactions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(transaction.id.clone(), transaction);
    }

    /// Remove an internal transaction, as the recording module would on deletion
    pub fn remove_transaction(&self, transaction_id: &str) -> Option<BankTransaction> {
        self.transactions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(transaction_id)
    }

    /// Register a journal entry id
    pub fn add_journal_entry(&self, journal_id: &str) {
        self.journals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(journal_id.to_string());
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.accounts.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.statements.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.lines.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.receipts.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.payments.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.transactions.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.journals.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatementStorage for MemoryStorage {
    async fn save_statement(&self, statement: &BankStatement) -> ReconResult<()> {
        write(&self.statements)?.insert(statement.id.clone(), statement.clone());
        Ok(())
    }

    async fn get_statement(&self, statement_id: &str) -> ReconResult<Option<BankStatement>> {
        Ok(read(&self.statements)?.get(statement_id).cloned())
    }

    async fn update_statement(&self, statement: &BankStatement) -> ReconResult<()> {
        let mut statements = write(&self.statements)?;
        match statements.get_mut(&statement.id) {
            Some(existing) => {
                *existing = statement.clone();
                Ok(())
            }
            None => Err(ReconError::StatementNotFound(statement.id.clone())),
        }
    }

    async fn save_line(&self, line: &BankStatementLine) -> ReconResult<()> {
        write(&self.lines)?.insert(line.id.clone(), line.clone());
        Ok(())
    }

    async fn get_line(&self, line_id: &str) -> ReconResult<Option<BankStatementLine>> {
        Ok(read(&self.lines)?.get(line_id).cloned())
    }

    async fn update_line(&self, line: &BankStatementLine) -> ReconResult<()> {
        let mut lines = write(&self.lines)?;
        match lines.get_mut(&line.id) {
            Some(existing) => {
                *existing = line.clone();
                Ok(())
            }
            None => Err(ReconError::LineNotFound(line.id.clone())),
        }
    }

    async fn list_lines(&self, statement_id: &str) -> ReconResult<Vec<BankStatementLine>> {
        let mut lines: Vec<BankStatementLine> = read(&self.lines)?
            .values()
            .filter(|line| line.statement_id == statement_id)
            .cloned()
            .collect();
        lines.sort_by_key(|line| line.line_number);
        Ok(lines)
    }
}

#[async_trait]
impl BankAccountProvider for MemoryStorage {
    async fn get_bank_account(&self, account_id: &str) -> ReconResult<Option<BankAccount>> {
        Ok(read(&self.accounts)?.get(account_id).cloned())
    }
}

#[async_trait]
impl ReceiptProvider for MemoryStorage {
    async fn get_receipt(&self, receipt_id: &str) -> ReconResult<Option<Receipt>> {
        Ok(read(&self.receipts)?.get(receipt_id).cloned())
    }

    async fn find_confirmed_receipts(
        &self,
        account_id: &str,
        amount: &BigDecimal,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> ReconResult<Vec<Receipt>> {
        let mut found: Vec<Receipt> = read(&self.receipts)?
            .values()
            .filter(|r| {
                r.bank_account_id == account_id
                    && r.status == DocumentStatus::Confirmed
                    && &r.amount == amount
                    && in_window(r.date, date_from, date_to)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }
}

#[async_trait]
impl PaymentProvider for MemoryStorage {
    async fn get_payment(&self, payment_id: &str) -> ReconResult<Option<Payment>> {
        Ok(read(&self.payments)?.get(payment_id).cloned())
    }

    async fn find_confirmed_payments(
        &self,
        account_id: &str,
        amount: &BigDecimal,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> ReconResult<Vec<Payment>> {
        let mut found: Vec<Payment> = read(&self.payments)?
            .values()
            .filter(|p| {
                p.bank_account_id == account_id
                    && p.status == DocumentStatus::Confirmed
                    && &p.amount == amount
                    && in_window(p.date, date_from, date_to)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }
}

#[async_trait]
impl BankTransactionProvider for MemoryStorage {
    async fn get_transaction(&self, transaction_id: &str) -> ReconResult<Option<BankTransaction>> {
        Ok(read(&self.transactions)?.get(transaction_id).cloned())
    }

    async fn find_unreconciled_transactions(
        &self,
        account_id: &str,
        transaction_type: TransactionType,
        amount: &BigDecimal,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> ReconResult<Vec<BankTransaction>> {
        let mut found: Vec<BankTransaction> = read(&self.transactions)?
            .values()
            .filter(|t| {
                t.bank_account_id == account_id
                    && !t.is_reconciled
                    && t.transaction_type == transaction_type
                    && &t.amount == amount
                    && in_window(t.date, date_from, date_to)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn set_reconciled(
        &self,
        transaction_id: &str,
        line_id: &str,
        reconciled_by: &str,
        reconciled_at: NaiveDateTime,
    ) -> ReconResult<()> {
        let mut transactions = write(&self.transactions)?;
        let txn = transactions.get_mut(transaction_id).ok_or_else(|| {
            ReconError::TargetNotFound {
                match_type: MatchType::Transaction,
                target_id: transaction_id.to_string(),
            }
        })?;

        if let Some(existing) = &txn.reconciled_statement_line_id {
            if txn.is_reconciled && existing != line_id {
                return Err(ReconError::AlreadyReconciled {
                    transaction_id: transaction_id.to_string(),
                    line_id: existing.clone(),
                });
            }
        }

        txn.is_reconciled = true;
        txn.reconciled_statement_line_id = Some(line_id.to_string());
        txn.reconciled_at = Some(reconciled_at);
        txn.reconciled_by = Some(reconciled_by.to_string());
        Ok(())
    }

    async fn clear_reconciled(&self, transaction_id: &str) -> ReconResult<()> {
        let mut transactions = write(&self.transactions)?;
        let Some(txn) = transactions.get_mut(transaction_id) else {
            return Ok(());
        };

        txn.is_reconciled = false;
        txn.reconciled_statement_line_id = None;
        txn.reconciled_at = None;
        txn.reconciled_by = None;
        Ok(())
    }
}

#[async_trait]
impl JournalProvider for MemoryStorage {
    async fn journal_entry_exists(&self, journal_id: &str) -> ReconResult<bool> {
        Ok(read(&self.journals)?.contains(journal_id))
    }
}
