//! Validation utilities

use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal) -> ReconResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(ReconError::Validation(
            "Amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate the user recorded against a match, unmatch or exclusion
pub fn validate_user(user: &str) -> ReconResult<()> {
    if user.trim().is_empty() {
        return Err(ReconError::Validation(
            "User cannot be empty".to_string(),
        ));
    }

    if user.len() > 100 {
        return Err(ReconError::Validation(
            "User cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate free-text notes attached to a line
pub fn validate_notes(notes: Option<&str>) -> ReconResult<()> {
    match notes {
        Some(text) if text.len() > 500 => Err(ReconError::Validation(
            "Notes cannot exceed 500 characters".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Check that a line's amounts agree with its type: exactly one side is
/// positive and it is the side named by `transaction_type`
pub fn validate_line_amounts(line: &BankStatementLine) -> ReconResult<()> {
    let zero = BigDecimal::from(0);
    let (active, other) = match line.transaction_type {
        TransactionType::Credit => (&line.credit_amount, &line.debit_amount),
        TransactionType::Debit => (&line.debit_amount, &line.credit_amount),
    };

    if *active <= zero || *other != zero {
        return Err(ReconError::Validation(format!(
            "Line {} has amounts inconsistent with {:?}: credit = {}, debit = {}",
            line.id, line.transaction_type, line.credit_amount, line.debit_amount
        )));
    }

    Ok(())
}
