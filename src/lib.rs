//! # Bank Reconciliation
//!
//! Reconciles bank statements against an organization's own records:
//! customer receipts, vendor payments and internally recorded bank
//! transactions.
//!
//! ## Features
//!
//! - **Candidate search**: exact-amount lookups within a date window across three record sources
//! - **Confidence scoring**: a fixed, auditable heuristic with deterministic tie-breaking
//! - **Auto-matching**: unattended matching above a threshold with a per-line batch report
//! - **Match lifecycle**: manual match, unmatch, exclusion and journal creation, keeping
//!   internal transactions' reconciled flags in step
//! - **Statement aggregates**: line counters and status recomputed from line states
//! - **Reconciliation summary**: statement balance, book balance and variance
//! - **Storage abstraction**: database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bank_reconciliation::utils::MemoryStorage;
//! use bank_reconciliation::{NewStatement, NewStatementLine, ReconciliationEngine};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! # async fn run() -> bank_reconciliation::ReconResult<()> {
//! let storage = MemoryStorage::new();
//! let engine = ReconciliationEngine::new(storage);
//!
//! let statement = engine
//!     .create_statement(NewStatement {
//!         bank_account_id: "hdfc-current".to_string(),
//!         statement_number: None,
//!         period_from: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
//!         period_to: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
//!         opening_balance: BigDecimal::from(1000),
//!         closing_balance: BigDecimal::from(6000),
//!     })
//!     .await?;
//! engine
//!     .create_statement_lines(
//!         &statement.id,
//!         vec![NewStatementLine::credit(
//!             NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
//!             BigDecimal::from(5000),
//!         )],
//!     )
//!     .await?;
//!
//! let report = engine.auto_match(&statement.id).await?;
//! let summary = engine.get_summary(&statement.id).await?;
//! println!("matched {} lines, variance {}", report.matched_count(), summary.difference);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
