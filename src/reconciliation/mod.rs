//! Bank statement reconciliation
//!
//! Lines of a bank statement are matched against receipts, payments and
//! internally recorded bank transactions:
//!
//! - [`candidates`]: search for records with the same amount near the line date
//! - [`scoring`]: fixed confidence heuristic and ranking
//! - [`auto_match`]: unattended matching above a threshold, with a per-line report
//! - [`state`]: apply and reverse matches, including the reconciled flag on
//!   internal transactions
//! - [`aggregate`]: statement counters and status
//! - [`summary`]: statement versus book balance
//! - [`engine`]: the [`ReconciliationEngine`] tying it together under per-statement locks

pub mod aggregate;
pub mod auto_match;
pub mod candidates;
pub mod engine;
pub mod locks;
pub mod scoring;
pub mod state;
pub mod summary;

pub use aggregate::*;
pub use auto_match::*;
pub use candidates::*;
pub use engine::*;
pub use locks::*;
pub use scoring::*;
pub use state::*;
pub use summary::*;
