//! Matching policy configuration
//!
//! The window, threshold and score table are fixed reconciliation policy. They
//! live here as named values so they can be audited and overridden, but amount
//! matching has no tolerance setting: candidates must match to the paisa.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{ReconError, ReconResult};

/// Days either side of the line date searched for candidates
pub const DEFAULT_DATE_WINDOW_DAYS: i64 = 5;
/// Minimum confidence for an unattended match
pub const DEFAULT_AUTO_MATCH_THRESHOLD: f64 = 0.9;
/// Score for any candidate dated on the line date
pub const EXACT_DATE_SCORE: f64 = 1.0;
/// Score for a receipt or payment dated within the window but not on the line date
pub const EXTERNAL_OFFSET_SCORE: f64 = 0.8;
/// Score for an internal transaction dated within the window but not on the line date
pub const INTERNAL_OFFSET_SCORE: f64 = 0.7;
/// Upper bound on one auto-match batch
pub const DEFAULT_AUTO_MATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Candidate search and scoring policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingPolicy {
    pub date_window_days: i64,
    pub auto_match_threshold: f64,
    pub exact_date_score: f64,
    pub external_offset_score: f64,
    pub internal_offset_score: f64,
    pub auto_match_timeout: Duration,
}

impl Default for MatchingPolicy {
    fn default() -> Self {
        Self {
            date_window_days: DEFAULT_DATE_WINDOW_DAYS,
            auto_match_threshold: DEFAULT_AUTO_MATCH_THRESHOLD,
            exact_date_score: EXACT_DATE_SCORE,
            external_offset_score: EXTERNAL_OFFSET_SCORE,
            internal_offset_score: INTERNAL_OFFSET_SCORE,
            auto_match_timeout: DEFAULT_AUTO_MATCH_TIMEOUT,
        }
    }
}

impl MatchingPolicy {
    /// Set the candidate search window
    pub fn with_date_window_days(mut self, days: i64) -> Self {
        self.date_window_days = days;
        self
    }

    /// Set the auto-match threshold
    pub fn with_auto_match_threshold(mut self, threshold: f64) -> Self {
        self.auto_match_threshold = threshold;
        self
    }

    /// Set the auto-match batch timeout
    pub fn with_auto_match_timeout(mut self, timeout: Duration) -> Self {
        self.auto_match_timeout = timeout;
        self
    }

    /// Check the policy is usable
    pub fn validate(&self) -> ReconResult<()> {
        if self.date_window_days < 0 {
            return Err(ReconError::Validation(format!(
                "Date window cannot be negative: {}",
                self.date_window_days
            )));
        }

        let scores = [
            ("auto_match_threshold", self.auto_match_threshold),
            ("exact_date_score", self.exact_date_score),
            ("external_offset_score", self.external_offset_score),
            ("internal_offset_score", self.internal_offset_score),
        ];
        for (name, value) in scores {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ReconError::Validation(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.auto_match_timeout.is_zero() {
            return Err(ReconError::Validation(
                "Auto-match timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = MatchingPolicy::default();
        assert_eq!(policy.date_window_days, 5);
        assert_eq!(policy.auto_match_threshold, 0.9);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(MatchingPolicy::default()
            .with_date_window_days(-1)
            .validate()
            .is_err());
        assert!(MatchingPolicy::default()
            .with_auto_match_threshold(1.5)
            .validate()
            .is_err());
        assert!(MatchingPolicy::default()
            .with_auto_match_threshold(0.0)
            .validate()
            .is_err());
        assert!(MatchingPolicy::default()
            .with_auto_match_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let policy: MatchingPolicy =
            serde_json::from_str(r#"{ "date_window_days": 3 }"#).unwrap();
        assert_eq!(policy.date_window_days, 3);
        assert_eq!(policy.internal_offset_score, INTERNAL_OFFSET_SCORE);
        assert_eq!(policy.auto_match_timeout, DEFAULT_AUTO_MATCH_TIMEOUT);
    }
}
