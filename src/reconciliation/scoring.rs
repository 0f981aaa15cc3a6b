//! Confidence scoring and ranking of match candidates

use std::cmp::Ordering;

use crate::config::MatchingPolicy;
use crate::reconciliation::candidates::CandidateRecord;
use crate::types::*;

/// Fixed, auditable scoring heuristic
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    exact_date_score: f64,
    external_offset_score: f64,
    internal_offset_score: f64,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(&MatchingPolicy::default())
    }
}

impl ConfidenceScorer {
    pub fn new(policy: &MatchingPolicy) -> Self {
        Self {
            exact_date_score: policy.exact_date_score,
            external_offset_score: policy.external_offset_score,
            internal_offset_score: policy.internal_offset_score,
        }
    }

    /// Score one candidate against a line. Amounts are already equal, so only
    /// the source and date exactness matter.
    pub fn score(&self, line: &BankStatementLine, candidate: &CandidateRecord) -> f64 {
        if candidate.date() == line.transaction_date {
            self.exact_date_score
        } else if candidate.is_external() {
            self.external_offset_score
        } else {
            self.internal_offset_score
        }
    }

    /// Score and sort candidates by confidence, highest first.
    ///
    /// The sort is stable, so equal scores keep discovery order (receipts and
    /// payments ahead of internal transactions).
    pub fn rank(
        &self,
        line: &BankStatementLine,
        candidates: Vec<CandidateRecord>,
    ) -> Vec<MatchCandidate> {
        let mut ranked: Vec<MatchCandidate> = candidates
            .into_iter()
            .map(|record| MatchCandidate {
                confidence: self.score(line, &record),
                match_type: record.match_type(),
                target_id: record.id().to_string(),
                reference: record.reference().to_string(),
                date: record.date(),
                amount: record.amount().clone(),
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn credit_line(day: u32) -> BankStatementLine {
        BankStatementLine::new(
            "l1".to_string(),
            "s1".to_string(),
            1,
            NewStatementLine::credit(date(day), BigDecimal::from(5000)),
        )
    }

    fn receipt(id: &str, day: u32) -> CandidateRecord {
        CandidateRecord::Receipt(Receipt {
            id: id.to_string(),
            bank_account_id: "hdfc".to_string(),
            date: date(day),
            amount: BigDecimal::from(5000),
            reference: id.to_string(),
            status: DocumentStatus::Confirmed,
        })
    }

    fn transaction(id: &str, day: u32) -> CandidateRecord {
        CandidateRecord::Transaction(BankTransaction::new(
            id.to_string(),
            "hdfc".to_string(),
            date(day),
            TransactionType::Credit,
            BigDecimal::from(5000),
            id.to_string(),
        ))
    }

    #[test]
    fn test_score_table() {
        let scorer = ConfidenceScorer::default();
        let line = credit_line(10);

        assert_eq!(scorer.score(&line, &receipt("r", 10)), 1.0);
        assert_eq!(scorer.score(&line, &receipt("r", 12)), 0.8);
        assert_eq!(scorer.score(&line, &transaction("t", 10)), 1.0);
        assert_eq!(scorer.score(&line, &transaction("t", 8)), 0.7);
    }

    #[test]
    fn test_rank_is_non_increasing_with_stable_ties() {
        let scorer = ConfidenceScorer::default();
        let line = credit_line(10);
        let ranked = scorer.rank(
            &line,
            vec![
                receipt("r-off", 11),
                receipt("r-exact", 10),
                transaction("t-exact", 10),
                transaction("t-off", 9),
            ],
        );

        let order: Vec<&str> = ranked.iter().map(|c| c.target_id.as_str()).collect();
        assert_eq!(order, vec!["r-exact", "t-exact", "r-off", "t-off"]);
        assert!(ranked
            .windows(2)
            .all(|pair| pair[0].confidence >= pair[1].confidence));
    }

    #[test]
    fn test_score_is_deterministic() {
        let scorer = ConfidenceScorer::default();
        let line = credit_line(10);
        let candidate = transaction("t", 13);
        assert_eq!(scorer.score(&line, &candidate), scorer.score(&line, &candidate));
    }
}
