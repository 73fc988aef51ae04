use std::cmp::Reverse;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use tracing::warn;

use crate::config::RankingWeights;
use crate::models::{CreationDate, Document, RankedDocument};
use crate::tokenizer::Tokenizer;

/// Raw scores are divided by this before weighting; no clamping
pub const SCORE_NORMALIZER: f64 = 100.0;

/// Orders candidate documents by title match, community score and recency
#[derive(Clone)]
pub struct Ranker {
    weights: RankingWeights,
    tokenizer: Tokenizer,
}

impl Ranker {
    pub fn new(weights: RankingWeights, tokenizer: Tokenizer) -> Self {
        Self { weights, tokenizer }
    }

    pub fn weights(&self) -> &RankingWeights {
        &self.weights
    }

    pub fn rank(&self, documents: Vec<Document>, terms: &[String]) -> Vec<RankedDocument> {
        self.rank_at(documents, terms, Utc::now())
    }

    /// Rank against a fixed clock.
    ///
    /// Sorted by weighted score descending, then raw score descending, then
    /// id ascending.
    pub fn rank_at(
        &self,
        documents: Vec<Document>,
        terms: &[String],
        now: DateTime<Utc>,
    ) -> Vec<RankedDocument> {
        let terms: HashSet<&str> = terms.iter().map(String::as_str).collect();

        let mut ranked: Vec<RankedDocument> = documents
            .into_iter()
            .map(|document| {
                let match_score = self.match_score(&document, &terms);
                let normalized_score = normalized_score(document.score);
                let recency_weight = recency_weight(&document.created_at, now);
                let weighted_score = self.weights.title * match_score as f64
                    + self.weights.score * normalized_score
                    + self.weights.date * recency_weight;
                RankedDocument {
                    document,
                    match_score,
                    normalized_score,
                    recency_weight,
                    weighted_score,
                }
            })
            .collect();

        ranked.sort_by_key(|r| {
            (
                Reverse(OrderedFloat(r.weighted_score)),
                Reverse(r.document.score),
                r.document.id,
            )
        });
        ranked
    }

    /// Distinct query terms present among the document's title tokens
    fn match_score(&self, document: &Document, terms: &HashSet<&str>) -> usize {
        match self.tokenizer.tokenize(&document.title) {
            Ok(words) => words.iter().filter(|w| terms.contains(w.as_str())).count(),
            Err(e) => {
                warn!(doc_id = document.id, error = %e, "title not normalizable, no title match");
                0
            }
        }
    }
}

pub fn normalized_score(score: i64) -> f64 {
    score as f64 / SCORE_NORMALIZER
}

/// `1 / (1 + days)` with future dates counted as today; unparsable dates weigh 0
pub fn recency_weight(created_at: &CreationDate, now: DateTime<Utc>) -> f64 {
    match created_at.timestamp() {
        Some(ts) => {
            let days = now.signed_duration_since(ts).num_days().max(0);
            1.0 / (1.0 + days as f64)
        }
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenizerConfig;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn ranker(weights: RankingWeights) -> Ranker {
        Ranker::new(weights, Tokenizer::new(&TokenizerConfig::default()))
    }

    fn doc(id: u64, title: &str, score: i64, days_ago: i64) -> Document {
        Document::new(id, title)
            .with_score(score)
            .with_created_at(CreationDate::from_datetime(now() - Duration::days(days_ago)))
    }

    #[test]
    fn test_recency_weight() {
        let created = CreationDate::from_datetime(now() - Duration::days(30));
        assert!((recency_weight(&created, now()) - 1.0 / 31.0).abs() < 1e-12);

        let future = CreationDate::from_datetime(now() + Duration::days(3));
        assert_eq!(recency_weight(&future, now()), 1.0);

        assert_eq!(recency_weight(&CreationDate::new("not a date"), now()), 0.0);
    }

    #[test]
    fn test_normalized_score_is_not_clamped() {
        assert_eq!(normalized_score(85), 0.85);
        assert_eq!(normalized_score(250), 2.5);
        assert_eq!(normalized_score(-10), -0.1);
    }

    #[test]
    fn test_breakdown() {
        let ranker = ranker(RankingWeights::default());
        let terms = vec!["healthcar".to_string(), "ai".to_string()];
        let ranked = ranker.rank_at(vec![doc(42, "AI in Healthcare", 85, 30)], &terms, now());

        let r = &ranked[0];
        assert_eq!(r.match_score, 2);
        assert_eq!(r.normalized_score, 0.85);
        let expected = 2.0 * 2.0 + 0.85 + 1.0 / 31.0;
        assert!((r.weighted_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_title_word_counts_once() {
        let ranker = ranker(RankingWeights::default());
        let terms = vec!["rust".to_string()];
        let ranked = ranker.rank_at(vec![doc(1, "Rust rust RUST", 0, 0)], &terms, now());
        assert_eq!(ranked[0].match_score, 1);
    }

    #[test]
    fn test_ties_broken_by_score_then_id() {
        // Zero score weight makes weighted scores identical
        let ranker = ranker(RankingWeights::new(2.0, 0.0, 1.0));
        let terms = vec!["rust".to_string()];
        let docs = vec![
            doc(3, "rust", 10, 5),
            doc(2, "rust", 50, 5),
            doc(1, "rust", 10, 5),
        ];
        let ranked = ranker.rank_at(docs, &terms, now());
        let ids: Vec<u64> = ranked.iter().map(|r| r.document.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_order_by_weighted_score_and_stable() {
        let ranker = ranker(RankingWeights::default());
        let terms = vec!["cargo".to_string()];
        let docs = vec![
            doc(1, "unrelated", 90, 0),
            doc(2, "cargo workspaces", 10, 100),
            doc(3, "cargo", 10, 0),
        ];

        let first = ranker.rank_at(docs.clone(), &terms, now());
        let ids: Vec<u64> = first.iter().map(|r| r.document.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        for _ in 0..5 {
            let again = ranker.rank_at(docs.clone(), &terms, now());
            let again: Vec<u64> = again.iter().map(|r| r.document.id).collect();
            assert_eq!(again, ids);
        }
    }
}
