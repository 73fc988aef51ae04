use serde::Serialize;

use super::document::{Document, DocumentId};

/// A barrel that could not be read or written, with the reason
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BarrelFailure {
    pub barrel: String,
    pub error: String,
}

impl BarrelFailure {
    pub fn new(barrel: impl Into<String>, error: impl ToString) -> Self {
        Self {
            barrel: barrel.into(),
            error: error.to_string(),
        }
    }
}

/// Document with its ranking breakdown
#[derive(Clone, Debug, Serialize)]
pub struct RankedDocument {
    pub document: Document,
    pub match_score: usize,
    pub normalized_score: f64,
    pub recency_weight: f64,
    pub weighted_score: f64,
}

/// Why a result set may be shorter than expected
#[derive(Clone, Debug, Default, Serialize)]
pub struct QueryDiagnostics {
    pub unreadable_barrels: Vec<BarrelFailure>,
    pub missing_documents: Vec<DocumentId>,
    pub skipped_rows: usize,
    /// Terms no posting barrel covers
    pub uncovered_terms: Vec<String>,
}

impl QueryDiagnostics {
    pub fn is_partial(&self) -> bool {
        !self.unreadable_barrels.is_empty() || !self.missing_documents.is_empty()
    }

    pub fn merge(&mut self, other: QueryDiagnostics) {
        for failure in other.unreadable_barrels {
            if !self.unreadable_barrels.contains(&failure) {
                self.unreadable_barrels.push(failure);
            }
        }
        for id in other.missing_documents {
            if !self.missing_documents.contains(&id) {
                self.missing_documents.push(id);
            }
        }
        self.skipped_rows += other.skipped_rows;
        self.uncovered_terms.extend(other.uncovered_terms);
    }
}

/// Search response with timing information
#[derive(Clone, Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub terms: Vec<String>,
    pub results: Vec<RankedDocument>,
    pub total_candidates: usize,
    pub took_ms: u64,
    pub diagnostics: QueryDiagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_merge() {
        let mut a = QueryDiagnostics::default();
        assert!(!a.is_partial());

        let b = QueryDiagnostics {
            unreadable_barrels: vec![BarrelFailure::new("0-3999.csv", "denied")],
            missing_documents: vec![5],
            skipped_rows: 2,
            uncovered_terms: vec!["zebra".to_string()],
        };
        a.merge(b.clone());
        a.merge(b);

        assert!(a.is_partial());
        assert_eq!(a.unreadable_barrels.len(), 1);
        assert_eq!(a.missing_documents, vec![5]);
        assert_eq!(a.skipped_rows, 4);
    }
}
