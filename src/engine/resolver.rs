use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::barrel::{ForwardBarrelStore, PostingBarrelStore};
use crate::error::Result;
use crate::models::{BarrelFailure, DocumentId, QueryDiagnostics, StoredDocument, TokenOrigin};
use crate::tokenizer::{identify, Tokenizer};

/// Candidate ids for one or more terms, before any document is fetched
#[derive(Debug, Default)]
pub struct Candidates {
    pub doc_ids: BTreeSet<DocumentId>,
    pub diagnostics: QueryDiagnostics,
}

/// Ids surviving the candidate cap
#[derive(Debug)]
pub struct ResolvedIds {
    pub term: String,
    pub doc_ids: Vec<DocumentId>,
    pub total_candidates: usize,
    pub diagnostics: QueryDiagnostics,
}

/// Documents fetched for a resolved term
#[derive(Debug)]
pub struct Resolved {
    pub term: String,
    pub documents: Vec<StoredDocument>,
    pub total_candidates: usize,
    pub diagnostics: QueryDiagnostics,
}

/// Turns a query term into candidate documents.
///
/// Read-only: barrels are read without locks since writers replace files
/// by rename.
pub struct QueryResolver<'a> {
    tokenizer: &'a Tokenizer,
    forward: &'a ForwardBarrelStore,
    postings: &'a PostingBarrelStore,
}

impl<'a> QueryResolver<'a> {
    pub fn new(
        tokenizer: &'a Tokenizer,
        forward: &'a ForwardBarrelStore,
        postings: &'a PostingBarrelStore,
    ) -> Self {
        Self {
            tokenizer,
            forward,
            postings,
        }
    }

    /// Candidate ids for an already normalized term, title and tag postings
    /// merged. A term no barrel covers yields no candidates.
    pub fn candidates(&self, normalized: &str) -> Result<Candidates> {
        let numeric_id = identify(normalized, TokenOrigin::Tag)?.numeric_id;
        let mut result = Candidates::default();

        let mut ranges = self.postings.covering(numeric_id);
        if ranges.is_empty() {
            // Ranges may have been extended by another process
            match self.postings.refresh() {
                Ok(_) => ranges = self.postings.covering(numeric_id),
                Err(e) => warn!(error = %e, "could not rescan posting barrels"),
            }
        }
        if ranges.is_empty() {
            debug!(term = normalized, numeric_id, "no posting barrel covers term");
            result.diagnostics.uncovered_terms.push(normalized.to_string());
            return Ok(result);
        }

        for range in ranges {
            match self.postings.lookup(range, numeric_id) {
                Ok(lookup) => {
                    result.diagnostics.skipped_rows += lookup.skipped_rows;
                    result.doc_ids.extend(lookup.doc_ids);
                }
                Err(e) => {
                    let barrel = range.posting_file_name();
                    warn!(barrel = %barrel, error = %e, "posting barrel unreadable");
                    result
                        .diagnostics
                        .unreadable_barrels
                        .push(BarrelFailure::new(barrel, &e));
                }
            }
        }
        debug!(term = normalized, candidates = result.doc_ids.len(), "resolved candidates");
        Ok(result)
    }

    /// Normalize `term`, collect its candidates, and cap them at `limit`
    pub fn resolve_ids(&self, term: &str, limit: usize) -> Result<ResolvedIds> {
        let normalized = self.tokenizer.normalize_term(term)?;
        let candidates = self.candidates(&normalized)?;
        let total_candidates = candidates.doc_ids.len();
        Ok(ResolvedIds {
            term: normalized,
            doc_ids: cap(&candidates.doc_ids, limit),
            total_candidates,
            diagnostics: candidates.diagnostics,
        })
    }

    /// Resolve `term` all the way to its stored documents
    pub fn resolve(&self, term: &str, limit: usize) -> Result<Resolved> {
        let ids = self.resolve_ids(term, limit)?;
        let (documents, diagnostics) = self.fetch(&ids.doc_ids, ids.diagnostics);
        Ok(Resolved {
            term: ids.term,
            documents,
            total_candidates: ids.total_candidates,
            diagnostics,
        })
    }

    /// Fetch documents, recording missing rows and unreadable barrels
    pub fn fetch(
        &self,
        ids: &[DocumentId],
        mut diagnostics: QueryDiagnostics,
    ) -> (Vec<StoredDocument>, QueryDiagnostics) {
        let fetched = self.forward.fetch_many(ids);
        diagnostics.merge(QueryDiagnostics {
            unreadable_barrels: fetched.failures,
            missing_documents: fetched.missing,
            skipped_rows: fetched.skipped_rows,
            uncovered_terms: Vec::new(),
        });
        if !diagnostics.missing_documents.is_empty() {
            warn!(
                missing = diagnostics.missing_documents.len(),
                "candidate documents missing from forward barrels"
            );
        }
        (fetched.documents, diagnostics)
    }
}

/// Lowest `limit` ids, so the cap is deterministic
pub fn cap(ids: &BTreeSet<DocumentId>, limit: usize) -> Vec<DocumentId> {
    ids.iter().take(limit).copied().collect()
}
