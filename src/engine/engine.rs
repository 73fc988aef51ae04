use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam::channel;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::indexer::Indexer;
use super::resolver::{cap, QueryResolver};
use super::scoring::Ranker;
use crate::barrel::{validate_contiguous, BarrelRange, ForwardBarrelStore, PostingBarrelStore};
use crate::config::IndexSettings;
use crate::error::{BoltError, Result};
use crate::models::{
    Document, DocumentId, IndexResult, QueryDiagnostics, SearchResponse, StoredDocument,
};
use crate::tokenizer::{Normalizer, Tokenizer};

/// Summary of an index integrity check
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    pub posting_barrels: usize,
    pub forward_barrels: usize,
    pub highest_token_id: Option<u64>,
    /// Forward barrels whose range does not match the configured width
    pub misaligned_forward_barrels: Vec<String>,
}

/// Entry point tying the barrel stores, tokenizer and ranker together
pub struct SearchEngine {
    settings: IndexSettings,
    tokenizer: Tokenizer,
    forward: ForwardBarrelStore,
    postings: PostingBarrelStore,
    ranker: Ranker,
}

impl SearchEngine {
    /// Open (or create) an index under `settings.data_dir`
    pub fn open(settings: IndexSettings) -> Result<Self> {
        let tokenizer = Tokenizer::new(&settings.tokenizer);
        Self::open_with_tokenizer(settings, tokenizer)
    }

    /// Open with an externally supplied normalizer
    pub fn with_normalizer(settings: IndexSettings, normalizer: Arc<dyn Normalizer>) -> Result<Self> {
        let tokenizer = Tokenizer::with_normalizer(&settings.tokenizer, normalizer);
        Self::open_with_tokenizer(settings, tokenizer)
    }

    fn open_with_tokenizer(settings: IndexSettings, tokenizer: Tokenizer) -> Result<Self> {
        settings.validate()?;
        let forward = ForwardBarrelStore::open(settings.forward_dir(), settings.barrel_width)?;
        let postings = PostingBarrelStore::open(settings.posting_dir(), settings.barrel_width)?;
        let ranker = Ranker::new(settings.ranking, tokenizer.clone());
        info!(
            data_dir = ?settings.data_dir,
            barrel_width = settings.barrel_width,
            posting_barrels = postings.ranges().len(),
            "search engine opened"
        );
        Ok(Self {
            settings,
            tokenizer,
            forward,
            postings,
            ranker,
        })
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    fn indexer(&self) -> Indexer<'_> {
        Indexer::new(&self.tokenizer, &self.forward, &self.postings)
    }

    fn resolver(&self) -> QueryResolver<'_> {
        QueryResolver::new(&self.tokenizer, &self.forward, &self.postings)
    }

    pub fn ingest(&self, doc: &Document) -> Result<IndexResult> {
        self.indexer().ingest(doc)
    }

    /// Ingest many documents, one worker per forward barrel group.
    ///
    /// Documents sharing a forward barrel are ingested in input order by the
    /// same worker. Results come back in input order.
    pub fn ingest_batch(&self, docs: &[Document]) -> Vec<Result<IndexResult>> {
        let mut groups: BTreeMap<BarrelRange, Vec<usize>> = BTreeMap::new();
        for (idx, doc) in docs.iter().enumerate() {
            groups
                .entry(self.forward.barrel_of(doc.id))
                .or_default()
                .push(idx);
        }

        let workers = self.settings.ingest_workers.clamp(1, groups.len().max(1));
        debug!(documents = docs.len(), groups = groups.len(), workers, "batch ingest");

        let (job_tx, job_rx) = channel::unbounded::<Vec<usize>>();
        let (result_tx, result_rx) = channel::unbounded::<(usize, Result<IndexResult>)>();
        for group in groups.into_values() {
            // Receiver is alive until the scope below ends
            let _ = job_tx.send(group);
        }
        drop(job_tx);

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    let indexer = self.indexer();
                    while let Ok(group) = job_rx.recv() {
                        for idx in group {
                            let _ = result_tx.send((idx, indexer.ingest(&docs[idx])));
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut results: Vec<Option<Result<IndexResult>>> = docs.iter().map(|_| None).collect();
        for (idx, result) in result_rx.iter() {
            results[idx] = Some(result);
        }
        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(BoltError::Internal("ingest worker exited".into()))))
            .collect()
    }

    /// Search for every word of `query`; candidates of all terms are merged
    /// and ranked together.
    pub fn search(&self, query: &str, limit: Option<usize>) -> Result<SearchResponse> {
        let start = Instant::now();
        let limit = limit.unwrap_or(self.settings.default_limit);
        let terms = self.tokenizer.tokenize(query)?;
        if terms.is_empty() {
            return Err(BoltError::EmptyQuery);
        }

        let resolver = self.resolver();
        let mut candidates = BTreeSet::new();
        let mut diagnostics = QueryDiagnostics::default();
        for term in &terms {
            let found = resolver.candidates(term)?;
            candidates.extend(found.doc_ids);
            diagnostics.merge(found.diagnostics);
        }

        let ids = cap(&candidates, limit);
        let (documents, diagnostics) = resolver.fetch(&ids, diagnostics);
        Ok(self.respond(query, terms, documents, candidates.len(), diagnostics, start))
    }

    /// Search a single term
    pub fn search_term(&self, term: &str, limit: Option<usize>) -> Result<SearchResponse> {
        let start = Instant::now();
        let limit = limit.unwrap_or(self.settings.default_limit);
        let resolved = self.resolver().resolve(term, limit)?;
        Ok(self.respond(
            term,
            vec![resolved.term],
            resolved.documents,
            resolved.total_candidates,
            resolved.diagnostics,
            start,
        ))
    }

    fn respond(
        &self,
        query: &str,
        terms: Vec<String>,
        documents: Vec<StoredDocument>,
        total_candidates: usize,
        diagnostics: QueryDiagnostics,
        start: Instant,
    ) -> SearchResponse {
        let documents = documents.into_iter().map(|d| d.document).collect();
        let results = self.ranker.rank(documents, &terms);
        if diagnostics.is_partial() {
            warn!(
                query,
                unreadable = diagnostics.unreadable_barrels.len(),
                missing = diagnostics.missing_documents.len(),
                "partial results"
            );
        }
        let took_ms = start.elapsed().as_millis() as u64;
        info!(query, results = results.len(), total_candidates, took_ms, "search completed");
        SearchResponse {
            query: query.to_string(),
            terms,
            results,
            total_candidates,
            took_ms,
            diagnostics,
        }
    }

    pub fn get_document(&self, doc_id: DocumentId) -> Result<Option<StoredDocument>> {
        self.forward.get(doc_id)
    }

    /// Posting ranges currently on disk
    pub fn posting_ranges(&self) -> Result<Vec<BarrelRange>> {
        Ok(self.postings.refresh()?.to_vec())
    }

    /// Check posting range contiguity and forward barrel alignment.
    ///
    /// A range gap is returned as an error, never repaired.
    pub fn verify(&self) -> Result<VerifyReport> {
        let ranges = self.postings.refresh()?;
        validate_contiguous(&ranges)?;

        let width = self.settings.barrel_width;
        let forward = self.forward.barrels()?;
        let misaligned_forward_barrels = forward
            .iter()
            .filter(|r| BarrelRange::aligned(r.start, width) != **r)
            .map(|r| r.forward_file_name())
            .collect::<Vec<_>>();
        if !misaligned_forward_barrels.is_empty() {
            warn!(count = misaligned_forward_barrels.len(), "misaligned forward barrels");
        }

        Ok(VerifyReport {
            posting_barrels: ranges.len(),
            forward_barrels: forward.len(),
            highest_token_id: ranges.last().map(|r| r.end),
            misaligned_forward_barrels,
        })
    }
}
