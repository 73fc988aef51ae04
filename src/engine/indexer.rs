use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::barrel::{AppendOutcome, ForwardBarrelStore, PostingBarrelStore};
use crate::error::Result;
use crate::models::{
    BarrelFailure, Document, IndexResult, IndexedDocument, TokenKey, TokenOrigin,
};
use crate::tokenizer::{identify, Tokenizer};

/// Writes one document into the forward index and posts its tokens
pub struct Indexer<'a> {
    tokenizer: &'a Tokenizer,
    forward: &'a ForwardBarrelStore,
    postings: &'a PostingBarrelStore,
}

impl<'a> Indexer<'a> {
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

    /// Ingest a document.
    ///
    /// Re-ingesting a known id is a no-op reported as `Skipped`. A failed
    /// forward write is returned as an error; posting failures are recorded
    /// per barrel and the remaining tokens are still posted. Range
    /// corruption aborts immediately.
    pub fn ingest(&self, doc: &Document) -> Result<IndexResult> {
        let forward_range = self.forward.barrel_of(doc.id);
        let forward_barrel = forward_range.forward_file_name();

        if self.forward.contains(doc.id)? {
            info!(doc_id = doc.id, barrel = %forward_barrel, "document already indexed, skipping");
            return Ok(IndexResult::Skipped {
                doc_id: doc.id,
                forward_barrel,
            });
        }

        let mut indexed = IndexedDocument {
            doc_id: doc.id,
            forward_barrel: forward_barrel.clone(),
            ..Default::default()
        };

        let title_words = self.field_words(
            doc,
            "title",
            self.tokenizer.tokenize(&doc.title),
            &mut indexed,
        );
        let tag_words = self.field_words(
            doc,
            "tags",
            self.tokenizer.tokenize_all(doc.tags.iter().map(String::as_str)),
            &mut indexed,
        );
        indexed.token_keys = token_keys(doc, &title_words, &tag_words);

        if let AppendOutcome::AlreadyPresent(_) = self.forward.append(doc, &indexed.token_keys)? {
            // Lost a race against a concurrent ingest of the same id
            info!(doc_id = doc.id, barrel = %forward_barrel, "document already indexed, skipping");
            return Ok(IndexResult::Skipped {
                doc_id: doc.id,
                forward_barrel,
            });
        }

        for key in &indexed.token_keys {
            if let Err(e) = self.post(*key, doc.id) {
                if e.is_integrity_error() {
                    return Err(e);
                }
                let barrel = e
                    .barrel()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("posting for {}", key));
                warn!(doc_id = doc.id, token = %key, error = %e, "posting update failed");
                let failure = BarrelFailure::new(barrel, &e);
                if !indexed.posting_failures.contains(&failure) {
                    indexed.posting_failures.push(failure);
                }
            }
        }

        info!(
            doc_id = doc.id,
            barrel = %forward_barrel,
            tokens = indexed.token_keys.len(),
            posting_failures = indexed.posting_failures.len(),
            "document indexed"
        );
        Ok(IndexResult::Indexed(indexed))
    }

    fn post(&self, key: TokenKey, doc_id: u64) -> Result<()> {
        self.postings.ensure_coverage(key.numeric_id)?;
        self.postings.upsert_posting(key, doc_id)?;
        Ok(())
    }

    /// Words of one field; a normalizer failure empties the field
    fn field_words(
        &self,
        doc: &Document,
        field: &str,
        words: Result<Vec<String>>,
        indexed: &mut IndexedDocument,
    ) -> Vec<String> {
        words.unwrap_or_else(|e| {
            warn!(doc_id = doc.id, field, error = %e, "field normalization failed, no tokens");
            indexed.failed_fields.push(field.to_string());
            Vec::new()
        })
    }
}

/// Title keys first, then tag keys, without repeats
fn token_keys(doc: &Document, title_words: &[String], tag_words: &[String]) -> Vec<TokenKey> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    let fields = [(TokenOrigin::Title, title_words), (TokenOrigin::Tag, tag_words)];
    for (origin, words) in fields {
        for word in words {
            match identify(word, origin) {
                Ok(key) => {
                    if seen.insert(key) {
                        keys.push(key);
                    }
                }
                Err(e) => debug!(doc_id = doc.id, word = %word, error = %e, "word has no token id"),
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrel::BarrelRange;
    use crate::config::TokenizerConfig;
    use crate::error::BoltError;
    use crate::tokenizer::{token_id, Normalizer};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Stores {
        _tmp: TempDir,
        tokenizer: Tokenizer,
        forward: ForwardBarrelStore,
        postings: PostingBarrelStore,
    }

    fn stores(tokenizer: Tokenizer) -> Stores {
        let tmp = TempDir::new().unwrap();
        let forward = ForwardBarrelStore::open(tmp.path().join("DocumentBarrels"), 4000).unwrap();
        let postings = PostingBarrelStore::open(tmp.path().join("barrels"), 4000).unwrap();
        Stores {
            _tmp: tmp,
            tokenizer,
            forward,
            postings,
        }
    }

    fn plain() -> Tokenizer {
        Tokenizer::new(&TokenizerConfig {
            stem: false,
            ..Default::default()
        })
    }

    struct RejectWord(&'static str);

    impl Normalizer for RejectWord {
        fn normalize(&self, word: &str) -> Result<String> {
            if word == self.0 {
                Err(BoltError::Normalizer(format!("cannot normalize {}", word)))
            } else {
                Ok(word.to_lowercase())
            }
        }
    }

    #[test]
    fn test_ingest_writes_forward_and_postings() {
        let s = stores(plain());
        let indexer = Indexer::new(&s.tokenizer, &s.forward, &s.postings);
        let doc = Document::new(42, "AI in AI").with_tags(["ai"]);

        let result = indexer.ingest(&doc).unwrap();
        let IndexResult::Indexed(indexed) = result else {
            panic!("expected indexed");
        };
        assert_eq!(indexed.forward_barrel, "barrel_0_to_3999.csv");
        assert_eq!(
            indexed.token_keys,
            vec![
                TokenKey::titled(token_id("ai").unwrap()),
                TokenKey::titled(token_id("in").unwrap()),
                TokenKey::bare(token_id("ai").unwrap()),
            ]
        );
        assert!(indexed.failed_fields.is_empty());

        let stored = s.forward.get(42).unwrap().unwrap();
        assert_eq!(stored.combined_token_ids, indexed.token_keys);

        let ai = token_id("ai").unwrap();
        let range = s.postings.locate(ai).unwrap();
        assert_eq!(range, BarrelRange::aligned(ai, 4000));
        let barrel = s.postings.load(range).unwrap();
        assert!(barrel.postings[&TokenKey::titled(ai)].contains(&42));
        assert!(barrel.postings[&TokenKey::bare(ai)].contains(&42));
    }

    #[test]
    fn test_reingest_is_skipped() {
        let s = stores(plain());
        let indexer = Indexer::new(&s.tokenizer, &s.forward, &s.postings);
        let doc = Document::new(7, "rust");
        assert!(!indexer.ingest(&doc).unwrap().is_skipped());

        let again = indexer.ingest(&doc.clone().with_tags(["new"])).unwrap();
        assert!(again.is_skipped());
        assert_eq!(again.doc_id(), 7);
        assert!(s.postings.locate(token_id("new").unwrap()).is_err());
    }

    #[test]
    fn test_normalizer_failure_drops_field_only() {
        let tokenizer = Tokenizer::with_normalizer(
            &TokenizerConfig::default(),
            Arc::new(RejectWord("broken")),
        );
        let s = stores(tokenizer);
        let indexer = Indexer::new(&s.tokenizer, &s.forward, &s.postings);
        let doc = Document::new(5, "working title").with_tags(["broken", "fine"]);

        let IndexResult::Indexed(indexed) = indexer.ingest(&doc).unwrap() else {
            panic!("expected indexed");
        };
        assert_eq!(indexed.failed_fields, vec!["tags"]);
        assert_eq!(indexed.token_keys.len(), 2);
        assert!(indexed.token_keys.iter().all(|k| k.marker));
        assert!(s.forward.contains(5).unwrap());
    }

    #[test]
    fn test_range_gap_aborts_ingest() {
        let s = stores(plain());
        std::fs::write(s.postings.dir().join("0-3999.csv"), "Token_ID,Document_IDs\n").unwrap();
        std::fs::write(s.postings.dir().join("8000-11999.csv"), "Token_ID,Document_IDs\n").unwrap();
        s.postings.refresh().unwrap();

        let indexer = Indexer::new(&s.tokenizer, &s.forward, &s.postings);
        let err = indexer.ingest(&Document::new(1, "gap")).unwrap_err();
        assert!(err.is_integrity_error());
    }
}
