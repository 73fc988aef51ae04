use serde::Serialize;

use super::document::DocumentId;
use super::search::BarrelFailure;
use super::token::TokenKey;

/// Outcome of ingesting one document
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexResult {
    Indexed(IndexedDocument),
    /// The id already exists in its forward barrel; nothing was written.
    Skipped {
        doc_id: DocumentId,
        forward_barrel: String,
    },
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct IndexedDocument {
    pub doc_id: DocumentId,
    pub forward_barrel: String,
    pub token_keys: Vec<TokenKey>,
    /// Fields whose normalization failed and contributed no tokens
    pub failed_fields: Vec<String>,
    /// Posting barrels that could not be updated after a retry
    pub posting_failures: Vec<BarrelFailure>,
}

impl IndexResult {
    pub fn doc_id(&self) -> DocumentId {
        match self {
            IndexResult::Indexed(doc) => doc.doc_id,
            IndexResult::Skipped { doc_id, .. } => *doc_id,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, IndexResult::Skipped { .. })
    }

    /// True when the document and every posting were written
    pub fn is_complete(&self) -> bool {
        match self {
            IndexResult::Indexed(doc) => doc.posting_failures.is_empty(),
            IndexResult::Skipped { .. } => true,
        }
    }
}
