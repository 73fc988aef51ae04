pub mod document;
pub mod ingest;
pub mod search;
pub mod token;

pub use document::{CreationDate, Document, DocumentId, StoredDocument};
pub use ingest::{IndexResult, IndexedDocument};
pub use search::{BarrelFailure, QueryDiagnostics, RankedDocument, SearchResponse};
pub use token::{TokenKey, TokenOrigin, TITLE_MARKER};
