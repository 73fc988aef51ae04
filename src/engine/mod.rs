//! Indexing, query resolution and ranking over the barrel stores.

mod dataset;
#[allow(clippy::module_inception)]
mod engine;
mod indexer;
mod resolver;
pub mod scoring;

pub use dataset::{parse_documents, read_documents};
pub use engine::{SearchEngine, VerifyReport};
pub use indexer::Indexer;
pub use resolver::{Candidates, QueryResolver, Resolved, ResolvedIds};
pub use scoring::Ranker;
