pub mod barrel;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod tokenizer;

pub use barrel::{BarrelRange, ForwardBarrelStore, PostingBarrelStore};
pub use config::{IndexSettings, RankingWeights, TokenizerConfig};
pub use engine::{read_documents, Ranker, SearchEngine, VerifyReport};
pub use error::{BoltError, Result};
pub use models::*;
pub use tokenizer::{identify, token_id, Normalizer, Tokenizer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
