//! Text normalization, field tokenization, and token identification.

mod normalizer;
mod token_id;
#[allow(clippy::module_inception)]
mod tokenizer;

pub use normalizer::{Normalizer, PassThroughNormalizer, StemmingNormalizer};
pub use token_id::{identify, token_id};
pub use tokenizer::Tokenizer;
