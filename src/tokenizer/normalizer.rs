use rust_stemmers::{Algorithm, Stemmer};

use crate::error::Result;

/// Word normalization capability consumed by the index.
///
/// Implementations must be deterministic: the same input word always
/// yields the same lemma, at ingestion and at query time alike.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, word: &str) -> Result<String>;
}

/// Lowercases and reduces words with the English Snowball stemmer
pub struct StemmingNormalizer {
    stemmer: Stemmer,
}

impl StemmingNormalizer {
    pub fn english() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
        }
    }
}

impl Default for StemmingNormalizer {
    fn default() -> Self {
        Self::english()
    }
}

impl Normalizer for StemmingNormalizer {
    fn normalize(&self, word: &str) -> Result<String> {
        let lower = word.trim().to_lowercase();
        Ok(self.stemmer.stem(&lower).into_owned())
    }
}

/// Degraded mode: optional lowercasing, no lemmatization
#[derive(Clone, Debug)]
pub struct PassThroughNormalizer {
    lowercase: bool,
}

impl PassThroughNormalizer {
    pub fn new(lowercase: bool) -> Self {
        Self { lowercase }
    }
}

impl Default for PassThroughNormalizer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Normalizer for PassThroughNormalizer {
    fn normalize(&self, word: &str) -> Result<String> {
        let word = word.trim();
        Ok(if self.lowercase {
            word.to_lowercase()
        } else {
            word.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stemming_normalizer() {
        let n = StemmingNormalizer::english();
        assert_eq!(n.normalize("Running").unwrap(), "run");
        assert_eq!(n.normalize("documents").unwrap(), "document");
        assert_eq!(
            n.normalize("Healthcare").unwrap(),
            n.normalize("healthcare").unwrap()
        );
    }

    #[test]
    fn test_pass_through_normalizer() {
        assert_eq!(PassThroughNormalizer::new(true).normalize(" AI ").unwrap(), "ai");
        assert_eq!(PassThroughNormalizer::new(false).normalize("AI").unwrap(), "AI");
    }
}
