use std::collections::HashSet;
use std::sync::Arc;

use stop_words::{get, LANGUAGE};
use unicode_segmentation::UnicodeSegmentation;

use super::normalizer::{Normalizer, PassThroughNormalizer, StemmingNormalizer};
use crate::config::TokenizerConfig;
use crate::error::{BoltError, Result};

/// Splits field text into normalized, deduplicated words
#[derive(Clone)]
pub struct Tokenizer {
    config: TokenizerConfig,
    normalizer: Arc<dyn Normalizer>,
    stopwords: HashSet<String>,
}

impl Tokenizer {
    /// Create a new tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        let normalizer: Arc<dyn Normalizer> = if config.stem {
            Arc::new(StemmingNormalizer::english())
        } else {
            Arc::new(PassThroughNormalizer::new(config.lowercase))
        };
        Self::with_normalizer(config, normalizer)
    }

    /// Create a tokenizer around an externally supplied normalizer
    pub fn with_normalizer(config: &TokenizerConfig, normalizer: Arc<dyn Normalizer>) -> Self {
        let stopwords = if config.remove_stopwords {
            get(LANGUAGE::English)
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect()
        } else {
            HashSet::new()
        };

        Self {
            config: config.clone(),
            normalizer,
            stopwords,
        }
    }

    pub fn normalizer(&self) -> &Arc<dyn Normalizer> {
        &self.normalizer
    }

    /// Normalize a single query term the way field text is normalized.
    ///
    /// Only the first word survives; no words left is an empty query.
    pub fn normalize_term(&self, term: &str) -> Result<String> {
        self.tokenize(term)?
            .into_iter()
            .next()
            .ok_or(BoltError::EmptyQuery)
    }

    /// Tokenize text into normalized words, keeping first occurrences only.
    ///
    /// A normalizer failure on any word fails the whole field.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for word in text.unicode_words() {
            let lower = if self.config.lowercase {
                word.to_lowercase()
            } else {
                word.to_string()
            };
            let len = lower.chars().count();
            if len < self.config.min_token_length
                || len > self.config.max_token_length
                || self.stopwords.contains(&lower)
            {
                continue;
            }

            let normalized = self.normalizer.normalize(&lower)?;
            if normalized.is_empty() {
                continue;
            }
            if seen.insert(normalized.clone()) {
                out.push(normalized);
            }
        }

        Ok(out)
    }

    /// Tokenize several texts as one field
    pub fn tokenize_all<'a, I>(&self, texts: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let joined: Vec<&str> = texts.into_iter().collect();
        self.tokenize(&joined.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingNormalizer;

    impl Normalizer for FailingNormalizer {
        fn normalize(&self, word: &str) -> Result<String> {
            Err(BoltError::Normalizer(format!("cannot lemmatize {}", word)))
        }
    }

    fn plain() -> TokenizerConfig {
        TokenizerConfig {
            stem: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_tokenize_dedups_preserving_order() {
        let tokenizer = Tokenizer::new(&plain());
        let tokens = tokenizer.tokenize("AI in Healthcare: AI, healthcare & more").unwrap();
        assert_eq!(tokens, vec!["ai", "in", "healthcare", "more"]);
    }

    #[test]
    fn test_stemming_tokenizer() {
        let tokenizer = Tokenizer::new(&TokenizerConfig::default());
        let tokens = tokenizer.tokenize("Learning learned learns").unwrap();
        assert_eq!(tokens, vec!["learn"]);
    }

    #[test]
    fn test_stopword_removal() {
        let config = TokenizerConfig {
            remove_stopwords: true,
            ..plain()
        };
        let tokenizer = Tokenizer::new(&config);
        let tokens = tokenizer.tokenize("the borrow checker of the compiler").unwrap();
        assert!(!tokens.contains(&"the".to_string()));
        assert!(tokens.contains(&"compiler".to_string()));
    }

    #[test]
    fn test_length_bounds() {
        let config = TokenizerConfig {
            min_token_length: 3,
            max_token_length: 5,
            ..plain()
        };
        let tokens = Tokenizer::new(&config).tokenize("ai rust elephant").unwrap();
        assert_eq!(tokens, vec!["rust"]);
    }

    #[test]
    fn test_normalize_term() {
        let tokenizer = Tokenizer::new(&plain());
        assert_eq!(tokenizer.normalize_term("  Rust ").unwrap(), "rust");
        assert_eq!(tokenizer.normalize_term("Rust?").unwrap(), "rust");
        assert_eq!(tokenizer.normalize_term("borrow checker").unwrap(), "borrow");
        assert!(matches!(
            tokenizer.normalize_term("   "),
            Err(BoltError::EmptyQuery)
        ));
        assert!(matches!(
            tokenizer.normalize_term("?!"),
            Err(BoltError::EmptyQuery)
        ));
    }

    #[test]
    fn test_normalize_term_matches_field_tokens() {
        let stemming = Tokenizer::new(&TokenizerConfig::default());
        let fields = stemming.tokenize("What is Rust? Healthcare!").unwrap();
        for word in ["Rust?", "Healthcare", "healthcare!"] {
            let term = stemming.normalize_term(word).unwrap();
            assert!(fields.contains(&term), "{} -> {}", word, term);
        }
    }

    #[test]
    fn test_normalizer_failure_fails_field() {
        let tokenizer = Tokenizer::with_normalizer(&plain(), Arc::new(FailingNormalizer));
        assert!(matches!(
            tokenizer.tokenize("anything"),
            Err(BoltError::Normalizer(_))
        ));
        // Empty text never reaches the normalizer
        assert!(tokenizer.tokenize("").unwrap().is_empty());
    }
}
