use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BoltError, Result};

/// Default width of both forward and posting barrels
pub const DEFAULT_BARREL_WIDTH: u64 = 4000;

/// Default cap on candidate documents per query
pub const DEFAULT_QUERY_LIMIT: usize = 30;

const FORWARD_DIR: &str = "DocumentBarrels";
const POSTING_DIR: &str = "barrels";

/// Index settings configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub data_dir: PathBuf,
    pub barrel_width: u64,
    pub default_limit: usize,
    pub ingest_workers: usize,
    pub tokenizer: TokenizerConfig,
    pub ranking: RankingWeights,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./dataset"),
            barrel_width: DEFAULT_BARREL_WIDTH,
            default_limit: DEFAULT_QUERY_LIMIT,
            ingest_workers: num_cpus::get(),
            tokenizer: TokenizerConfig::default(),
            ranking: RankingWeights::default(),
        }
    }
}

/// Tokenizer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub lowercase: bool,
    pub stem: bool,
    pub remove_stopwords: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            stem: true,
            remove_stopwords: false,
            min_token_length: 1,
            max_token_length: 64,
        }
    }
}

/// Weights of the three ranking factors
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub title: f64,
    pub score: f64,
    pub date: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            title: 2.0,
            score: 1.0,
            date: 1.0,
        }
    }
}

impl RankingWeights {
    pub fn new(title: f64, score: f64, date: f64) -> Self {
        Self { title, score, date }
    }
}

impl IndexSettings {
    /// Create settings rooted at `data_dir` with all other values defaulted
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_barrel_width(mut self, width: u64) -> Self {
        self.barrel_width = width;
        self
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_ingest_workers(mut self, workers: usize) -> Self {
        self.ingest_workers = workers;
        self
    }

    pub fn with_ranking(mut self, ranking: RankingWeights) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: TokenizerConfig) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Directory holding forward (document) barrels
    pub fn forward_dir(&self) -> PathBuf {
        self.data_dir.join(FORWARD_DIR)
    }

    /// Directory holding posting (inverted) barrels
    pub fn posting_dir(&self) -> PathBuf {
        self.data_dir.join(POSTING_DIR)
    }

    pub fn validate(&self) -> Result<()> {
        if self.barrel_width == 0 {
            return Err(BoltError::InvalidRequest(
                "barrel_width must be greater than zero".to_string(),
            ));
        }
        if self.tokenizer.min_token_length > self.tokenizer.max_token_length {
            return Err(BoltError::InvalidRequest(format!(
                "min_token_length {} exceeds max_token_length {}",
                self.tokenizer.min_token_length, self.tokenizer.max_token_length
            )));
        }
        Ok(())
    }

    /// Load settings from a JSON file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let settings: Self = serde_json::from_slice(&bytes)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
