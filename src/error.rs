use thiserror::Error;

/// Main error type for BoltSearch operations
#[derive(Error, Debug)]
pub enum BoltError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Posting barrel ranges are not contiguous: {previous} is followed by {next}")]
    RangeGap { previous: String, next: String },

    #[error("Barrel {barrel} I/O error: {source}")]
    BarrelIo {
        barrel: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Barrel {barrel} CSV error: {source}")]
    Csv {
        barrel: String,
        #[source]
        source: csv::Error,
    },

    #[error("Barrel {barrel} schema mismatch: expected header {expected:?}, found {found:?}")]
    SchemaMismatch {
        barrel: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Query is empty after normalization")]
    EmptyQuery,

    #[error("No posting barrel covers token {0}")]
    NotFound(u64),

    #[error("Normalizer error: {0}")]
    Normalizer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for BoltSearch operations
pub type Result<T> = std::result::Result<T, BoltError>;

impl BoltError {
    pub fn barrel_io(barrel: impl Into<String>, source: std::io::Error) -> Self {
        BoltError::BarrelIo {
            barrel: barrel.into(),
            source,
        }
    }

    pub fn csv(barrel: impl Into<String>, source: csv::Error) -> Self {
        BoltError::Csv {
            barrel: barrel.into(),
            source,
        }
    }

    /// Check if this error indicates a transient failure that could be retried
    pub fn is_retriable(&self) -> bool {
        matches!(self, BoltError::BarrelIo { .. })
    }

    /// Integrity errors halt the affected operation and must reach the operator.
    pub fn is_integrity_error(&self) -> bool {
        matches!(self, BoltError::RangeGap { .. })
    }

    /// Name of the barrel this error belongs to, if any
    pub fn barrel(&self) -> Option<&str> {
        match self {
            BoltError::BarrelIo { barrel, .. }
            | BoltError::Csv { barrel, .. }
            | BoltError::SchemaMismatch { barrel, .. } => Some(barrel),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BoltError::NotFound(42);
        assert_eq!(err.to_string(), "No posting barrel covers token 42");

        let err = BoltError::RangeGap {
            previous: "0-3999".to_string(),
            next: "5000-8999".to_string(),
        };
        assert!(err.to_string().contains("0-3999 is followed by 5000-8999"));
    }

    #[test]
    fn test_retriable_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert!(BoltError::barrel_io("0-3999.csv", io).is_retriable());
        assert!(!BoltError::EmptyQuery.is_retriable());
        assert!(!BoltError::InvalidToken(String::new()).is_retriable());
    }

    #[test]
    fn test_barrel_name() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = BoltError::barrel_io("barrel_0_to_3999.csv", io);
        assert_eq!(err.barrel(), Some("barrel_0_to_3999.csv"));
        assert_eq!(BoltError::EmptyQuery.barrel(), None);
        assert!(BoltError::RangeGap {
            previous: "a".into(),
            next: "b".into()
        }
        .is_integrity_error());
    }
}
