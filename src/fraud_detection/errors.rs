//! Scoring error types
//!
//! Every failure path of the scoring core is a variant here, so callers can
//! match on it instead of parsing messages.

use thiserror::Error;

/// Scoring error type
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Too few training rows to fit the anomaly model
    #[error("Insufficient data: need at least {required} messages to train, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Inference attempted before any successful fit
    #[error("Anomaly model is not trained")]
    NotTrained,

    /// Feature columns disagree with the schema frozen at fit time
    #[error("Feature schema mismatch: expected [{}], got [{}]", .expected.join(", "), .actual.join(", "))]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Invalid configuration or model parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Scoring result type
pub type Result<T> = std::result::Result<T, ScoringError>;

impl From<serde_json::Error> for ScoringError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl ScoringError {
    /// Whether the caller can fix the condition by supplying more data
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }

    /// Whether the error reflects a broken setup that must not be retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SchemaMismatch { .. } | Self::Configuration(_))
    }

    /// Stable machine-readable kind, for API layers that serialize errors
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientData { .. } => "insufficient_data",
            Self::NotTrained => "not_trained",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::Configuration(_) => "configuration",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScoringError::InsufficientData { required: 10, actual: 3 };
        assert_eq!(
            err.to_string(),
            "Insufficient data: need at least 10 messages to train, got 3"
        );
        assert_eq!(ScoringError::NotTrained.to_string(), "Anomaly model is not trained");
    }

    #[test]
    fn test_error_classification() {
        let recoverable = ScoringError::InsufficientData { required: 10, actual: 1 };
        assert!(recoverable.is_recoverable());
        assert!(!recoverable.is_fatal());

        let fatal = ScoringError::SchemaMismatch {
            expected: vec!["a".to_string()],
            actual: vec!["b".to_string()],
        };
        assert!(fatal.is_fatal());
        assert!(!fatal.is_recoverable());
        assert!(fatal.to_string().contains("expected [a]"));

        assert!(!ScoringError::NotTrained.is_fatal());
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(ScoringError::NotTrained.kind(), "not_trained");
        assert_eq!(ScoringError::Configuration("x".into()).kind(), "configuration");
        let io = ScoringError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.kind(), "io");
    }
}
