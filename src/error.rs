//! Error types for the insights engine
//!
//! `InsightsError` covers infrastructure failures (database, HTTP, config).
//! The three pipeline errors are recovered locally by the orchestrator and
//! never reach the caller of `get_insights`:
//! - AggregationError: a history read failed, empty history is substituted
//! - AnalysisError: the AI path failed, the heuristic analyzer takes over
//! - PersistError: the cache write failed, the fresh record is still returned

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InsightsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Language-model API returned an error status (never carries the API key).
    #[error("Provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database lock poisoned")]
    Lock,

    #[error("Invalid stored value: {0}")]
    InvalidData(String),
}

impl InsightsError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider { provider: provider.into(), message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, InsightsError>;

/// A history read failed. The aggregator substitutes empty history.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("conversation log read failed: {0}")]
    Conversations(String),

    #[error("calendar read failed: {0}")]
    Calendar(String),
}

/// The AI analyzer could not produce a record. Decoding is all-or-nothing,
/// so every variant means "nothing from this response is trusted".
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no language model configured")]
    Unavailable,

    #[error("language model request timed out")]
    Timeout,

    #[error("language model transport failed: {0}")]
    Transport(String),

    #[error("language model rejected the request: {0}")]
    Provider(String),

    #[error("malformed analysis response: {0}")]
    Malformed(String),

    #[error("incomplete analysis response: {0}")]
    Incomplete(&'static str),
}

impl From<InsightsError> for AnalysisError {
    fn from(err: InsightsError) -> Self {
        match err {
            InsightsError::Network(e) if e.is_timeout() => AnalysisError::Timeout,
            InsightsError::Network(e) => AnalysisError::Transport(e.to_string()),
            InsightsError::Serialization(e) => AnalysisError::Malformed(e.to_string()),
            InsightsError::Provider { provider, message } => {
                AnalysisError::Provider(format!("{}: {}", provider, message))
            }
            other => AnalysisError::Transport(other.to_string()),
        }
    }
}

/// The insights cache could not be read or written.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("insights write failed: {0}")]
    Write(String),

    #[error("insights read failed: {0}")]
    Read(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_map_to_analysis_provider() {
        let err = InsightsError::provider("openai", "Rate limited - too many requests");
        let analysis: AnalysisError = err.into();
        assert!(matches!(analysis, AnalysisError::Provider(ref m) if m.contains("Rate limited")));
    }

    #[test]
    fn json_errors_map_to_malformed() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let analysis: AnalysisError = InsightsError::from(parse_err).into();
        assert!(matches!(analysis, AnalysisError::Malformed(_)));
    }
}
