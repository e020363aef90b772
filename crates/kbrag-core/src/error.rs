use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Not initialized: {0}")]
    UninitializedState(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Snapshot fingerprint mismatch: expected {expected}, found {found}")]
    PersistenceMismatch { expected: String, found: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Document {path} is not valid UTF-8")]
    Encoding { path: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn uninitialized(what: impl Into<String>) -> Self {
        Self::UninitializedState(what.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_mentions_both_sizes() {
        let err = Error::DimensionMismatch { expected: 1500, actual: 12 };
        let msg = err.to_string();
        assert!(msg.contains("1500"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn bad_regex_becomes_configuration_error() {
        let err: Error = regex::Regex::new("(").unwrap_err().into();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
