use thiserror::Error;

/// Top-level error type for Scholar.
///
/// Subsystem crates define their own error types and convert from
/// `ScholarError` where a core failure crosses into their domain.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScholarError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Knowledge error: {0}")]
    Knowledge(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ScholarError {
    fn from(err: toml::de::Error) -> Self {
        ScholarError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ScholarError {
    fn from(err: toml::ser::Error) -> Self {
        ScholarError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ScholarError {
    fn from(err: serde_json::Error) -> Self {
        ScholarError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Scholar operations.
pub type Result<T> = std::result::Result<T, ScholarError>;
