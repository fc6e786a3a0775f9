use thiserror::Error;

/// Top-level error type for the Revend workspace.
///
/// Subsystem crates either return this directly or wrap it in their own
/// error type with a `From` impl so `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RevendError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for RevendError {
    fn from(err: toml::de::Error) -> Self {
        RevendError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for RevendError {
    fn from(err: toml::ser::Error) -> Self {
        RevendError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for RevendError {
    fn from(err: serde_json::Error) -> Self {
        RevendError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Revend operations.
pub type Result<T> = std::result::Result<T, RevendError>;
