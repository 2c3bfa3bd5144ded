//! Error types for the page generator
//!
//! Configuration and font problems are fatal at setup. `EmptyRender` is the one
//! recoverable variant: callers skip the row or cell that produced it.

use thiserror::Error;

/// Custom error type for generator operations
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Font error: {0}")]
    FontError(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("JSON error: {0}")]
    JsonError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Nothing to render: {0:?}")]
    EmptyRender(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

impl GeneratorError {
    /// True for degenerate input that the caller is expected to skip.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GeneratorError::EmptyRender(_))
    }
}

/// Result type alias for generator operations
pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// Helper to convert serde_json errors
impl From<serde_json::Error> for GeneratorError {
    fn from(err: serde_json::Error) -> Self {
        GeneratorError::JsonError(err.to_string())
    }
}

impl From<image::ImageError> for GeneratorError {
    fn from(err: image::ImageError) -> Self {
        GeneratorError::ImageError(err.to_string())
    }
}

impl From<toml::de::Error> for GeneratorError {
    fn from(err: toml::de::Error) -> Self {
        GeneratorError::Config(err.to_string())
    }
}
