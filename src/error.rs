//! Error types for the wall engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the wall engine
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to initialize the engine
    #[error("Engine initialization failed: {0}")]
    InitializationError(String),

    /// Failed to fetch a manifest or image list
    #[error("Failed to fetch {0}")]
    FetchError(String),

    /// Malformed manifest or image list
    #[error("Failed to parse {0}")]
    ParseError(String),

    /// Failed to load an image
    #[error("Failed to load image: {0}")]
    LoadError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
