//! Error types for the capture engine

use thiserror::Error;

/// Result type alias for engine and driver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, scripting or exporting a page
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to initialize the renderer
    #[error("Engine initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load a URL
    #[error("Failed to load URL: {0}")]
    LoadError(String),

    /// Failed to execute JavaScript
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// Failed to encode or write the output image
    #[error("Export failed: {0}")]
    ExportError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// The wait was cancelled through a `CancellationToken`
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<png::EncodingError> for Error {
    fn from(err: png::EncodingError) -> Self {
        Error::ExportError(err.to_string())
    }
}

impl From<boa_engine::JsError> for Error {
    fn from(err: boa_engine::JsError) -> Self {
        Error::ScriptError(format!("Script thrown: {}", err))
    }
}
