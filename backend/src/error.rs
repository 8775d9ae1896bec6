//! Error types for runtime operations

use thiserror::Error;

/// Errors raised by runtime management operations
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Cannot reach container engine: {0}")]
    Connection(String),

    #[error("There was an error starting the runtime: {0}")]
    RuntimeStart(String),

    #[error("There was an error pulling the runtime: {0}")]
    Pull(String),

    #[error("Invalid invocation response: {0}")]
    Invocation(String),

    #[error("Invalid runtime metadata: {0}")]
    Metadata(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Container engine error: {0}")]
    Engine(#[from] bollard::errors::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Handler package error: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    /// Whether the engine answered that the container is gone (404) or
    /// already being removed (409)
    pub fn is_already_removed(&self) -> bool {
        matches!(
            self,
            RuntimeError::Engine(bollard::errors::Error::DockerResponseServerError {
                status_code: 404 | 409,
                ..
            })
        )
    }
}
