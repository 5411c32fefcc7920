//! Error types for the blockhouse connectors.
//!
//! One enum covers both sides of the pipeline. The variants map onto the
//! failure policy of the consumer loop:
//!
//! - `StoreError` is logged and the record dropped.
//! - `SourceConnectionError` stops the loop; the admin surface keeps serving.
//! - Everything else is surfaced to the caller unchanged.

use thiserror::Error;

/// Errors that can occur in sources, sinks and the consumer loop.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The source log could not be reached or subscribed to.
    #[error("Source connection error: {0}")]
    SourceConnectionError(String),

    /// A read or acknowledgment against a connected source failed.
    #[error("Source error: {0}")]
    SourceError(String),

    /// The analytical store rejected or failed a request.
    #[error("Store error: {0}")]
    StoreError(String),

    /// Error in the consumer loop itself.
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl ConnectorError {
    /// Whether this error ends the consumer loop.
    pub fn is_fatal_to_loop(&self) -> bool {
        matches!(
            self,
            ConnectorError::SourceConnectionError(_) | ConnectorError::RuntimeError(_)
        )
    }
}

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;

impl From<serde_json::Error> for ConnectorError {
    fn from(e: serde_json::Error) -> Self {
        ConnectorError::SerializationError(e.to_string())
    }
}
