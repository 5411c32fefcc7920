//! Schema Registry Error Types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchemaLoadError>;

/// Failure to build a registry from a schema source.
///
/// Loading is all-or-nothing: any of these leaves the caller with no
/// candidates at all rather than a partially populated registry.
#[derive(Error, Debug)]
pub enum SchemaLoadError {
    #[error("Schema source not found: {0}")]
    SourceNotFound(String),

    #[error("Failed to compile schema: {0}")]
    CompileError(String),

    #[error("Invalid descriptor set: {0}")]
    InvalidDescriptor(String),

    #[error("Message type not found in schema: {0}")]
    MessageTypeNotFound(String),

    #[error("Duplicate candidate name: {0}")]
    DuplicateName(String),

    #[error("No message types configured")]
    NoMessageTypes,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A single candidate's failure to interpret a payload.
///
/// Never leaves the decode cascade; the next candidate is tried instead.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Wire format error: {0}")]
    WireFormat(String),

    #[error("Rendering error: {0}")]
    Render(String),
}

impl From<prost::DecodeError> for DecodeError {
    fn from(e: prost::DecodeError) -> Self {
        DecodeError::WireFormat(e.to_string())
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Render(e.to_string())
    }
}
