//! Error types for the flow engine

use thiserror::Error;

use crate::types::{EdgeId, NodeId};

/// Result type alias using FlowEngineError
pub type Result<T> = std::result::Result<T, FlowEngineError>;

/// Errors that can occur in the flow engine
#[derive(Debug, Error)]
pub enum FlowEngineError {
    /// A node referenced by id does not exist
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// An edge referenced by id does not exist
    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeId),

    /// A version number that was never recorded
    #[error("Version not found: {0}")]
    VersionNotFound(u64),

    /// A template id that is not in the catalog
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// User-supplied input was rejected (e.g. empty version summary)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An imported document could not be read as a graph
    #[error("Import failed: {0}")]
    Import(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowEngineError {
    /// Create an invalid input error with a message
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an import error with a message
    pub fn import(msg: impl Into<String>) -> Self {
        Self::Import(msg.into())
    }
}
