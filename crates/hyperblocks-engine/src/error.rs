use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the block-tree core.
///
/// Commands either apply as one atomic transaction or return one of these
/// before anything is dispatched.
#[derive(Debug, Error)]
pub enum EngineError {
    /// One or more referenced block IDs are absent from the document.
    #[error("block(s) not found: {}", .0.join(", "))]
    BlockNotFound(Vec<String>),

    #[error("unknown block type: {0}")]
    UnknownBlockType(String),

    #[error("block type {block_type} does not declare prop {prop:?}")]
    UnknownProp { block_type: String, prop: String },

    #[error("value {value:?} is not allowed for prop {prop:?} of block type {block_type}")]
    InvalidPropValue {
        block_type: String,
        prop: String,
        value: String,
    },

    /// An explicit block ID is already in use.
    #[error("block ID already in use: {0}")]
    DuplicateBlockId(String),

    #[error("ID generator produced only colliding IDs after {attempts} attempts")]
    IdGeneratorExhausted { attempts: usize },

    #[error("position {pos} is outside the document (size {size})")]
    InvalidPosition { pos: usize, size: usize },

    /// Internal invariant breach. Not reachable through the public command
    /// surface; seeing this is a bug.
    #[error("document structure violation: {0}")]
    StructureViolation(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn not_found(id: impl Into<String>) -> Self {
        EngineError::BlockNotFound(vec![id.into()])
    }

    pub(crate) fn structure(message: impl Into<String>) -> Self {
        EngineError::StructureViolation(message.into())
    }
}

/// Result type for block-tree operations.
pub type Result<T> = std::result::Result<T, EngineError>;
