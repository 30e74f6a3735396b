//! 文件操作错误定义
//!
//! 所有错误对当前操作都是终止性的，不做内部重试，也不尝试修复。

use thesolution_core::error::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid file format: {0}")]
    Format(String),

    #[error("Unsupported version: {0}")]
    Version(String),

    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("Checksum mismatch: expected {expected}, computed {actual}")]
    Integrity { expected: String, actual: String },

    #[error("Refusing to save an empty tree")]
    EmptyTree,

    #[error("Unknown node type: {0}")]
    UnknownType(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Duplicate node id: {0}")]
    DuplicateId(String),

    #[error("Cycle detected: {0}")]
    Cycle(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<ModelError> for FileError {
    fn from(error: ModelError) -> Self {
        match error {
            ModelError::Validation(msg) => FileError::Validation(msg),
            ModelError::NotFound(id) => FileError::NotFound(id.to_string()),
            ModelError::DuplicateId(id) => FileError::DuplicateId(id.to_string()),
            ModelError::Cycle { node, parent } => {
                FileError::Cycle(format!("{node} cannot be placed under {parent}"))
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, FileError>;
