//! 对象模型错误定义

use crate::node::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Node not found: {0}")]
    NotFound(NodeId),

    #[error("Duplicate node id: {0}")]
    DuplicateId(NodeId),

    #[error("Attaching {node} under {parent} would create a cycle")]
    Cycle { node: NodeId, parent: NodeId },
}

pub type Result<T> = std::result::Result<T, ModelError>;
