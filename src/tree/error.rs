//! Tree error types.

use super::branch::Branch;

/// Errors from component tree operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("component tree branch {0} is frozen and cannot be modified")]
    Frozen(Branch),

    #[error("component with ID {0} already exists")]
    DuplicateId(String),

    #[error("component tree branch {0} does not exist")]
    BranchNotFound(Branch),

    #[error("component with ID '{0}' is builder-managed and cannot be removed by app")]
    Protected(String),

    #[error("failed to delete component with ID {0}: no such component")]
    ComponentNotFound(String),

    #[error("component tree must have at least one branch")]
    EmptyTree,

    #[error("invalid component '{id}': {reason}")]
    InvalidComponent { id: String, reason: String },

    #[error("parent chain of component {0} contains a cycle")]
    ParentCycle(String),

    #[error("failed to serialise component: {0}")]
    Serialise(#[from] serde_json::Error),
}

pub type TreeResult<T> = Result<T, TreeError>;
