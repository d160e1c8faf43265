//! Error types for the workflow engine

use thiserror::Error;

use crate::orchestration::{LinkId, NodeId, OrchestrationId};
use crate::project::ProjectId;

/// Result type alias using WorkflowError
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors that can occur in the workflow engine
///
/// Execution failures of a node (transport errors, missing variables) are not
/// errors at this level: the executor reports them as an unsuccessful outcome
/// and a log line.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Invalid node or graph configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// No graph store or metadata exists for the orchestration
    #[error("Orchestration not found: {0}")]
    OrchestrationNotFound(OrchestrationId),

    /// No node with the given id exists in the orchestration
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// No project with the given id exists
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration problems detected while building or running a graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The type tag does not name a known node type
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    /// A DELAY node's delay text is not a non-negative integer
    #[error("node {node_id}: delay '{value}' is not a valid number of milliseconds")]
    InvalidDelay { node_id: NodeId, value: String },

    /// A node with this id already exists in the orchestration
    #[error("node id {0} is already in use")]
    DuplicateNodeId(NodeId),

    /// A link with this id already exists in the orchestration
    #[error("link id {0} is already in use")]
    DuplicateLinkId(LinkId),

    /// A node id too large to derive its attribute ids from
    #[error("node id {0} is out of range")]
    NodeIdOutOfRange(NodeId),

    /// A link id too large to advance the link allocator past
    #[error("link id {0} is out of range")]
    LinkIdOutOfRange(LinkId),
}

impl WorkflowError {
    /// Check whether this error is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
