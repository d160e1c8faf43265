//! Error types for the storage layer

use thiserror::Error;

/// Result type alias using StorageError
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite open, prepare, step or commit failure
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Creating the database directory failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine rejected loaded data
    #[error("Workflow error: {0}")]
    Workflow(#[from] waypoint_engine::WorkflowError),
}
