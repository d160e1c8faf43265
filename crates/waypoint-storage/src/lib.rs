//! Waypoint Storage - SQLite persistence for workspaces
//!
//! Four tables mirror the engine's row records: `projects`,
//! `orchestrations`, `nodes` and `links`. A save replaces all of them in one
//! transaction; a load reads them back into a [`Workspace`].
//!
//! [`Workspace`]: waypoint_engine::Workspace

pub mod database;
pub mod error;

pub use database::Database;
pub use error::{Result, StorageError};
