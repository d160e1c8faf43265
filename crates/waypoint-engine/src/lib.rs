//! Waypoint Engine - workflow graphs for HTTP/API test sequences
//!
//! This crate owns the engineering core of the Waypoint editor:
//!
//! - The node/link data model with attribute ids derived from node ids
//! - Per-orchestration graph stores with their id allocators
//! - The node executor (HTTP requests, variables, delays, logging)
//! - The orchestration runner that walks a chain from its Start node
//! - Flat row records used to persist graphs and project metadata
//!
//! Rendering is not part of this crate. The editor talks to the drawing
//! surface only through [`CanvasSurface`], which the headless
//! [`HeadlessSurface`] implements for the CLI and tests.
//!
//! # Example
//!
//! ```ignore
//! use waypoint_engine::{NodeEditor, NodeType, Position};
//!
//! let mut editor = NodeEditor::headless();
//! let start = editor.create_node(1000, NodeType::Start, Position::new(0.0, 0.0));
//! let log = editor.create_node(1000, NodeType::Log, Position::new(200.0, 0.0));
//! editor.create_link(1000, start + 1, log + 1);
//! ```

pub mod constants;
pub mod error;
pub mod events;
pub mod http;
pub mod log_sink;
pub mod orchestration;
pub mod project;
pub mod surface;
pub mod workspace;

pub use error::{ConfigurationError, Result, WorkflowError};
pub use events::{EventSink, NullEventSink, RunEvent, VecEventSink};
pub use http::{parse_headers, HttpClient, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use log_sink::{LogLevel, LogSink};
pub use orchestration::{
    AttributeId, ExecutionContext, GraphSnapshot, HttpRequestConfig, InteractionSummary, Link,
    LinkId, LinkRow, Node, NodeConfig, NodeEditor, NodeExecutor, NodeId, NodeRow, NodeType,
    OrchestrationData, OrchestrationId, OrchestrationRunner, Pin, PinDirection, Position,
    RestoreSummary, RunReport, RunState, Termination, VariableValue,
};
pub use project::{Orchestration, OrchestrationRow, Project, ProjectId, ProjectManager, ProjectRow};
pub use surface::{CanvasSurface, HeadlessSurface};
pub use workspace::{NodeRun, OrchestrationRun, Workspace, WorkspaceRows};
