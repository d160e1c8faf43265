//! Orchestration graphs and their execution
//!
//! An orchestration is a graph of typed nodes joined by links between pins:
//! - **Graph store**: nodes, links and id allocators for one orchestration
//! - **Node executor**: the side effect of a single node
//! - **Runner**: walks the chain from the Start node, one node at a time
//! - **Persistence rows**: the flat form a storage backend reads and writes
//!
//! # Node Types
//!
//! - **Start**: entry point (exactly one per runnable graph)
//! - **HTTP_GET / HTTP_POST / HTTP_PUT / HTTP_DELETE**: issue a request and
//!   keep the response
//! - **SET_VARIABLE / GET_VARIABLE**: bind and read workflow variables
//! - **DELAY**: wait for a number of milliseconds
//! - **LOG**: write a message to the execution log
//! - **JSON_EXTRACT / IF_CONDITION / ASSERT**: editable, not yet executable
//!
//! # Example
//!
//! ```ignore
//! use waypoint_engine::orchestration::{
//!     ExecutionContext, NodeEditor, NodeExecutor, NodeType, OrchestrationRunner, Position,
//! };
//! use waypoint_engine::NullEventSink;
//!
//! let mut editor = NodeEditor::headless();
//! let start = editor.create_node(1000, NodeType::Start, Position::new(0.0, 0.0));
//! let log = editor.create_node(1000, NodeType::Log, Position::new(200.0, 0.0));
//! editor.create_link(1000, start + 1, log + 1);
//!
//! let runner = OrchestrationRunner::new(NodeExecutor::with_reqwest());
//! let mut ctx = ExecutionContext::new();
//! let report = runner
//!     .run(1000, editor.orchestration_data(1000), &mut ctx, &NullEventSink)
//!     .await;
//! ```

pub mod codec;
pub mod context;
pub mod executor;
pub mod nodes;
pub mod persistence;
pub mod store;
pub mod types;

pub use context::{ExecutionContext, VariableValue};
pub use executor::{OrchestrationRunner, RunReport, RunState, Termination};
pub use nodes::NodeExecutor;
pub use persistence::{GraphSnapshot, LinkRow, NodeRow, RestoreSummary};
pub use store::{InteractionSummary, NodeEditor, OrchestrationData};
pub use types::{
    AttributeId, HttpRequestConfig, Link, LinkId, Node, NodeConfig, NodeId, NodeType,
    OrchestrationId, Pin, PinDirection, Position,
};
