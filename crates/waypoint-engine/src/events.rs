//! Event types for streaming run progress
//!
//! Events are sent from the runner to any consumer (CLI, UI, tests) to report
//! which nodes ran and how a run ended. They complement the text log rather
//! than replace it.

use serde::{Deserialize, Serialize};

use crate::orchestration::{NodeId, OrchestrationId};

/// Trait for sending run events
///
/// A sink that cannot deliver an event reports an error; the runner ignores it.
pub trait EventSink: Send + Sync {
    fn send(&self, event: RunEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted while an orchestration runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunEvent {
    #[serde(rename_all = "camelCase")]
    RunStarted {
        orchestration_id: OrchestrationId,
        execution_id: String,
    },

    #[serde(rename_all = "camelCase")]
    NodeStarted {
        orchestration_id: OrchestrationId,
        execution_id: String,
        node_id: NodeId,
        node_type: String,
    },

    #[serde(rename_all = "camelCase")]
    NodeCompleted {
        orchestration_id: OrchestrationId,
        execution_id: String,
        node_id: NodeId,
    },

    #[serde(rename_all = "camelCase")]
    NodeFailed {
        orchestration_id: OrchestrationId,
        execution_id: String,
        node_id: NodeId,
        error: String,
    },

    /// Run reached a terminal state without a node failure
    #[serde(rename_all = "camelCase")]
    RunCompleted {
        orchestration_id: OrchestrationId,
        execution_id: String,
        nodes_executed: usize,
        reason: String,
    },

    #[serde(rename_all = "camelCase")]
    RunFailed {
        orchestration_id: OrchestrationId,
        execution_id: String,
        error: String,
    },
}

impl RunEvent {
    /// Execution id carried by every event
    pub fn execution_id(&self) -> &str {
        match self {
            RunEvent::RunStarted { execution_id, .. }
            | RunEvent::NodeStarted { execution_id, .. }
            | RunEvent::NodeCompleted { execution_id, .. }
            | RunEvent::NodeFailed { execution_id, .. }
            | RunEvent::RunCompleted { execution_id, .. }
            | RunEvent::RunFailed { execution_id, .. } => execution_id,
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: RunEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: parking_lot::Mutex<Vec<RunEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: RunEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}
