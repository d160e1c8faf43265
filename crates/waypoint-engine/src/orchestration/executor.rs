//! Orchestration runner
//!
//! Walks a graph store as a single chain: from the Start node, follow the
//! first link leaving the current frontier pin, execute the node it lands on,
//! and continue from that node's last pin. Branch pins are never followed.

use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::context::ExecutionContext;
use super::nodes::NodeExecutor;
use super::store::OrchestrationData;
use super::types::{AttributeId, Node, NodeId, OrchestrationId};
use crate::constants::traversal::MAX_ITERATIONS;
use crate::events::{EventSink, RunEvent};

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// No link leaves the frontier pin
    EndOfChain,
    /// A link leaves the frontier but no unexecuted node owns its end
    BrokenChain { attribute: AttributeId },
    /// The step cap was reached
    IterationCap,
    /// A node reported an action failure
    NodeFailed { node_id: NodeId },
    /// A node's configuration could not be executed
    ConfigurationError { node_id: NodeId, message: String },
    /// The graph has no Start node
    MissingStart,
    /// The graph has more than one Start node
    MultipleStarts(usize),
}

impl Termination {
    /// Terminal state this termination maps to
    ///
    /// A broken chain and the iteration cap end the run normally.
    pub fn state(&self) -> RunState {
        match self {
            Termination::EndOfChain
            | Termination::BrokenChain { .. }
            | Termination::IterationCap => RunState::Completed,
            Termination::NodeFailed { .. }
            | Termination::ConfigurationError { .. }
            | Termination::MissingStart
            | Termination::MultipleStarts(_) => RunState::Failed,
        }
    }
}

/// Result of running an orchestration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub orchestration_id: OrchestrationId,
    pub execution_id: String,
    pub state: RunState,
    pub termination: Termination,
    /// Node ids in execution order
    pub executed: Vec<NodeId>,
    pub execution_time_ms: u64,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.state == RunState::Completed
    }
}

/// Runs orchestration graphs with a [`NodeExecutor`]
#[derive(Debug, Clone)]
pub struct OrchestrationRunner {
    executor: NodeExecutor,
    /// Maximum link-following steps after the Start node
    max_iterations: usize,
}

impl OrchestrationRunner {
    pub fn new(executor: NodeExecutor) -> Self {
        Self {
            executor,
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Set the step cap
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn executor(&self) -> &NodeExecutor {
        &self.executor
    }

    /// Run an orchestration to a terminal state
    ///
    /// The graph is borrowed for the whole run, so it cannot change under it.
    /// Everything that happens is logged to `ctx`; the report summarises it.
    pub async fn run(
        &self,
        orchestration_id: OrchestrationId,
        data: &OrchestrationData,
        ctx: &mut ExecutionContext,
        event_sink: &dyn EventSink,
    ) -> RunReport {
        let start_time = Instant::now();
        let mut run = Run {
            orchestration_id,
            execution_id: format!("run-{}", uuid::Uuid::new_v4()),
            executed: Vec::new(),
            event_sink,
        };

        let termination = self.walk(data, ctx, &mut run).await;
        run.finish(termination, ctx, start_time.elapsed().as_millis() as u64)
    }

    async fn walk(
        &self,
        data: &OrchestrationData,
        ctx: &mut ExecutionContext,
        run: &mut Run<'_>,
    ) -> Termination {
        let starts = data.start_nodes();
        let start = match starts.as_slice() {
            [start] => *start,
            [] => {
                ctx.log("ERROR: No Start node found");
                return Termination::MissingStart;
            }
            many => {
                ctx.log(format!(
                    "ERROR: Found {} Start nodes, expected exactly one",
                    many.len()
                ));
                return Termination::MultipleStarts(many.len());
            }
        };

        run.emit_started();

        if let Some(stop) = self.step(start, ctx, run).await {
            return stop;
        }

        let mut visited: HashSet<NodeId> = HashSet::from([start.id()]);
        let mut frontier = match start.next_attribute() {
            Some(attribute) => attribute,
            None => return Termination::EndOfChain,
        };

        for _ in 0..self.max_iterations {
            let link = match data.links().iter().find(|l| l.start_attr == frontier) {
                Some(link) => link,
                None => return Termination::EndOfChain,
            };

            let next = data
                .nodes()
                .iter()
                .find(|n| !visited.contains(&n.id()) && n.owns_attribute(link.end_attr));
            let node = match next {
                Some(node) => node,
                None => {
                    ctx.log(format!(
                        "WARNING: No unexecuted node owns attribute {}, stopping",
                        link.end_attr
                    ));
                    return Termination::BrokenChain {
                        attribute: link.end_attr,
                    };
                }
            };

            if let Some(stop) = self.step(node, ctx, run).await {
                return stop;
            }

            visited.insert(node.id());
            frontier = match node.next_attribute() {
                Some(attribute) => attribute,
                None => return Termination::EndOfChain,
            };
        }

        ctx.log(format!(
            "WARNING: Iteration limit ({}) reached, stopping",
            self.max_iterations
        ));
        Termination::IterationCap
    }

    /// Execute one node. Returns a termination if the run must stop here.
    async fn step(
        &self,
        node: &Node,
        ctx: &mut ExecutionContext,
        run: &mut Run<'_>,
    ) -> Option<Termination> {
        run.emit_node_started(node);
        run.executed.push(node.id());

        match self.executor.execute(node, ctx).await {
            Ok(true) => {
                run.emit_node_completed(node.id());
                None
            }
            Ok(false) => {
                run.emit_node_failed(node.id(), "node execution failed");
                Some(Termination::NodeFailed { node_id: node.id() })
            }
            Err(e) => {
                let message = e.to_string();
                ctx.log(format!("ERROR: {}", message));
                run.emit_node_failed(node.id(), &message);
                Some(Termination::ConfigurationError {
                    node_id: node.id(),
                    message,
                })
            }
        }
    }
}

/// Bookkeeping for one run in flight
struct Run<'a> {
    orchestration_id: OrchestrationId,
    execution_id: String,
    executed: Vec<NodeId>,
    event_sink: &'a dyn EventSink,
}

impl Run<'_> {
    fn finish(self, termination: Termination, ctx: &mut ExecutionContext, elapsed: u64) -> RunReport {
        let state = termination.state();
        match state {
            RunState::Completed => {
                ctx.log(format!(
                    "Workflow execution completed ({} nodes)",
                    self.executed.len()
                ));
                let _ = self.event_sink.send(RunEvent::RunCompleted {
                    orchestration_id: self.orchestration_id,
                    execution_id: self.execution_id.clone(),
                    nodes_executed: self.executed.len(),
                    reason: format!("{:?}", termination),
                });
            }
            _ => {
                ctx.log("Workflow execution failed");
                let _ = self.event_sink.send(RunEvent::RunFailed {
                    orchestration_id: self.orchestration_id,
                    execution_id: self.execution_id.clone(),
                    error: format!("{:?}", termination),
                });
            }
        }

        log::debug!(
            "Run {} of orchestration {} ended in {:?} after {}ms",
            self.execution_id,
            self.orchestration_id,
            state,
            elapsed
        );

        RunReport {
            orchestration_id: self.orchestration_id,
            execution_id: self.execution_id,
            state,
            termination,
            executed: self.executed,
            execution_time_ms: elapsed,
        }
    }

    fn emit_started(&self) {
        let _ = self.event_sink.send(RunEvent::RunStarted {
            orchestration_id: self.orchestration_id,
            execution_id: self.execution_id.clone(),
        });
    }

    fn emit_node_started(&self, node: &Node) {
        let _ = self.event_sink.send(RunEvent::NodeStarted {
            orchestration_id: self.orchestration_id,
            execution_id: self.execution_id.clone(),
            node_id: node.id(),
            node_type: node.type_tag().to_string(),
        });
    }

    fn emit_node_completed(&self, node_id: NodeId) {
        let _ = self.event_sink.send(RunEvent::NodeCompleted {
            orchestration_id: self.orchestration_id,
            execution_id: self.execution_id.clone(),
            node_id,
        });
    }

    fn emit_node_failed(&self, node_id: NodeId, error: &str) {
        let _ = self.event_sink.send(RunEvent::NodeFailed {
            orchestration_id: self.orchestration_id,
            execution_id: self.execution_id.clone(),
            node_id,
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NullEventSink, VecEventSink};
    use crate::http::{HttpClient, HttpRequest, HttpResponse};
    use crate::orchestration::{NodeConfig, NodeType, Position};
    use crate::surface::HeadlessSurface;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct OkClient;

    #[async_trait]
    impl HttpClient for OkClient {
        async fn perform(&self, _request: HttpRequest) -> HttpResponse {
            HttpResponse {
                status_code: 200,
                body: "ok".to_string(),
                success: true,
                ..HttpResponse::default()
            }
        }
    }

    fn runner() -> OrchestrationRunner {
        OrchestrationRunner::new(NodeExecutor::new(Arc::new(OkClient)))
    }

    fn log_node(data: &mut OrchestrationData, surface: &mut HeadlessSurface, message: &str) -> NodeId {
        let id = data.create_node(NodeType::Log, Position::default(), surface);
        if let Some(NodeConfig::Log { message: m }) = data.node_mut(id).map(|n| n.config_mut()) {
            *m = message.to_string();
        }
        id
    }

    #[tokio::test]
    async fn test_missing_start_executes_nothing() {
        let mut surface = HeadlessSurface::new();
        let mut data = OrchestrationData::new();
        log_node(&mut data, &mut surface, "never");

        let mut ctx = ExecutionContext::new();
        let report = runner().run(1000, &data, &mut ctx, &NullEventSink).await;

        assert_eq!(report.termination, Termination::MissingStart);
        assert_eq!(report.state, RunState::Failed);
        assert!(report.executed.is_empty());
        assert!(!ctx.execution_log().contains("LOG: never"));
    }

    #[tokio::test]
    async fn test_multiple_starts_is_rejected() {
        let mut surface = HeadlessSurface::new();
        let mut data = OrchestrationData::new();
        data.create_node(NodeType::Start, Position::default(), &mut surface);
        data.create_node(NodeType::Start, Position::default(), &mut surface);

        let mut ctx = ExecutionContext::new();
        let report = runner().run(1000, &data, &mut ctx, &NullEventSink).await;
        assert_eq!(report.termination, Termination::MultipleStarts(2));
        assert!(report.executed.is_empty());
    }

    #[tokio::test]
    async fn test_chain_runs_in_link_order() {
        let mut surface = HeadlessSurface::new();
        let mut data = OrchestrationData::new();
        let start = data.create_node(NodeType::Start, Position::default(), &mut surface); // 1
        let a = log_node(&mut data, &mut surface, "a"); // 11: {12, 13}
        let b = log_node(&mut data, &mut surface, "b"); // 21: {22, 23}
        data.create_link(13, 22);
        data.create_link(2, 12);

        let sink = VecEventSink::new();
        let mut ctx = ExecutionContext::new();
        let report = runner().run(1000, &data, &mut ctx, &sink).await;

        assert!(report.success());
        assert_eq!(report.termination, Termination::EndOfChain);
        assert_eq!(report.executed, vec![start, a, b]);

        let log = ctx.execution_log();
        let a_at = log.find("LOG: a").unwrap();
        let b_at = log.find("LOG: b").unwrap();
        assert!(a_at < b_at);

        let events = sink.events();
        assert!(matches!(events.first(), Some(RunEvent::RunStarted { .. })));
        assert!(matches!(events.last(), Some(RunEvent::RunCompleted { nodes_executed: 3, .. })));
    }

    #[tokio::test]
    async fn test_first_link_wins() {
        let mut surface = HeadlessSurface::new();
        let mut data = OrchestrationData::new();
        data.create_node(NodeType::Start, Position::default(), &mut surface);
        let a = log_node(&mut data, &mut surface, "a");
        log_node(&mut data, &mut surface, "b");
        data.create_link(2, 12);
        data.create_link(2, 22);

        let mut ctx = ExecutionContext::new();
        let report = runner().run(1000, &data, &mut ctx, &NullEventSink).await;
        assert_eq!(report.executed, vec![1, a]);
        assert!(!ctx.execution_log().contains("LOG: b"));
    }

    #[tokio::test]
    async fn test_broken_chain_completes() {
        let mut surface = HeadlessSurface::new();
        let mut data = OrchestrationData::new();
        data.create_node(NodeType::Start, Position::default(), &mut surface);
        data.create_link(2, 555);

        let mut ctx = ExecutionContext::new();
        let report = runner().run(1000, &data, &mut ctx, &NullEventSink).await;
        assert!(report.success());
        assert_eq!(report.termination, Termination::BrokenChain { attribute: 555 });
    }

    #[tokio::test]
    async fn test_cycle_stops_at_visited_node() {
        let mut surface = HeadlessSurface::new();
        let mut data = OrchestrationData::new();
        data.create_node(NodeType::Start, Position::default(), &mut surface);
        log_node(&mut data, &mut surface, "a"); // 11
        log_node(&mut data, &mut surface, "b"); // 21
        data.create_link(2, 12);
        data.create_link(13, 22);
        data.create_link(23, 12); // back to a

        let mut ctx = ExecutionContext::new();
        let report = runner().run(1000, &data, &mut ctx, &NullEventSink).await;
        assert_eq!(report.executed, vec![1, 11, 21]);
        assert_eq!(report.termination, Termination::BrokenChain { attribute: 12 });
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let mut surface = HeadlessSurface::new();
        let mut data = OrchestrationData::new();
        data.create_node(NodeType::Start, Position::default(), &mut surface);
        let mut previous_next = 2;
        for i in 0..5 {
            let id = log_node(&mut data, &mut surface, &format!("n{i}"));
            data.create_link(previous_next, id + 1);
            previous_next = id + 2;
        }

        let mut ctx = ExecutionContext::new();
        let report = runner()
            .with_max_iterations(3)
            .run(1000, &data, &mut ctx, &NullEventSink)
            .await;
        assert_eq!(report.termination, Termination::IterationCap);
        assert_eq!(report.executed.len(), 4);
        assert!(report.success());
    }

    #[tokio::test]
    async fn test_configuration_error_fails_run() {
        let mut surface = HeadlessSurface::new();
        let mut data = OrchestrationData::new();
        data.create_node(NodeType::Start, Position::default(), &mut surface);
        let delay = data.create_node(NodeType::Delay, Position::default(), &mut surface);
        if let Some(NodeConfig::Delay { delay_ms }) = data.node_mut(delay).map(|n| n.config_mut()) {
            *delay_ms = "soon".to_string();
        }
        let after = log_node(&mut data, &mut surface, "after");
        data.create_link(2, delay + 1);
        data.create_link(delay + 2, after + 1);

        let mut ctx = ExecutionContext::new();
        let report = runner().run(1000, &data, &mut ctx, &NullEventSink).await;
        assert_eq!(report.state, RunState::Failed);
        assert!(matches!(
            report.termination,
            Termination::ConfigurationError { node_id, .. } if node_id == delay
        ));
        assert!(!ctx.execution_log().contains("LOG: after"));
    }
}
