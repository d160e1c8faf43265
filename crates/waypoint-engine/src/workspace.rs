//! Workspace: projects, graphs and the shared log, as one unit
//!
//! This is what an application loads at start-up, edits, executes, and
//! saves on exit.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};
use crate::events::EventSink;
use crate::log_sink::LogSink;
use crate::orchestration::{
    ExecutionContext, GraphSnapshot, NodeEditor, NodeExecutor, NodeId, OrchestrationId,
    OrchestrationRunner, RunReport,
};
use crate::project::{OrchestrationRow, ProjectManager, ProjectRow};

/// Name of the project created when nothing could be loaded
pub const DEFAULT_PROJECT_NAME: &str = "Default Project";
/// Name of the orchestration created alongside it
pub const DEFAULT_ORCHESTRATION_NAME: &str = "Main Orchestration";

/// Every row a storage backend persists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRows {
    pub projects: Vec<ProjectRow>,
    pub orchestrations: Vec<OrchestrationRow>,
    pub graph: GraphSnapshot,
}

/// Outcome of executing a single selected node
#[derive(Debug)]
pub struct NodeRun {
    pub node_id: NodeId,
    pub success: bool,
    pub context: ExecutionContext,
}

/// Outcome of executing a whole orchestration
#[derive(Debug)]
pub struct OrchestrationRun {
    pub report: RunReport,
    pub context: ExecutionContext,
}

#[derive(Debug)]
pub struct Workspace {
    projects: ProjectManager,
    editor: NodeEditor,
    log_sink: Arc<LogSink>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(Arc::new(LogSink::new()))
    }
}

impl Workspace {
    /// Empty workspace with a headless editor
    pub fn new(log_sink: Arc<LogSink>) -> Self {
        Self::with_editor(NodeEditor::headless(), log_sink)
    }

    pub fn with_editor(editor: NodeEditor, log_sink: Arc<LogSink>) -> Self {
        Self {
            projects: ProjectManager::new(),
            editor,
            log_sink,
        }
    }

    /// Workspace with one default project holding one empty orchestration
    pub fn bootstrap(log_sink: Arc<LogSink>) -> Self {
        let mut workspace = Self::new(log_sink);
        let project_id = workspace.projects.add_project(DEFAULT_PROJECT_NAME);
        if let Ok(orchestration_id) = workspace
            .projects
            .add_orchestration(project_id, DEFAULT_ORCHESTRATION_NAME)
        {
            workspace.editor.orchestration_data(orchestration_id);
        }
        log::info!("Bootstrapped workspace with '{}'", DEFAULT_PROJECT_NAME);
        workspace
    }

    /// Rebuild a workspace from stored rows
    pub fn from_rows(rows: &WorkspaceRows, log_sink: Arc<LogSink>) -> Self {
        Self::from_rows_with_editor(rows, NodeEditor::headless(), log_sink)
    }

    /// Rebuild a workspace from stored rows into an editor on a given surface
    pub fn from_rows_with_editor(
        rows: &WorkspaceRows,
        editor: NodeEditor,
        log_sink: Arc<LogSink>,
    ) -> Self {
        let mut workspace = Self::with_editor(editor, log_sink);
        workspace.projects = ProjectManager::from_rows(&rows.projects, &rows.orchestrations);
        workspace.editor.restore(&rows.graph);
        workspace
    }

    /// Flatten the workspace into rows for storage
    ///
    /// Live positions of the active orchestration are committed first. Graph
    /// stores of orchestrations that no project owns any more are left out.
    pub fn to_rows(&mut self) -> WorkspaceRows {
        self.editor.commit_positions();

        let (projects, orchestrations) = self.projects.to_rows();
        let mut graph = self.editor.flatten();

        let known = &self.projects;
        let before = (graph.nodes.len(), graph.links.len());
        graph
            .nodes
            .retain(|row| known.contains_orchestration(row.orchestration_id));
        graph
            .links
            .retain(|row| known.contains_orchestration(row.orchestration_id));
        let dropped = before.0 - graph.nodes.len() + before.1 - graph.links.len();
        if dropped > 0 {
            log::warn!("Not saving {} rows of orchestrations with no project", dropped);
        }

        WorkspaceRows {
            projects,
            orchestrations,
            graph,
        }
    }

    pub fn projects(&self) -> &ProjectManager {
        &self.projects
    }

    pub fn projects_mut(&mut self) -> &mut ProjectManager {
        &mut self.projects
    }

    pub fn editor(&self) -> &NodeEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut NodeEditor {
        &mut self.editor
    }

    pub fn log_sink(&self) -> &Arc<LogSink> {
        &self.log_sink
    }

    pub fn is_empty(&self) -> bool {
        self.projects.projects().is_empty()
    }

    /// Fresh execution context wired to the shared log sink
    pub fn new_context(&self) -> ExecutionContext {
        ExecutionContext::with_sink(Arc::clone(&self.log_sink))
    }

    /// Delete an orchestration and its graph
    pub fn remove_orchestration(&mut self, id: OrchestrationId) -> Result<()> {
        let project_id = self
            .projects
            .find_orchestration(id)
            .map(|(project, _)| project.id)
            .ok_or(WorkflowError::OrchestrationNotFound(id))?;
        if let Some(project) = self.projects.project_mut(project_id) {
            project.remove_orchestration(id);
        }
        self.editor.remove_orchestration_data(id);
        Ok(())
    }

    /// Run a whole orchestration with a fresh context
    pub async fn execute(
        &mut self,
        orchestration_id: OrchestrationId,
        runner: &OrchestrationRunner,
        event_sink: &dyn EventSink,
    ) -> Result<OrchestrationRun> {
        if !self.projects.contains_orchestration(orchestration_id)
            && !self.editor.contains(orchestration_id)
        {
            return Err(WorkflowError::OrchestrationNotFound(orchestration_id));
        }

        let mut context = self.new_context();
        let data = self.editor.orchestration_data(orchestration_id);
        let report = runner.run(orchestration_id, data, &mut context, event_sink).await;
        Ok(OrchestrationRun { report, context })
    }

    /// Execute the first selected node on its own, ignoring links
    ///
    /// Returns `Ok(None)` when nothing is selected.
    pub async fn execute_selected(
        &mut self,
        orchestration_id: OrchestrationId,
        executor: &NodeExecutor,
    ) -> Result<Option<NodeRun>> {
        let node_id = match self.editor.surface().selected_nodes().first() {
            Some(id) => *id,
            None => return Ok(None),
        };

        let node = self
            .editor
            .get(orchestration_id)
            .ok_or(WorkflowError::OrchestrationNotFound(orchestration_id))?
            .node(node_id)
            .ok_or(WorkflowError::NodeNotFound(node_id))?;

        let mut context = self.new_context();
        match executor.execute(node, &mut context).await {
            Ok(success) => Ok(Some(NodeRun {
                node_id,
                success,
                context,
            })),
            Err(e) => {
                context.log(format!("ERROR: {}", e));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullEventSink;
    use crate::http::{HttpClient, HttpRequest, HttpResponse};
    use crate::orchestration::{NodeConfig, NodeType, Position};
    use crate::surface::HeadlessSurface;
    use async_trait::async_trait;

    struct NoNetwork;

    #[async_trait]
    impl HttpClient for NoNetwork {
        async fn perform(&self, _request: HttpRequest) -> HttpResponse {
            HttpResponse::transport_error("network disabled")
        }
    }

    fn executor() -> NodeExecutor {
        NodeExecutor::new(Arc::new(NoNetwork))
    }

    #[test]
    fn test_bootstrap() {
        let workspace = Workspace::bootstrap(Arc::new(LogSink::new()));
        let projects = workspace.projects().projects();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, DEFAULT_PROJECT_NAME);
        assert_eq!(projects[0].orchestrations()[0].name, DEFAULT_ORCHESTRATION_NAME);
        assert!(workspace.editor().contains(1000));
    }

    #[tokio::test]
    async fn test_execute_mirrors_to_sink() {
        let sink = Arc::new(LogSink::new());
        let mut workspace = Workspace::bootstrap(Arc::clone(&sink));
        let editor = workspace.editor_mut();
        let start = editor.create_node(1000, NodeType::Start, Position::default());
        let log = editor.create_node(1000, NodeType::Log, Position::default());
        if let Some(NodeConfig::Log { message }) = editor.node_mut(1000, log).map(|n| n.config_mut()) {
            *message = "hi".to_string();
        }
        editor.create_link(1000, start + 1, log + 1);

        let runner = OrchestrationRunner::new(executor());
        let run = workspace.execute(1000, &runner, &NullEventSink).await.unwrap();
        assert!(run.report.success());
        assert!(run.context.execution_log().contains("LOG: hi"));
        assert!(sink.snapshot().iter().any(|l| l == "[EXEC] LOG: hi"));
    }

    #[tokio::test]
    async fn test_execute_unknown_orchestration() {
        let mut workspace = Workspace::bootstrap(Arc::new(LogSink::new()));
        let runner = OrchestrationRunner::new(executor());
        let err = workspace.execute(4242, &runner, &NullEventSink).await.unwrap_err();
        assert!(matches!(err, WorkflowError::OrchestrationNotFound(4242)));
    }

    #[tokio::test]
    async fn test_execute_selected_runs_first_selected() {
        let mut surface = HeadlessSurface::new();
        surface.select_nodes([11, 1]);
        let mut workspace =
            Workspace::with_editor(NodeEditor::new(Box::new(surface)), Arc::new(LogSink::new()));
        let editor = workspace.editor_mut();
        editor.create_node(1000, NodeType::Start, Position::default());
        editor.create_node(1000, NodeType::HttpGet, Position::default());

        let run = workspace
            .execute_selected(1000, &executor())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(run.node_id, 11);
        assert!(!run.success);
        assert!(run.context.execution_log().contains("ERROR: network disabled"));
    }

    #[tokio::test]
    async fn test_execute_selected_without_selection() {
        let mut workspace = Workspace::bootstrap(Arc::new(LogSink::new()));
        assert!(workspace
            .execute_selected(1000, &executor())
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_rows_skip_removed_orchestrations() {
        let mut workspace = Workspace::bootstrap(Arc::new(LogSink::new()));
        let project = workspace.projects().projects()[0].id;
        let extra = workspace
            .projects_mut()
            .add_orchestration(project, "Extra")
            .unwrap();
        workspace
            .editor_mut()
            .create_node(extra, NodeType::Start, Position::default());
        // A graph store with no orchestration behind it
        workspace
            .editor_mut()
            .create_node(9999, NodeType::Log, Position::default());

        let rows = workspace.to_rows();
        assert_eq!(rows.graph.nodes.len(), 1);
        assert_eq!(rows.graph.nodes[0].orchestration_id, extra);

        workspace.remove_orchestration(extra).unwrap();
        assert!(workspace.to_rows().graph.nodes.is_empty());
        assert!(!workspace.editor().contains(extra));
    }

    #[test]
    fn test_rows_keep_positions_per_orchestration() {
        let mut workspace = Workspace::bootstrap(Arc::new(LogSink::new()));
        let project = workspace.projects().projects()[0].id;
        let second = workspace
            .projects_mut()
            .add_orchestration(project, "Second")
            .unwrap();
        let editor = workspace.editor_mut();
        editor.create_node(1000, NodeType::Start, Position::new(10.0, 20.0));
        editor.create_node(second, NodeType::Start, Position::new(-1.0, -2.0));

        let rows = workspace.to_rows();
        let positions: Vec<(i32, i32, f32, f32)> = rows
            .graph
            .nodes
            .iter()
            .map(|row| (row.orchestration_id, row.id, row.pos_x, row.pos_y))
            .collect();
        assert_eq!(
            positions,
            vec![(1000, 1, 10.0, 20.0), (second, 1, -1.0, -2.0)]
        );

        // A load-then-save cycle keeps them too
        let mut restored = Workspace::from_rows(&rows, Arc::new(LogSink::new()));
        restored.editor_mut().orchestration_data(second);
        assert_eq!(restored.to_rows(), rows);
    }

    #[test]
    fn test_rows_round_trip() {
        let mut workspace = Workspace::bootstrap(Arc::new(LogSink::new()));
        let editor = workspace.editor_mut();
        let start = editor.create_node(1000, NodeType::Start, Position::new(1.0, 2.0));
        let log = editor.create_node(1000, NodeType::Log, Position::new(3.0, 4.0));
        editor.create_link(1000, start + 1, log + 1);

        let rows = workspace.to_rows();
        let mut restored = Workspace::from_rows(&rows, Arc::new(LogSink::new()));
        assert_eq!(restored.to_rows(), rows);
    }
}
