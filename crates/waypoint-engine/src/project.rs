//! Project and orchestration bookkeeping
//!
//! Projects group orchestrations by name. Graph data is not stored here: it
//! lives in the [`NodeEditor`](crate::NodeEditor), keyed by orchestration id.

use serde::{Deserialize, Serialize};

use crate::constants::ids::{ORCHESTRATION_ID_SEED, PROJECT_ID_SEED};
use crate::error::{Result, WorkflowError};
use crate::orchestration::OrchestrationId;

/// Unique identifier for a project
pub type ProjectId = i32;

/// A named orchestration. Its graph lives in the editor under `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orchestration {
    pub id: OrchestrationId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    orchestrations: Vec<Orchestration>,
}

impl Project {
    pub fn new(id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            orchestrations: Vec::new(),
        }
    }

    pub fn orchestrations(&self) -> &[Orchestration] {
        &self.orchestrations
    }

    pub fn orchestration(&self, id: OrchestrationId) -> Option<&Orchestration> {
        self.orchestrations.iter().find(|o| o.id == id)
    }

    pub fn orchestration_mut(&mut self, id: OrchestrationId) -> Option<&mut Orchestration> {
        self.orchestrations.iter_mut().find(|o| o.id == id)
    }

    /// Attach an orchestration with a known id
    ///
    /// Ids are allocated by [`ProjectManager`]; use
    /// [`ProjectManager::add_orchestration_with_id`] to keep its allocator in step.
    fn push_orchestration(&mut self, id: OrchestrationId, name: String) {
        self.orchestrations.push(Orchestration { id, name });
    }

    /// Detach an orchestration. Its graph store is untouched.
    pub fn remove_orchestration(&mut self, id: OrchestrationId) -> Option<Orchestration> {
        let index = self.orchestrations.iter().position(|o| o.id == id)?;
        Some(self.orchestrations.remove(index))
    }
}

/// Storage form of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRow {
    pub id: ProjectId,
    pub name: String,
}

/// Storage form of an orchestration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationRow {
    pub id: OrchestrationId,
    pub project_id: ProjectId,
    pub name: String,
}

/// Owns every project and hands out project and orchestration ids
///
/// Orchestration ids come from one counter for all projects, so graph store
/// keys never collide. Ids are never reused.
#[derive(Debug, Clone)]
pub struct ProjectManager {
    projects: Vec<Project>,
    next_project_id: ProjectId,
    next_orchestration_id: OrchestrationId,
}

impl Default for ProjectManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectManager {
    pub fn new() -> Self {
        Self {
            projects: Vec::new(),
            next_project_id: PROJECT_ID_SEED,
            next_orchestration_id: ORCHESTRATION_ID_SEED,
        }
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn project_mut(&mut self, id: ProjectId) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    pub fn add_project(&mut self, name: impl Into<String>) -> ProjectId {
        let id = self.next_project_id;
        self.projects.push(Project::new(id, name));
        self.next_project_id += 1;
        id
    }

    /// Add a project with a known id, as when loading from storage
    pub fn add_project_with_id(&mut self, id: ProjectId, name: impl Into<String>) {
        self.projects.push(Project::new(id, name));
        self.next_project_id = self.next_project_id.max(id + 1);
    }

    /// Remove a project and its orchestrations. Returns the removed project.
    pub fn remove_project(&mut self, id: ProjectId) -> Option<Project> {
        let index = self.projects.iter().position(|p| p.id == id)?;
        Some(self.projects.remove(index))
    }

    /// Add an orchestration to a project with the next free id
    pub fn add_orchestration(
        &mut self,
        project_id: ProjectId,
        name: impl Into<String>,
    ) -> Result<OrchestrationId> {
        let id = self.next_orchestration_id;
        let project = self
            .project_mut(project_id)
            .ok_or(WorkflowError::ProjectNotFound(project_id))?;
        project.push_orchestration(id, name.into());
        self.next_orchestration_id += 1;
        Ok(id)
    }

    /// Add an orchestration with a known id, as when loading from storage
    pub fn add_orchestration_with_id(
        &mut self,
        project_id: ProjectId,
        id: OrchestrationId,
        name: impl Into<String>,
    ) -> Result<()> {
        let project = self
            .project_mut(project_id)
            .ok_or(WorkflowError::ProjectNotFound(project_id))?;
        project.push_orchestration(id, name.into());
        self.next_orchestration_id = self.next_orchestration_id.max(id + 1);
        Ok(())
    }

    /// Find an orchestration and the project that owns it
    pub fn find_orchestration(&self, id: OrchestrationId) -> Option<(&Project, &Orchestration)> {
        self.projects
            .iter()
            .find_map(|p| p.orchestration(id).map(|o| (p, o)))
    }

    pub fn contains_orchestration(&self, id: OrchestrationId) -> bool {
        self.find_orchestration(id).is_some()
    }

    /// Every orchestration id across all projects
    pub fn orchestration_ids(&self) -> Vec<OrchestrationId> {
        self.projects
            .iter()
            .flat_map(|p| p.orchestrations.iter().map(|o| o.id))
            .collect()
    }

    /// Flatten project metadata into rows
    pub fn to_rows(&self) -> (Vec<ProjectRow>, Vec<OrchestrationRow>) {
        let projects = self
            .projects
            .iter()
            .map(|p| ProjectRow {
                id: p.id,
                name: p.name.clone(),
            })
            .collect();
        let orchestrations = self
            .projects
            .iter()
            .flat_map(|p| {
                p.orchestrations.iter().map(move |o| OrchestrationRow {
                    id: o.id,
                    project_id: p.id,
                    name: o.name.clone(),
                })
            })
            .collect();
        (projects, orchestrations)
    }

    /// Rebuild a manager from rows
    ///
    /// Orchestrations whose project is missing are skipped with a warning.
    pub fn from_rows(projects: &[ProjectRow], orchestrations: &[OrchestrationRow]) -> Self {
        let mut manager = Self::new();

        let mut projects: Vec<&ProjectRow> = projects.iter().collect();
        projects.sort_by_key(|row| row.id);
        for row in projects {
            manager.add_project_with_id(row.id, row.name.clone());
        }

        let mut orchestrations: Vec<&OrchestrationRow> = orchestrations.iter().collect();
        orchestrations.sort_by_key(|row| (row.project_id, row.id));
        for row in orchestrations {
            if let Err(e) = manager.add_orchestration_with_id(row.project_id, row.id, row.name.clone()) {
                log::warn!("Skipping orchestration {} '{}': {}", row.id, row.name, e);
            }
        }

        manager
    }
}
