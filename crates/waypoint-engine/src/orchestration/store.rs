//! Per-orchestration graph storage
//!
//! [`OrchestrationData`] owns the nodes and links of one orchestration and
//! its two id allocators. [`NodeEditor`] keys graph stores by orchestration id,
//! creating them lazily, and owns the canvas surface they are drawn on.

use std::collections::{BTreeMap, HashSet};

use super::types::{AttributeId, Link, LinkId, Node, NodeId, NodeType, OrchestrationId, Position};
use crate::constants::ids::{LINK_ID_SEED, NODE_ID_SEED, NODE_ID_STEP};
use crate::error::{ConfigurationError, Result, WorkflowError};
use crate::surface::{CanvasSurface, HeadlessSurface};

/// Nodes and links of one orchestration
#[derive(Debug, Clone)]
pub struct OrchestrationData {
    nodes: Vec<Node>,
    links: Vec<Link>,
    next_node_id: NodeId,
    next_link_id: LinkId,
}

impl Default for OrchestrationData {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            next_node_id: NODE_ID_SEED,
            next_link_id: LINK_ID_SEED,
        }
    }
}

impl OrchestrationData {
    /// Create an empty store with allocators at their seeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Links in insertion order
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Id the next auto-allocated node will receive
    pub fn next_node_id(&self) -> NodeId {
        self.next_node_id
    }

    /// Id the next auto-allocated link will receive
    pub fn next_link_id(&self) -> LinkId {
        self.next_link_id
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id() == id)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.iter().find(|l| l.id == id)
    }

    /// Find the first node whose pins include `attribute`
    pub fn node_for_attribute(&self, attribute: AttributeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.owns_attribute(attribute))
    }

    /// All Start nodes, in insertion order
    pub fn start_nodes(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.node_type() == NodeType::Start)
            .collect()
    }

    /// Create a node with the next auto-allocated id
    pub fn create_node(
        &mut self,
        node_type: NodeType,
        position: Position,
        surface: &mut dyn CanvasSurface,
    ) -> NodeId {
        let id = self.next_node_id;
        let mut node = Node::new(id, node_type);
        node.set_position(position, surface);
        self.nodes.push(node);
        self.next_node_id = self.next_node_id.saturating_add(NODE_ID_STEP);
        log::debug!("Created {} node {}", node_type, id);
        id
    }

    /// Create a node from its type tag
    ///
    /// An unknown tag creates nothing and consumes no id.
    pub fn create_node_from_tag(
        &mut self,
        tag: &str,
        position: Position,
        surface: &mut dyn CanvasSurface,
    ) -> Result<NodeId> {
        let node_type: NodeType = tag.parse()?;
        Ok(self.create_node(node_type, position, surface))
    }

    /// Create a node with a caller-supplied id, as when restoring from storage
    ///
    /// The allocator moves past `id` so later auto-allocated ids cannot
    /// collide with it. Ids with no room for their attribute ids are rejected.
    pub fn create_node_with_id(
        &mut self,
        id: NodeId,
        node_type: NodeType,
        position: Position,
        surface: &mut dyn CanvasSurface,
    ) -> Result<&mut Node> {
        if self.node(id).is_some() {
            return Err(ConfigurationError::DuplicateNodeId(id).into());
        }
        let past_id = id
            .checked_add(NODE_ID_STEP)
            .ok_or(ConfigurationError::NodeIdOutOfRange(id))?;

        let mut node = Node::new(id, node_type);
        node.set_position(position, surface);
        self.nodes.push(node);

        if id >= self.next_node_id {
            self.next_node_id = past_id;
        }

        let index = self.nodes.len() - 1;
        Ok(&mut self.nodes[index])
    }

    /// Connect two pins with a new auto-allocated link id
    pub fn create_link(&mut self, start_attr: AttributeId, end_attr: AttributeId) -> LinkId {
        let id = self.next_link_id;
        self.links.push(Link::new(id, start_attr, end_attr));
        self.next_link_id = self.next_link_id.saturating_add(1);
        id
    }

    /// Insert a link with a known id, as when restoring from storage
    pub fn insert_link(&mut self, link: Link) -> Result<()> {
        if self.link(link.id).is_some() {
            return Err(ConfigurationError::DuplicateLinkId(link.id).into());
        }
        let past_id = link
            .id
            .checked_add(1)
            .ok_or(ConfigurationError::LinkIdOutOfRange(link.id))?;

        self.links.push(link);
        if link.id >= self.next_link_id {
            self.next_link_id = past_id;
        }
        Ok(())
    }

    /// Remove a node and every link touching one of its pins
    pub fn delete_node(&mut self, id: NodeId) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n.id() == id)?;
        let node = self.nodes.remove(index);
        let attributes = node.attribute_ids();
        self.links.retain(|l| !l.touches(&attributes));
        Some(node)
    }

    /// Remove a link. Nodes are unaffected.
    pub fn delete_link(&mut self, id: LinkId) -> Option<Link> {
        let index = self.links.iter().position(|l| l.id == id)?;
        Some(self.links.remove(index))
    }

    /// Remove exactly the selected nodes and links in one pass
    ///
    /// Links touching a removed node go with it. Returns the number of nodes
    /// and links removed.
    pub fn delete_selection(&mut self, node_ids: &[NodeId], link_ids: &[LinkId]) -> (usize, usize) {
        let selected_nodes: HashSet<NodeId> = node_ids.iter().copied().collect();
        let selected_links: HashSet<LinkId> = link_ids.iter().copied().collect();

        let removed_attributes: HashSet<AttributeId> = self
            .nodes
            .iter()
            .filter(|n| selected_nodes.contains(&n.id()))
            .flat_map(|n| n.attribute_ids())
            .collect();

        let nodes_before = self.nodes.len();
        let links_before = self.links.len();

        self.nodes.retain(|n| !selected_nodes.contains(&n.id()));
        self.links.retain(|l| {
            !selected_links.contains(&l.id)
                && !removed_attributes.contains(&l.start_attr)
                && !removed_attributes.contains(&l.end_attr)
        });

        (
            nodes_before - self.nodes.len(),
            links_before - self.links.len(),
        )
    }

    /// Push every cached node position to the surface
    pub fn push_positions(&self, surface: &mut dyn CanvasSurface) {
        for node in &self.nodes {
            surface.set_node_position(node.id(), node.position());
        }
    }

    /// Pull live positions from the surface into the node caches
    pub fn commit_positions(&mut self, surface: &dyn CanvasSurface) {
        for node in &mut self.nodes {
            node.commit_position(surface);
        }
    }
}

/// What one call to [`NodeEditor::process_interactions`] changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionSummary {
    pub links_created: usize,
    pub links_removed: usize,
    pub nodes_removed: usize,
}

/// Graph stores keyed by orchestration id, plus the surface they render on
///
/// The surface keys positions by node id alone and node ids repeat across
/// orchestrations, so it only ever holds the positions of the active
/// orchestration: the one last opened with
/// [`orchestration_data`](NodeEditor::orchestration_data).
pub struct NodeEditor {
    graphs: BTreeMap<OrchestrationId, OrchestrationData>,
    surface: Box<dyn CanvasSurface>,
    active: Option<OrchestrationId>,
}

impl std::fmt::Debug for NodeEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeEditor")
            .field("graphs", &self.graphs)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl NodeEditor {
    pub fn new(surface: Box<dyn CanvasSurface>) -> Self {
        Self {
            graphs: BTreeMap::new(),
            surface,
            active: None,
        }
    }

    /// Create an editor drawing on a [`HeadlessSurface`]
    pub fn headless() -> Self {
        Self::new(Box::new(HeadlessSurface::new()))
    }

    pub fn surface(&self) -> &dyn CanvasSurface {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> &mut dyn CanvasSurface {
        self.surface.as_mut()
    }

    /// Open an orchestration on the surface, creating its store on first access
    ///
    /// The orchestration becomes the active one and its cached positions are
    /// pushed to the surface so it redraws where it was left.
    pub fn orchestration_data(&mut self, id: OrchestrationId) -> &mut OrchestrationData {
        self.active = Some(id);
        let surface = self.surface.as_mut();
        let data = self.graphs.entry(id).or_insert_with(|| {
            log::debug!("Created graph store for orchestration {}", id);
            OrchestrationData::new()
        });
        data.push_positions(surface);
        data
    }

    /// Orchestration whose positions the surface currently holds
    pub fn active_orchestration(&self) -> Option<OrchestrationId> {
        self.active
    }

    /// Get or create a graph store without opening it on the surface
    pub(crate) fn store_mut(&mut self, id: OrchestrationId) -> &mut OrchestrationData {
        self.graphs.entry(id).or_default()
    }

    /// Put the active orchestration's positions back on the surface after
    /// another orchestration wrote to it
    fn resync_surface(&mut self, written: OrchestrationId) {
        let active = match self.active {
            Some(active) if active != written => active,
            _ => return,
        };
        if let Some(data) = self.graphs.get(&active) {
            data.push_positions(self.surface.as_mut());
        }
    }

    /// Read a graph store without creating it
    pub fn get(&self, id: OrchestrationId) -> Option<&OrchestrationData> {
        self.graphs.get(&id)
    }

    pub fn contains(&self, id: OrchestrationId) -> bool {
        self.graphs.contains_key(&id)
    }

    /// Orchestration ids with a graph store, ascending
    pub fn orchestration_ids(&self) -> Vec<OrchestrationId> {
        self.graphs.keys().copied().collect()
    }

    /// Iterate graph stores in ascending orchestration id order
    pub fn graphs(&self) -> impl Iterator<Item = (OrchestrationId, &OrchestrationData)> {
        self.graphs.iter().map(|(id, data)| (*id, data))
    }

    /// Drop the graph store of a deleted orchestration
    pub fn remove_orchestration_data(&mut self, id: OrchestrationId) -> Option<OrchestrationData> {
        if self.active == Some(id) {
            self.active = None;
        }
        self.graphs.remove(&id)
    }

    /// Create a node in an orchestration, creating its store if needed
    pub fn create_node(
        &mut self,
        orchestration_id: OrchestrationId,
        node_type: NodeType,
        position: Position,
    ) -> NodeId {
        let surface = self.surface.as_mut();
        let id = self
            .graphs
            .entry(orchestration_id)
            .or_default()
            .create_node(node_type, position, surface);
        self.resync_surface(orchestration_id);
        id
    }

    /// Create a node from a type tag; see [`OrchestrationData::create_node_from_tag`]
    pub fn create_node_from_tag(
        &mut self,
        orchestration_id: OrchestrationId,
        tag: &str,
        position: Position,
    ) -> Result<NodeId> {
        let surface = self.surface.as_mut();
        let id = self
            .graphs
            .entry(orchestration_id)
            .or_default()
            .create_node_from_tag(tag, position, surface)?;
        self.resync_surface(orchestration_id);
        Ok(id)
    }

    /// Create a node with an explicit id; see [`OrchestrationData::create_node_with_id`]
    pub fn create_node_with_id(
        &mut self,
        orchestration_id: OrchestrationId,
        id: NodeId,
        node_type: NodeType,
        position: Position,
    ) -> Result<&mut Node> {
        let surface = self.surface.as_mut();
        self.graphs
            .entry(orchestration_id)
            .or_default()
            .create_node_with_id(id, node_type, position, surface)?;
        self.resync_surface(orchestration_id);
        self.graphs
            .get_mut(&orchestration_id)
            .and_then(|data| data.node_mut(id))
            .ok_or(WorkflowError::NodeNotFound(id))
    }

    /// Connect two pins in an orchestration
    pub fn create_link(
        &mut self,
        orchestration_id: OrchestrationId,
        start_attr: AttributeId,
        end_attr: AttributeId,
    ) -> LinkId {
        self.graphs
            .entry(orchestration_id)
            .or_default()
            .create_link(start_attr, end_attr)
    }

    /// Mutable access to one node of an orchestration
    pub fn node_mut(&mut self, orchestration_id: OrchestrationId, id: NodeId) -> Option<&mut Node> {
        self.graphs.get_mut(&orchestration_id)?.node_mut(id)
    }

    /// Move a node, keeping cache and surface in step
    pub fn set_node_position(
        &mut self,
        orchestration_id: OrchestrationId,
        id: NodeId,
        position: Position,
    ) -> bool {
        let surface = self.surface.as_mut();
        match self
            .graphs
            .get_mut(&orchestration_id)
            .and_then(|g| g.node_mut(id))
        {
            Some(node) => {
                node.set_position(position, surface);
            }
            None => return false,
        }
        self.resync_surface(orchestration_id);
        true
    }

    pub fn delete_node(&mut self, orchestration_id: OrchestrationId, id: NodeId) -> Option<Node> {
        self.graphs.get_mut(&orchestration_id)?.delete_node(id)
    }

    pub fn delete_link(&mut self, orchestration_id: OrchestrationId, id: LinkId) -> Option<Link> {
        self.graphs.get_mut(&orchestration_id)?.delete_link(id)
    }

    /// Apply one frame of surface interaction to an orchestration
    ///
    /// Order matches a render frame: new links, then a delete request on the
    /// selection, then a detached link.
    pub fn process_interactions(&mut self, orchestration_id: OrchestrationId) -> InteractionSummary {
        let mut summary = InteractionSummary::default();
        let surface = self.surface.as_mut();
        let data = self.graphs.entry(orchestration_id).or_default();

        while let Some((start_attr, end_attr)) = surface.take_created_link() {
            data.create_link(start_attr, end_attr);
            summary.links_created += 1;
        }

        if surface.take_delete_requested() {
            let nodes = surface.selected_nodes();
            let links = surface.selected_links();
            let (nodes_removed, links_removed) = data.delete_selection(&nodes, &links);
            summary.nodes_removed += nodes_removed;
            summary.links_removed += links_removed;
        }

        while let Some(link_id) = surface.take_destroyed_link() {
            if data.delete_link(link_id).is_some() {
                summary.links_removed += 1;
            }
        }

        summary
    }

    /// Pull live positions of the active orchestration into its node caches
    ///
    /// Other stores keep their cached positions.
    pub fn commit_positions(&mut self) {
        let surface = self.surface.as_ref();
        if let Some(data) = self.active.and_then(|id| self.graphs.get_mut(&id)) {
            data.commit_positions(surface);
        }
    }

    /// Total node and link counts across all orchestrations
    pub fn totals(&self) -> (usize, usize) {
        self.graphs.values().fold((0, 0), |(nodes, links), data| {
            (nodes + data.nodes().len(), links + data.links().len())
        })
    }
}

impl Default for NodeEditor {
    fn default() -> Self {
        Self::headless()
    }
}
