//! Canvas surface boundary
//!
//! The drawing surface owns live node positions and the user's selection
//! while an orchestration is on screen. The engine reads and writes them only
//! through [`CanvasSurface`], so a GUI toolkit and the headless CLI can share
//! the same editor code.

use std::collections::{HashMap, VecDeque};

use crate::orchestration::{AttributeId, LinkId, NodeId, Position};

/// Trait for the surface a node editor draws on
pub trait CanvasSurface: Send {
    /// Store the live position of a node
    fn set_node_position(&mut self, node_id: NodeId, position: Position);

    /// Read the live position of a node, if the surface knows it
    fn node_position(&self, node_id: NodeId) -> Option<Position>;

    /// Currently selected node ids, in selection order
    fn selected_nodes(&self) -> Vec<NodeId>;

    /// Currently selected link ids, in selection order
    fn selected_links(&self) -> Vec<LinkId>;

    /// A link the user just dragged between two pins (start, end)
    fn take_created_link(&mut self) -> Option<(AttributeId, AttributeId)>;

    /// A link the user just detached
    fn take_destroyed_link(&mut self) -> Option<LinkId>;

    /// Whether the user asked to delete the current selection
    fn take_delete_requested(&mut self) -> bool;
}

/// In-memory surface with no rendering
///
/// Used by the CLI and by tests to script user interaction.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    positions: HashMap<NodeId, Position>,
    selected_nodes: Vec<NodeId>,
    selected_links: Vec<LinkId>,
    created_links: VecDeque<(AttributeId, AttributeId)>,
    destroyed_links: VecDeque<LinkId>,
    delete_requested: bool,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the node selection
    pub fn select_nodes(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.selected_nodes = ids.into_iter().collect();
    }

    /// Replace the link selection
    pub fn select_links(&mut self, ids: impl IntoIterator<Item = LinkId>) {
        self.selected_links = ids.into_iter().collect();
    }

    pub fn clear_selection(&mut self) {
        self.selected_nodes.clear();
        self.selected_links.clear();
    }

    /// Simulate the user connecting two pins
    pub fn connect(&mut self, start_attr: AttributeId, end_attr: AttributeId) {
        self.created_links.push_back((start_attr, end_attr));
    }

    /// Simulate the user detaching a link
    pub fn detach(&mut self, link_id: LinkId) {
        self.destroyed_links.push_back(link_id);
    }

    /// Simulate the delete key
    pub fn request_delete(&mut self) {
        self.delete_requested = true;
    }
}

impl CanvasSurface for HeadlessSurface {
    fn set_node_position(&mut self, node_id: NodeId, position: Position) {
        self.positions.insert(node_id, position);
    }

    fn node_position(&self, node_id: NodeId) -> Option<Position> {
        self.positions.get(&node_id).copied()
    }

    fn selected_nodes(&self) -> Vec<NodeId> {
        self.selected_nodes.clone()
    }

    fn selected_links(&self) -> Vec<LinkId> {
        self.selected_links.clone()
    }

    fn take_created_link(&mut self) -> Option<(AttributeId, AttributeId)> {
        self.created_links.pop_front()
    }

    fn take_destroyed_link(&mut self) -> Option<LinkId> {
        self.destroyed_links.pop_front()
    }

    fn take_delete_requested(&mut self) -> bool {
        std::mem::take(&mut self.delete_requested)
    }
}
