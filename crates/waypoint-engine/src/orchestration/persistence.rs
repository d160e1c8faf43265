//! Flat row records for graph persistence
//!
//! A [`GraphSnapshot`] is what a storage backend writes and reads: one
//! [`NodeRow`] per node and one [`LinkRow`] per link, across every
//! orchestration. Restoring preserves ids and advances the allocators past
//! them.

use serde::{Deserialize, Serialize};

use super::store::NodeEditor;
use super::types::{AttributeId, Link, LinkId, NodeId, NodeType, OrchestrationId, Position};

/// Storage form of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRow {
    pub id: NodeId,
    pub orchestration_id: OrchestrationId,
    /// Type tag, see [`NodeType::tag`]
    pub node_type: String,
    pub pos_x: f32,
    pub pos_y: f32,
    /// Escaped field payload; `None` leaves the type's defaults in place
    pub data: Option<String>,
}

/// Storage form of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRow {
    pub id: LinkId,
    pub orchestration_id: OrchestrationId,
    pub start_attr: AttributeId,
    pub end_attr: AttributeId,
}

/// Every node and link row of an editor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeRow>,
    pub links: Vec<LinkRow>,
}

impl GraphSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}

/// What [`NodeEditor::restore`] rebuilt and what it had to skip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub nodes: usize,
    pub links: usize,
    pub skipped_nodes: usize,
    pub skipped_links: usize,
}

impl NodeEditor {
    /// Flatten every graph store into rows
    ///
    /// Rows come out ordered by orchestration id, then insertion order.
    /// Positions are the cached ones; call
    /// [`commit_positions`](NodeEditor::commit_positions) first to capture
    /// live surface positions.
    pub fn flatten(&self) -> GraphSnapshot {
        let mut snapshot = GraphSnapshot::default();

        for (orchestration_id, data) in self.graphs() {
            for node in data.nodes() {
                let position = node.position();
                snapshot.nodes.push(NodeRow {
                    id: node.id(),
                    orchestration_id,
                    node_type: node.type_tag().to_string(),
                    pos_x: position.x,
                    pos_y: position.y,
                    data: Some(node.serialize_data()),
                });
            }
            for link in data.links() {
                snapshot.links.push(LinkRow {
                    id: link.id,
                    orchestration_id,
                    start_attr: link.start_attr,
                    end_attr: link.end_attr,
                });
            }
        }

        snapshot
    }

    /// Rebuild graph stores from rows, in (orchestration, id) order
    ///
    /// Rows are added to whatever the editor already holds. Nodes with an
    /// unknown type tag and rows whose id is already taken are skipped with a
    /// warning.
    pub fn restore(&mut self, snapshot: &GraphSnapshot) -> RestoreSummary {
        let mut summary = RestoreSummary::default();

        let mut nodes: Vec<&NodeRow> = snapshot.nodes.iter().collect();
        nodes.sort_by_key(|row| (row.orchestration_id, row.id));

        for row in nodes {
            let node_type = match NodeType::from_tag(&row.node_type) {
                Some(node_type) => node_type,
                None => {
                    log::warn!(
                        "Skipping node {} in orchestration {}: unknown type '{}'",
                        row.id,
                        row.orchestration_id,
                        row.node_type
                    );
                    summary.skipped_nodes += 1;
                    continue;
                }
            };

            let position = Position::new(row.pos_x, row.pos_y);
            match self.create_node_with_id(row.orchestration_id, row.id, node_type, position) {
                Ok(node) => {
                    if let Some(data) = &row.data {
                        node.deserialize_data(data);
                    }
                    summary.nodes += 1;
                }
                Err(e) => {
                    log::warn!(
                        "Skipping node {} in orchestration {}: {}",
                        row.id,
                        row.orchestration_id,
                        e
                    );
                    summary.skipped_nodes += 1;
                }
            }
        }

        let mut links: Vec<&LinkRow> = snapshot.links.iter().collect();
        links.sort_by_key(|row| (row.orchestration_id, row.id));

        for row in links {
            let data = self.store_mut(row.orchestration_id);
            match data.insert_link(Link::new(row.id, row.start_attr, row.end_attr)) {
                Ok(()) => summary.links += 1,
                Err(e) => {
                    log::warn!(
                        "Skipping link {} in orchestration {}: {}",
                        row.id,
                        row.orchestration_id,
                        e
                    );
                    summary.skipped_links += 1;
                }
            }
        }

        log::info!(
            "Restored {} nodes and {} links ({} skipped)",
            summary.nodes,
            summary.links,
            summary.skipped_nodes + summary.skipped_links
        );
        summary
    }
}
