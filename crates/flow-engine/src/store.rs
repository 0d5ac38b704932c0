//! Graph store: the live canvas graph, selection, and undo history
//!
//! Structural mutations (adding or removing nodes and edges, loading a
//! whole graph) push a history snapshot. `update_node` and the runtime
//! status setters do not, so live parameter edits and simulated runs never
//! flood the undo list.
//!
//! `set_nodes` / `set_edges` replace collections verbatim. Keeping edges
//! pointing at existing nodes is the caller's job there.

use crate::error::Result;
use crate::history::{SnapshotHistory, DEFAULT_HISTORY_LIMIT};
use crate::types::{
    Connection, EdgeId, GraphEdge, GraphNode, NodeDataPatch, NodeId, NodeStatus, WorkflowGraph,
};

/// Default position offset applied to duplicated nodes
pub const DEFAULT_DUPLICATE_OFFSET: f64 = 50.0;

/// Single source of truth for the current canvas
pub struct GraphStore {
    graph: WorkflowGraph,
    selected: Option<NodeId>,
    history: SnapshotHistory,
    duplicate_offset: f64,
}

impl GraphStore {
    /// Create an empty store with the default history limit
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            graph: WorkflowGraph::new(),
            selected: None,
            history: SnapshotHistory::new(limit),
            duplicate_offset: DEFAULT_DUPLICATE_OFFSET,
        }
    }

    /// Set the offset used by `duplicate_node`
    pub fn with_duplicate_offset(mut self, offset: f64) -> Self {
        self.duplicate_offset = offset;
        self
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.graph.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.graph.edges
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.graph.find_node(id)
    }

    /// Deep copy of the current `(nodes, edges)`
    pub fn snapshot(&self) -> WorkflowGraph {
        self.graph.clone()
    }

    pub fn selected_node(&self) -> Option<&GraphNode> {
        self.selected.as_deref().and_then(|id| self.graph.find_node(id))
    }

    pub fn select_node(&mut self, id: Option<&str>) {
        self.selected = id.map(str::to_string);
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Replace all nodes (no validation, no snapshot)
    pub fn set_nodes(&mut self, nodes: Vec<GraphNode>) {
        self.graph.nodes = nodes;
    }

    /// Replace all edges (no validation, no snapshot)
    pub fn set_edges(&mut self, edges: Vec<GraphEdge>) {
        self.graph.edges = edges;
    }

    /// Append a node and snapshot
    pub fn add_node(&mut self, node: GraphNode) -> Result<()> {
        self.ensure_baseline()?;
        log::debug!("adding node '{}'", node.id);
        self.graph.nodes.push(node);
        self.save_history()
    }

    /// Merge a partial update into a node's data
    ///
    /// Returns false if no node has this id. Does not snapshot.
    pub fn update_node(&mut self, id: &str, patch: NodeDataPatch) -> bool {
        match self.graph.find_node_mut(id) {
            Some(node) => {
                patch.apply_to(&mut node.data);
                true
            }
            None => false,
        }
    }

    /// Remove a node and every edge touching it
    ///
    /// Returns false (and leaves history alone) if no node has this id.
    pub fn delete_node(&mut self, id: &str) -> Result<bool> {
        if self.graph.find_node(id).is_none() {
            return Ok(false);
        }
        self.ensure_baseline()?;

        self.graph.nodes.retain(|n| n.id != id);
        let before = self.graph.edges.len();
        self.graph.edges.retain(|e| !e.touches(id));
        log::debug!(
            "deleted node '{}' and {} incident edge(s)",
            id,
            before - self.graph.edges.len()
        );

        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        self.save_history()?;
        Ok(true)
    }

    /// Clone a node under a new id, shifted on the canvas
    ///
    /// Returns the new node's id, or None if the source node is missing.
    pub fn duplicate_node(&mut self, id: &str) -> Result<Option<NodeId>> {
        let Some(source) = self.graph.find_node(id) else {
            return Ok(None);
        };

        let mut copy = source.clone();
        copy.id = GraphNode::generate_id();
        copy.position = source.position.offset(self.duplicate_offset);
        copy.data.clear_runtime_state();

        let new_id = copy.id.clone();
        self.add_node(copy)?;
        Ok(Some(new_id))
    }

    /// Connect two nodes
    ///
    /// The edge id is derived from the endpoints. Duplicates and cycles are
    /// accepted.
    pub fn add_edge(&mut self, connection: Connection) -> Result<EdgeId> {
        self.ensure_baseline()?;
        let edge = GraphEdge::connect(connection.source, connection.target);
        let id = edge.id.clone();
        self.graph.edges.push(edge);
        self.save_history()?;
        Ok(id)
    }

    /// Remove an edge by id
    pub fn delete_edge(&mut self, id: &str) -> Result<bool> {
        if !self.graph.edges.iter().any(|e| e.id == id) {
            return Ok(false);
        }
        self.ensure_baseline()?;
        self.graph.edges.retain(|e| e.id != id);
        self.save_history()?;
        Ok(true)
    }

    /// Replace the whole graph (template load, import, generated graph)
    pub fn load_graph(&mut self, graph: WorkflowGraph) -> Result<()> {
        self.ensure_baseline()?;
        log::info!(
            "loading graph with {} node(s) and {} edge(s)",
            graph.nodes.len(),
            graph.edges.len()
        );
        self.graph = graph;
        self.drop_stale_selection();
        self.save_history()
    }

    // =========================================================================
    // Runtime state (never snapshotted)
    // =========================================================================

    /// Set one node's status and error message
    pub fn set_node_status(&mut self, id: &str, status: NodeStatus, error: Option<String>) -> bool {
        match self.graph.find_node_mut(id) {
            Some(node) => {
                node.data.status = status;
                node.data.error = error;
                true
            }
            None => false,
        }
    }

    /// Set every node to `status` and clear errors
    pub fn reset_statuses(&mut self, status: NodeStatus) {
        for node in &mut self.graph.nodes {
            node.data.status = status;
            node.data.error = None;
        }
    }

    pub fn set_edge_animated(&mut self, id: &str, animated: bool) -> bool {
        match self.graph.find_edge_mut(id) {
            Some(edge) => {
                edge.animated = animated;
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Snapshot the current graph, discarding any redo tail
    pub fn save_history(&mut self) -> Result<()> {
        self.history.commit(&self.graph)
    }

    /// Step back one snapshot. Returns false at the oldest snapshot.
    pub fn undo(&mut self) -> Result<bool> {
        match self.history.undo() {
            Some(graph) => {
                self.restore(graph?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Step forward one snapshot. Returns false at the newest snapshot.
    pub fn redo(&mut self) -> Result<bool> {
        match self.history.redo() {
            Some(graph) => {
                self.restore(graph?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Drop all history and start again from the current graph
    pub fn reset_history(&mut self) -> Result<()> {
        self.history.reset(&self.graph)
    }

    fn ensure_baseline(&mut self) -> Result<()> {
        self.history.begin_change(&self.graph)
    }

    fn restore(&mut self, graph: WorkflowGraph) {
        self.graph = graph;
        self.drop_stale_selection();
    }

    fn drop_stale_selection(&mut self) {
        if let Some(id) = &self.selected {
            if self.graph.find_node(id).is_none() {
                self.selected = None;
            }
        }
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
