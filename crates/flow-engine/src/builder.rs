//! Fluent builder for canvas graphs
//!
//! Provides a compact API for constructing graphs programmatically, used by
//! the template catalog, the intent generator and tests.

use serde_json::Value;

use crate::types::{GraphEdge, GraphNode, NodeData, Position, WorkflowGraph};

/// Horizontal spacing between auto-placed nodes
const AUTO_SPACING_X: f64 = 250.0;

/// Fluent builder for constructing workflow graphs
///
/// # Example
///
/// ```ignore
/// let graph = WorkflowBuilder::new()
///     .add_node("read", "Read new mail", "gmail")
///     .with_function("listMessages")
///     .with_param("query", serde_json::json!("is:unread"))
///     .add_node("notify", "Post to channel", "slack")
///     .connect("read", "notify")
///     .build();
/// ```
#[derive(Default)]
pub struct WorkflowBuilder {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, placed to the right of the previous one
    pub fn add_node(
        mut self,
        id: impl Into<String>,
        title: impl Into<String>,
        app: impl Into<String>,
    ) -> Self {
        let position = Position::new(self.nodes.len() as f64 * AUTO_SPACING_X, 0.0);
        self.nodes
            .push(GraphNode::new(id, position, NodeData::new(title, app)));
        self
    }

    /// Move the most recently added node
    pub fn at(mut self, x: f64, y: f64) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.position = Position::new(x, y);
        }
        self
    }

    /// Set the function on the most recently added node
    pub fn with_function(mut self, function_name: impl Into<String>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.data.function_name = Some(function_name.into());
        }
        self
    }

    /// Set a parameter on the most recently added node
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.data.params.insert(key.into(), value);
        }
        self
    }

    /// Make the most recently added node fail when simulated
    pub fn with_mock_error(mut self, message: impl Into<String>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.data.mock_error = Some(message.into());
        }
        self
    }

    /// Add a dependency edge with the store's derived id
    pub fn connect(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push(GraphEdge::connect(source, target));
        self
    }

    /// Chain every node to the next in insertion order
    pub fn chain_all(mut self) -> Self {
        let ids: Vec<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        for pair in ids.windows(2) {
            self.edges.push(GraphEdge::connect(&pair[0], &pair[1]));
        }
        self
    }

    /// Build the graph without validation
    pub fn build(self) -> WorkflowGraph {
        WorkflowGraph::from_parts(self.nodes, self.edges)
    }
}
