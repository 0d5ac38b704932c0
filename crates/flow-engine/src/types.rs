//! Core types for workflow canvas graphs
//!
//! These types define the structure of a canvas graph: nodes bound to an
//! integration app, and directed "must-run-before" edges between them.
//! Field names serialize in camelCase so documents match the canvas
//! import/export format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Parameter mapping carried by a node
pub type Params = Map<String, Value>;

/// Position of a node on the canvas
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Shift by the same amount on both axes
    pub fn offset(self, delta: f64) -> Self {
        Self {
            x: self.x + delta,
            y: self.y + delta,
        }
    }
}

/// Execution status of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Pending,
    Running,
    Success,
    Error,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a workflow step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Human-readable step title
    pub title: String,
    /// Integration the step talks to (e.g. "gmail", "slack")
    pub app: String,
    /// Integration function invoked by the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Step parameters
    #[serde(default)]
    pub params: Params,
    /// Current execution status
    #[serde(default)]
    pub status: NodeStatus,
    /// Error message from the last failed run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When set, simulated execution of this step fails with this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_error: Option<String>,
}

impl NodeData {
    pub fn new(title: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            app: app.into(),
            ..Self::default()
        }
    }

    pub fn with_function(mut self, function_name: impl Into<String>) -> Self {
        self.function_name = Some(function_name.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_mock_error(mut self, message: impl Into<String>) -> Self {
        self.mock_error = Some(message.into());
        self
    }

    /// Reset runtime state (status and error) to idle
    pub fn clear_runtime_state(&mut self) {
        self.status = NodeStatus::Idle;
        self.error = None;
    }
}

/// Partial update merged into a node's data
///
/// Unset fields leave the node untouched. `params` are merged key by key.
/// The optional string fields take an inner `None` (JSON `null`) to clear
/// the value on the node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub function_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub error: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub mock_error: Option<Option<String>>,
}

/// A field that is present in the document, even as `null`, is `Some`
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl NodeDataPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn function_name(mut self, function_name: impl Into<String>) -> Self {
        self.function_name = Some(Some(function_name.into()));
        self
    }

    pub fn clear_function_name(mut self) -> Self {
        self.function_name = Some(None);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub fn status(mut self, status: NodeStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    /// Make simulated runs of the node fail with `message`
    pub fn mock_error(mut self, message: impl Into<String>) -> Self {
        self.mock_error = Some(Some(message.into()));
        self
    }

    pub fn clear_mock_error(mut self) -> Self {
        self.mock_error = Some(None);
        self
    }

    /// Merge this patch into `data`
    pub fn apply_to(self, data: &mut NodeData) {
        if let Some(title) = self.title {
            data.title = title;
        }
        if let Some(app) = self.app {
            data.app = app;
        }
        if let Some(function_name) = self.function_name {
            data.function_name = function_name;
        }
        if let Some(params) = self.params {
            data.params.extend(params);
        }
        if let Some(status) = self.status {
            data.status = status;
        }
        if let Some(error) = self.error {
            data.error = error;
        }
        if let Some(mock_error) = self.mock_error {
            data.mock_error = mock_error;
        }
    }
}

/// A node (card) on the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Unique identifier for this node
    pub id: NodeId,
    /// Position in the UI
    #[serde(default)]
    pub position: Position,
    /// Step payload
    pub data: NodeData,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, position: Position, data: NodeData) -> Self {
        Self {
            id: id.into(),
            position,
            data,
        }
    }

    /// Generate a fresh node id
    pub fn generate_id() -> NodeId {
        format!("node-{}", uuid::Uuid::new_v4())
    }
}

/// A directed dependency: `source` must run before `target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Target node ID
    pub target: NodeId,
    /// Set while the target node is running
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub animated: bool,
}

impl GraphEdge {
    /// Build an edge with the store's deterministic id `e{source}-{target}`
    pub fn connect(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: Self::edge_id(&source, &target),
            source,
            target,
            animated: false,
        }
    }

    pub fn edge_id(source: &str, target: &str) -> EdgeId {
        format!("e{}-{}", source, target)
    }

    /// Key used to compare edges across versions, independent of edge id
    pub fn endpoint_key(&self) -> String {
        format!("{}-{}", self.source, self.target)
    }

    /// Whether this edge touches `node_id` at either end
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// A requested connection between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source: NodeId,
    pub target: NodeId,
}

impl Connection {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// A complete canvas graph
///
/// This is also the import/export document shape: `{ nodes, edges }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowGraph {
    /// Nodes in the graph
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    /// Edges connecting nodes
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl WorkflowGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self { nodes, edges }
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find a node by ID (mutable)
    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Find an edge by ID (mutable)
    pub fn find_edge_mut(&mut self, id: &str) -> Option<&mut GraphEdge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Get edges going out of a node
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Get the IDs of nodes that this node depends on (upstream nodes)
    pub fn get_dependencies(&self, node_id: &str) -> Vec<NodeId> {
        self.incoming_edges(node_id)
            .map(|e| e.source.clone())
            .collect()
    }

    /// Get the IDs of nodes that depend on this node (downstream nodes)
    pub fn get_dependents(&self, node_id: &str) -> Vec<NodeId> {
        self.outgoing_edges(node_id)
            .map(|e| e.target.clone())
            .collect()
    }

    /// Return a copy with statuses reset, errors cleared and animation off
    pub fn without_runtime_state(&self) -> Self {
        let mut graph = self.clone();
        for node in &mut graph.nodes {
            node.data.clear_runtime_state();
        }
        for edge in &mut graph.edges {
            edge.animated = false;
        }
        graph
    }
}
