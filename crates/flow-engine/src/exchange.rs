//! JSON import/export of canvas graphs
//!
//! The document is `{ "nodes": [...], "edges": [...] }` with camelCase
//! fields. There is no schema version and no checksum. A document that
//! fails to parse is rejected as a whole; callers keep their current graph.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{FlowEngineError, Result};
use crate::types::{GraphEdge, GraphNode, WorkflowGraph};

/// What happens to node ids on import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdPolicy {
    /// Assign fresh node ids and rewrite edges to match
    #[default]
    Regenerate,
    /// Keep ids as they appear in the document
    Preserve,
}

/// Serialize a graph to a pretty-printed document
pub fn export_json(graph: &WorkflowGraph) -> Result<String> {
    Ok(serde_json::to_string_pretty(graph)?)
}

/// Parse a document into a graph
///
/// Runtime state in the document (statuses, errors, animation) is dropped.
pub fn import_json(text: &str, policy: IdPolicy) -> Result<WorkflowGraph> {
    let graph: WorkflowGraph = serde_json::from_str(text)
        .map_err(|e| FlowEngineError::import(format!("malformed graph document: {}", e)))?;
    let graph = graph.without_runtime_state();

    Ok(match policy {
        IdPolicy::Regenerate => regenerate_ids(&graph),
        IdPolicy::Preserve => graph,
    })
}

pub fn export_to_file(graph: &WorkflowGraph, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, export_json(graph)?)?;
    log::info!(
        "exported {} node(s) and {} edge(s) to {:?}",
        graph.nodes.len(),
        graph.edges.len(),
        path
    );
    Ok(())
}

pub fn import_from_file(path: impl AsRef<Path>, policy: IdPolicy) -> Result<WorkflowGraph> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let graph = import_json(&text, policy)?;
    log::info!("imported {} node(s) from {:?}", graph.nodes.len(), path);
    Ok(graph)
}

/// Give every node a fresh id and remap edges to match
///
/// Edge ids are re-derived from the new endpoints. Endpoints that name no
/// node are left as they are. Ids mentioned inside node params are not
/// rewritten.
pub fn regenerate_ids(graph: &WorkflowGraph) -> WorkflowGraph {
    let mut mapping: HashMap<&str, String> = HashMap::new();
    let nodes: Vec<GraphNode> = graph
        .nodes
        .iter()
        .map(|node| {
            let new_id = mapping
                .entry(node.id.as_str())
                .or_insert_with(GraphNode::generate_id)
                .clone();
            GraphNode {
                id: new_id,
                ..node.clone()
            }
        })
        .collect();

    let remap = |id: &str| mapping.get(id).cloned().unwrap_or_else(|| id.to_string());
    let edges: Vec<GraphEdge> = graph
        .edges
        .iter()
        .map(|edge| GraphEdge {
            animated: edge.animated,
            ..GraphEdge::connect(remap(&edge.source), remap(&edge.target))
        })
        .collect();

    WorkflowGraph::from_parts(nodes, edges)
}
