//! Graph validation
//!
//! The store accepts any graph; these checks are run on demand (import,
//! the CLI `validate` command) and report every problem found.

use std::collections::HashSet;

use crate::executor::topological_order;
use crate::types::WorkflowGraph;

/// Validation error with location context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Some nodes can never be scheduled
    CycleDetected { nodes: Vec<String> },
    /// Two nodes share an id
    DuplicateNodeId { node_id: String },
    /// Two edges connect the same source and target
    DuplicateEdge { edge_id: String },
    /// An edge references a non-existent node
    UnknownNode { edge_id: String, node_id: String },
    /// A node is not bound to any app
    MissingApp { node_id: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected { nodes } => {
                write!(f, "Cycle detected; these nodes can never run: {}", nodes.join(", "))
            }
            Self::DuplicateNodeId { node_id } => {
                write!(f, "Node id '{}' is used more than once", node_id)
            }
            Self::DuplicateEdge { edge_id } => {
                write!(f, "Edge '{}' duplicates an existing connection", edge_id)
            }
            Self::UnknownNode { edge_id, node_id } => {
                write!(f, "Edge '{}' references unknown node '{}'", edge_id, node_id)
            }
            Self::MissingApp { node_id } => {
                write!(f, "Node '{}' is not bound to an app", node_id)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a canvas graph
///
/// Returns all validation errors found (not just the first).
pub fn validate_workflow(graph: &WorkflowGraph) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_node_ids(graph, &mut errors);
    validate_edge_references(graph, &mut errors);
    validate_duplicate_edges(graph, &mut errors);
    validate_apps(graph, &mut errors);
    detect_cycles(graph, &mut errors);

    errors
}

fn validate_node_ids(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }
}

/// Check that all edge source/target nodes exist
fn validate_edge_references(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    let node_ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();

    for edge in &graph.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !node_ids.contains(endpoint.as_str()) {
                errors.push(ValidationError::UnknownNode {
                    edge_id: edge.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
    }
}

fn validate_duplicate_edges(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for edge in &graph.edges {
        if !seen.insert(edge.endpoint_key()) {
            errors.push(ValidationError::DuplicateEdge {
                edge_id: edge.id.clone(),
            });
        }
    }
}

fn validate_apps(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    for node in &graph.nodes {
        if node.data.app.trim().is_empty() {
            errors.push(ValidationError::MissingApp {
                node_id: node.id.clone(),
            });
        }
    }
}

/// Nodes left out of the topological order sit on or behind a cycle
fn detect_cycles(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    let plan = topological_order(graph);
    if !plan.is_complete() {
        errors.push(ValidationError::CycleDetected {
            nodes: plan.excluded,
        });
    }
}
