//! Structural diff between two graphs
//!
//! Nodes are matched by id. A node present on both sides is modified when
//! its `data` differs; positions are not compared. Edges are matched by
//! their `source-target` pair, not by edge id.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::{GraphNode, NodeData, NodeId, WorkflowGraph};

/// A node whose data changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeChange {
    pub node_id: NodeId,
    /// Title on the newer side
    pub title: String,
    /// Changed fields: `title`, `app`, ... and `params.<key>` per parameter
    pub changed_fields: Vec<String>,
}

/// Raw counts for summary display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffCounts {
    pub nodes_added: usize,
    pub nodes_removed: usize,
    pub nodes_modified: usize,
    pub edges_added: usize,
    pub edges_removed: usize,
}

/// Difference from an older graph to a newer one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDiff {
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub modified_nodes: Vec<NodeChange>,
    /// `source-target` keys of edges only in the newer graph
    pub added_edges: Vec<String>,
    /// `source-target` keys of edges only in the older graph
    pub removed_edges: Vec<String>,
    pub counts: DiffCounts,
}

impl GraphDiff {
    pub fn is_empty(&self) -> bool {
        self.counts == DiffCounts::default()
    }

    /// One-line human summary, e.g. "+2 nodes, ~1 modified, -1 edge"
    pub fn summary_line(&self) -> String {
        let c = &self.counts;
        let mut parts = Vec::new();
        if c.nodes_added > 0 {
            parts.push(format!("+{} {}", c.nodes_added, plural(c.nodes_added, "node")));
        }
        if c.nodes_removed > 0 {
            parts.push(format!("-{} {}", c.nodes_removed, plural(c.nodes_removed, "node")));
        }
        if c.nodes_modified > 0 {
            parts.push(format!("~{} modified", c.nodes_modified));
        }
        if c.edges_added > 0 {
            parts.push(format!("+{} {}", c.edges_added, plural(c.edges_added, "edge")));
        }
        if c.edges_removed > 0 {
            parts.push(format!("-{} {}", c.edges_removed, plural(c.edges_removed, "edge")));
        }
        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

/// Compute what changed from `old` to `new`
pub fn diff_graphs(old: &WorkflowGraph, new: &WorkflowGraph) -> GraphDiff {
    let old_nodes: HashMap<&str, &GraphNode> =
        old.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let new_nodes: HashMap<&str, &GraphNode> =
        new.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let added_nodes: Vec<NodeId> = new
        .nodes
        .iter()
        .filter(|n| !old_nodes.contains_key(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect();

    let removed_nodes: Vec<NodeId> = old
        .nodes
        .iter()
        .filter(|n| !new_nodes.contains_key(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect();

    let modified_nodes: Vec<NodeChange> = new
        .nodes
        .iter()
        .filter_map(|n| {
            let before = old_nodes.get(n.id.as_str())?;
            if before.data == n.data {
                return None;
            }
            Some(NodeChange {
                node_id: n.id.clone(),
                title: n.data.title.clone(),
                changed_fields: changed_fields(&before.data, &n.data),
            })
        })
        .collect();

    let old_edges: HashSet<String> = old.edges.iter().map(|e| e.endpoint_key()).collect();
    let new_edges: HashSet<String> = new.edges.iter().map(|e| e.endpoint_key()).collect();

    let added_edges = unique_keys(new.edges.iter().map(|e| e.endpoint_key()), &old_edges);
    let removed_edges = unique_keys(old.edges.iter().map(|e| e.endpoint_key()), &new_edges);

    let counts = DiffCounts {
        nodes_added: added_nodes.len(),
        nodes_removed: removed_nodes.len(),
        nodes_modified: modified_nodes.len(),
        edges_added: added_edges.len(),
        edges_removed: removed_edges.len(),
    };

    GraphDiff {
        added_nodes,
        removed_nodes,
        modified_nodes,
        added_edges,
        removed_edges,
        counts,
    }
}

/// Keys not in `other`, first occurrence order, without repeats
fn unique_keys(keys: impl Iterator<Item = String>, other: &HashSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.filter(|k| !other.contains(k) && seen.insert(k.clone()))
        .collect()
}

fn changed_fields(old: &NodeData, new: &NodeData) -> Vec<String> {
    let mut fields = Vec::new();
    if old.title != new.title {
        fields.push("title".to_string());
    }
    if old.app != new.app {
        fields.push("app".to_string());
    }
    if old.function_name != new.function_name {
        fields.push("functionName".to_string());
    }
    if old.mock_error != new.mock_error {
        fields.push("mockError".to_string());
    }
    if old.status != new.status {
        fields.push("status".to_string());
    }
    if old.error != new.error {
        fields.push("error".to_string());
    }

    let keys: BTreeSet<&String> = old.params.keys().chain(new.params.keys()).collect();
    for key in keys {
        if old.params.get(key) != new.params.get(key) {
            fields.push(format!("params.{}", key));
        }
    }
    fields
}
