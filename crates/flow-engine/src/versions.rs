//! Named, restorable version checkpoints
//!
//! Versions are coarser than undo history: one is recorded per save-worthy
//! change (AI regeneration, manual save, template import, restore). Records
//! are never mutated and the list is kept most-recent-first. Restoring an
//! old version appends a new `version_restore` record, so nothing recorded
//! earlier is lost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::{diff_graphs, GraphDiff};
use crate::error::{FlowEngineError, Result};
use crate::types::{GraphEdge, GraphNode, WorkflowGraph};

/// What produced a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    AiRegenerate,
    ManualEdit,
    TemplateImport,
    VersionRestore,
}

impl ChangeType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AiRegenerate => "AI regenerate",
            Self::ManualEdit => "Manual edit",
            Self::TemplateImport => "Template import",
            Self::VersionRestore => "Version restore",
        }
    }
}

/// An immutable checkpoint of the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub id: String,
    /// Monotonic version number, starting at 1
    pub version: u64,
    pub change_type: ChangeType,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub summary: String,
    /// Changes relative to the version recorded just before this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<GraphDiff>,
    pub created_at: DateTime<Utc>,
}

impl VersionRecord {
    /// The stored graph as a fresh copy
    pub fn graph(&self) -> WorkflowGraph {
        WorkflowGraph::from_parts(self.nodes.clone(), self.edges.clone())
    }
}

/// Most-recent-first list of version records
#[derive(Debug, Clone, Default)]
pub struct VersionHistory {
    records: Vec<VersionRecord>,
    next_version: u64,
}

impl VersionHistory {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_version: 1,
        }
    }

    /// Rebuild from persisted records
    ///
    /// Records are re-sorted most-recent-first; numbering continues after
    /// the highest stored version.
    pub fn from_records(mut records: Vec<VersionRecord>) -> Self {
        records.sort_by(|a, b| b.version.cmp(&a.version));
        let next_version = records.first().map_or(1, |r| r.version + 1);
        Self {
            records,
            next_version,
        }
    }

    /// Record a new version of `graph`
    ///
    /// Runtime state (statuses, errors, edge animation) is not stored.
    pub fn record(
        &mut self,
        change_type: ChangeType,
        graph: &WorkflowGraph,
        summary: impl Into<String>,
    ) -> &VersionRecord {
        let graph = graph.without_runtime_state();
        let diff = self.latest().map(|prev| diff_graphs(&prev.graph(), &graph));

        let record = VersionRecord {
            id: format!("version-{}", uuid::Uuid::new_v4()),
            version: self.next_version.max(1),
            change_type,
            nodes: graph.nodes,
            edges: graph.edges,
            summary: summary.into(),
            diff,
            created_at: Utc::now(),
        };
        self.next_version = record.version + 1;

        log::info!(
            "recorded version {} ({}): {}",
            record.version,
            record.change_type.label(),
            record.summary
        );
        self.records.insert(0, record);
        &self.records[0]
    }

    /// Copy out an old version's graph and record the restore
    ///
    /// Returns the graph to load into the live store.
    pub fn restore(&mut self, version: u64) -> Result<WorkflowGraph> {
        let graph = self
            .get(version)
            .ok_or(FlowEngineError::VersionNotFound(version))?
            .graph();
        self.record(
            ChangeType::VersionRestore,
            &graph,
            format!("Restored version {}", version),
        );
        Ok(graph)
    }

    /// Diff between two recorded versions, from `from` to `to`
    pub fn diff(&self, from: u64, to: u64) -> Result<GraphDiff> {
        let old = self.get(from).ok_or(FlowEngineError::VersionNotFound(from))?;
        let new = self.get(to).ok_or(FlowEngineError::VersionNotFound(to))?;
        Ok(diff_graphs(&old.graph(), &new.graph()))
    }

    pub fn get(&self, version: u64) -> Option<&VersionRecord> {
        self.records.iter().find(|r| r.version == version)
    }

    pub fn latest(&self) -> Option<&VersionRecord> {
        self.records.first()
    }

    pub fn records(&self) -> &[VersionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::WorkflowBuilder;
    use crate::types::NodeStatus;

    fn graph(titles: &[&str]) -> WorkflowGraph {
        let mut builder = WorkflowBuilder::new();
        for (i, title) in titles.iter().enumerate() {
            builder = builder.add_node(format!("n{}", i), *title, "slack");
        }
        builder.chain_all().build()
    }

    #[test]
    fn test_versions_are_monotonic_and_most_recent_first() {
        let mut history = VersionHistory::new();
        history.record(ChangeType::AiRegenerate, &graph(&["a"]), "generated");
        history.record(ChangeType::ManualEdit, &graph(&["a", "b"]), "added b");

        let versions: Vec<_> = history.records().iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![2, 1]);
        assert!(history.get(1).unwrap().diff.is_none());

        let diff = history.latest().unwrap().diff.as_ref().unwrap();
        assert_eq!(diff.counts.nodes_added, 1);
        assert_eq!(diff.counts.edges_added, 1);
    }

    #[test]
    fn test_restore_records_new_version() {
        let mut history = VersionHistory::new();
        history.record(ChangeType::TemplateImport, &graph(&["a"]), "template");
        history.record(ChangeType::ManualEdit, &graph(&["a", "b", "c"]), "edit");

        let restored = history.restore(1).unwrap();

        assert_eq!(restored.nodes.len(), 1);
        assert_eq!(history.len(), 3);
        let latest = history.latest().unwrap();
        assert_eq!(latest.version, 3);
        assert_eq!(latest.change_type, ChangeType::VersionRestore);
        assert_eq!(latest.summary, "Restored version 1");
        assert_eq!(history.get(2).unwrap().nodes.len(), 3);
    }

    #[test]
    fn test_restore_unknown_version() {
        let mut history = VersionHistory::new();
        assert!(matches!(
            history.restore(7),
            Err(FlowEngineError::VersionNotFound(7))
        ));
        assert!(history.is_empty());
    }

    #[test]
    fn test_runtime_state_is_not_stored() {
        let mut g = graph(&["a", "b"]);
        g.nodes[0].data.status = NodeStatus::Success;
        g.edges[0].animated = true;

        let mut history = VersionHistory::new();
        let record = history.record(ChangeType::ManualEdit, &g, "after run");
        assert_eq!(record.nodes[0].data.status, NodeStatus::Idle);
        assert!(!record.edges[0].animated);
    }

    #[test]
    fn test_diff_same_version_is_empty() {
        let mut history = VersionHistory::new();
        history.record(ChangeType::ManualEdit, &graph(&["a", "b"]), "v1");
        assert!(history.diff(1, 1).unwrap().is_empty());
    }

    #[test]
    fn test_from_records_continues_numbering() {
        let mut history = VersionHistory::new();
        history.record(ChangeType::ManualEdit, &graph(&["a"]), "v1");
        history.record(ChangeType::ManualEdit, &graph(&["b"]), "v2");

        let mut records = history.records().to_vec();
        records.reverse();
        let mut reloaded = VersionHistory::from_records(records);

        assert_eq!(reloaded.latest().unwrap().version, 2);
        assert_eq!(reloaded.record(ChangeType::ManualEdit, &graph(&["c"]), "v3").version, 3);
    }
}
