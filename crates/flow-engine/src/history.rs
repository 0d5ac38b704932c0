//! Snapshot history behind the store's undo/redo
//!
//! Each entry is a full `(nodes, edges)` copy, serialized and
//! zstd-compressed, so no later edit can reach into it. Entries form a
//! line with a cursor: undo and redo move the cursor, and a new change
//! drops everything after it before appending. Once `limit` entries are
//! held the oldest is dropped.
//!
//! The history starts empty. The first change records the graph as it
//! was before the change, so that very first edit can be undone.

use std::collections::VecDeque;

use crate::error::{FlowEngineError, Result};
use crate::types::WorkflowGraph;

/// Default number of snapshots kept
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

const COMPRESSION_LEVEL: i32 = 3;

/// One compressed copy of the canvas
#[derive(Debug, Clone)]
pub struct Snapshot {
    bytes: Vec<u8>,
    node_count: usize,
    edge_count: usize,
}

impl Snapshot {
    pub fn capture(graph: &WorkflowGraph) -> Result<Self> {
        let json = serde_json::to_vec(graph)?;
        let bytes = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)
            .map_err(|e| FlowEngineError::Compression(e.to_string()))?;
        Ok(Self {
            bytes,
            node_count: graph.nodes.len(),
            edge_count: graph.edges.len(),
        })
    }

    pub fn restore(&self) -> Result<WorkflowGraph> {
        let json = zstd::decode_all(self.bytes.as_slice())
            .map_err(|e| FlowEngineError::Compression(e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

/// Linear, capped list of snapshots with a cursor
#[derive(Debug)]
pub struct SnapshotHistory {
    entries: VecDeque<Snapshot>,
    cursor: usize,
    limit: usize,
}

impl SnapshotHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Record the state a change is about to leave, if nothing is recorded yet
    pub fn begin_change(&mut self, before: &WorkflowGraph) -> Result<()> {
        if self.entries.is_empty() {
            self.append(Snapshot::capture(before)?);
        }
        Ok(())
    }

    /// Record the state a change produced, discarding the redo tail
    pub fn commit(&mut self, after: &WorkflowGraph) -> Result<()> {
        let snapshot = Snapshot::capture(after)?;
        self.entries.truncate(self.cursor + 1);
        self.append(snapshot);
        Ok(())
    }

    /// Forget everything and start over from `graph`
    pub fn reset(&mut self, graph: &WorkflowGraph) -> Result<()> {
        let snapshot = Snapshot::capture(graph)?;
        self.entries.clear();
        self.cursor = 0;
        self.append(snapshot);
        Ok(())
    }

    /// Move the cursor back and return the graph found there
    pub fn undo(&mut self) -> Option<Result<WorkflowGraph>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].restore())
    }

    /// Move the cursor forward and return the graph found there
    pub fn redo(&mut self) -> Option<Result<WorkflowGraph>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor].restore())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn append(&mut self, snapshot: Snapshot) {
        log::trace!(
            "snapshot {} recorded: {} node(s), {} edge(s)",
            self.entries.len() + 1,
            snapshot.node_count(),
            snapshot.edge_count()
        );
        self.entries.push_back(snapshot);
        if self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }
}

impl Default for SnapshotHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::WorkflowBuilder;

    fn canvas(titles: &[&str]) -> WorkflowGraph {
        let mut builder = WorkflowBuilder::new();
        for (i, title) in titles.iter().enumerate() {
            builder = builder.add_node(format!("n{}", i), *title, "jira");
        }
        builder.chain_all().build()
    }

    #[test]
    fn test_snapshot_keeps_counts_and_content() {
        let graph = canvas(&["a", "b", "c"]);
        let snapshot = Snapshot::capture(&graph).unwrap();

        assert_eq!(snapshot.node_count(), 3);
        assert_eq!(snapshot.edge_count(), 2);
        assert_eq!(snapshot.restore().unwrap(), graph);
    }

    #[test]
    fn test_begin_change_records_baseline_once() {
        let mut history = SnapshotHistory::new(10);
        history.begin_change(&canvas(&[])).unwrap();
        history.begin_change(&canvas(&["ignored"])).unwrap();
        history.commit(&canvas(&["a"])).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.undo().unwrap().unwrap(), canvas(&[]));
        assert!(history.undo().is_none());
        assert_eq!(history.redo().unwrap().unwrap(), canvas(&["a"]));
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_commit_after_undo_drops_redo_tail() {
        let mut history = SnapshotHistory::new(10);
        history.reset(&canvas(&[])).unwrap();
        history.commit(&canvas(&["a"])).unwrap();
        history.commit(&canvas(&["a", "b"])).unwrap();
        history.undo();

        history.commit(&canvas(&["a", "c"])).unwrap();

        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
        assert_eq!(history.undo().unwrap().unwrap(), canvas(&["a"]));
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = SnapshotHistory::new(3);
        history.reset(&canvas(&[])).unwrap();
        for title in ["a", "b", "c", "d"] {
            history.commit(&canvas(&[title])).unwrap();
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.undo().unwrap().unwrap(), canvas(&["c"]));
        assert_eq!(history.undo().unwrap().unwrap(), canvas(&["b"]));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_reset_clears_both_directions() {
        let mut history = SnapshotHistory::new(10);
        history.reset(&canvas(&[])).unwrap();
        history.commit(&canvas(&["a"])).unwrap();
        history.undo();

        history.reset(&canvas(&["b"])).unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
