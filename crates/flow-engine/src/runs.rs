//! Run records and bounded run history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{NodeId, NodeStatus};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

/// One executed node within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub node_id: NodeId,
    pub title: String,
    pub status: NodeStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one simulated pass over the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    /// Executed nodes in execution order
    pub steps: Vec<StepRecord>,
    /// The node that halted the run, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_node: Option<NodeId>,
}

impl RunRecord {
    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }

    /// Node ids in the order they were executed
    pub fn executed_nodes(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.node_id.as_str()).collect()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.duration_ms).sum()
    }
}

/// Most-recent-first list of run records, capped at `limit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHistory {
    records: Vec<RunRecord>,
    limit: usize,
}

impl RunHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            records: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Rebuild from persisted records, re-applying the cap
    pub fn from_records(mut records: Vec<RunRecord>, limit: usize) -> Self {
        records.truncate(limit.max(1));
        Self {
            records,
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, record: RunRecord) {
        self.records.insert(0, record);
        self.records.truncate(self.limit);
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    pub fn latest(&self) -> Option<&RunRecord> {
        self.records.first()
    }

    pub fn find(&self, id: &str) -> Option<&RunRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
