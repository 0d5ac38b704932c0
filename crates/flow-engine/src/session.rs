//! Application session
//!
//! A `Session` owns everything the canvas works with: the graph store, the
//! version list, run history, configuration and, optionally, a state
//! directory. Save-worthy operations (template load, AI regeneration,
//! manual save, restore, runs) and every canvas edit made through the
//! session are written through to the state directory when one is
//! configured; write failures there are logged, not returned.
//!
//! The store is only handed out read-only, so no edit can skip the write.

use crate::config::EngineConfig;
use crate::diff::GraphDiff;
use crate::error::{FlowEngineError, Result};
use crate::events::EventSink;
use crate::exchange::{export_json, import_json, IdPolicy};
use crate::executor::{StepRunner, WorkflowRunner};
use crate::intent::{IntentParser, ParsedIntent};
use crate::persistence::{FlowState, StateStore, StoreKey};
use crate::runs::{RunHistory, RunRecord};
use crate::store::GraphStore;
use crate::templates::find_template;
use crate::types::{Connection, EdgeId, GraphNode, NodeDataPatch, NodeId, WorkflowGraph};
use crate::versions::{ChangeType, VersionHistory, VersionRecord};

pub struct Session {
    store: GraphStore,
    versions: VersionHistory,
    runs: RunHistory,
    config: EngineConfig,
    state: Option<StateStore>,
    parser: IntentParser,
}

impl Session {
    /// In-memory session; nothing is persisted
    pub fn new(config: EngineConfig) -> Self {
        let store = GraphStore::with_history_limit(config.history_limit)
            .with_duplicate_offset(config.duplicate_offset);
        Self {
            store,
            versions: VersionHistory::new(),
            runs: RunHistory::new(config.run_history_limit),
            config,
            state: None,
            parser: IntentParser::new(),
        }
    }

    /// Session backed by `config.state_dir`, if set
    ///
    /// Previously saved flow, versions and runs are loaded. Stores that are
    /// missing or unreadable start empty. The loaded graph becomes the
    /// undo baseline.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let state = config.state_dir.as_ref().map(StateStore::new);
        let mut session = Self::new(config);
        let Some(state) = state else {
            return Ok(session);
        };

        if let Some(flow) = state.load::<FlowState>(StoreKey::Flow) {
            session.store.set_nodes(flow.nodes);
            session.store.set_edges(flow.edges);
            session.store.select_node(flow.selected_node.as_deref());
            session.store.reset_history()?;
        }
        if let Some(records) = state.load::<Vec<VersionRecord>>(StoreKey::Versions) {
            session.versions = VersionHistory::from_records(records);
        }
        if let Some(records) = state.load::<Vec<RunRecord>>(StoreKey::Runs) {
            session.runs = RunHistory::from_records(records, session.config.run_history_limit);
        }
        log::info!(
            "opened session at {:?}: {} node(s), {} version(s), {} run(s)",
            state.dir(),
            session.store.nodes().len(),
            session.versions.len(),
            session.runs.len()
        );

        session.state = Some(state);
        Ok(session)
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn versions(&self) -> &VersionHistory {
        &self.versions
    }

    pub fn runs(&self) -> &RunHistory {
        &self.runs
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_persistent(&self) -> bool {
        self.state.is_some()
    }

    // =========================================================================
    // Canvas edits
    // =========================================================================

    pub fn add_node(&mut self, node: GraphNode) -> Result<()> {
        self.store.add_node(node)?;
        self.autosave();
        Ok(())
    }

    pub fn update_node(&mut self, id: &str, patch: NodeDataPatch) -> bool {
        let updated = self.store.update_node(id, patch);
        if updated {
            self.autosave();
        }
        updated
    }

    pub fn delete_node(&mut self, id: &str) -> Result<bool> {
        let deleted = self.store.delete_node(id)?;
        if deleted {
            self.autosave();
        }
        Ok(deleted)
    }

    pub fn duplicate_node(&mut self, id: &str) -> Result<Option<NodeId>> {
        let copy = self.store.duplicate_node(id)?;
        if copy.is_some() {
            self.autosave();
        }
        Ok(copy)
    }

    pub fn add_edge(&mut self, connection: Connection) -> Result<EdgeId> {
        let id = self.store.add_edge(connection)?;
        self.autosave();
        Ok(id)
    }

    pub fn delete_edge(&mut self, id: &str) -> Result<bool> {
        let deleted = self.store.delete_edge(id)?;
        if deleted {
            self.autosave();
        }
        Ok(deleted)
    }

    pub fn select_node(&mut self, id: Option<&str>) {
        self.store.select_node(id);
        self.autosave();
    }

    /// Replace the canvas without recording a version
    pub fn load_graph(&mut self, graph: WorkflowGraph) -> Result<()> {
        self.store.load_graph(graph)?;
        self.autosave();
        Ok(())
    }

    pub fn undo(&mut self) -> Result<bool> {
        let moved = self.store.undo()?;
        if moved {
            self.autosave();
        }
        Ok(moved)
    }

    pub fn redo(&mut self) -> Result<bool> {
        let moved = self.store.redo()?;
        if moved {
            self.autosave();
        }
        Ok(moved)
    }

    // =========================================================================
    // Save-worthy changes
    // =========================================================================

    /// Load a catalog template onto the canvas
    pub fn apply_template(&mut self, template_id: &str) -> Result<&VersionRecord> {
        let template = find_template(template_id)?;
        self.store.load_graph(template.graph())?;
        self.versions.record(
            ChangeType::TemplateImport,
            self.store.graph(),
            format!("Imported template '{}'", template.name),
        );
        self.autosave();
        Ok(self.latest_version())
    }

    /// Parse free text without touching the canvas
    pub fn parse_intent(&self, text: &str) -> ParsedIntent {
        self.parser.parse(text)
    }

    /// Replace the canvas with a graph generated from free text
    pub fn apply_intent(&mut self, text: &str) -> Result<&VersionRecord> {
        let graph = self.parser.generate(text)?;
        self.store.load_graph(graph)?;
        self.versions.record(
            ChangeType::AiRegenerate,
            self.store.graph(),
            format!("Generated from \"{}\"", text.trim()),
        );
        self.autosave();
        Ok(self.latest_version())
    }

    /// Record the current canvas as a manual checkpoint
    pub fn save_version(&mut self, summary: &str) -> Result<&VersionRecord> {
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(FlowEngineError::invalid("version summary must not be empty"));
        }
        self.versions
            .record(ChangeType::ManualEdit, self.store.graph(), summary);
        self.autosave();
        Ok(self.latest_version())
    }

    /// Put an old version back on the canvas
    ///
    /// The restore is itself recorded as a new version, once the canvas
    /// holds the restored graph.
    pub fn restore_version(&mut self, version: u64) -> Result<()> {
        let graph = self
            .versions
            .get(version)
            .ok_or(FlowEngineError::VersionNotFound(version))?
            .graph();
        self.store.load_graph(graph)?;
        self.versions.restore(version)?;
        self.autosave();
        Ok(())
    }

    pub fn diff_versions(&self, from: u64, to: u64) -> Result<GraphDiff> {
        self.versions.diff(from, to)
    }

    // =========================================================================
    // Import / export
    // =========================================================================

    /// Replace the canvas with an imported document
    ///
    /// Node ids are regenerated. A malformed document leaves the canvas
    /// untouched.
    pub fn import_json(&mut self, text: &str) -> Result<()> {
        let graph = import_json(text, IdPolicy::Regenerate)?;
        self.store.load_graph(graph)?;
        self.store.select_node(None);
        self.autosave();
        Ok(())
    }

    pub fn export_json(&self) -> Result<String> {
        export_json(self.store.graph())
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Simulate the canvas with the configured delay window
    pub async fn run(&mut self, sink: &dyn EventSink) -> RunRecord {
        let runner = WorkflowRunner::simulated(&self.config);
        self.run_with(&runner, sink).await
    }

    /// Run the canvas with a custom step implementation
    pub async fn run_with<S: StepRunner>(
        &mut self,
        runner: &WorkflowRunner<S>,
        sink: &dyn EventSink,
    ) -> RunRecord {
        let record = runner.run(&mut self.store, sink).await;
        self.runs.push(record.clone());
        self.autosave();
        record
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write every store to the state directory
    ///
    /// A no-op for in-memory sessions.
    pub fn persist(&self) -> Result<()> {
        let Some(state) = &self.state else {
            return Ok(());
        };

        let flow = FlowState {
            nodes: self.store.nodes().to_vec(),
            edges: self.store.edges().to_vec(),
            selected_node: self.store.selected_node().map(|n| n.id.clone()),
        };
        state.save(StoreKey::Flow, &flow)?;
        state.save(StoreKey::Versions, &self.versions.records())?;
        state.save(StoreKey::Runs, &self.runs.records())?;
        state.save(StoreKey::Settings, &self.config)?;
        Ok(())
    }

    fn autosave(&self) {
        if let Err(e) = self.persist() {
            log::warn!("Failed to persist session state: {}", e);
        }
    }

    fn latest_version(&self) -> &VersionRecord {
        // Only called right after a record was pushed
        &self.versions.records()[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NullEventSink, VecEventSink};
    use crate::runs::RunOutcome;
    use crate::executor::SimulatedStep;
    use crate::types::{NodeData, NodeStatus, Position};
    use tempfile::TempDir;

    fn persistent_config(dir: &TempDir) -> EngineConfig {
        EngineConfig {
            state_dir: Some(dir.path().to_path_buf()),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_apply_template_records_version() {
        let mut session = Session::new(EngineConfig::default());
        let record = session.apply_template("bug-triage").unwrap();

        assert_eq!(record.version, 1);
        assert_eq!(record.change_type, ChangeType::TemplateImport);
        assert_eq!(session.store().nodes().len(), 3);
        assert!(session.store().can_undo());
    }

    #[test]
    fn test_unknown_template_leaves_canvas() {
        let mut session = Session::new(EngineConfig::default());
        assert!(matches!(
            session.apply_template("missing"),
            Err(FlowEngineError::TemplateNotFound(_))
        ));
        assert!(session.store().nodes().is_empty());
        assert!(session.versions().is_empty());
    }

    #[test]
    fn test_empty_summary_rejected() {
        let mut session = Session::new(EngineConfig::default());
        session.apply_template("bug-triage").unwrap();

        let err = session.save_version("   ").unwrap_err();
        assert!(matches!(err, FlowEngineError::InvalidInput(_)));
        assert_eq!(session.versions().len(), 1);
    }

    #[test]
    fn test_restore_round_trip() {
        let mut session = Session::new(EngineConfig::default());
        session
            .apply_intent("when an email arrives create a jira ticket")
            .unwrap();
        session.apply_template("release-notes").unwrap();
        assert_eq!(session.store().nodes().len(), 5);

        session.restore_version(1).unwrap();

        let ids: Vec<_> = session.store().nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["gmail-1", "jira-2"]);
        let latest = session.versions().latest().unwrap();
        assert_eq!(latest.version, 3);
        assert_eq!(latest.change_type, ChangeType::VersionRestore);
        assert!(session.diff_versions(1, 3).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_restore_changes_nothing() {
        let mut session = Session::new(EngineConfig::default());
        session.apply_template("bug-triage").unwrap();
        let before = session.store().snapshot();
        let history = session.store().history_len();

        assert!(matches!(
            session.restore_version(9),
            Err(FlowEngineError::VersionNotFound(9))
        ));
        assert_eq!(session.store().snapshot(), before);
        assert_eq!(session.store().history_len(), history);
        assert_eq!(session.versions().len(), 1);
    }

    #[test]
    fn test_restore_records_what_the_canvas_holds() {
        let mut session = Session::new(EngineConfig::default());
        session.apply_template("bug-triage").unwrap();
        session.apply_template("lead-capture").unwrap();

        session.restore_version(1).unwrap();

        let latest = session.versions().latest().unwrap();
        assert_eq!(latest.change_type, ChangeType::VersionRestore);
        assert_eq!(latest.graph(), session.store().snapshot().without_runtime_state());
    }

    #[test]
    fn test_manual_edit_diff() {
        let mut session = Session::new(EngineConfig::default());
        session.apply_template("bug-triage").unwrap();
        session.update_node(
            "slack-1",
            NodeDataPatch::default().param("channel", serde_json::json!("#oncall")),
        );

        let record = session.save_version("route to on-call").unwrap();
        let diff = record.diff.as_ref().unwrap();
        assert_eq!(diff.modified_nodes[0].changed_fields, vec!["params.channel"]);
    }

    #[test]
    fn test_import_failure_keeps_canvas() {
        let mut session = Session::new(EngineConfig::default());
        session.apply_template("bug-triage").unwrap();
        let before = session.store().snapshot();

        assert!(session.import_json("not a graph").is_err());
        assert_eq!(session.store().snapshot(), before);
    }

    #[test]
    fn test_export_then_import_regenerates_ids() {
        let mut session = Session::new(EngineConfig::default());
        session.apply_template("bug-triage").unwrap();
        let exported = session.export_json().unwrap();

        session.import_json(&exported).unwrap();
        assert_eq!(session.store().nodes().len(), 3);
        assert!(session.store().node("gmail-1").is_none());
        let first = &session.store().nodes()[0].id;
        assert_eq!(&session.store().edges()[0].source, first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_is_recorded() {
        let mut session = Session::new(EngineConfig::default());
        session.apply_template("bug-triage").unwrap();
        let sink = VecEventSink::new();

        let record = session.run(&sink).await;

        assert!(record.succeeded());
        assert_eq!(record.executed_nodes(), vec!["gmail-1", "jira-1", "slack-1"]);
        assert_eq!(session.runs().len(), 1);
        assert!(!sink.events().is_empty());
        assert!(session
            .store()
            .nodes()
            .iter()
            .all(|n| n.data.status == NodeStatus::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut session = Session::open(persistent_config(&dir)).unwrap();
            assert!(session.is_persistent());
            session.apply_template("lead-capture").unwrap();
            session.select_node(Some("sheets-1"));
            session.save_version("checkpoint").unwrap();
            let record = session.run(&NullEventSink).await;
            assert_eq!(record.outcome, RunOutcome::Succeeded);
        }

        let session = Session::open(persistent_config(&dir)).unwrap();
        assert_eq!(session.store().nodes().len(), 3);
        assert_eq!(session.store().selected_node().unwrap().id, "sheets-1");
        assert_eq!(session.versions().len(), 2);
        assert_eq!(session.runs().len(), 1);
        assert!(!session.store().can_undo());
    }

    #[test]
    fn test_canvas_edits_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut session = Session::open(persistent_config(&dir)).unwrap();
            session.apply_template("bug-triage").unwrap();
            session
                .add_node(GraphNode::new(
                    "extra",
                    Position::new(400.0, 0.0),
                    NodeData::new("Notify", "slack"),
                ))
                .unwrap();
            assert!(session.delete_node("jira-1").unwrap());
        }

        let mut session = Session::open(persistent_config(&dir)).unwrap();
        let ids: Vec<_> = session.store().nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["gmail-1", "slack-1", "extra"]);
        assert!(session.store().edges().iter().all(|e| !e.touches("jira-1")));

        session.add_edge(Connection::new("slack-1", "extra")).unwrap();
        let copy = session.duplicate_node("extra").unwrap().unwrap();
        assert!(session.undo().unwrap());
        drop(session);

        let session = Session::open(persistent_config(&dir)).unwrap();
        assert!(session.store().node(&copy).is_none());
        assert_eq!(session.store().edges().last().unwrap().id, "eslack-1-extra");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_error_toggle_drives_runs() {
        let mut session = Session::new(EngineConfig::default());
        session.apply_template("bug-triage").unwrap();
        let ms = std::time::Duration::from_millis(10);
        let runner = WorkflowRunner::new(SimulatedStep::new(ms..ms));

        assert!(session.update_node("jira-1", NodeDataPatch::default().mock_error("quota exceeded")));
        let failed = session.run_with(&runner, &NullEventSink).await;
        assert_eq!(failed.failed_node.as_deref(), Some("jira-1"));
        assert_eq!(
            session.store().node("jira-1").unwrap().data.error.as_deref(),
            Some("quota exceeded")
        );

        assert!(session.update_node("jira-1", NodeDataPatch::default().clear_mock_error()));
        let retried = session.run_with(&runner, &NullEventSink).await;
        assert!(retried.succeeded());
        assert!(session.store().node("jira-1").unwrap().data.error.is_none());
    }

    #[test]
    fn test_corrupt_state_starts_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("versions.json"), "[{\"broken\":").unwrap();

        let session = Session::open(persistent_config(&dir)).unwrap();
        assert!(session.versions().is_empty());
        assert!(session.store().nodes().is_empty());
    }
}
