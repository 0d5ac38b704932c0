//! Flow Engine - workflow canvas simulation
//!
//! This crate holds the state and behavior behind a workflow-automation
//! canvas. It supports:
//!
//! - A graph store with selection and compressed snapshot undo/redo
//! - Kahn-ordered, strictly sequential simulated execution
//! - Named version checkpoints with restore and structural diffs
//! - JSON import/export, a template catalog and keyword-driven generation
//! - Best-effort persistence of session state to a directory
//!
//! # Architecture
//!
//! - `GraphStore`: the live graph; structural mutations snapshot into a
//!   `SnapshotHistory`
//! - `WorkflowRunner`: walks the topological order, delegating each node to
//!   a `StepRunner` and streaming `RunEvent`s to an `EventSink`
//! - `VersionHistory`: immutable, most-recent-first checkpoints
//! - `Session`: owns all of the above plus configuration and persistence
//!
//! # Example
//!
//! ```ignore
//! use flow_engine::{EngineConfig, LogEventSink, Session};
//!
//! let mut session = Session::new(EngineConfig::default());
//! session.apply_template("bug-triage")?;
//! let record = session.run(&LogEventSink).await;
//! println!("run {}: {:?}", record.id, record.outcome);
//! ```

pub mod builder;
pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod exchange;
pub mod executor;
pub mod history;
pub mod intent;
pub mod persistence;
pub mod runs;
pub mod session;
pub mod store;
pub mod templates;
pub mod types;
pub mod validation;
pub mod versions;

// Re-export key types
pub use builder::WorkflowBuilder;
pub use config::{ConfigError, EngineConfig, CONFIG_FILE_NAME};
pub use diff::{diff_graphs, DiffCounts, GraphDiff, NodeChange};
pub use error::{FlowEngineError, Result};
pub use events::{EventError, EventSink, LogEventSink, NullEventSink, RunEvent, VecEventSink};
pub use exchange::{export_json, import_json, IdPolicy};
pub use executor::{
    topological_order, SimulatedStep, StepOutcome, StepRunner, TopologicalOrder, WorkflowRunner,
};
pub use history::{Snapshot, SnapshotHistory};
pub use intent::{generate_graph, IntentParser, ParsedIntent};
pub use persistence::{FlowState, StateStore, StoreKey};
pub use runs::{RunHistory, RunOutcome, RunRecord, StepRecord};
pub use session::Session;
pub use store::GraphStore;
pub use templates::{builtin_templates, find_template, WorkflowTemplate};
pub use types::{
    Connection, EdgeId, GraphEdge, GraphNode, NodeData, NodeDataPatch, NodeId, NodeStatus,
    Params, Position, WorkflowGraph,
};
pub use validation::{validate_workflow, ValidationError};
