//! Event types for streaming run progress
//!
//! Events are sent from the executor to whatever surface reports progress
//! (a status bar, toast notifications, a terminal).

use serde::{Deserialize, Serialize};

/// Trait for sending run events
///
/// This abstracts over the transport mechanism (channel, log, collector)
/// so the executor can be used in different contexts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: RunEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

/// Events emitted during a simulated run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunEvent {
    /// Run started over `node_count` ordered nodes
    #[serde(rename_all = "camelCase")]
    RunStarted { run_id: String, node_count: usize },

    /// Every ordered node ran successfully
    #[serde(rename_all = "camelCase")]
    RunCompleted { run_id: String },

    /// A node failed and the run stopped
    #[serde(rename_all = "camelCase")]
    RunFailed {
        run_id: String,
        node_id: String,
        error: String,
    },

    /// A node started executing
    #[serde(rename_all = "camelCase")]
    NodeStarted { run_id: String, node_id: String },

    /// A node completed successfully
    #[serde(rename_all = "camelCase")]
    NodeSucceeded {
        run_id: String,
        node_id: String,
        duration_ms: u64,
    },

    /// A node failed
    #[serde(rename_all = "camelCase")]
    NodeFailed {
        run_id: String,
        node_id: String,
        error: String,
    },
}

impl RunEvent {
    /// Node id for node-scoped events
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeStarted { node_id, .. }
            | Self::NodeSucceeded { node_id, .. }
            | Self::NodeFailed { node_id, .. }
            | Self::RunFailed { node_id, .. } => Some(node_id),
            Self::RunStarted { .. } | Self::RunCompleted { .. } => None,
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: RunEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// An event sink that writes each event to the log
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn send(&self, event: RunEvent) -> Result<(), EventError> {
        match &event {
            RunEvent::RunFailed { node_id, error, .. } => {
                log::error!("run failed at '{}': {}", node_id, error)
            }
            RunEvent::NodeFailed { node_id, error, .. } => {
                log::warn!("node '{}' failed: {}", node_id, error)
            }
            other => log::info!("{:?}", other),
        }
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<RunEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: RunEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .map_err(|_| EventError {
                message: "event buffer poisoned".to_string(),
            })?
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(RunEvent::NodeStarted {
            run_id: "run1".to_string(),
            node_id: "a".to_string(),
        })
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].node_id(), Some("a"));

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        sink.send(RunEvent::RunCompleted {
            run_id: "run1".to_string(),
        })
        .unwrap();
    }

    #[test]
    fn test_event_tagging() {
        let event = RunEvent::NodeSucceeded {
            run_id: "r".to_string(),
            node_id: "a".to_string(),
            duration_ms: 800,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "nodeSucceeded");
        assert_eq!(value["durationMs"], 800);
    }
}
