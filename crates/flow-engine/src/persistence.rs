//! Best-effort JSON persistence for session state
//!
//! Each logical store is one pretty-printed JSON file in a state directory.
//! Reads never fail: a missing file is absent, and a file that cannot be
//! read or parsed is logged and treated as absent. There are no migrations.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{GraphEdge, GraphNode, NodeId};

/// Logical stores kept in the state directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// The live canvas graph and selection
    Flow,
    /// Version records
    Versions,
    /// Run records
    Runs,
    /// The engine configuration last used with this state
    Settings,
}

impl StoreKey {
    pub const ALL: [StoreKey; 4] = [Self::Flow, Self::Versions, Self::Runs, Self::Settings];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Flow => "flow",
            Self::Versions => "versions",
            Self::Runs => "runs",
            Self::Settings => "settings",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.name())
    }
}

/// The persisted shape of the `flow` store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowState {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_node: Option<NodeId>,
}

/// Directory of JSON files, one per [`StoreKey`]
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Store rooted at `dir`; the directory is created on first save
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: StoreKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Read a store, or `None` when it is missing or unreadable
    pub fn load<T: DeserializeOwned>(&self, key: StoreKey) -> Option<T> {
        let path = self.path_for(key);
        if !path.exists() {
            return None;
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Failed to read '{}' store from {:?}: {}", key.name(), path, e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => {
                log::debug!("Loaded '{}' store from {:?}", key.name(), path);
                Some(value)
            }
            Err(e) => {
                log::warn!("Failed to parse '{}' store from {:?}: {}", key.name(), path, e);
                None
            }
        }
    }

    pub fn save<T: Serialize>(&self, key: StoreKey, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, content)?;
        log::debug!("Saved '{}' store to {:?}", key.name(), path);
        Ok(())
    }

    pub fn remove(&self, key: StoreKey) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path)?;
            log::debug!("Removed '{}' store at {:?}", key.name(), path);
        }
        Ok(())
    }

    /// Remove every store file
    pub fn clear(&self) -> Result<()> {
        for key in StoreKey::ALL {
            self.remove(key)?;
        }
        Ok(())
    }
}
