//! Persisted sync state.
//!
//! One document per process, loaded at the start of a pass, mutated in
//! memory and written back atomically at the end. Its job is series
//! bookkeeping for the bidirectional path: which series were seen on
//! which side, and which uids were deliberately removed (tombstones) so a
//! stale backend listing cannot resurrect them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BridgeError, BridgeResult};

pub const STATE_VERSION: u32 = 1;

fn current_version() -> u32 {
    STATE_VERSION
}

/// Presence flags for one series, per side of the pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPresence {
    pub in_source: bool,
    pub in_target: bool,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub last_sync: Option<DateTime<Utc>>,
    /// Known series by uid. BTreeMap keeps the serialized document stable.
    #[serde(default)]
    pub series: BTreeMap<String, SeriesPresence>,
    /// Tombstones: uids of series deliberately removed from both sides.
    #[serde(default)]
    pub deleted_uids: BTreeSet<String>,
    /// Schema tag for forward compatibility.
    #[serde(default = "current_version")]
    pub version: u32,
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState {
            last_sync: None,
            series: BTreeMap::new(),
            deleted_uids: BTreeSet::new(),
            version: STATE_VERSION,
        }
    }
}

impl SyncState {
    pub fn is_tombstoned(&self, uid: &str) -> bool {
        self.deleted_uids.contains(uid)
    }
}

/// File-backed store for [`SyncState`].
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StateStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state. A missing or unreadable file is a fresh
    /// start, not an error: the next pass re-derives everything it can
    /// from current backend listings.
    pub fn load(&self) -> SyncState {
        if !self.path.exists() {
            return SyncState::default();
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read sync state, starting fresh");
                return SyncState::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "sync state is corrupt, starting fresh");
                SyncState::default()
            }
        }
    }

    /// Write the state atomically (temp file + rename).
    pub fn save(&self, state: &SyncState) -> BridgeResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;

        let temp = self.path.with_extension("tmp");
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}
