//! Persisted application state
//!
//! Only the current lesson and the schedule list survive a restart. Auto mode
//! and the active view are deliberately absent: they always start disarmed/home.

use crate::models::Lesson;
use crate::schedule::{default_schedules, Schedule};
use crate::{catalog, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Storage key of the current state layout
pub const STATE_KEY: &str = "xunting_app_state_v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub current_lesson: Lesson,
    pub schedules: Vec<Schedule>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            current_lesson: catalog::default_lesson(),
            schedules: default_schedules(),
        }
    }
}

/// Key-value persistence for PersistedState
pub trait StateStore: Send + Sync {
    /// Load the saved state, or None when nothing usable has been saved
    fn load(&self) -> Result<Option<PersistedState>>;

    fn save(&self, state: &PersistedState) -> Result<()>;
}

/// Stores state as one key of a JSON object in a single file
///
/// Other keys already present in the file are preserved on save.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Option<serde_json::Map<String, serde_json::Value>>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(serde_json::Value::Object(map)) => Ok(Some(map)),
            Ok(_) => {
                warn!(path = %self.path.display(), "State file is not a JSON object, ignoring");
                Ok(None)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "State file is corrupt, ignoring");
                Ok(None)
            }
        }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        let Some(mut document) = self.read_document()? else {
            return Ok(None);
        };
        let Some(value) = document.remove(STATE_KEY) else {
            return Ok(None);
        };

        match serde_json::from_value::<PersistedState>(value) {
            Ok(state) => {
                debug!(
                    lesson = %state.current_lesson.id,
                    schedules = state.schedules.len(),
                    "Loaded persisted state"
                );
                Ok(Some(state))
            }
            Err(e) => {
                warn!(error = %e, "Persisted state has an unexpected shape, using defaults");
                Ok(None)
            }
        }
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        let mut document = self.read_document()?.unwrap_or_default();
        document.insert(STATE_KEY.to_string(), serde_json::to_value(state)?);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write-then-rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&document)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Saved state");
        Ok(())
    }
}
