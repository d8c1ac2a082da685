//! One snapshot file per session.
//!
//! The buffer owns no file boundary itself; [`MemoryStore`] is the thin layer
//! a host uses to persist [`MemoryState`] between processes.
//!
//! Directory layout:
//! ```text
//! store_dir/
//!   session-a.json
//!   session-b.json
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::memory::BoundedMemory;
use crate::state::MemoryState;
use crate::{MemoryError, Result};

/// Saves and loads [`MemoryState`] snapshots keyed by session id.
pub struct MemoryStore {
    dir: PathBuf,
}

impl MemoryStore {
    /// Create a store, ensuring its directory exists.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| MemoryError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a session's snapshot file.
    pub fn path(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.dir.join(format!("{session_id}.json")))
    }

    /// Atomic write: serialize to a temp file, then rename into place.
    pub fn save(&self, session_id: &str, state: &MemoryState) -> Result<PathBuf> {
        let final_path = self.path(session_id)?;
        let tmp_path = self.dir.join(format!(".{session_id}.json.tmp"));

        let json = state.to_json_pretty()?;
        std::fs::write(&tmp_path, json).map_err(|e| MemoryError::io(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &final_path).map_err(|e| MemoryError::io(&final_path, e))?;

        debug!(
            "Saved {} turns for session {session_id} to {}",
            state.turns.len(),
            final_path.display()
        );
        Ok(final_path)
    }

    /// Load a session's snapshot. Returns `None` if the session doesn't exist.
    pub fn load(&self, session_id: &str, strict: bool) -> Result<Option<MemoryState>> {
        let path = self.path(session_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path).map_err(|e| MemoryError::io(&path, e))?;
        MemoryState::from_json(&json, strict).map(Some)
    }

    /// Export `memory` and save it under `session_id`.
    pub fn save_memory(&self, session_id: &str, memory: &BoundedMemory) -> Result<PathBuf> {
        self.save(session_id, &memory.export())
    }

    /// Import the saved snapshot for `session_id` into `memory`.
    ///
    /// Returns `false` (leaving `memory` untouched) if nothing was saved.
    pub fn restore(
        &self,
        session_id: &str,
        memory: &mut BoundedMemory,
        strict: bool,
    ) -> Result<bool> {
        match self.load(session_id, strict)? {
            Some(state) => {
                memory.import(state, strict)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Session ids with a saved snapshot, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| MemoryError::io(&self.dir, e))?;

        let mut sessions = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {e}", self.dir.display());
                    continue;
                }
            };
            if !entry.file_type().is_ok_and(|ft| ft.is_file()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            if let Some(session_id) = name.strip_suffix(".json") {
                sessions.push(session_id.to_string());
            }
        }
        sessions.sort();
        Ok(sessions)
    }

    /// Delete a session's snapshot. Returns whether a file was removed.
    pub fn remove(&self, session_id: &str) -> Result<bool> {
        let path = self.path(session_id)?;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|e| MemoryError::io(&path, e))?;
        Ok(true)
    }
}

/// Session ids become file names: no separators, no leading dot, not empty.
fn validate_session_id(session_id: &str) -> Result<()> {
    let ok = !session_id.is_empty()
        && !session_id.starts_with('.')
        && !session_id.contains(['/', '\\'])
        && !session_id.contains('\0');
    if ok {
        Ok(())
    } else {
        Err(MemoryError::InvalidInput(format!(
            "invalid session id {session_id:?}"
        )))
    }
}
