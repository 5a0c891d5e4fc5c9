//! Progress persistence
//!
//! [`PersistedProgress`] is the saved form of a learner's progress, keyed by
//! adventure id. Where it lives is up to the [`ProgressStore`]: the library
//! ships an in-memory store, front-ends bring their own.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::validation::ProgressState;

/// Saved progress for one adventure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedProgress {
    pub completed_tasks: Vec<String>,
    pub completed_missions: Vec<String>,
    pub hints_used: IndexMap<String, u8>,
    pub current_mission_index: usize,
    pub current_task_index: usize,
    pub last_saved: DateTime<Utc>,
}

impl PersistedProgress {
    /// Snapshot `state`, stamped now.
    pub fn capture(state: &ProgressState) -> Self {
        Self {
            completed_tasks: state.completed_tasks.iter().cloned().collect(),
            completed_missions: state.completed_missions.iter().cloned().collect(),
            hints_used: state.hints_used.clone(),
            current_mission_index: state.current_mission_index,
            current_task_index: state.current_task_index,
            last_saved: Utc::now(),
        }
    }

    /// Back into tracker state.
    pub fn into_state(self) -> ProgressState {
        ProgressState {
            current_mission_index: self.current_mission_index,
            current_task_index: self.current_task_index,
            completed_tasks: self.completed_tasks.into_iter().collect(),
            completed_missions: self.completed_missions.into_iter().collect(),
            hints_used: self.hints_used,
        }
    }
}

/// Where progress is saved.
pub trait ProgressStore: Send + Sync {
    /// Saved progress for an adventure, if any.
    fn load(&self, adventure_id: &str) -> Result<Option<PersistedProgress>>;

    /// Save progress, replacing what was there.
    fn save(&self, adventure_id: &str, progress: &PersistedProgress) -> Result<()>;

    /// Forget saved progress. Clearing nothing is not an error.
    fn clear(&self, adventure_id: &str) -> Result<()>;
}

/// Progress kept in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    saved: Mutex<HashMap<String, PersistedProgress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&self, adventure_id: &str) -> Result<Option<PersistedProgress>> {
        let saved = self.saved.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(saved.get(adventure_id).cloned())
    }

    fn save(&self, adventure_id: &str, progress: &PersistedProgress) -> Result<()> {
        let mut saved = self.saved.lock().unwrap_or_else(PoisonError::into_inner);
        saved.insert(adventure_id.to_string(), progress.clone());
        Ok(())
    }

    fn clear(&self, adventure_id: &str) -> Result<()> {
        let mut saved = self.saved.lock().unwrap_or_else(PoisonError::into_inner);
        saved.remove(adventure_id);
        Ok(())
    }
}
