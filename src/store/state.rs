use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::store::codec::write_atomic;

/// Names the task an agent session is currently executing.
///
/// Lives outside the task stores and is never committed. When it is absent
/// the project is in manual-edit mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub story_id: u64,
    pub task_id: u64,
    pub task_start_time: DateTime<Utc>,
}

impl ExecutionState {
    pub fn started_now(story_id: u64, task_id: u64) -> Self {
        Self {
            story_id,
            task_id,
            task_start_time: Utc::now(),
        }
    }
}

/// Read the execution state. A missing file is `None`; so is an unreadable
/// one, which is logged rather than allowed to block task mutations.
pub fn read_execution_state(path: &Path) -> Result<Option<ExecutionState>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)?;
    match serde_json::from_str(&data) {
        Ok(state) => Ok(Some(state)),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unparseable execution state");
            Ok(None)
        }
    }
}

pub fn write_execution_state(path: &Path, state: &ExecutionState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    write_atomic(path, json.as_bytes())
}

/// Remove the execution state. Returns whether a state file existed.
pub fn clear_execution_state(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path)?;
    Ok(true)
}
