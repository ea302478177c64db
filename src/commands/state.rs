use std::path::Path;

use serde_json::json;

use crate::config::Config;
use crate::error::Result;
use crate::output::Format;
use crate::store::state::{self, ExecutionState};

/// Record which task an agent session is executing.
pub fn set(project_root: &Path, story_id: u64, task_id: u64, format: Format) -> Result<()> {
    let config = Config::load(project_root)?;
    let current = ExecutionState::started_now(story_id, task_id);
    state::write_execution_state(&config.execution_state_path, &current)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string(&current)?),
        _ => eprintln!("Executing task {task_id} of story {story_id}"),
    }
    Ok(())
}

pub fn clear(project_root: &Path, format: Format) -> Result<()> {
    let config = Config::load(project_root)?;
    let existed = state::clear_execution_state(&config.execution_state_path)?;
    match format {
        Format::Json => println!("{}", json!({"cleared": existed})),
        _ if existed => eprintln!("Execution state cleared"),
        _ => eprintln!("No execution state to clear"),
    }
    Ok(())
}

pub fn show(project_root: &Path, format: Format) -> Result<()> {
    let config = Config::load(project_root)?;
    let current = state::read_execution_state(&config.execution_state_path)?;
    match (format, current) {
        (Format::Json, current) => println!("{}", serde_json::to_string(&current)?),
        (_, Some(s)) => println!(
            "story {} / task {} since {}",
            s.story_id, s.task_id, s.task_start_time
        ),
        (_, None) => eprintln!("No task is executing (manual mode)"),
    }
    Ok(())
}
