use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::{Result, TaskError};
use crate::model::Task;

/// Read every task record from a JSON-lines store, preserving file order.
///
/// A missing file is an empty store. Blank lines are skipped; any other line
/// that fails to parse aborts the whole read.
pub fn read_tasks(path: &Path) -> Result<Vec<Task>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read_to_string(path)?;
    parse_tasks(&data, path)
}

fn parse_tasks(data: &str, path: &Path) -> Result<Vec<Task>> {
    let mut tasks = Vec::new();
    for (idx, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let task: Task = serde_json::from_str(line).map_err(|e| TaskError::CorruptStore {
            path: path.display().to_string(),
            line: idx + 1,
            message: e.to_string(),
        })?;
        tasks.push(task);
    }
    Ok(tasks)
}

/// Render tasks as JSON lines, one record per line with a trailing newline.
pub fn encode_tasks(tasks: &[Task]) -> Result<String> {
    let mut out = String::new();
    for task in tasks {
        out.push_str(&serde_json::to_string(task)?);
        out.push('\n');
    }
    Ok(out)
}

/// Replace the store file wholesale with `tasks`.
///
/// The content lands in a sibling temp file first and is renamed into place,
/// so a reader sees either the old list or the new one.
pub fn write_tasks(path: &Path, tasks: &[Task]) -> Result<()> {
    let encoded = encode_tasks(tasks)?;
    write_atomic(path, encoded.as_bytes())
}

pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{file_name}.tmp.{}", std::process::id()));

    let mut temp = File::create(&temp_path)?;
    temp.write_all(data)?;
    temp.sync_all()?;
    drop(temp);

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }
    Ok(())
}
