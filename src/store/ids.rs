use crate::error::{Result, TaskError};
use crate::model::Task;
use crate::schema::{Diagnostics, Violation};

/// Next id to allocate: one past the highest id in either store.
///
/// Archived ids count, so an id is never handed out twice even after its task
/// has left the active store.
pub fn next_id(active: &[Task], archive: &[Task]) -> Result<u64> {
    let highest = active.iter().chain(archive).map(|t| t.id).max().unwrap_or(0);
    highest.checked_add(1).ok_or_else(|| {
        TaskError::Validation(Diagnostics(vec![Violation {
            path: "/id".into(),
            message: format!("id space exhausted: highest id is {highest}"),
        }]))
    })
}

/// Locate a task by id in the active store first, then the archive.
pub fn find_any<'a>(id: u64, active: &'a [Task], archive: &'a [Task]) -> Option<&'a Task> {
    active
        .iter()
        .find(|t| t.id == id)
        .or_else(|| archive.iter().find(|t| t.id == id))
}

/// A parent may already be completed, so both stores are searched.
pub fn validate_parent(parent_id: u64, active: &[Task], archive: &[Task]) -> Result<()> {
    match find_any(parent_id, active, archive) {
        Some(_) => Ok(()),
        None => Err(TaskError::ParentNotFound(parent_id)),
    }
}
