use std::path::Path;

use crate::error::{Result, TaskError};
use crate::output::{self, Format};
use crate::store::ops::TaskQuery;
use crate::store::repo::TaskRepo;

/// Show one task from either store, with its story's shared context.
pub fn run(project_root: &Path, id: u64, format: Format) -> Result<()> {
    let repo = TaskRepo::open(project_root)?;
    let selected = repo.select(&TaskQuery {
        id: Some(id),
        include_archive: true,
        ..TaskQuery::default()
    })?;
    let Some(hit) = selected.first() else {
        return Err(TaskError::TaskNotFound(id));
    };
    match format {
        Format::Json => println!("{}", serde_json::to_string(hit)?),
        _ => output::print_selection(std::slice::from_ref(hit), format)?,
    }
    Ok(())
}
