use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::ops::TaskRef;
use crate::store::repo::TaskRepo;

pub fn complete(
    project_root: &Path,
    target: TaskRef,
    comment: Option<String>,
    format: Format,
) -> Result<()> {
    let repo = TaskRepo::open(project_root)?;
    let task = repo.complete(&target, comment.as_deref())?;
    output::print_task(&task, format)
}

pub fn delete(project_root: &Path, target: TaskRef, format: Format) -> Result<()> {
    let repo = TaskRepo::open(project_root)?;
    let task = repo.delete(&target)?;
    output::print_task(&task, format)
}
