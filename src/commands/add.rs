use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::ops::NewTask;
use crate::store::repo::TaskRepo;

pub fn run(project_root: &Path, request: NewTask, format: Format) -> Result<()> {
    let repo = TaskRepo::open(project_root)?;
    let task = repo.add(request)?;
    output::print_task(&task, format)
}
