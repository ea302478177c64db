use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::ops::TaskUpdate;
use crate::store::repo::TaskRepo;

pub fn run(project_root: &Path, id: u64, update: TaskUpdate, format: Format) -> Result<()> {
    let repo = TaskRepo::open(project_root)?;
    let task = repo.update(id, update)?;
    output::print_task(&task, format)
}
