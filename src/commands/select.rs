use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::ops::TaskQuery;
use crate::store::repo::TaskRepo;

pub fn run(project_root: &Path, query: TaskQuery, format: Format) -> Result<()> {
    let repo = TaskRepo::open(project_root)?;
    let selected = repo.select(&query)?;
    output::print_selection(&selected, format)
}
