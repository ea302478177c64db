use std::path::Path;

use crate::error::Result;
use crate::store::repo::TaskRepo;

pub fn run(project_root: &Path) -> Result<()> {
    let repo = TaskRepo::init(project_root)?;
    eprintln!(
        "Initialized {} in {}",
        repo.config().store_dir().display(),
        project_root.display()
    );
    Ok(())
}
