use std::path::Path;

use colored::Colorize;
use serde_json::json;

use crate::error::Result;
use crate::git::SyncOutcome;
use crate::output::Format;
use crate::store::repo::TaskRepo;

pub fn run(project_root: &Path, format: Format) -> Result<()> {
    let repo = TaskRepo::open(project_root)?;
    let outcome = repo.sync()?;

    let (label, detail) = match &outcome {
        SyncOutcome::NotARepository => ("not_a_repository", None),
        SyncOutcome::NoRemote => ("no_remote", None),
        SyncOutcome::NoUpstream { branch } => ("no_upstream", branch.clone()),
        SyncOutcome::UpstreamMissing { branch } => ("upstream_missing", Some(branch.clone())),
        SyncOutcome::Pulled { head } => ("pulled", head.clone()),
    };

    match format {
        Format::Json => println!("{}", json!({"outcome": label, "detail": detail})),
        _ => match outcome {
            SyncOutcome::Pulled { .. } => println!("{}", "Up to date with remote.".green()),
            _ => eprintln!("Nothing to pull ({label})."),
        },
    }
    Ok(())
}
