use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use git2::{Repository, RepositoryState};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, TaskError};

pub const MERGE_CONFLICT: &str = "merge-conflict";
pub const DIVERGED: &str = "diverged";
pub const UNCOMMITTED_CHANGES: &str = "uncommitted-changes";
pub const MERGE_IN_PROGRESS: &str = "merge-in-progress";
pub const GIT_UNAVAILABLE: &str = "git-unavailable";
pub const PULL_FAILED: &str = "pull-failed";

/// What a pull-before-mutate attempt found. Every variant means the caller
/// may go ahead with its mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    NotARepository,
    NoRemote,
    /// Detached HEAD, or a branch with no tracking configuration.
    NoUpstream { branch: Option<String> },
    /// The tracked branch does not exist on the remote yet (e.g. a fresh
    /// clone of an empty repository).
    UpstreamMissing { branch: String },
    Pulled { head: Option<String> },
}

/// Pull the latest history for the project, then hand back the active store
/// path. On failure nothing under the project has been modified.
pub fn sync_and_resolve_path(config: &Config) -> Result<PathBuf> {
    let outcome = pull_latest(&config.project_root, config.fast_forward_only)?;
    debug!(?outcome, "sync complete");
    Ok(config.active_path.clone())
}

pub fn pull_latest(project_root: &Path, fast_forward_only: bool) -> Result<SyncOutcome> {
    let Ok(repo) = Repository::discover(project_root) else {
        return Ok(SyncOutcome::NotARepository);
    };
    if repo.remotes()?.is_empty() {
        return Ok(SyncOutcome::NoRemote);
    }

    let branch = current_branch(&repo);
    let Some(tracked) = branch
        .as_deref()
        .filter(|name| has_upstream(&repo, name))
        .map(String::from)
    else {
        return Ok(SyncOutcome::NoUpstream { branch });
    };

    if repo.state() != RepositoryState::Clean {
        return Err(sync_error(
            MERGE_IN_PROGRESS,
            format!(
                "repository is in the middle of a {:?} operation; finish or abort it first",
                repo.state()
            ),
        ));
    }

    let workdir = repo
        .workdir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project_root.to_path_buf());

    let mut args = vec!["pull"];
    if fast_forward_only {
        args.push("--ff-only");
    } else {
        args.extend(["--no-rebase", "--no-edit"]);
    }

    debug!(workdir = %workdir.display(), ?args, "running git pull");
    let output = git(&workdir, &args)?;
    if output.status.success() {
        let head = head_sha(&workdir);
        info!(head = head.as_deref().unwrap_or("-"), "pulled latest history");
        return Ok(SyncOutcome::Pulled { head });
    }

    let detail = combined_output(&output);
    if upstream_missing(&detail) {
        info!(branch = %tracked, "upstream branch not on remote yet, nothing to pull");
        return Ok(SyncOutcome::UpstreamMissing { branch: tracked });
    }
    let error_type = classify_failure(&detail, in_merge(&workdir));
    if error_type == MERGE_CONFLICT {
        abort_merge(&workdir);
    }
    warn!(error_type, "git pull failed");
    Err(sync_error(error_type, detail))
}

fn sync_error(error_type: &str, message: impl Into<String>) -> TaskError {
    TaskError::SyncConflict {
        error_type: error_type.to_string(),
        message: message.into(),
    }
}

fn git(workdir: &Path, args: &[&str]) -> Result<Output> {
    Command::new("git")
        .arg("-C")
        .arg(workdir)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_MERGE_AUTOEDIT", "no")
        .output()
        .map_err(|e| sync_error(GIT_UNAVAILABLE, format!("could not run git: {e}")))
}

fn current_branch(repo: &Repository) -> Option<String> {
    // Works for unborn branches too, where `repo.head()` fails.
    let head = repo.find_reference("HEAD").ok()?;
    let target = head.symbolic_target()?;
    target.strip_prefix("refs/heads/").map(String::from)
}

fn has_upstream(repo: &Repository, branch: &str) -> bool {
    repo.config()
        .and_then(|cfg| cfg.get_string(&format!("branch.{branch}.merge")))
        .is_ok()
}

fn head_sha(workdir: &Path) -> Option<String> {
    let repo = Repository::open(workdir).ok()?;
    let oid = repo.head().ok()?.target()?;
    Some(oid.to_string())
}

fn in_merge(workdir: &Path) -> bool {
    Repository::open(workdir).is_ok_and(|r| r.state() == RepositoryState::Merge)
}

fn abort_merge(workdir: &Path) {
    match git(workdir, &["merge", "--abort"]) {
        Ok(out) if out.status.success() => debug!("aborted conflicted merge"),
        Ok(out) => warn!(detail = %combined_output(&out), "git merge --abort failed"),
        Err(err) => warn!(%err, "git merge --abort failed"),
    }
}

fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    [stdout.trim(), stderr.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn upstream_missing(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    lower.contains("no such ref was fetched") || lower.contains("couldn't find remote ref")
}

fn classify_failure(detail: &str, merging: bool) -> &'static str {
    let lower = detail.to_lowercase();
    if merging || lower.contains("conflict") {
        MERGE_CONFLICT
    } else if lower.contains("not possible to fast-forward") || lower.contains("diverg") {
        DIVERGED
    } else if lower.contains("would be overwritten") || lower.contains("commit your changes") {
        UNCOMMITTED_CHANGES
    } else {
        PULL_FAILED
    }
}
