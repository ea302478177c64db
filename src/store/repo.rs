use std::path::Path;

use tracing::{debug, info};

use crate::config::{self, Config};
use crate::error::Result;
use crate::git::{self, SyncOutcome};
use crate::model::Task;
use crate::store::ops::{self, NewTask, SelectedTask, TaskQuery, TaskRef, TaskUpdate};
use crate::store::{codec, lock, state};

/// The task repository for one project.
///
/// Every operation runs the same cycle: take the project lock, pull remote
/// history, load both stores, apply the change in memory, write back, release.
/// Committing and pushing the result is left to the caller.
pub struct TaskRepo {
    config: Config,
}

impl TaskRepo {
    pub fn open(project_root: &Path) -> Result<Self> {
        Ok(Self::from_config(Config::load(project_root)?))
    }

    pub fn init(project_root: &Path) -> Result<Self> {
        Ok(Self::from_config(config::init(project_root)?))
    }

    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn locked<T>(&self, op: &'static str, f: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
        lock::with_lock(&self.config.lock_path, self.config.lock_timeout, || {
            debug!(op, "lock held, syncing");
            let active_path = git::sync_and_resolve_path(&self.config)?;
            f(&active_path)
        })
    }

    pub fn add(&self, request: NewTask) -> Result<Task> {
        self.locked("add", |active_path| {
            let mut active = codec::read_tasks(active_path)?;
            let archive = codec::read_tasks(&self.config.archive_path)?;
            let task = ops::add(&mut active, &archive, request)?;
            codec::write_tasks(active_path, &active)?;
            info!(id = task.id, parent = ?task.parent_id, "task added");
            Ok(task)
        })
    }

    pub fn update(&self, id: u64, update: TaskUpdate) -> Result<Task> {
        self.locked("update", |active_path| {
            let mut active = codec::read_tasks(active_path)?;
            let archive = codec::read_tasks(&self.config.archive_path)?;
            let running = state::read_execution_state(&self.config.execution_state_path)?
                .map(|s| s.task_id);
            let task = ops::update(&mut active, &archive, id, update, running)?;
            codec::write_tasks(active_path, &active)?;
            info!(id, status = %task.status, "task updated");
            Ok(task)
        })
    }

    pub fn complete(&self, target: &TaskRef, completion_comment: Option<&str>) -> Result<Task> {
        self.locked("complete", |active_path| {
            let mut active = codec::read_tasks(active_path)?;
            let mut archive = codec::read_tasks(&self.config.archive_path)?;
            let task = ops::complete(&mut active, &mut archive, target, completion_comment)?;
            self.write_both(active_path, &active, &archive)?;
            info!(id = task.id, "task completed and archived");
            Ok(task)
        })
    }

    pub fn delete(&self, target: &TaskRef) -> Result<Task> {
        self.locked("delete", |active_path| {
            let mut active = codec::read_tasks(active_path)?;
            let mut archive = codec::read_tasks(&self.config.archive_path)?;
            let task = ops::delete(&mut active, &mut archive, target)?;
            self.write_both(active_path, &active, &archive)?;
            info!(id = task.id, "task deleted and archived");
            Ok(task)
        })
    }

    /// Query under the lock so the result reflects the freshly pulled state.
    pub fn select(&self, query: &TaskQuery) -> Result<Vec<SelectedTask>> {
        self.locked("select", |active_path| {
            let active = codec::read_tasks(active_path)?;
            let archive = codec::read_tasks(&self.config.archive_path)?;
            Ok(ops::select(&active, &archive, query))
        })
    }

    /// Pull remote history without mutating anything.
    pub fn sync(&self) -> Result<SyncOutcome> {
        lock::with_lock(&self.config.lock_path, self.config.lock_timeout, || {
            git::pull_latest(&self.config.project_root, self.config.fast_forward_only)
        })
    }

    // The archive goes first: a crash in between leaves a duplicate, never a loss.
    fn write_both(&self, active_path: &Path, active: &[Task], archive: &[Task]) -> Result<()> {
        codec::write_tasks(&self.config.archive_path, archive)?;
        codec::write_tasks(active_path, active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::model::Status;
    use crate::store::lock::ProjectLock;
    use crate::store::state::{ExecutionState, write_execution_state};
    use serde_json::json;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn add_update_complete_scenario() {
        let dir = tempdir().unwrap();
        let repo = TaskRepo::init(dir.path()).unwrap();

        let task = repo.add(NewTask::new("simple", "Test task")).unwrap();
        assert_eq!(task.id, 1);

        let updated = repo
            .update(1, TaskUpdate::from_json(json!({"status": "in-progress"})).unwrap())
            .unwrap();
        assert_eq!(updated.status, Status::InProgress);
        assert_eq!(updated.title, "Test task");

        let done = repo.complete(&TaskRef::Id(1), Some("All done")).unwrap();
        assert_eq!(done.status, Status::Closed);
        assert!(done.description.contains("All done"));

        let active = codec::read_tasks(&repo.config().active_path).unwrap();
        let archive = codec::read_tasks(&repo.config().archive_path).unwrap();
        assert!(active.is_empty());
        assert_eq!(archive.len(), 1);
        assert_eq!(archive[0].id, 1);
        assert_eq!(archive[0].status, Status::Closed);
    }

    #[test]
    fn failed_add_leaves_file_bytes_unchanged() {
        let dir = tempdir().unwrap();
        let repo = TaskRepo::init(dir.path()).unwrap();
        repo.add(NewTask::new("simple", "Existing")).unwrap();
        let before = fs::read(&repo.config().active_path).unwrap();

        let err = repo
            .add(NewTask {
                parent_id: Some(99999),
                ..NewTask::new("simple", "Orphan")
            })
            .unwrap_err();
        assert!(matches!(err, TaskError::ParentNotFound(99999)));
        assert_eq!(fs::read(&repo.config().active_path).unwrap(), before);
    }

    #[test]
    fn shared_context_prefixed_from_execution_state() {
        let dir = tempdir().unwrap();
        let repo = TaskRepo::init(dir.path()).unwrap();
        let story = repo
            .add(NewTask {
                task_type: crate::model::TaskType::Story,
                ..NewTask::new("story", "Story")
            })
            .unwrap();
        let child = repo
            .add(NewTask {
                parent_id: Some(story.id),
                ..NewTask::new("simple", "Child")
            })
            .unwrap();

        write_execution_state(
            &repo.config().execution_state_path,
            &ExecutionState::started_now(story.id, child.id),
        )
        .unwrap();

        let updated = repo
            .update(
                story.id,
                TaskUpdate::from_json(json!({"shared_context": ["found a quirk"]})).unwrap(),
            )
            .unwrap();
        assert_eq!(updated.shared_context, vec!["Task 2: found a quirk"]);

        let hits = repo
            .select(&TaskQuery {
                id: Some(child.id),
                ..TaskQuery::default()
            })
            .unwrap();
        assert_eq!(
            hits[0].parent_shared_context,
            Some(vec!["Task 2: found a quirk".to_string()])
        );
    }

    #[test]
    fn held_lock_surfaces_timeout() {
        let dir = tempdir().unwrap();
        let mut config = config::init(dir.path()).unwrap();
        config.lock_timeout = Duration::from_millis(100);
        let repo = TaskRepo::from_config(config);

        let _held = ProjectLock::acquire(&repo.config().lock_path, Duration::from_secs(1)).unwrap();
        let err = repo.add(NewTask::new("simple", "blocked")).unwrap_err();
        assert!(matches!(err, TaskError::LockTimeout(_)));
        assert!(
            codec::read_tasks(&repo.config().active_path)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn corrupt_store_halts_operation() {
        let dir = tempdir().unwrap();
        let repo = TaskRepo::init(dir.path()).unwrap();
        fs::write(&repo.config().active_path, "not json\n").unwrap();

        let err = repo.add(NewTask::new("simple", "x")).unwrap_err();
        assert!(matches!(err, TaskError::CorruptStore { line: 1, .. }));
        assert_eq!(
            fs::read_to_string(&repo.config().active_path).unwrap(),
            "not json\n"
        );
    }

    #[test]
    fn sync_outside_git_is_a_no_op() {
        let dir = tempdir().unwrap();
        let repo = TaskRepo::init(dir.path()).unwrap();
        assert_eq!(repo.sync().unwrap(), SyncOutcome::NotARepository);
    }
}
