//! In-memory task operations.
//!
//! Each function takes the loaded stores, checks everything it needs up front
//! and only then mutates them, so a returned error means the lists are exactly
//! as they were passed in. Persisting the result is the caller's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TaskError};
use crate::model::{Relation, SessionEvent, Status, Task, TaskType};
use crate::schema::{self, Diagnostics};
use crate::store::ids;

/// Upper bound, in bytes of compact JSON, for a story's whole shared context.
pub const SHARED_CONTEXT_LIMIT: usize = 50 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTask {
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub design: Option<String>,
    #[serde(default, rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub parent_id: Option<u64>,
    /// Insert at the front of the parent's child block (or of the file).
    #[serde(default)]
    pub prepend: bool,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl NewTask {
    pub fn new(category: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent key (`None`).
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update. Present fields replace the stored value wholesale, except
/// `shared_context`, whose entries are appended.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub design: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default, rename = "type")]
    pub task_type: Option<TaskType>,
    #[serde(default, deserialize_with = "present")]
    pub parent_id: Option<Option<u64>>,
    /// Values of any JSON type; non-strings are stored as their JSON text.
    #[serde(default, deserialize_with = "present")]
    pub meta: Option<Option<Map<String, Value>>>,
    #[serde(default, deserialize_with = "present")]
    pub relations: Option<Option<Vec<Relation>>>,
    #[serde(default)]
    pub shared_context: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present")]
    pub session_events: Option<Option<Vec<SessionEvent>>>,
    #[serde(default, deserialize_with = "present")]
    pub code_reviewed: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub pr_num: Option<Option<u64>>,
}

impl TaskUpdate {
    /// Parse a request object, reporting unknown keys and bad values as
    /// validation failures.
    pub fn from_json(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(TaskError::Validation(Diagnostics(vec![schema::Violation {
                path: String::new(),
                message: "update must be a JSON object".into(),
            }])));
        }
        serde_json::from_value(value).map_err(|e| TaskError::Validation(e.into()))
    }
}

/// How complete/delete name their target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRef {
    Id(u64),
    /// Case-insensitive substring of exactly one active task's title.
    Title(String),
}

impl From<u64> for TaskRef {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskQuery {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default, rename = "type")]
    pub task_type: Option<TaskType>,
    #[serde(default)]
    pub parent_id: Option<u64>,
    /// Case-insensitive title substring.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub include_archive: bool,
}

impl TaskQuery {
    fn matches(&self, task: &Task, title_needle: Option<&str>) -> bool {
        self.id.is_none_or(|id| task.id == id)
            && self.status.is_none_or(|s| task.status == s)
            && self.task_type.is_none_or(|k| task.task_type == k)
            && self.parent_id.is_none_or(|p| task.parent_id == Some(p))
            && title_needle.is_none_or(|needle| task.title.to_lowercase().contains(needle))
    }
}

/// A query result. `parent_shared_context` is derived from the parent story
/// on every read and never stored on the child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedTask {
    #[serde(flatten)]
    pub task: Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_shared_context: Option<Vec<String>>,
}

pub fn add(active: &mut Vec<Task>, archive: &[Task], request: NewTask) -> Result<Task> {
    if let Some(parent_id) = request.parent_id {
        ids::validate_parent(parent_id, active, archive)?;
    }

    let id = ids::next_id(active, archive)?;
    let mut task = Task::new(id, request.category, request.title);
    task.task_type = request.task_type;
    task.parent_id = request.parent_id;
    task.description = request.description.unwrap_or_default();
    task.design = request.design.unwrap_or_default();
    task.meta = request.meta;
    task.relations = request.relations;
    schema::validate_task(&task)?;

    let at = insertion_index(active, request.parent_id, request.prepend);
    active.insert(at, task.clone());
    Ok(task)
}

/// Children are kept contiguous: a new child lands after the parent's last
/// child (or before its first, when prepending). A first child follows its
/// parent directly when the parent is still active.
fn insertion_index(active: &[Task], parent_id: Option<u64>, prepend: bool) -> usize {
    let Some(parent_id) = parent_id else {
        return if prepend { 0 } else { active.len() };
    };

    let mut children = active
        .iter()
        .enumerate()
        .filter(|(_, t)| t.parent_id == Some(parent_id))
        .map(|(i, _)| i);
    let first = children.next();
    let last = children.last().or(first);

    match (first, last) {
        (Some(first), _) if prepend => first,
        (_, Some(last)) => last + 1,
        _ => active
            .iter()
            .position(|t| t.id == parent_id)
            .map_or(active.len(), |p| p + 1),
    }
}

/// Apply `update` to the active task `id`. Archived tasks cannot be updated.
///
/// `running_task` is the id named by the execution state, if any; appended
/// shared-context entries are attributed to it.
pub fn update(
    active: &mut [Task],
    archive: &[Task],
    id: u64,
    update: TaskUpdate,
    running_task: Option<u64>,
) -> Result<Task> {
    let idx = active
        .iter()
        .position(|t| t.id == id)
        .ok_or(TaskError::TaskNotFound(id))?;
    let mut task = active[idx].clone();

    if let Some(title) = update.title {
        task.title = title;
    }
    if let Some(description) = update.description {
        task.description = description;
    }
    if let Some(design) = update.design {
        task.design = design;
    }
    if let Some(category) = update.category {
        task.category = category;
    }
    if let Some(status) = update.status {
        task.status = status;
    }
    if let Some(task_type) = update.task_type {
        task.task_type = task_type;
    }
    match update.parent_id {
        None => {}
        Some(None) => task.parent_id = None,
        Some(Some(parent_id)) => {
            if parent_id == id {
                return Err(TaskError::Validation(Diagnostics(vec![schema::Violation {
                    path: "/parent_id".into(),
                    message: format!("task {id} cannot be its own parent"),
                }])));
            }
            ids::validate_parent(parent_id, active, archive)?;
            task.parent_id = Some(parent_id);
        }
    }
    if let Some(meta) = update.meta {
        task.meta = meta.map(stringify_meta).unwrap_or_default();
    }
    if let Some(relations) = update.relations {
        task.relations = relations.unwrap_or_default();
    }
    if let Some(events) = update.session_events {
        task.session_events = events.unwrap_or_default();
    }
    if let Some(code_reviewed) = update.code_reviewed {
        task.code_reviewed = code_reviewed;
    }
    if let Some(pr_num) = update.pr_num {
        task.pr_num = pr_num;
    }
    if let Some(entries) = update.shared_context {
        task.shared_context = append_shared_context(&task.shared_context, entries, running_task)?;
    }

    schema::validate_task(&task)?;
    active[idx] = task.clone();
    Ok(task)
}

fn stringify_meta(meta: Map<String, Value>) -> BTreeMap<String, String> {
    meta.into_iter()
        .map(|(key, value)| (key, schema::meta_value_to_string(value)))
        .collect()
}

/// The combined list, or `SizeLimitExceeded` if it would outgrow the cap.
pub fn append_shared_context(
    existing: &[String],
    entries: Vec<String>,
    running_task: Option<u64>,
) -> Result<Vec<String>> {
    let mut combined = existing.to_vec();
    combined.extend(entries.into_iter().map(|entry| match running_task {
        Some(task_id) => format!("Task {task_id}: {entry}"),
        None => entry,
    }));

    let size = serde_json::to_string(&combined)?.len();
    if size > SHARED_CONTEXT_LIMIT {
        return Err(TaskError::SizeLimitExceeded {
            size,
            limit: SHARED_CONTEXT_LIMIT,
        });
    }
    Ok(combined)
}

/// Position of the single active task `target` names.
pub fn resolve(active: &[Task], target: &TaskRef) -> Result<usize> {
    match target {
        TaskRef::Id(id) => active
            .iter()
            .position(|t| t.id == *id)
            .ok_or(TaskError::TaskNotFound(*id)),
        TaskRef::Title(pattern) => {
            let needle = pattern.to_lowercase();
            let hits = active
                .iter()
                .enumerate()
                .filter(|(_, t)| t.title.to_lowercase().contains(&needle))
                .collect::<Vec<_>>();
            match hits.as_slice() {
                [(idx, _)] => Ok(*idx),
                _ => Err(TaskError::AmbiguousMatch {
                    pattern: pattern.clone(),
                    matches: hits.iter().map(|(_, t)| t.id).collect(),
                }),
            }
        }
    }
}

/// Close the target and move it to the archive, optionally recording a
/// completion comment in its description.
pub fn complete(
    active: &mut Vec<Task>,
    archive: &mut Vec<Task>,
    target: &TaskRef,
    completion_comment: Option<&str>,
) -> Result<Task> {
    let idx = resolve(active, target)?;
    let mut task = active[idx].clone();
    task.status = Status::Closed;
    if let Some(comment) = completion_comment.map(str::trim).filter(|c| !c.is_empty()) {
        task.description = if task.description.is_empty() {
            comment.to_string()
        } else {
            format!("{}\n\n{comment}", task.description)
        };
    }
    archive_at(active, archive, idx, task)
}

/// Mark the target deleted and move it to the archive.
pub fn delete(active: &mut Vec<Task>, archive: &mut Vec<Task>, target: &TaskRef) -> Result<Task> {
    let idx = resolve(active, target)?;
    let mut task = active[idx].clone();
    task.status = Status::Deleted;
    archive_at(active, archive, idx, task)
}

fn archive_at(
    active: &mut Vec<Task>,
    archive: &mut Vec<Task>,
    idx: usize,
    task: Task,
) -> Result<Task> {
    schema::validate_task(&task)?;
    active.remove(idx);
    archive.push(task.clone());
    Ok(task)
}

/// Filter the active store, and the archive when asked, in store order.
pub fn select(active: &[Task], archive: &[Task], query: &TaskQuery) -> Vec<SelectedTask> {
    let needle = query.title.as_ref().map(|t| t.to_lowercase());
    let archived: &[Task] = if query.include_archive { archive } else { &[] };

    active
        .iter()
        .chain(archived)
        .filter(|t| query.matches(t, needle.as_deref()))
        .map(|task| SelectedTask {
            parent_shared_context: query
                .id
                .and(task.parent_id)
                .map(|parent_id| parent_shared_context(parent_id, active, archive)),
            task: task.clone(),
        })
        .collect()
}

fn parent_shared_context(parent_id: u64, active: &[Task], archive: &[Task]) -> Vec<String> {
    ids::find_any(parent_id, active, archive)
        .map(|parent| parent.shared_context.clone())
        .unwrap_or_default()
}
