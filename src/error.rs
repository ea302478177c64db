use thiserror::Error;

use crate::schema::Diagnostics;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("not a taskmill project (run `taskmill init` first)")]
    NotInitialized,

    #[error("taskmill already initialized in this project")]
    AlreadyInitialized,

    #[error("invalid task: {0}")]
    Validation(Diagnostics),

    #[error("task {0} not found")]
    TaskNotFound(u64),

    #[error("parent task {0} not found in active or archived tasks")]
    ParentNotFound(u64),

    #[error("{}", describe_ambiguous(.pattern, .matches))]
    AmbiguousMatch { pattern: String, matches: Vec<u64> },

    #[error("shared context would be {size} bytes, over the {limit} byte limit")]
    SizeLimitExceeded { size: usize, limit: usize },

    #[error("timed out waiting for lock: {0}")]
    LockTimeout(String),

    #[error("sync failed ({error_type}): {message}")]
    SyncConflict { error_type: String, message: String },

    #[error("corrupt task store {path} at line {line}: {message}")]
    CorruptStore {
        path: String,
        line: usize,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

fn describe_ambiguous(pattern: &str, matches: &[u64]) -> String {
    if matches.is_empty() {
        return format!("no active task title matches '{pattern}'");
    }
    let ids = matches
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("title pattern '{pattern}' matches {} tasks: {ids}", matches.len())
}

impl TaskError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::AlreadyInitialized => "already_initialized",
            Self::Validation(_) => "validation_error",
            Self::TaskNotFound(_) => "task_not_found",
            Self::ParentNotFound(_) => "parent_not_found",
            Self::AmbiguousMatch { .. } => "ambiguous_match",
            Self::SizeLimitExceeded { .. } => "size_limit_exceeded",
            Self::LockTimeout(_) => "lock_timeout",
            Self::SyncConflict { .. } => "sync_conflict",
            Self::CorruptStore { .. } => "corrupt_store",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
            Self::Git(_) => "git_error",
        }
    }

    /// Operational faults halt the requested operation outright; the rest are
    /// caller mistakes that can be corrected and resubmitted.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout(_) | Self::CorruptStore { .. } | Self::Io(_) | Self::Git(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;
