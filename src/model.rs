use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[clap(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Blocked,
    Closed,
    Deleted,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[clap(rename_all = "kebab-case")]
pub enum TaskType {
    #[default]
    Task,
    Bug,
    Feature,
    Story,
    Chore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[clap(rename_all = "kebab-case")]
pub enum RelationType {
    BlockedBy,
    Related,
    DiscoveredDuring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionEventType {
    UserPrompt,
    Compaction,
    SessionStart,
}

/// A typed edge from the owning task to another task. `relates_to` is not
/// checked for existence; it may point into the archive or another project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Relation {
    pub id: u64,
    pub relates_to: u64,
    pub as_type: RelationType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionEvent {
    pub timestamp: String,
    pub event_type: SessionEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Task {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    pub status: Status,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub design: String,
    pub category: String,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    /// Story-only log of notes shared with child tasks. Older records omit it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shared_context: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub session_events: Vec<SessionEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_reviewed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_num: Option<u64>,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Blocked => write!(f, "blocked"),
            Self::Closed => write!(f, "closed"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Bug => write!(f, "bug"),
            Self::Feature => write!(f, "feature"),
            Self::Story => write!(f, "story"),
            Self::Chore => write!(f, "chore"),
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlockedBy => write!(f, "blocked-by"),
            Self::Related => write!(f, "related"),
            Self::DiscoveredDuring => write!(f, "discovered-during"),
        }
    }
}

impl Task {
    /// A fresh open task with every optional field empty.
    pub fn new(id: u64, category: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            parent_id: None,
            status: Status::Open,
            task_type: TaskType::Task,
            title: title.into(),
            description: String::new(),
            design: String::new(),
            category: category.into(),
            meta: BTreeMap::new(),
            relations: Vec::new(),
            shared_context: Vec::new(),
            session_events: Vec::new(),
            code_reviewed: None,
            pr_num: None,
        }
    }

    pub fn is_story(&self) -> bool {
        self.task_type == TaskType::Story
    }
}
