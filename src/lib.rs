//! taskmill: a git-synchronized task store shared by cooperating processes.

pub mod commands;
pub mod config;
pub mod error;
pub mod git;
pub mod model;
pub mod output;
pub mod schema;
pub mod store;

pub use error::{Result, TaskError};
pub use model::{Relation, RelationType, SessionEvent, SessionEventType, Status, Task, TaskType};
pub use store::ops::{NewTask, SelectedTask, TaskQuery, TaskRef, TaskUpdate};
pub use store::repo::TaskRepo;
