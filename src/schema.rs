//! JSON Schema for task records.
//!
//! Every write that originates outside the crate passes through [`validate`]
//! before it reaches disk. [`explain`] returns the same findings as structured
//! diagnostics so callers can show the user every violated constraint at once.

use std::sync::LazyLock;

use jsonschema::Validator;
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{Result, TaskError};
use crate::model::Task;

/// One violated constraint, located by JSON pointer (`""` is the record root).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(pub Vec<Violation>);

impl Diagnostics {
    fn single(path: &str, message: impl Into<String>) -> Self {
        Self(vec![Violation {
            path: path.to_string(),
            message: message.into(),
        }])
    }

    pub fn violations(&self) -> &[Violation] {
        &self.0
    }

    /// True when some violation sits at `pointer` or below it.
    pub fn touches(&self, pointer: &str) -> bool {
        self.0.iter().any(|v| v.path.starts_with(pointer))
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts = self
            .0
            .iter()
            .map(|v| {
                if v.path.is_empty() {
                    v.message.clone()
                } else {
                    format!("{}: {}", v.path, v.message)
                }
            })
            .collect::<Vec<_>>();
        write!(f, "{}", parts.join("; "))
    }
}

impl From<serde_json::Error> for Diagnostics {
    fn from(err: serde_json::Error) -> Self {
        Self::single("", err.to_string())
    }
}

const NON_BLANK: &str = "\\S";

fn task_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["id", "status", "type", "title", "category"],
        "additionalProperties": false,
        "properties": {
            "id": { "type": "integer", "minimum": 1 },
            "parent_id": { "type": ["integer", "null"], "minimum": 1 },
            "status": {
                "enum": ["open", "in-progress", "blocked", "closed", "deleted"]
            },
            "type": { "enum": ["task", "bug", "feature", "story", "chore"] },
            "title": { "type": "string", "pattern": NON_BLANK },
            "description": { "type": "string" },
            "design": { "type": "string" },
            "category": { "type": "string", "pattern": NON_BLANK },
            "meta": {
                "type": "object",
                "additionalProperties": { "type": "string" }
            },
            "relations": {
                "type": "array",
                "items": { "$ref": "#/$defs/relation" }
            },
            "shared_context": {
                "type": ["array", "null"],
                "items": { "type": "string" }
            },
            "session_events": {
                "type": ["array", "null"],
                "items": { "$ref": "#/$defs/session_event" }
            },
            "code_reviewed": { "type": ["string", "null"] },
            "pr_num": { "type": ["integer", "null"], "minimum": 0 }
        },
        "$defs": {
            "relation": {
                "type": "object",
                "required": ["id", "relates_to", "as_type"],
                "additionalProperties": false,
                "properties": {
                    "id": { "type": "integer", "minimum": 0 },
                    "relates_to": { "type": "integer", "minimum": 1 },
                    "as_type": {
                        "enum": ["blocked-by", "related", "discovered-during"]
                    }
                }
            },
            "session_event": {
                "type": "object",
                "required": ["timestamp", "event_type"],
                "additionalProperties": false,
                "properties": {
                    "timestamp": { "type": "string", "pattern": NON_BLANK },
                    "event_type": {
                        "enum": ["user-prompt", "compaction", "session-start"]
                    },
                    "content": { "type": ["string", "null"] },
                    "trigger": { "type": ["string", "null"] },
                    "session_id": { "type": ["string", "null"] }
                }
            }
        }
    })
}

static TASK_VALIDATOR: LazyLock<std::result::Result<Validator, String>> = LazyLock::new(|| {
    jsonschema::validator_for(&task_schema())
        .map_err(|err| format!("task schema failed to compile: {err}"))
});

/// Describe every constraint `value` violates, or `None` when it is a valid task.
pub fn explain(value: &Value) -> Option<Diagnostics> {
    match value {
        Value::Null => return Some(Diagnostics::single("", "task must not be null")),
        Value::Object(map) if map.is_empty() => {
            return Some(Diagnostics::single("", "task must not be an empty object"));
        }
        _ => {}
    }

    let validator = match &*TASK_VALIDATOR {
        Ok(validator) => validator,
        Err(message) => return Some(Diagnostics::single("", message.clone())),
    };

    let violations = validator
        .iter_errors(value)
        .map(|err| Violation {
            path: err.instance_path.to_string(),
            message: err.to_string(),
        })
        .collect::<Vec<_>>();

    if violations.is_empty() {
        None
    } else {
        Some(Diagnostics(violations))
    }
}

/// Predicate form of [`explain`].
pub fn is_valid(value: &Value) -> bool {
    explain(value).is_none()
}

pub fn validate(value: &Value) -> Result<()> {
    match explain(value) {
        Some(diagnostics) => Err(TaskError::Validation(diagnostics)),
        None => Ok(()),
    }
}

/// Validate a typed record through the same schema external writes use.
pub fn validate_task(task: &Task) -> Result<()> {
    validate(&serde_json::to_value(task)?)
}

/// Strings pass through; anything else becomes its compact JSON text.
pub fn meta_value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Replace every non-string value in a `meta` object with its JSON text.
pub fn coerce_meta(meta: &mut serde_json::Map<String, Value>) {
    for value in meta.values_mut() {
        if !value.is_string() {
            *value = Value::String(meta_value_to_string(value.take()));
        }
    }
}

/// Coerce `meta` values in place when `record` is an object carrying a `meta` object.
pub fn coerce_record_meta(record: &mut Value) {
    if let Some(Value::Object(meta)) = record.get_mut("meta") {
        coerce_meta(meta);
    }
}
