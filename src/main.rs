use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use taskmill::config::{Config, PROJECT_DIR_ENV};
use taskmill::error::{Result, TaskError};
use taskmill::model::{Status, TaskType};
use taskmill::output::Format;
use taskmill::{NewTask, TaskQuery, TaskRef, TaskUpdate};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(
    name = "taskmill",
    version,
    about = "Git-synchronized task store for cooperating agents"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    /// Project directory (defaults to the nearest ancestor holding .taskmill/)
    #[arg(long, global = true, env = PROJECT_DIR_ENV)]
    project: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize .taskmill/ in the current (or --project) directory
    Init,
    /// Add a task to the active store
    Add {
        /// Task title
        title: String,
        /// Prompt template governing execution
        #[arg(long, default_value = "simple")]
        category: String,
        /// Task type
        #[arg(long = "type", value_enum, default_value = "task")]
        task_type: TaskType,
        #[arg(long, short)]
        description: Option<String>,
        #[arg(long)]
        design: Option<String>,
        /// Parent story ID
        #[arg(long)]
        parent: Option<u64>,
        /// Insert at the front of the parent's children instead of the end
        #[arg(long)]
        prepend: bool,
        /// Meta entry as KEY=VALUE (repeatable)
        #[arg(long = "meta", value_parser = parse_key_value)]
        meta: Vec<(String, String)>,
    },
    /// Update fields of an active task
    Update {
        id: u64,
        /// Full JSON patch; cannot be combined with field flags
        #[arg(long, conflicts_with_all = [
            "title", "description", "design", "category", "status", "task_type",
            "parent", "clear_parent", "meta", "clear_meta", "context", "pr",
        ])]
        json: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, short)]
        description: Option<String>,
        #[arg(long)]
        design: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long = "type", value_enum)]
        task_type: Option<TaskType>,
        #[arg(long, conflicts_with = "clear_parent")]
        parent: Option<u64>,
        /// Detach from the parent story
        #[arg(long)]
        clear_parent: bool,
        /// Replace meta with these KEY=VALUE entries (repeatable)
        #[arg(long = "meta", value_parser = parse_key_value, conflicts_with = "clear_meta")]
        meta: Vec<(String, String)>,
        #[arg(long)]
        clear_meta: bool,
        /// Append a shared-context note (repeatable)
        #[arg(long)]
        context: Vec<String>,
        /// Pull request number
        #[arg(long)]
        pr: Option<u64>,
    },
    /// Close a task and move it to the archive
    Complete {
        /// Task ID, or a title substring matching exactly one active task
        target: String,
        /// Treat TARGET as a title pattern even if it is numeric
        #[arg(long)]
        by_title: bool,
        /// Comment appended to the description
        #[arg(long, short)]
        comment: Option<String>,
    },
    /// Mark a task deleted and move it to the archive
    Delete {
        /// Task ID, or a title substring matching exactly one active task
        target: String,
        #[arg(long)]
        by_title: bool,
    },
    /// Filter tasks
    Select {
        #[arg(long)]
        id: Option<u64>,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long = "type", value_enum)]
        task_type: Option<TaskType>,
        #[arg(long)]
        parent: Option<u64>,
        /// Case-insensitive title substring
        #[arg(long)]
        title: Option<String>,
        /// Include archived tasks
        #[arg(long)]
        archived: bool,
    },
    /// Show one task (active or archived)
    Show { id: u64 },
    /// Pull remote history without changing tasks
    Sync,
    /// Inspect or change the execution state
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Record the task currently being executed
    Set {
        #[arg(long)]
        story: u64,
        #[arg(long)]
        task: u64,
    },
    /// Remove the execution state (manual mode)
    Clear,
    /// Print the execution state
    Show,
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

fn parse_target(target: String, by_title: bool) -> TaskRef {
    match target.trim().parse::<u64>() {
        Ok(id) if !by_title => TaskRef::Id(id),
        _ => TaskRef::Title(target),
    }
}

fn project_root(cli_project: Option<PathBuf>) -> Result<PathBuf> {
    match cli_project {
        Some(dir) => Ok(Config::load(&dir)?.project_root),
        None => Ok(Config::discover()?.project_root),
    }
}

fn run(cli: Cli, format: Format) -> Result<()> {
    if let Commands::Init = cli.command {
        let dir = match cli.project {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        return taskmill::commands::init::run(&dir);
    }

    let root = project_root(cli.project)?;

    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Add {
            title,
            category,
            task_type,
            description,
            design,
            parent,
            prepend,
            meta,
        } => {
            let request = NewTask {
                category,
                title,
                description,
                design,
                task_type,
                parent_id: parent,
                prepend,
                meta: meta.into_iter().collect::<BTreeMap<_, _>>(),
                relations: vec![],
            };
            taskmill::commands::add::run(&root, request, format)
        }
        Commands::Update {
            id,
            json,
            title,
            description,
            design,
            category,
            status,
            task_type,
            parent,
            clear_parent,
            meta,
            clear_meta,
            context,
            pr,
        } => {
            let update = match json {
                Some(raw) => TaskUpdate::from_json(
                    serde_json::from_str(&raw).map_err(|e| TaskError::Validation(e.into()))?,
                )?,
                None => TaskUpdate {
                    title,
                    description,
                    design,
                    category,
                    status,
                    task_type,
                    parent_id: if clear_parent { Some(None) } else { parent.map(Some) },
                    meta: if clear_meta {
                        Some(None)
                    } else if meta.is_empty() {
                        None
                    } else {
                        Some(Some(
                            meta.into_iter()
                                .map(|(k, v)| (k, Value::String(v)))
                                .collect::<Map<_, _>>(),
                        ))
                    },
                    shared_context: (!context.is_empty()).then_some(context),
                    pr_num: pr.map(Some),
                    ..TaskUpdate::default()
                },
            };
            taskmill::commands::update::run(&root, id, update, format)
        }
        Commands::Complete {
            target,
            by_title,
            comment,
        } => taskmill::commands::lifecycle::complete(
            &root,
            parse_target(target, by_title),
            comment,
            format,
        ),
        Commands::Delete { target, by_title } => {
            taskmill::commands::lifecycle::delete(&root, parse_target(target, by_title), format)
        }
        Commands::Select {
            id,
            status,
            task_type,
            parent,
            title,
            archived,
        } => {
            let query = TaskQuery {
                id,
                status,
                task_type,
                parent_id: parent,
                title,
                include_archive: archived,
            };
            taskmill::commands::select::run(&root, query, format)
        }
        Commands::Show { id } => taskmill::commands::show::run(&root, id, format),
        Commands::Sync => taskmill::commands::sync::run(&root, format),
        Commands::State { action } => match action {
            StateAction::Set { story, task } => {
                taskmill::commands::state::set(&root, story, task, format)
            }
            StateAction::Clear => taskmill::commands::state::clear(&root, format),
            StateAction::Show => taskmill::commands::state::show(&root, format),
        },
    }
}

fn init_tracing() {
    // Opt-in via TASKMILL_LOG or RUST_LOG; logs go to stderr so stdout stays parseable.
    let filter = ["TASKMILL_LOG", "RUST_LOG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|raw| raw.trim().to_string())
        .find(|raw| !raw.is_empty())
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                let mut body = serde_json::json!({
                    "error": e.code(),
                    "message": e.to_string()
                });
                match &e {
                    TaskError::Validation(diagnostics) => {
                        body["details"] = serde_json::json!(diagnostics);
                    }
                    TaskError::SyncConflict { error_type, .. } => {
                        body["error_type"] = serde_json::json!(error_type);
                    }
                    _ => {}
                }
                eprintln!("{body}");
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(if e.is_operational() { 2 } else { 1 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_target_is_an_id_unless_forced() {
        assert_eq!(parse_target("12".into(), false), TaskRef::Id(12));
        assert_eq!(
            parse_target("12".into(), true),
            TaskRef::Title("12".into())
        );
        assert_eq!(
            parse_target("login bug".into(), false),
            TaskRef::Title("login bug".into())
        );
    }

    #[test]
    fn key_value_parser() {
        assert_eq!(
            parse_key_value("refined=yes").unwrap(),
            ("refined".to_string(), "yes".to_string())
        );
        assert_eq!(
            parse_key_value("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }
}
