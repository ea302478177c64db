//! Project discovery and path resolution.
//!
//! A project is any directory holding a `.taskmill/` store directory. Its
//! optional `config.json` can rename the store files and tune locking/sync.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TaskError};
use crate::store::lock::DEFAULT_LOCK_TIMEOUT;

pub const STORE_DIR: &str = ".taskmill";
pub const PROJECT_DIR_ENV: &str = "TASKMILL_DIR";

const CONFIG_FILE: &str = "config.json";
const LOCK_FILE: &str = "store.lock";
const STATE_FILE: &str = "execution_state.json";

fn default_version() -> u32 {
    1
}

fn default_active_file() -> String {
    "tasks.jsonl".into()
}

fn default_archive_file() -> String {
    "archive.jsonl".into()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT.as_millis() as u64
}

/// Contents of `.taskmill/config.json`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_active_file")]
    pub active_file: String,
    #[serde(default = "default_archive_file")]
    pub archive_file: String,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Refuse to merge on pull; diverged history becomes a sync error.
    #[serde(default)]
    pub fast_forward_only: bool,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            active_file: default_active_file(),
            archive_file: default_archive_file(),
            lock_timeout_ms: default_lock_timeout_ms(),
            fast_forward_only: false,
        }
    }
}

/// Resolved absolute locations for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub project_root: PathBuf,
    pub active_path: PathBuf,
    pub archive_path: PathBuf,
    pub lock_path: PathBuf,
    pub execution_state_path: PathBuf,
    pub lock_timeout: Duration,
    pub fast_forward_only: bool,
}

impl Config {
    /// Load the configuration of the project rooted at `project_root`.
    pub fn load(project_root: &Path) -> Result<Self> {
        let root = absolute(project_root)?;
        let store_dir = root.join(STORE_DIR);
        if !store_dir.is_dir() {
            return Err(TaskError::NotInitialized);
        }

        let config_path = store_dir.join(CONFIG_FILE);
        let file = if config_path.exists() {
            serde_json::from_str(&fs::read_to_string(&config_path)?)?
        } else {
            ConfigFile::default()
        };
        Ok(Self::from_file(root, &file))
    }

    /// Find the project from the environment override or by walking up from
    /// the current directory.
    pub fn discover() -> Result<Self> {
        if let Ok(dir) = std::env::var(PROJECT_DIR_ENV)
            && !dir.trim().is_empty()
        {
            debug!(dir = %dir, "project dir taken from {PROJECT_DIR_ENV}");
            return Self::load(Path::new(dir.trim()));
        }
        let cwd = std::env::current_dir()?;
        Self::load(&find_project_root(&cwd)?)
    }

    fn from_file(root: PathBuf, file: &ConfigFile) -> Self {
        let store_dir = root.join(STORE_DIR);
        Self {
            active_path: store_dir.join(&file.active_file),
            archive_path: store_dir.join(&file.archive_file),
            lock_path: store_dir.join(LOCK_FILE),
            execution_state_path: store_dir.join(STATE_FILE),
            lock_timeout: Duration::from_millis(file.lock_timeout_ms),
            fast_forward_only: file.fast_forward_only,
            project_root: root,
        }
    }

    pub fn store_dir(&self) -> PathBuf {
        self.project_root.join(STORE_DIR)
    }
}

/// Create the store directory with empty task files and a default config.
pub fn init(project_root: &Path) -> Result<Config> {
    let root = absolute(project_root)?;
    let store_dir = root.join(STORE_DIR);
    if store_dir.join(CONFIG_FILE).exists() {
        return Err(TaskError::AlreadyInitialized);
    }
    fs::create_dir_all(&store_dir)?;

    let file = ConfigFile::default();
    fs::write(
        store_dir.join(CONFIG_FILE),
        format!("{}\n", serde_json::to_string_pretty(&file)?),
    )?;
    // Lock and execution state are per-machine; keep them out of history.
    fs::write(
        store_dir.join(".gitignore"),
        format!("{LOCK_FILE}\n{STATE_FILE}\n.*.tmp.*\n"),
    )?;

    let config = Config::from_file(root, &file);
    for path in [&config.active_path, &config.archive_path] {
        if !path.exists() {
            fs::write(path, "")?;
        }
    }
    Ok(config)
}

/// Walk up from `start` to the nearest directory holding a store directory.
pub fn find_project_root(start: &Path) -> Result<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(STORE_DIR).is_dir() {
            return Ok(dir);
        }
        if !dir.pop() {
            return Err(TaskError::NotInitialized);
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_creates_store_layout() {
        let dir = tempdir().unwrap();
        let config = init(dir.path()).unwrap();
        assert!(config.active_path.exists());
        assert!(config.archive_path.exists());
        assert!(config.store_dir().join("config.json").exists());
        let ignore = fs::read_to_string(config.store_dir().join(".gitignore")).unwrap();
        assert!(ignore.contains("store.lock"));
        assert!(ignore.contains("execution_state.json"));
    }

    #[test]
    fn init_twice_fails() {
        let dir = tempdir().unwrap();
        init(dir.path()).unwrap();
        assert!(matches!(
            init(dir.path()),
            Err(TaskError::AlreadyInitialized)
        ));
    }

    #[test]
    fn load_requires_store_dir() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(TaskError::NotInitialized)
        ));
    }

    #[test]
    fn load_resolves_absolute_paths_from_config() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(STORE_DIR)).unwrap();
        fs::write(
            dir.path().join(STORE_DIR).join("config.json"),
            r#"{"active_file": "work.jsonl", "lock_timeout_ms": 250}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert!(config.active_path.is_absolute());
        assert_eq!(
            config.active_path,
            dir.path().join(STORE_DIR).join("work.jsonl")
        );
        assert_eq!(
            config.archive_path,
            dir.path().join(STORE_DIR).join("archive.jsonl")
        );
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert!(!config.fast_forward_only);
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(STORE_DIR)).unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.lock_timeout, DEFAULT_LOCK_TIMEOUT);
        assert!(config.active_path.ends_with("tasks.jsonl"));
    }

    #[test]
    fn find_project_root_walks_up() {
        let dir = tempdir().unwrap();
        init(dir.path()).unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested).unwrap(), dir.path());
    }
}
