use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{SettingsFile, Task};

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Io(err) if err.kind() == std::io::ErrorKind::NotFound)
    }
}

/// How a startup load went. Only `Loaded` and `Missing` are silent.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(usize),
    Missing,
    Recovered {
        error: StorageError,
        preserved_as: Option<PathBuf>,
    },
}

pub struct Storage {
    root: PathBuf,
    tasks_file: String,
}

impl Storage {
    pub fn new(root: PathBuf, tasks_file: impl Into<String>) -> Self {
        Self {
            root,
            tasks_file: tasks_file.into(),
        }
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.root.join(&self.tasks_file)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn load_tasks(&self) -> Result<Vec<Task>, StorageError> {
        self.load_json(&self.tasks_path())
    }

    /// Loads the task list without ever failing: a missing file is an empty
    /// list, a malformed one is copied aside and also treated as empty.
    pub fn load_tasks_or_empty(&self) -> (Vec<Task>, LoadOutcome) {
        match self.load_tasks() {
            Ok(tasks) => {
                let count = tasks.len();
                (tasks, LoadOutcome::Loaded(count))
            }
            Err(error) if error.is_not_found() => (Vec::new(), LoadOutcome::Missing),
            Err(error) => {
                let preserved_as = match self.preserve_corrupt(&self.tasks_path()) {
                    Ok(path) => Some(path),
                    Err(copy_err) => {
                        log::warn!("could not preserve unreadable tasks file: {copy_err}");
                        None
                    }
                };
                (
                    Vec::new(),
                    LoadOutcome::Recovered {
                        error,
                        preserved_as,
                    },
                )
            }
        }
    }

    pub fn save_tasks(&self, tasks: &[Task]) -> Result<(), StorageError> {
        self.write_atomic(&self.tasks_path(), tasks)
    }

    pub fn load_settings(&self) -> Result<SettingsFile, StorageError> {
        self.load_json(&self.settings_path())
    }

    pub fn save_settings(&self, data: &SettingsFile) -> Result<(), StorageError> {
        self.write_atomic(&self.settings_path(), data)
    }

    fn load_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StorageError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes `<file>.tmp` beside `path`, syncs it, then renames it over
    /// `path` so readers only ever see a complete file.
    fn write_atomic<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        data: &T,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(data)?;
        let staging = staging_path(path);
        let mut staged = File::create(&staging)?;
        staged.write_all(&json)?;
        staged.sync_all()?;
        drop(staged);
        fs::rename(&staging, path)?;
        log::trace!("wrote {} bytes to {}", json.len(), path.display());
        Ok(())
    }

    fn preserve_corrupt(&self, path: &Path) -> Result<PathBuf, StorageError> {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("tasks.json");
        let target = path.with_file_name(format!("{name}.corrupt-{timestamp}"));
        fs::copy(path, &target)?;
        Ok(target)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
