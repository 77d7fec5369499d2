use std::path::PathBuf;

use crate::models::{Settings, SettingsFile};
use crate::storage::{Storage, StorageError};

pub const APP_DIR_NAME: &str = "todo-minder";
pub const DATA_DIR_ENV: &str = "TODO_MINDER_DATA_DIR";
pub const SCHEMA_VERSION: u32 = 1;

/// `$TODO_MINDER_DATA_DIR`, else the platform data dir, else the working directory.
pub fn data_directory() -> PathBuf {
    resolve_data_directory(std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
}

fn resolve_data_directory(override_dir: Option<PathBuf>) -> PathBuf {
    override_dir
        .filter(|dir| !dir.as_os_str().is_empty())
        .or_else(|| dirs::data_local_dir().map(|dir| dir.join(APP_DIR_NAME)))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Reads `settings.json`, writing the defaults out the first time so they
/// can be edited. A broken settings file falls back to defaults.
pub fn load_settings(root: &std::path::Path) -> Settings {
    let storage = Storage::new(root.to_path_buf(), Settings::default().tasks_file);
    match storage.load_settings() {
        Ok(file) => file.settings,
        Err(error) if error.is_not_found() => {
            let settings = Settings::default();
            if let Err(write_err) = write_defaults(&storage, &settings) {
                log::warn!("could not write default settings: {write_err}");
            }
            settings
        }
        Err(error) => {
            log::warn!(
                "settings file unreadable, using defaults: {error} path={}",
                storage.settings_path().display()
            );
            Settings::default()
        }
    }
}

fn write_defaults(storage: &Storage, settings: &Settings) -> Result<(), StorageError> {
    storage.ensure_dirs()?;
    storage.save_settings(&SettingsFile {
        schema_version: SCHEMA_VERSION,
        settings: settings.clone(),
    })
}
