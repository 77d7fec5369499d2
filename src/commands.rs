use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::events::StatePayload;
use crate::models::{Task, TaskDraft, TaskPatch};
use crate::state::TaskStore;
use crate::storage::{LoadOutcome, Storage, StorageError};

#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

/// Everything a command needs from its surroundings besides the store.
pub trait CommandCtx {
    fn data_dir(&self) -> Result<PathBuf, StorageError>;
    fn tasks_file(&self) -> &str;
    fn emit_state_updated(&self, payload: StatePayload);

    fn storage(&self) -> Result<Storage, StorageError> {
        Ok(Storage::new(self.data_dir()?, self.tasks_file()))
    }
}

fn ok<T>(data: T) -> CommandResult<T> {
    CommandResult {
        ok: true,
        data: Some(data),
        error: None,
    }
}

fn err<T>(message: &str) -> CommandResult<T> {
    CommandResult {
        ok: false,
        data: None,
        error: Some(message.to_string()),
    }
}

/// The change happened in memory but could not be written to disk.
fn unsaved<T>(data: T, message: &str) -> CommandResult<T> {
    CommandResult {
        ok: false,
        data: Some(data),
        error: Some(message.to_string()),
    }
}

pub fn persist(
    ctx: &impl CommandCtx,
    store: &TaskStore,
    now: NaiveDateTime,
) -> Result<(), StorageError> {
    let storage = ctx.storage()?;
    storage.ensure_dirs()?;
    storage.save_tasks(store.tasks())?;
    log::debug!(
        "tasks saved count={} path={}",
        store.len(),
        storage.tasks_path().display()
    );
    ctx.emit_state_updated(StatePayload {
        total: store.len(),
        overdue_count: store.overdue_count(now),
    });
    Ok(())
}

fn persist_result<T>(
    ctx: &impl CommandCtx,
    store: &TaskStore,
    now: NaiveDateTime,
    data: T,
) -> CommandResult<T> {
    match persist(ctx, store, now) {
        Ok(()) => ok(data),
        Err(error) => {
            log::error!("failed to save tasks: {error}");
            unsaved(data, &format!("storage error: {error}"))
        }
    }
}

/// Replaces the store contents with whatever is on disk. Never fails: an
/// unreadable file leaves an empty list and an outcome the caller can show.
pub fn load_state_impl(ctx: &impl CommandCtx, store: &mut TaskStore) -> LoadOutcome {
    let storage = match ctx.storage() {
        Ok(storage) => storage,
        Err(error) => {
            log::warn!("data directory unavailable: {error}");
            store.replace_tasks(Vec::new());
            return LoadOutcome::Recovered {
                error,
                preserved_as: None,
            };
        }
    };
    let (tasks, outcome) = storage.load_tasks_or_empty();
    match &outcome {
        LoadOutcome::Loaded(count) => {
            log::info!(
                "loaded tasks count={count} path={}",
                storage.tasks_path().display()
            )
        }
        LoadOutcome::Missing => log::info!(
            "no tasks file at {}, starting empty",
            storage.tasks_path().display()
        ),
        LoadOutcome::Recovered {
            error,
            preserved_as,
        } => log::warn!(
            "tasks file unreadable, starting empty: {error} preserved_as={:?}",
            preserved_as
        ),
    }
    store.replace_tasks(tasks);
    outcome
}

pub fn create_task_impl(
    ctx: &impl CommandCtx,
    store: &mut TaskStore,
    draft: TaskDraft,
    now: NaiveDateTime,
) -> CommandResult<Task> {
    let task = match store.add(draft, now) {
        Ok(task) => task,
        Err(error) => return err(&error.to_string()),
    };
    log::info!("task created id={}", task.id);
    persist_result(ctx, store, now, task)
}

pub fn update_task_impl(
    ctx: &impl CommandCtx,
    store: &mut TaskStore,
    task_id: &str,
    patch: &TaskPatch,
    now: NaiveDateTime,
) -> CommandResult<Task> {
    if patch.is_empty() {
        return err("nothing to change");
    }
    let task = match store.update(task_id, patch, now) {
        Ok(task) => task,
        Err(error) => return err(&error.to_string()),
    };
    log::info!("task updated id={}", task.id);
    persist_result(ctx, store, now, task)
}

pub fn complete_task_impl(
    ctx: &impl CommandCtx,
    store: &mut TaskStore,
    task_id: &str,
    now: NaiveDateTime,
) -> CommandResult<Task> {
    let task = match store.complete(task_id) {
        Ok(task) => task,
        Err(error) => return err(&error.to_string()),
    };
    log::info!("task completed id={}", task.id);
    persist_result(ctx, store, now, task)
}

pub fn toggle_task_impl(
    ctx: &impl CommandCtx,
    store: &mut TaskStore,
    task_id: &str,
    now: NaiveDateTime,
) -> CommandResult<Task> {
    let task = match store.toggle(task_id) {
        Ok(task) => task,
        Err(error) => return err(&error.to_string()),
    };
    log::info!("task toggled id={} completed={}", task.id, task.completed);
    persist_result(ctx, store, now, task)
}

pub fn delete_task_impl(
    ctx: &impl CommandCtx,
    store: &mut TaskStore,
    task_id: &str,
    now: NaiveDateTime,
) -> CommandResult<Task> {
    let task = match store.remove(task_id) {
        Ok(task) => task,
        Err(error) => return err(&error.to_string()),
    };
    log::info!("task deleted id={}", task.id);
    persist_result(ctx, store, now, task)
}

/// Final save on the way out.
pub fn shutdown_impl(
    ctx: &impl CommandCtx,
    store: &TaskStore,
    now: NaiveDateTime,
) -> CommandResult<usize> {
    persist_result(ctx, store, now, store.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::state::TaskFilter;
    use chrono::NaiveDate;
    use std::fs;
    use std::sync::Mutex;

    struct TestCtx {
        root: tempfile::TempDir,
        data_dir_error: Option<String>,
        emitted: Mutex<Vec<StatePayload>>,
    }

    impl TestCtx {
        fn new() -> Self {
            Self {
                root: tempfile::tempdir().unwrap(),
                data_dir_error: None,
                emitted: Mutex::new(Vec::new()),
            }
        }

        fn with_data_dir_error(message: &str) -> Self {
            let mut ctx = Self::new();
            ctx.data_dir_error = Some(message.to_string());
            ctx
        }

        fn root_path(&self) -> &std::path::Path {
            self.root.path()
        }

        fn saved_tasks(&self) -> Vec<Task> {
            let raw = fs::read_to_string(self.root_path().join("tasks.json")).unwrap();
            serde_json::from_str(&raw).unwrap()
        }
    }

    impl CommandCtx for TestCtx {
        fn data_dir(&self) -> Result<PathBuf, StorageError> {
            if let Some(message) = &self.data_dir_error {
                return Err(StorageError::Io(std::io::Error::other(message.clone())));
            }
            Ok(self.root.path().to_path_buf())
        }

        fn tasks_file(&self) -> &str {
            "tasks.json"
        }

        fn emit_state_updated(&self, payload: StatePayload) {
            self.emitted.lock().unwrap().push(payload);
        }
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn draft(title: &str, deadline: Option<NaiveDateTime>) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            deadline,
            ..TaskDraft::default()
        }
    }

    #[test]
    fn ok_err_and_unsaved_helpers_construct_expected_shape() {
        let r = ok(1);
        assert!(r.ok);
        assert_eq!(r.data, Some(1));
        assert_eq!(r.error, None);

        let r: CommandResult<i32> = err("nope");
        assert!(!r.ok);
        assert_eq!(r.data, None);
        assert_eq!(r.error, Some("nope".to_string()));

        let r = unsaved(2, "disk");
        assert!(!r.ok);
        assert_eq!(r.data, Some(2));
        assert_eq!(r.error, Some("disk".to_string()));
    }

    #[test]
    fn create_persists_snapshot_and_emits_state() {
        let ctx = TestCtx::new();
        let mut store = TaskStore::default();

        let res = create_task_impl(&ctx, &mut store, draft("a", Some(at(10, 0))), at(9, 0));
        assert!(res.ok);
        let task = res.data.unwrap();
        assert_eq!(ctx.saved_tasks(), vec![task]);

        let emitted = ctx.emitted.lock().unwrap();
        assert_eq!(
            emitted.as_slice(),
            &[StatePayload {
                total: 1,
                overdue_count: 0
            }]
        );
    }

    #[test]
    fn invalid_input_is_rejected_without_saving() {
        let ctx = TestCtx::new();
        let mut store = TaskStore::default();

        let res = create_task_impl(&ctx, &mut store, draft("  ", None), at(9, 0));
        assert!(!res.ok);
        assert!(res.data.is_none());
        assert_eq!(res.error.as_deref(), Some("title must not be empty"));
        assert!(store.is_empty());
        assert!(!ctx.root_path().join("tasks.json").exists());
        assert!(ctx.emitted.lock().unwrap().is_empty());
    }

    #[test]
    fn write_failure_keeps_in_memory_change() {
        let ctx = TestCtx::new();
        fs::create_dir_all(ctx.root_path().join("tasks.json")).unwrap();
        let mut store = TaskStore::default();

        let res = create_task_impl(&ctx, &mut store, draft("keep me", None), at(9, 0));
        assert!(!res.ok);
        let task = res.data.expect("task is returned even when unsaved");
        assert!(res.error.unwrap().starts_with("storage error"));
        assert_eq!(store.get(&task.id), Some(&task));

        let bad_ctx = TestCtx::with_data_dir_error("nope");
        let res = complete_task_impl(&bad_ctx, &mut store, &task.id, at(9, 1));
        assert!(!res.ok);
        assert!(store.get(&task.id).unwrap().completed);
    }

    #[test]
    fn update_complete_toggle_and_delete_cover_found_and_not_found() {
        let ctx = TestCtx::new();
        let mut store = TaskStore::default();
        let task = create_task_impl(&ctx, &mut store, draft("a", Some(at(10, 0))), at(9, 0))
            .data
            .unwrap();

        let empty = update_task_impl(&ctx, &mut store, &task.id, &TaskPatch::default(), at(9, 0));
        assert_eq!(empty.error.as_deref(), Some("nothing to change"));

        let patch = TaskPatch {
            priority: Some(Priority::Low),
            ..TaskPatch::default()
        };
        let res = update_task_impl(&ctx, &mut store, &task.id, &patch, at(9, 0));
        assert!(res.ok);
        assert_eq!(ctx.saved_tasks()[0].priority, Priority::Low);

        let res = update_task_impl(&ctx, &mut store, "missing", &patch, at(9, 0));
        assert_eq!(res.error.as_deref(), Some("task not found: missing"));

        assert!(complete_task_impl(&ctx, &mut store, &task.id, at(9, 0)).ok);
        assert!(ctx.saved_tasks()[0].completed);
        assert!(!complete_task_impl(&ctx, &mut store, "missing", at(9, 0)).ok);

        let res = toggle_task_impl(&ctx, &mut store, &task.id, at(9, 0));
        assert!(!res.data.unwrap().completed);
        assert!(!ctx.saved_tasks()[0].completed);

        assert!(delete_task_impl(&ctx, &mut store, &task.id, at(9, 0)).ok);
        assert!(ctx.saved_tasks().is_empty());
        assert!(!delete_task_impl(&ctx, &mut store, &task.id, at(9, 0)).ok);
    }

    #[test]
    fn deleted_task_is_gone_after_reload() {
        let ctx = TestCtx::new();
        let mut store = TaskStore::default();
        let keep = create_task_impl(&ctx, &mut store, draft("keep", Some(at(10, 0))), at(9, 0))
            .data
            .unwrap();
        let gone = create_task_impl(&ctx, &mut store, draft("gone", Some(at(10, 0))), at(9, 0))
            .data
            .unwrap();
        assert!(delete_task_impl(&ctx, &mut store, &gone.id, at(9, 0)).ok);

        let mut reloaded = TaskStore::default();
        let outcome = load_state_impl(&ctx, &mut reloaded);
        assert!(matches!(outcome, LoadOutcome::Loaded(1)));
        assert_eq!(reloaded.tasks(), &[keep]);
        assert!(reloaded
            .list(TaskFilter::Overdue, at(11, 0))
            .iter()
            .all(|task| task.id != gone.id));
    }

    #[test]
    fn load_state_recovers_from_missing_corrupt_and_unavailable() {
        let ctx = TestCtx::new();
        let mut store = TaskStore::new(vec![Task::from_draft(draft("stale", None), at(1, 0))]);
        assert!(matches!(
            load_state_impl(&ctx, &mut store),
            LoadOutcome::Missing
        ));
        assert!(store.is_empty());

        fs::write(ctx.root_path().join("tasks.json"), b"[{\"title\": 5}]").unwrap();
        assert!(matches!(
            load_state_impl(&ctx, &mut store),
            LoadOutcome::Recovered { .. }
        ));
        assert!(store.is_empty());

        let bad_ctx = TestCtx::with_data_dir_error("nope");
        assert!(matches!(
            load_state_impl(&bad_ctx, &mut store),
            LoadOutcome::Recovered {
                preserved_as: None,
                ..
            }
        ));
    }

    #[test]
    fn shutdown_saves_current_state() {
        let ctx = TestCtx::new();
        let store = TaskStore::new(vec![Task::from_draft(draft("a", None), at(1, 0))]);
        let res = shutdown_impl(&ctx, &store, at(2, 0));
        assert_eq!(res.data, Some(1));
        assert_eq!(ctx.saved_tasks().len(), 1);
    }
}
