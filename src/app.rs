use std::future::Future;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::commands::{
    complete_task_impl, create_task_impl, delete_task_impl, load_state_impl, shutdown_impl,
    toggle_task_impl, update_task_impl, CommandCtx, CommandResult,
};
use crate::console::{
    parse_command, render_notification, render_task_details, render_task_line, status_line,
    ConsoleCommand, HELP,
};
use crate::events::StatePayload;
use crate::models::{Settings, Task};
use crate::scheduler::{tick_interval, Clock, ReminderTracker};
use crate::state::TaskStore;
use crate::storage::{LoadOutcome, StorageError};

/// Commands run against a fixed data directory.
pub struct AppCtx {
    data_dir: PathBuf,
    tasks_file: String,
}

impl AppCtx {
    pub fn new(data_dir: PathBuf, settings: &Settings) -> Self {
        Self {
            data_dir,
            tasks_file: settings.tasks_file.clone(),
        }
    }
}

impl CommandCtx for AppCtx {
    fn data_dir(&self) -> Result<PathBuf, StorageError> {
        Ok(self.data_dir.clone())
    }

    fn tasks_file(&self) -> &str {
        &self.tasks_file
    }

    fn emit_state_updated(&self, payload: StatePayload) {
        log::debug!(
            "state updated total={} overdue={}",
            payload.total,
            payload.overdue_count
        );
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub quit: bool,
}

impl Reply {
    fn output(lines: Vec<String>) -> Self {
        Self { lines, quit: false }
    }
}

/// All session state: the task list, the scheduler memory and the clock.
/// Only ever touched from the single event loop.
pub struct App<C: Clock, X: CommandCtx = AppCtx> {
    ctx: X,
    settings: Settings,
    clock: C,
    store: TaskStore,
    tracker: ReminderTracker,
    last_overdue: Option<usize>,
}

impl<C: Clock, X: CommandCtx> App<C, X> {
    pub fn new(ctx: X, settings: Settings, clock: C) -> Self {
        Self {
            ctx,
            settings,
            clock,
            store: TaskStore::default(),
            tracker: ReminderTracker::new(),
            last_overdue: None,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Loads the tasks file and produces the greeting.
    pub fn start(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        match load_state_impl(&self.ctx, &mut self.store) {
            LoadOutcome::Loaded(count) => lines.push(format!("{count} task(s) loaded.")),
            LoadOutcome::Missing => lines.push("No saved tasks yet.".to_string()),
            LoadOutcome::Recovered {
                error,
                preserved_as,
            } => {
                lines.push(format!(
                    "warning: could not read saved tasks ({error}); starting with an empty list."
                ));
                if let Some(path) = preserved_as {
                    lines.push(format!("The unreadable file was kept at {}", path.display()));
                }
            }
        }
        lines.push("Type 'help' for commands.".to_string());
        lines
    }

    pub fn handle_line(&mut self, line: &str) -> Reply {
        let command = match parse_command(line, self.settings.default_priority) {
            Ok(Some(command)) => command,
            Ok(None) => return Reply::default(),
            Err(error) => return Reply::output(vec![format!("error: {error}")]),
        };
        let now = self.clock.now();
        let lines = match command {
            ConsoleCommand::Add(draft) => {
                report("added", create_task_impl(&self.ctx, &mut self.store, draft, now), now)
            }
            ConsoleCommand::Edit { id, patch } => match self.store.resolve(&id) {
                Ok(id) => report(
                    "updated",
                    update_task_impl(&self.ctx, &mut self.store, &id, &patch, now),
                    now,
                ),
                Err(error) => vec![format!("error: {error}")],
            },
            ConsoleCommand::Done(id) => match self.store.resolve(&id) {
                Ok(id) => report(
                    "completed",
                    complete_task_impl(&self.ctx, &mut self.store, &id, now),
                    now,
                ),
                Err(error) => vec![format!("error: {error}")],
            },
            ConsoleCommand::Toggle(id) => match self.store.resolve(&id) {
                Ok(id) => report(
                    "toggled",
                    toggle_task_impl(&self.ctx, &mut self.store, &id, now),
                    now,
                ),
                Err(error) => vec![format!("error: {error}")],
            },
            ConsoleCommand::Remove(id) => match self.store.resolve(&id) {
                Ok(id) => report(
                    "deleted",
                    delete_task_impl(&self.ctx, &mut self.store, &id, now),
                    now,
                ),
                Err(error) => vec![format!("error: {error}")],
            },
            ConsoleCommand::Show(id) => match self.store.resolve(&id) {
                Ok(id) => self
                    .store
                    .get(&id)
                    .map(|task| render_task_details(task, now))
                    .unwrap_or_default(),
                Err(error) => vec![format!("error: {error}")],
            },
            ConsoleCommand::List(filter) => {
                let tasks = self.store.list(filter, now);
                if tasks.is_empty() {
                    vec!["(no tasks)".to_string()]
                } else {
                    tasks
                        .into_iter()
                        .map(|task| render_task_line(task, now))
                        .collect()
                }
            }
            ConsoleCommand::Help => HELP.lines().map(str::to_string).collect(),
            ConsoleCommand::Quit => return Reply { lines: Vec::new(), quit: true },
        };
        Reply::output(lines)
    }

    /// One scheduler firing: notifications first, then the overdue summary
    /// whenever it changed since the last tick.
    pub fn on_tick(&mut self) -> Vec<String> {
        let now = self.clock.now();
        let report = self.tracker.tick(self.store.tasks(), now);
        let mut lines: Vec<String> = report
            .notifications
            .iter()
            .map(|notification| {
                log::info!(
                    "notification kind={:?} task={}",
                    notification.kind,
                    notification.task_id
                );
                render_notification(notification)
            })
            .collect();
        if self.last_overdue != Some(report.overdue_count) {
            lines.push(status_line(report.overdue_count));
            self.last_overdue = Some(report.overdue_count);
        }
        lines
    }

    /// Saves the in-memory state before exit.
    pub fn shutdown(&mut self) -> Vec<String> {
        let result = shutdown_impl(&self.ctx, &self.store, self.clock.now());
        match result.error {
            None => {
                log::info!("shutdown saved tasks count={}", self.store.len());
                vec!["Saved. Bye.".to_string()]
            }
            Some(error) => vec![format!("error: could not save on exit: {error}")],
        }
    }
}

fn report(verb: &str, result: CommandResult<Task>, now: NaiveDateTime) -> Vec<String> {
    match (result.data, result.error) {
        (Some(task), None) => vec![format!("{verb}: {}", render_task_line(&task, now))],
        (Some(task), Some(error)) => vec![
            format!("{verb}: {}", render_task_line(&task, now)),
            format!("warning: change kept in memory but not saved ({error})"),
        ],
        (None, Some(error)) => vec![format!("error: {error}")],
        (None, None) => Vec::new(),
    }
}

async fn write_lines<W: AsyncWrite + Unpin>(output: &mut W, lines: &[String]) -> std::io::Result<()> {
    for line in lines {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }
    output.flush().await
}

/// The single cooperative loop: console lines, timer ticks and the shutdown
/// signal are handled one at a time. Ends on `quit`, end of input, an output
/// error or `shutdown`, and saves before returning in every case.
pub async fn run_loop<C, X, R, W, S>(
    app: &mut App<C, X>,
    input: R,
    mut output: W,
    shutdown: S,
) -> std::io::Result<()>
where
    C: Clock,
    X: CommandCtx,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    let greeting = app.start();
    let mut write_error = write_lines(&mut output, &greeting).await.err();

    let mut lines = input.lines();
    let mut interval = tick_interval(app.settings().tick_interval_secs);
    tokio::pin!(shutdown);

    while write_error.is_none() {
        tokio::select! {
            _ = interval.tick() => {
                let out = app.on_tick();
                write_error = write_lines(&mut output, &out).await.err();
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let reply = app.handle_line(&line);
                    write_error = write_lines(&mut output, &reply.lines).await.err();
                    if reply.quit {
                        break;
                    }
                }
                Ok(None) => {
                    log::info!("input closed");
                    break;
                }
                Err(error) => {
                    log::error!("failed to read input: {error}");
                    break;
                }
            },
            _ = &mut shutdown => {
                log::info!("shutdown requested");
                break;
            }
        }
    }

    let farewell = app.shutdown();
    match write_error {
        Some(error) => {
            log::error!("failed to write output: {error}");
            Err(error)
        }
        None => write_lines(&mut output, &farewell).await,
    }
}
