pub mod app;
pub mod commands;
pub mod config;
pub mod console;
pub mod events;
pub mod input;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod state;
pub mod storage;

use std::future::Future;
use std::path::PathBuf;

use crate::app::{run_loop, App, AppCtx};
use crate::scheduler::SystemClock;

/// Runs the interactive session against `data_dir` until `quit`, end of
/// input or ctrl-c. State is saved on every exit path.
pub async fn run(data_dir: PathBuf) -> std::io::Result<()> {
    let settings = config::load_settings(&data_dir);
    log::info!(
        "starting data_dir={} tick_interval_secs={}",
        data_dir.display(),
        settings.tick_interval_secs
    );

    let ctx = AppCtx::new(data_dir, &settings);
    let mut app = App::new(ctx, settings, SystemClock);

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let output = tokio::io::stdout();
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            log::warn!("ctrl-c handler unavailable: {error}");
            std::future::pending::<()>().await;
        }
    };

    run_loop(&mut app, input, output, ctrl_c).await
}

/// Drives `session` on `runtime`, then drops the runtime without waiting on
/// blocking work such as a pending stdin read, which tokio cannot cancel.
pub fn block_on_detached<F: Future>(runtime: tokio::runtime::Runtime, session: F) -> F::Output {
    let output = runtime.block_on(session);
    runtime.shutdown_background();
    output
}
