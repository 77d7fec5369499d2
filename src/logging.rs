use std::any::Any;
use std::path::Path;

pub const LOG_FILE_BASENAME: &str = "todo-minder";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const LOG_ROTATE_KEEP_FILES: usize = 10;
pub const LOG_ENV: &str = "TODO_MINDER_LOG";

/// Logs live next to the tasks and settings files.
pub fn log_directory(data_dir: &Path) -> &Path {
    data_dir
}

/// Log spec from `TODO_MINDER_LOG`, then `RUST_LOG`, then the build default.
pub fn log_spec(app_var: Option<String>, rust_log: Option<String>) -> String {
    let default_spec = if cfg!(debug_assertions) {
        "warn,todo_minder=debug"
    } else {
        "warn,todo_minder=info"
    };
    app_var
        .filter(|value| !value.trim().is_empty())
        .or_else(|| rust_log.filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| default_spec.to_string())
}

#[cfg(not(test))]
pub fn init_logging(
    data_dir: &Path,
) -> Result<flexi_logger::LoggerHandle, flexi_logger::FlexiLoggerError> {
    use flexi_logger::{
        detailed_format, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode,
    };

    std::fs::create_dir_all(data_dir)?;

    let spec = log_spec(std::env::var(LOG_ENV).ok(), std::env::var("RUST_LOG").ok());

    // stdout belongs to the console, so nothing is duplicated there.
    let handle = Logger::try_with_str(spec)?
        .log_to_file(
            FileSpec::default()
                .directory(log_directory(data_dir))
                .basename(LOG_FILE_BASENAME)
                .suffix(LOG_FILE_SUFFIX),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .format_for_files(detailed_format)
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        .duplicate_to_stderr(Duplicate::Error)
        .start()?;

    install_panic_hook();

    log::info!(
        "logger initialized dir={} rotate_size_bytes={} keep_files={}",
        log_directory(data_dir).display(),
        LOG_ROTATE_SIZE_BYTES,
        LOG_ROTATE_KEEP_FILES
    );
    Ok(handle)
}

/// Text of a panic payload; `panic!` produces either a `&str` or a `String`.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Routes panics into the log file before the default hook prints them.
#[cfg(not(test))]
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<unknown>".to_string());
        log::error!(
            "todo-minder panicked at {location}: {}\n{}",
            panic_message(info.payload()),
            std::backtrace::Backtrace::force_capture()
        );
        previous(info);
    }));
}
