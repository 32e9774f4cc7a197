use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Scheduler output at info, everything else only when it warns.
pub const DEFAULT_DIRECTIVES: &str = "danci_review=info,warn";
pub const DEFAULT_LOG_FILE: &str = "review.log";

pub struct FileLogGuard {
    _guard: WorkerGuard,
}

pub fn file_logging_enabled() -> bool {
    std::env::var("ENABLE_FILE_LOGS")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

/// Picks the first usable filter: the caller's, then `RUST_LOG`, then [`DEFAULT_DIRECTIVES`].
fn select_directives(requested: Option<&str>, from_env: Option<&str>) -> String {
    [requested, from_env]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|directives| !directives.is_empty() && EnvFilter::try_new(directives).is_ok())
        .unwrap_or(DEFAULT_DIRECTIVES)
        .to_string()
}

fn log_file_location() -> (String, String) {
    let dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    let file = std::env::var("REVIEW_LOG_FILE")
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());
    (dir, file)
}

/// Installs the global subscriber for hosts embedding the scheduler.
///
/// Safe to call more than once: later calls leave the first subscriber in place.
/// With `ENABLE_FILE_LOGS` set, output is also written daily-rotated to
/// `$LOG_DIR/$REVIEW_LOG_FILE`; keep the returned guard alive to flush it.
pub fn init_tracing(directives: Option<&str>) -> Option<FileLogGuard> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directives = select_directives(directives, rust_log.as_deref());
    let env_filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let stdout_layer = fmt::layer().with_target(true);

    if file_logging_enabled() {
        let (log_dir, log_file) = log_file_location();
        match std::fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, &log_file);
                let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
                let file_layer = fmt::layer()
                    .with_writer(file_writer)
                    .with_ansi(false)
                    .with_target(true);

                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(stdout_layer)
                    .with(file_layer)
                    .try_init();

                return Some(FileLogGuard { _guard: guard });
            }
            Err(err) => eprintln!("failed to create log directory {log_dir}: {err}"),
        }
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .try_init();

    None
}
