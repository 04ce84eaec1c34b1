//! Diagnostics logging bootstrap.
//!
//! # Responsibility
//! - Initialize file-based rolling diagnostics logs exactly once per process.
//! - Optionally route `warn`/`error` records and panics into the crash log.
//!
//! # Invariants
//! - Logging init is idempotent for the same directory and level.
//! - Logging initialization must not panic.
//! - Re-initialization with a different directory or level is rejected.

use crate::crash_log::{
    install_log_interceptor, install_panic_hook, CrashLogger, EntrySink, LogFs,
};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{info, LevelFilter};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOG_FILE_BASENAME: &str = "fieldops";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    log_dir: PathBuf,
    capturing: bool,
    _logger: LoggerHandle,
}

/// Crash log hookup for `init_logging`.
pub struct CrashCapture {
    sink: Arc<dyn EntrySink>,
    platform: String,
}

impl CrashCapture {
    pub fn new(sink: Arc<dyn EntrySink>, platform: impl Into<String>) -> Self {
        Self {
            sink,
            platform: platform.into(),
        }
    }

    /// Captures into `logger`, reusing its configured platform name.
    pub fn from_logger<F: LogFs + 'static>(logger: &Arc<CrashLogger<F>>) -> Self {
        let platform = logger.config().platform.clone();
        Self::new(logger.clone(), platform)
    }
}

/// Initializes diagnostics logging with level and directory.
///
/// When `capture` is set, the rolling file logger is wrapped by the crash
/// log interceptor and the panic hook is installed, so warnings, errors and
/// panics also land in the crash log.
///
/// # Invariants
/// - Calling this function repeatedly with the same `log_dir` and `level`
///   is idempotent.
/// - Re-initialization with a different `log_dir` or `level` is rejected.
/// - Initialization never panics.
///
/// # Errors
/// - Returns an error when `level` is unsupported.
/// - Returns an error when `log_dir` is empty, non-absolute, or cannot be created.
/// - Returns an error when logger backend setup fails.
pub fn init_logging(
    level: &str,
    log_dir: &str,
    capture: Option<CrashCapture>,
) -> Result<(), String> {
    let normalized_level = normalize_level(level)?;
    let normalized_dir = normalize_log_dir(log_dir)?;

    if let Some(state) = LOGGING_STATE.get() {
        return check_matches(state, normalized_level, &normalized_dir);
    }

    let init_level = normalized_level;
    let init_dir = normalized_dir.clone();

    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState, String> {
        std::fs::create_dir_all(&init_dir).map_err(|err| {
            format!(
                "failed to create log directory `{}`: {err}",
                init_dir.display()
            )
        })?;

        let level_filter = init_level
            .parse::<LevelFilter>()
            .map_err(|err| format!("invalid log level `{init_level}`: {err}"))?;

        let (file_logger, handle) = Logger::try_with_str(init_level)
            .map_err(|err| format!("invalid log level `{init_level}`: {err}"))?
            .log_to_file(
                FileSpec::default()
                    .directory(init_dir.as_path())
                    .basename(LOG_FILE_BASENAME),
            )
            .rotate(
                Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                Naming::Numbers,
                Cleanup::KeepLogFiles(MAX_LOG_FILES),
            )
            .write_mode(WriteMode::BufferAndFlush)
            .append()
            .format_for_files(flexi_logger::detailed_format)
            .build()
            .map_err(|err| format!("failed to build logger: {err}"))?;

        let capturing = capture.is_some();
        match capture {
            Some(CrashCapture { sink, platform }) => {
                install_log_interceptor(sink.clone(), file_logger, level_filter)?;
                install_panic_hook(sink, platform);
            }
            None => {
                log::set_boxed_logger(file_logger)
                    .map_err(|err| format!("failed to start logger: {err}"))?;
                log::set_max_level(level_filter);
            }
        }

        info!(
            "event=app_start module=core status=ok platform={} build_mode={} version={}",
            std::env::consts::OS,
            build_mode(),
            env!("CARGO_PKG_VERSION")
        );
        info!(
            "event=core_init module=core status=ok level={} log_dir={} crash_capture={}",
            init_level,
            init_dir.display(),
            capturing
        );

        Ok(LoggingState {
            level: init_level,
            log_dir: init_dir,
            capturing,
            _logger: handle,
        })
    })?;

    check_matches(state, normalized_level, &normalized_dir)
}

/// Returns active logging status metadata.
///
/// Returns `None` when logging has not been initialized.
/// Returns `(level, log_dir, crash_capture)` when logging is active.
pub fn logging_status() -> Option<(&'static str, PathBuf, bool)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.level, state.log_dir.clone(), state.capturing))
}

/// Returns the default log level for current build mode.
///
/// - `debug` builds -> `debug`
/// - `release` builds -> `info`
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn check_matches(state: &LoggingState, level: &str, log_dir: &Path) -> Result<(), String> {
    if state.log_dir != log_dir {
        return Err(format!(
            "logging already initialized at `{}`; refusing to switch to `{}`",
            state.log_dir.display(),
            log_dir.display()
        ));
    }
    if state.level != level {
        return Err(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            state.level, level
        ));
    }
    Ok(())
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn normalize_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(format!("log_dir must be an absolute path, got `{trimmed}`"));
    }
    Ok(path.to_path_buf())
}

fn build_mode() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}
