//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the crash log to the Dart error boundary and diagnostics screen.
//! - Route Dart's uncaught errors through the global fatal handler slot.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Logging calls before `init_crash_log` are dropped, never queued.
//! - Return values are UTF-8 strings or plain flags with stable meaning.

use fieldops_core::crash_log::{install_fatal_interceptor, NO_LOGS_PLACEHOLDER};
use fieldops_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, CrashCapture,
    CrashLogConfig, CrashLogger, ErrorReport, GlobalErrorHandler, Metadata,
};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const RAW_METADATA_KEY: &str = "rawMetadata";

static CRASH_LOG: OnceLock<Arc<CrashLogger>> = OnceLock::new();
static GLOBAL_ERRORS: OnceLock<GlobalErrorHandler> = OnceLock::new();

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Opens the crash log under `log_dir` and hooks the global error handler.
///
/// Input semantics:
/// - `log_dir`: absolute app-documents directory holding `app_crash_logs.txt`.
///
/// # FFI contract
/// - Sync call; creates the directory and header on first use.
/// - Safe to call repeatedly with the same `log_dir` (idempotent).
/// - A different `log_dir` after success returns an error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_crash_log(log_dir: String) -> String {
    match open_crash_log(log_dir.trim()) {
        Ok(_) => String::new(),
        Err(err) => err,
    }
}

/// Initializes Rust core diagnostics logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// When the crash log is already open, warnings, errors and panics are also
/// captured into it. Call `init_crash_log` first to get that capture.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    let capture = CRASH_LOG.get().map(|logger| CrashCapture::from_logger(logger));
    match init_logging_inner(level.as_str(), log_dir.as_str(), capture) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Logs an error caught by a Dart error boundary or `try` block.
///
/// Input semantics:
/// - `metadata_json`: optional JSON object; anything else is kept verbatim
///   under `rawMetadata`.
///
/// # FFI contract
/// - Sync call, non-blocking; the write happens in the background.
/// - Returns `false` when the crash log is not initialized.
#[flutter_rust_bridge::frb(sync)]
pub fn log_error(message: String, stack: Option<String>, metadata_json: Option<String>) -> bool {
    with_crash_log(|logger| {
        logger.log_error_report(ErrorReport::new(message, stack), parse_metadata(metadata_json))
    })
}

/// Logs an uncaught error together with the widget tree it happened in.
///
/// # FFI contract
/// - Sync call, non-blocking; the write happens in the background.
/// - Returns `false` when the crash log is not initialized.
#[flutter_rust_bridge::frb(sync)]
pub fn log_crash(
    message: String,
    stack: Option<String>,
    is_fatal: bool,
    component_stack: Option<String>,
) -> bool {
    with_crash_log(|logger| {
        logger.log_crash(ErrorReport::new(message, stack), is_fatal, component_stack)
    })
}

/// Logs a warning, usually forwarded from Dart's `debugPrint`/console path.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Returns `false` when the crash log is not initialized.
#[flutter_rust_bridge::frb(sync)]
pub fn log_warning(message: String, metadata_json: Option<String>) -> bool {
    with_crash_log(|logger| logger.log_warning(message, parse_metadata(metadata_json)))
}

/// Logs an informational breadcrumb.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Returns `false` when the crash log is not initialized.
#[flutter_rust_bridge::frb(sync)]
pub fn log_info(message: String, metadata_json: Option<String>) -> bool {
    with_crash_log(|logger| logger.log_info(message, parse_metadata(metadata_json)))
}

/// Dispatches an uncaught Dart error (`PlatformDispatcher.onError`) through
/// the global fatal handler slot.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Returns `false` when no handler is installed yet.
#[flutter_rust_bridge::frb(sync)]
pub fn report_global_error(message: String, stack: Option<String>, is_fatal: bool) -> bool {
    global_errors().report(&ErrorReport::new(message, stack), is_fatal)
}

/// Waits up to `timeout_ms` for queued entries to reach the file.
///
/// # FFI contract
/// - Sync call; blocks the caller for at most `timeout_ms`.
/// - Returns `true` when the queue drained (or nothing was initialized).
#[flutter_rust_bridge::frb(sync)]
pub fn flush_logs(timeout_ms: u32) -> bool {
    match CRASH_LOG.get() {
        Some(logger) => logger.flush(Duration::from_millis(u64::from(timeout_ms))),
        None => true,
    }
}

/// Returns the full crash log text for the diagnostics screen.
///
/// # FFI contract
/// - Sync call; reads the file.
/// - Never throws; returns a placeholder when unavailable.
#[flutter_rust_bridge::frb(sync)]
pub fn get_logs() -> String {
    match CRASH_LOG.get() {
        Some(logger) => logger.get_logs(),
        None => NO_LOGS_PLACEHOLDER.to_string(),
    }
}

/// Returns the crash log path when the file exists.
#[flutter_rust_bridge::frb(sync)]
pub fn get_log_file_location() -> Option<String> {
    CRASH_LOG
        .get()
        .and_then(|logger| logger.get_log_file_location())
        .map(|path| path.display().to_string())
}

/// Truncates the crash log to a fresh header.
///
/// # FFI contract
/// - Sync call; waits briefly for queued entries before truncating.
/// - Returns `false` on failure or when the crash log is not initialized.
#[flutter_rust_bridge::frb(sync)]
pub fn clear_logs() -> bool {
    CRASH_LOG.get().is_some_and(|logger| logger.clear_logs())
}

/// Returns the crash log size as `"<n.nn> KB"` or `"<n.nn> MB"`.
#[flutter_rust_bridge::frb(sync)]
pub fn get_log_file_size() -> String {
    match CRASH_LOG.get() {
        Some(logger) => logger.get_log_file_size(),
        None => "0.00 KB".to_string(),
    }
}

/// Returns whether the crash log holds more than its header.
#[flutter_rust_bridge::frb(sync)]
pub fn has_logs() -> bool {
    CRASH_LOG.get().is_some_and(|logger| logger.has_logs())
}

fn global_errors() -> &'static GlobalErrorHandler {
    GLOBAL_ERRORS.get_or_init(GlobalErrorHandler::new)
}

fn with_crash_log(f: impl FnOnce(&CrashLogger)) -> bool {
    match CRASH_LOG.get() {
        Some(logger) => {
            f(logger.as_ref());
            true
        }
        None => false,
    }
}

fn open_crash_log(log_dir: &str) -> Result<&'static Arc<CrashLogger>, String> {
    open_in(&CRASH_LOG, global_errors(), log_dir)
}

fn open_in<'a>(
    slot: &'a OnceLock<Arc<CrashLogger>>,
    errors: &GlobalErrorHandler,
    log_dir: &str,
) -> Result<&'a Arc<CrashLogger>, String> {
    if log_dir.is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    if let Some(existing) = slot.get() {
        return ensure_created(check_same_dir(existing, Path::new(log_dir))?);
    }

    let candidate = CrashLogger::new(CrashLogConfig::new(log_dir))?;
    // A concurrent caller may win the race; only the winner installs hooks.
    if slot.set(candidate.clone()).is_err() {
        return match slot.get() {
            Some(existing) => ensure_created(check_same_dir(existing, Path::new(log_dir))?),
            None => Err("crash log initialization raced and lost".to_string()),
        };
    }

    let platform = candidate.config().platform.clone();
    install_fatal_interceptor(errors, candidate, platform);
    match slot.get() {
        Some(active) => ensure_created(active),
        None => Err("crash log is not available".to_string()),
    }
}

fn ensure_created(logger: &Arc<CrashLogger>) -> Result<&Arc<CrashLogger>, String> {
    if logger.initialize() {
        Ok(logger)
    } else {
        Err(format!(
            "failed to create crash log under `{}`; entries will be retried on write",
            logger.config().log_dir.display()
        ))
    }
}

fn check_same_dir<'a>(
    existing: &'a Arc<CrashLogger>,
    log_dir: &Path,
) -> Result<&'a Arc<CrashLogger>, String> {
    let active = &existing.config().log_dir;
    if active.as_path() == log_dir {
        Ok(existing)
    } else {
        Err(format!(
            "crash log already initialized at `{}`; refusing to switch to `{}`",
            active.display(),
            log_dir.display()
        ))
    }
}

fn parse_metadata(raw: Option<String>) -> Option<Metadata> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Some(map),
        _ => {
            let mut map = Metadata::new();
            map.insert(RAW_METADATA_KEY.to_string(), Value::String(raw));
            Some(map)
        }
    }
}
