//! Process-wide crash logger: lifecycle, write queue and public surface.
//!
//! # Responsibility
//! - Accept entries from any number of producers without blocking on I/O.
//! - Persist entries one at a time, in submission order, through `LogStore`.
//! - Keep every storage failure away from the caller.
//!
//! # Invariants
//! - At most one drain routine runs at a time; it is the only writer.
//! - `draining` is cleared under the same lock that guards `pending`, so an
//!   entry is never stranded in the queue without a drain to pick it up.
//! - Storage operations (drain, clear, read, init) serialize on the store
//!   mutex; producers never take that mutex.
//!
//! Construct exactly one instance per process and share the `Arc`.

use super::config::CrashLogConfig;
use super::entry::{ErrorReport, LogEntry, LogKind, Metadata};
use super::format::format_entry;
use super::fs::{LogFs, StdFs};
use super::store::{LogStore, StoreResult};
use log::{error, info, warn};
use std::cell::Cell;
use std::collections::VecDeque;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::ops::Deref;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// `log` target for the logger's own diagnostics; never captured back.
pub const SIDE_CHANNEL_TARGET: &str = "crash_log";
/// Name of the short-lived thread that drains the queue.
pub const DRAIN_THREAD_NAME: &str = "crash-log-drain";
/// Returned by `get_logs` when no log file exists.
pub const NO_LOGS_PLACEHOLDER: &str = "No logs available";
/// Returned by `get_logs` when the log file cannot be read.
pub const READ_FAILED_PLACEHOLDER: &str = "Error reading logs";

const EMPTY_SIZE: &str = "0.00 KB";
const CLEAR_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

thread_local! {
    // Depth of drain loops and store locks held by the current thread.
    static WRITER_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as a crash log writer while alive.
struct WriterScope;

impl WriterScope {
    fn enter() -> Self {
        WRITER_DEPTH.with(|depth| depth.set(depth.get() + 1));
        WriterScope
    }

    fn active() -> bool {
        WRITER_DEPTH.with(Cell::get) > 0
    }
}

impl Drop for WriterScope {
    fn drop(&mut self) {
        WRITER_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Store lock that also marks the holding thread as a writer.
struct StoreAccess<'a, F> {
    guard: MutexGuard<'a, LogStore<F>>,
    _scope: WriterScope,
}

impl<F> Deref for StoreAccess<'_, F> {
    type Target = LogStore<F>;

    fn deref(&self) -> &LogStore<F> {
        &self.guard
    }
}

/// Destination for log entries, as seen by interceptors.
pub trait EntrySink: Send + Sync {
    /// Enqueues `entry`; must not block on I/O.
    fn submit(&self, entry: LogEntry);

    /// Waits until previously submitted entries are persisted.
    ///
    /// Returns `false` when `timeout` elapsed first or waiting cannot succeed.
    fn flush(&self, timeout: Duration) -> bool;
}

#[derive(Default)]
struct WriteQueue {
    pending: VecDeque<LogEntry>,
    draining: bool,
}

/// Single-writer crash log.
pub struct CrashLogger<F: LogFs + 'static = StdFs> {
    config: CrashLogConfig,
    store: Mutex<LogStore<F>>,
    queue: Mutex<WriteQueue>,
    idle: Condvar,
    initialized: AtomicBool,
    this: Weak<CrashLogger<F>>,
}

impl CrashLogger<StdFs> {
    /// Creates a logger over the local filesystem.
    ///
    /// # Errors
    /// - Returns the validation message when `config` is unusable.
    pub fn new(config: CrashLogConfig) -> Result<Arc<Self>, String> {
        Self::with_fs(config, StdFs)
    }
}

impl<F: LogFs + 'static> CrashLogger<F> {
    /// Creates a logger over a caller-provided filesystem capability.
    ///
    /// No file is touched until `initialize` or the first drain.
    pub fn with_fs(config: CrashLogConfig, fs: F) -> Result<Arc<Self>, String> {
        config.validate()?;
        let store = LogStore::new(fs, &config);
        Ok(Arc::new_cyclic(|this| Self {
            config,
            store: Mutex::new(store),
            queue: Mutex::new(WriteQueue::default()),
            idle: Condvar::new(),
            initialized: AtomicBool::new(false),
            this: this.clone(),
        }))
    }

    pub fn config(&self) -> &CrashLogConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Ensures the log file exists. Idempotent and safe to race.
    ///
    /// Returns `false` when the file could not be created; the next call
    /// (or the next drain) retries.
    pub fn initialize(&self) -> bool {
        if self.is_initialized() {
            return true;
        }
        let store = self.store();
        match self.initialize_with(&store) {
            Ok(()) => true,
            Err(err) => {
                error!(
                    target: SIDE_CHANNEL_TARGET,
                    "event=crash_log_init module=crash_log status=error error={err}"
                );
                false
            }
        }
    }

    /// Logs a caught error; its `source()` chain becomes the stack trace.
    pub fn log_error(&self, err: &(dyn Error + 'static), metadata: Option<Metadata>) {
        self.log_error_report(ErrorReport::from_error(err), metadata);
    }

    /// Logs a caught error that was already reduced to message + stack.
    pub fn log_error_report(&self, report: ErrorReport, metadata: Option<Metadata>) {
        self.submit(LogEntry::from_report(LogKind::Error, report).with_metadata(metadata));
    }

    /// Logs an uncaught error with its fatal flag and optional UI context.
    pub fn log_crash(
        &self,
        report: ErrorReport,
        is_fatal: bool,
        component_context: Option<String>,
    ) {
        let entry = crash_entry(report, is_fatal, &self.config.platform)
            .with_component_context(component_context);
        self.submit(entry);
    }

    pub fn log_warning(&self, message: impl Into<String>, metadata: Option<Metadata>) {
        self.submit(LogEntry::new(LogKind::Warning, message).with_metadata(metadata));
    }

    pub fn log_info(&self, message: impl Into<String>, metadata: Option<Metadata>) {
        self.submit(LogEntry::new(LogKind::Info, message).with_metadata(metadata));
    }

    /// Full log text, or a placeholder when missing or unreadable.
    pub fn get_logs(&self) -> String {
        let store = self.store();
        match store.read_all() {
            Ok(Some(content)) => content,
            Ok(None) => NO_LOGS_PLACEHOLDER.to_string(),
            Err(err) => {
                error!(
                    target: SIDE_CHANNEL_TARGET,
                    "event=crash_log_read module=crash_log status=error error={err}"
                );
                READ_FAILED_PLACEHOLDER.to_string()
            }
        }
    }

    /// Path of the log file, or `None` when it has never been created.
    pub fn get_log_file_location(&self) -> Option<PathBuf> {
        self.store().location().map(|path| path.to_path_buf())
    }

    /// Persists anything already queued, then truncates the log to a fresh header.
    pub fn clear_logs(&self) -> bool {
        if !self.flush(CLEAR_FLUSH_TIMEOUT) {
            warn!(
                target: SIDE_CHANNEL_TARGET,
                "event=crash_log_clear module=crash_log status=warn reason=flush_timeout"
            );
        }
        let store = self.store();
        match store.clear() {
            Ok(()) => {
                self.initialized.store(true, Ordering::Release);
                info!(
                    target: SIDE_CHANNEL_TARGET,
                    "event=crash_log_clear module=crash_log status=ok"
                );
                true
            }
            Err(err) => {
                error!(
                    target: SIDE_CHANNEL_TARGET,
                    "event=crash_log_clear module=crash_log status=error error={err}"
                );
                false
            }
        }
    }

    /// Human-readable file size; `0.00 KB` when absent or unreadable.
    pub fn get_log_file_size(&self) -> String {
        self.store()
            .size_human()
            .unwrap_or_else(|_| EMPTY_SIZE.to_string())
    }

    /// Whether at least one entry has been written since creation or clear.
    pub fn has_logs(&self) -> bool {
        self.store().has_meaningful_content().unwrap_or(false)
    }

    /// Number of entries waiting to be persisted.
    pub fn pending(&self) -> usize {
        lock(&self.queue).pending.len()
    }

    /// Blocks until the queue is empty and no drain is running.
    ///
    /// On a thread that is itself draining or holding the store the drain
    /// cannot progress, so this returns `false` at once instead of waiting.
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = lock(&self.queue);
        while queue.draining || !queue.pending.is_empty() {
            if WriterScope::active() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            queue = match self.idle.wait_timeout(queue, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    /// Enqueues `entry` and starts a drain when none is running.
    pub fn submit(&self, entry: LogEntry) {
        let start_drain = {
            let mut queue = lock(&self.queue);
            queue.pending.push_back(entry);
            !std::mem::replace(&mut queue.draining, true)
        };
        if start_drain {
            self.start_drain();
        }
    }

    fn start_drain(&self) {
        if let Some(this) = self.this.upgrade() {
            let spawned = thread::Builder::new()
                .name(DRAIN_THREAD_NAME.to_string())
                .spawn(move || this.drain());
            match spawned {
                Ok(_) => return,
                Err(err) => warn!(
                    target: SIDE_CHANNEL_TARGET,
                    "event=crash_log_drain module=crash_log status=warn mode=inline error={err}"
                ),
            }
        }
        self.drain();
    }

    fn drain(&self) {
        let _scope = WriterScope::enter();
        loop {
            let entry = {
                let mut queue = lock(&self.queue);
                match queue.pending.pop_front() {
                    Some(entry) => entry,
                    None => {
                        queue.draining = false;
                        self.idle.notify_all();
                        return;
                    }
                }
            };
            self.persist(&entry);
        }
    }

    fn persist(&self, entry: &LogEntry) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.write_entry(entry))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(
                target: SIDE_CHANNEL_TARGET,
                "event=crash_log_write module=crash_log status=error kind={} error={err}",
                entry.kind()
            ),
            Err(_) => error!(
                target: SIDE_CHANNEL_TARGET,
                "event=crash_log_write module=crash_log status=error kind={} error=panic",
                entry.kind()
            ),
        }
    }

    fn write_entry(&self, entry: &LogEntry) -> StoreResult<()> {
        let store = self.store();
        self.initialize_with(&store)?;
        if store.rotate_if_oversized()? {
            info!(
                target: SIDE_CHANNEL_TARGET,
                "event=crash_log_rotate module=crash_log status=ok backup={}",
                store.backup_path().display()
            );
        }
        store.append(&format_entry(entry))
    }

    fn initialize_with(&self, store: &LogStore<F>) -> StoreResult<()> {
        if self.is_initialized() {
            return Ok(());
        }
        let created = store.ensure_exists()?;
        self.initialized.store(true, Ordering::Release);
        info!(
            target: SIDE_CHANNEL_TARGET,
            "event=crash_log_init module=crash_log status=ok created={created} path={}",
            store.path().display()
        );
        Ok(())
    }
}

impl<F: LogFs + 'static> EntrySink for CrashLogger<F> {
    fn submit(&self, entry: LogEntry) {
        CrashLogger::submit(self, entry);
    }

    fn flush(&self, timeout: Duration) -> bool {
        CrashLogger::flush(self, timeout)
    }
}

/// Builds the `crash` entry shared by the logger and the global interceptors.
pub fn crash_entry(report: ErrorReport, is_fatal: bool, platform: &str) -> LogEntry {
    LogEntry::from_report(LogKind::Crash, report)
        .with_field("isFatal", is_fatal)
        .with_field("platform", platform)
}

impl<F: LogFs + 'static> CrashLogger<F> {
    fn store(&self) -> StoreAccess<'_, F> {
        StoreAccess {
            guard: lock(&self.store),
            _scope: WriterScope::enter(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::{CrashLogger, EntrySink, NO_LOGS_PLACEHOLDER};
    use crate::crash_log::config::CrashLogConfig;
    use crate::crash_log::entry::ErrorReport;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn nothing_touches_disk_before_first_use() {
        let temp = tempfile::tempdir().unwrap();
        let logger = CrashLogger::new(CrashLogConfig::new(temp.path().join("crash"))).unwrap();

        assert!(!logger.is_initialized());
        assert_eq!(logger.get_log_file_location(), None);
        assert_eq!(logger.get_logs(), NO_LOGS_PLACEHOLDER);
        assert_eq!(logger.get_log_file_size(), "0.00 KB");
        assert!(!logger.has_logs());
    }

    #[test]
    fn logging_initializes_implicitly() {
        let temp = tempfile::tempdir().unwrap();
        let logger = CrashLogger::new(CrashLogConfig::new(temp.path())).unwrap();

        logger.log_info("app started", None);
        assert!(logger.flush(WAIT));

        assert!(logger.is_initialized());
        let logs = logger.get_logs();
        assert!(logs.starts_with("=== App Crash Log File ===\n"));
        assert!(logs.contains("[INFO] "));
        assert!(logs.contains("Message: app started\n"));
        assert_eq!(logger.pending(), 0);
    }

    #[test]
    fn crash_entries_carry_fatal_flag_and_platform() {
        let temp = tempfile::tempdir().unwrap();
        let config = CrashLogConfig::new(temp.path()).with_platform("android");
        let logger = CrashLogger::new(config).unwrap();

        logger.log_crash(
            ErrorReport::new("null ticket id", Some("at TicketScreen".to_string())),
            false,
            Some("App > TicketScreen".to_string()),
        );
        assert!(logger.flush(WAIT));

        let logs = logger.get_logs();
        assert!(logs.contains("[CRASH] "));
        assert!(logs.contains("Stack Trace:\nat TicketScreen\n"));
        assert!(logs.contains("Component Stack:\nApp > TicketScreen\n"));
        assert!(logs.contains("\"isFatal\": false"));
        assert!(logs.contains("\"platform\": \"android\""));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let error = CrashLogger::new(CrashLogConfig::new("relative/dir"))
            .err()
            .expect("relative dir must be rejected");
        assert!(error.contains("absolute"));
    }

    #[test]
    fn flush_on_idle_logger_returns_immediately() {
        let temp = tempfile::tempdir().unwrap();
        let logger = CrashLogger::new(CrashLogConfig::new(temp.path())).unwrap();
        assert!(logger.flush(Duration::from_millis(1)));
    }

    #[test]
    fn flush_gives_up_at_once_while_this_thread_holds_the_store() {
        let temp = tempfile::tempdir().unwrap();
        let logger = CrashLogger::new(CrashLogConfig::new(temp.path())).unwrap();

        let store = logger.store();
        logger.log_warning("queued behind the held store", None);
        let sink: &dyn EntrySink = logger.as_ref();
        let started = Instant::now();
        assert!(!sink.flush(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(store);

        assert!(sink.flush(WAIT));
        assert!(logger.get_logs().contains("Message: queued behind the held store\n"));
    }
}
