//! Global interceptors that feed ambient error channels into the crash log.
//!
//! # Responsibility
//! - Capture `warn`/`error` records from the `log` facade.
//! - Capture reports sent to the process-wide fatal error handler.
//! - Capture panics through the `std::panic` hook.
//!
//! # Invariants
//! - Every interceptor forwards to the handler it replaced, unchanged, even
//!   when capturing fails.
//! - Installing an interceptor twice never duplicates captured entries.
//! - Records emitted on `SIDE_CHANNEL_TARGET` are never captured.

use super::entry::{ErrorReport, LogEntry, LogKind, Metadata};
use super::logger::{crash_entry, EntrySink, SIDE_CHANNEL_TARGET};
use log::kv::{self, Key, VisitSource};
use log::{Level, LevelFilter, Log, Metadata as RecordMetadata, Record};
use once_cell::sync::OnceCell;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

const PANIC_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

static LOG_INTERCEPTOR_INSTALLED: OnceCell<()> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
}

/// `log::Log` wrapper that records warnings and errors before forwarding.
pub struct LogInterceptor {
    sink: Arc<dyn EntrySink>,
    inner: Box<dyn Log>,
}

impl LogInterceptor {
    /// Wraps `inner`, the logger that handled records before interception.
    pub fn new(sink: Arc<dyn EntrySink>, inner: Box<dyn Log>) -> Self {
        Self { sink, inner }
    }

    fn capture(&self, record: &Record<'_>) {
        if CAPTURING.with(Cell::get) {
            return;
        }
        CAPTURING.with(|flag| flag.set(true));
        let _reset = CaptureReset;
        let _ = panic::catch_unwind(AssertUnwindSafe(|| {
            self.sink.submit(entry_from_record(record));
        }));
    }
}

struct CaptureReset;

impl Drop for CaptureReset {
    fn drop(&mut self) {
        CAPTURING.with(|flag| flag.set(false));
    }
}

impl Log for LogInterceptor {
    fn enabled(&self, metadata: &RecordMetadata<'_>) -> bool {
        metadata.level() <= Level::Warn || self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if record.level() <= Level::Warn && record.target() != SIDE_CHANNEL_TARGET {
            self.capture(record);
        }
        self.inner.log(record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Installs `LogInterceptor` as the process-wide `log` backend.
///
/// `inner` is the logger being wrapped. The effective max level is never
/// below `warn` so warnings always reach the crash log.
///
/// Returns `Ok(false)` when an interceptor is already installed.
///
/// # Errors
/// - Returns an error when another `log` backend was installed elsewhere.
pub fn install_log_interceptor(
    sink: Arc<dyn EntrySink>,
    inner: Box<dyn Log>,
    level: LevelFilter,
) -> Result<bool, String> {
    let mut installed_now = false;
    LOG_INTERCEPTOR_INSTALLED.get_or_try_init(|| -> Result<(), String> {
        log::set_boxed_logger(Box::new(LogInterceptor::new(sink, inner)))
            .map_err(|err| format!("failed to install log interceptor: {err}"))?;
        log::set_max_level(level.max(LevelFilter::Warn));
        installed_now = true;
        Ok(())
    })?;
    Ok(installed_now)
}

/// Converts a `warn`/`error` record into a crash log entry.
///
/// Structured `error` and `stack` key-values populate the message and
/// stack; remaining keys become metadata.
pub fn entry_from_record(record: &Record<'_>) -> LogEntry {
    let kind = if record.level() == Level::Error {
        LogKind::Error
    } else {
        LogKind::Warning
    };

    let mut fields = RecordFields::default();
    let _ = record.key_values().visit(&mut fields);

    let mut metadata = Metadata::new();
    metadata.insert("target".to_string(), record.target().into());
    if let Some(module) = record.module_path() {
        metadata.insert("module_path".to_string(), module.into());
    }
    if let (Some(file), Some(line)) = (record.file(), record.line()) {
        metadata.insert("location".to_string(), format!("{file}:{line}").into());
    }

    let args = record.args().to_string();
    let message = match fields.error {
        Some(error) => {
            if !args.is_empty() {
                metadata.insert("logMessage".to_string(), args.into());
            }
            error
        }
        None => args,
    };
    metadata.extend(fields.extra);

    LogEntry::new(kind, message)
        .with_stack_trace(fields.stack)
        .with_metadata(Some(metadata))
}

#[derive(Default)]
struct RecordFields {
    error: Option<String>,
    stack: Option<String>,
    extra: Metadata,
}

impl<'kvs> VisitSource<'kvs> for RecordFields {
    fn visit_pair(&mut self, key: Key<'kvs>, value: kv::Value<'kvs>) -> Result<(), kv::Error> {
        match key.as_str() {
            "error" => self.error = Some(value.to_string()),
            "stack" => self.stack = Some(value.to_string()),
            other => {
                self.extra
                    .insert(other.to_string(), serde_json::Value::String(value.to_string()));
            }
        }
        Ok(())
    }
}

/// Handler invoked with an uncaught error and its fatal flag.
pub type FatalHandler = Arc<dyn Fn(&ErrorReport, bool) + Send + Sync>;

/// Process-wide slot holding the current fatal error handler.
///
/// Platform glue (for example the Flutter `PlatformDispatcher.onError`
/// bridge) dispatches uncaught errors through `report`.
#[derive(Default)]
pub struct GlobalErrorHandler {
    handler: RwLock<Option<FatalHandler>>,
    intercepted: AtomicBool,
}

impl GlobalErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(&self) -> Option<FatalHandler> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the handler and returns the previous one.
    pub fn set_handler(&self, handler: FatalHandler) -> Option<FatalHandler> {
        self.handler
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handler)
    }

    /// Dispatches to the current handler; returns `false` when none is set.
    pub fn report(&self, report: &ErrorReport, is_fatal: bool) -> bool {
        match self.handler() {
            Some(handler) => {
                handler(report, is_fatal);
                true
            }
            None => false,
        }
    }
}

/// Wraps the slot's current handler so reports are logged as `crash` entries first.
///
/// Returns `false` when this slot was already intercepted.
pub fn install_fatal_interceptor(
    slot: &GlobalErrorHandler,
    sink: Arc<dyn EntrySink>,
    platform: impl Into<String>,
) -> bool {
    if slot.intercepted.swap(true, Ordering::AcqRel) {
        return false;
    }
    let platform = platform.into();
    let mut current = slot.handler.write().unwrap_or_else(PoisonError::into_inner);
    let previous = current.clone();
    *current = Some(Arc::new(move |report: &ErrorReport, is_fatal: bool| {
        let _ = panic::catch_unwind(AssertUnwindSafe(|| {
            sink.submit(crash_entry(report.clone(), is_fatal, &platform));
        }));
        if let Some(previous) = &previous {
            previous(report, is_fatal);
        }
    }));
    true
}

/// Installs a panic hook that logs panics as `crash` entries, then chains to
/// the previously installed hook.
///
/// Panics on the `main` thread are recorded as fatal and flushed before the
/// previous hook runs. Returns `false` when the hook was already installed.
pub fn install_panic_hook(sink: Arc<dyn EntrySink>, platform: impl Into<String>) -> bool {
    let platform = platform.into();
    let mut installed_now = false;
    PANIC_HOOK_INSTALLED.get_or_init(|| {
        let previous_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            // Panicking inside a hook aborts, so nothing here may panic.
            let is_fatal = thread::current().name() == Some("main");
            sink.submit(crash_entry(
                ErrorReport::from_panic(panic_info),
                is_fatal,
                &platform,
            ));
            if is_fatal {
                sink.flush(PANIC_FLUSH_TIMEOUT);
            }
            previous_hook(panic_info);
        }));
        installed_now = true;
    });
    installed_now
}
