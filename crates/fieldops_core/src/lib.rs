//! Core diagnostics for the FieldOps mobile app.
//! This crate owns the crash log and the diagnostics logging bootstrap.

pub mod crash_log;
pub mod logging;

pub use crash_log::{
    install_fatal_interceptor, install_log_interceptor, install_panic_hook, CrashLogConfig,
    CrashLogger, EntrySink, ErrorReport, GlobalErrorHandler, LogEntry, LogKind, Metadata,
};
pub use logging::{default_log_level, init_logging, logging_status, CrashCapture};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
