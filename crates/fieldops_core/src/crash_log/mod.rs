//! Durable crash/diagnostic log.
//!
//! # Responsibility
//! - Persist error, crash, warning and info entries to one local file.
//! - Serialize concurrent producers into a single ordered write stream.
//! - Bound file growth with size-triggered rotation (one backup kept).
//! - Capture ambient error channels (`log`, fatal handler, panics).
//!
//! # Invariants
//! - Logging failures never propagate to callers.
//! - Persisted order equals submission order.

pub mod config;
pub mod entry;
pub mod format;
pub mod fs;
pub mod intercept;
pub mod logger;
pub mod store;

pub use config::{CrashLogConfig, BACKUP_FILE_NAME, LOG_FILE_NAME, MAX_LOG_SIZE};
pub use entry::{ErrorReport, LogEntry, LogKind, Metadata, UNKNOWN_MESSAGE};
pub use format::{format_entry, format_header};
pub use fs::{LogFs, StdFs};
pub use intercept::{
    install_fatal_interceptor, install_log_interceptor, install_panic_hook, FatalHandler,
    GlobalErrorHandler, LogInterceptor,
};
pub use logger::{CrashLogger, EntrySink, NO_LOGS_PLACEHOLDER, SIDE_CHANNEL_TARGET};
pub use store::{LogStore, StoreError, StoreResult};
