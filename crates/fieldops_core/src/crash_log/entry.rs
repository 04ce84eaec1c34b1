//! Crash log record model.
//!
//! # Responsibility
//! - Define the immutable `LogEntry` unit of record.
//! - Normalize caller-provided errors into `ErrorReport` values.
//!
//! # Invariants
//! - A constructed `LogEntry` is never mutated; builders consume `self`.
//! - `message` is never empty; blank input falls back to `UNKNOWN_MESSAGE`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Placeholder used when an entry is created without a usable message.
pub const UNKNOWN_MESSAGE: &str = "Unknown error";

/// Ordered key/value block attached to an entry.
pub type Metadata = Map<String, Value>;

/// Closed set of record categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    /// Caught, recoverable error.
    Error,
    /// Uncaught error reported through a global hook.
    Crash,
    /// Non-fatal diagnostic.
    Warning,
    /// Informational breadcrumb.
    Info,
}

impl LogKind {
    /// Stable lower-case id.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Crash => "crash",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    /// Upper-case label used in the persisted block header.
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Crash => "CRASH",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }

    /// Parses a kind id; accepts `warn` as an alias of `warning`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "crash" => Some(Self::Crash),
            "warning" | "warn" => Some(Self::Warning),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

impl Display for LogKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error value: a message plus an optional stack rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub message: String,
    pub stack: Option<String>,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>, stack: Option<String>) -> Self {
        Self {
            message: message.into(),
            stack: stack.filter(|value| !value.trim().is_empty()),
        }
    }

    /// Builds a report from any error, rendering its `source()` chain as the stack.
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut current = err.source();
        while let Some(cause) = current {
            causes.push(format!("Caused by: {cause}"));
            current = cause.source();
        }
        let stack = if causes.is_empty() {
            None
        } else {
            Some(causes.join("\n"))
        };
        Self::new(err.to_string(), stack)
    }

    /// Builds a report from a panic, with location and a forced backtrace.
    pub fn from_panic(info: &std::panic::PanicHookInfo<'_>) -> Self {
        let message = if let Some(message) = info.payload().downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = info.payload().downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        let location = info
            .location()
            .map(|loc| format!("at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "at <unknown>".to_string());
        let backtrace = Backtrace::force_capture();
        Self::new(message, Some(format!("{location}\n{backtrace}")))
    }
}

impl Display for ErrorReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl<E: Error + 'static> From<&E> for ErrorReport {
    fn from(value: &E) -> Self {
        Self::from_error(value)
    }
}

/// One diagnostic event.
///
/// Fields are private so the record stays immutable after construction; use
/// the `with_*` builders before handing it to the logger.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    timestamp: DateTime<Utc>,
    kind: LogKind,
    message: String,
    stack_trace: Option<String>,
    component_context: Option<String>,
    metadata: Option<Metadata>,
}

impl LogEntry {
    /// Creates an entry stamped with the current UTC time.
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self::at(Utc::now(), kind, message)
    }

    /// Creates an entry with a caller-provided timestamp.
    pub fn at(timestamp: DateTime<Utc>, kind: LogKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            UNKNOWN_MESSAGE.to_string()
        } else {
            message
        };
        Self {
            timestamp,
            kind,
            message,
            stack_trace: None,
            component_context: None,
            metadata: None,
        }
    }

    /// Creates an entry whose message and stack come from `report`.
    pub fn from_report(kind: LogKind, report: ErrorReport) -> Self {
        Self::new(kind, report.message).with_stack_trace(report.stack)
    }

    pub fn with_stack_trace(mut self, stack: Option<String>) -> Self {
        self.stack_trace = stack.filter(|value| !value.is_empty());
        self
    }

    pub fn with_component_context(mut self, context: Option<String>) -> Self {
        self.component_context = context.filter(|value| !value.is_empty());
        self
    }

    /// Replaces the metadata block; an empty map is stored as absent.
    pub fn with_metadata(mut self, metadata: Option<Metadata>) -> Self {
        self.metadata = metadata.filter(|map| !map.is_empty());
        self
    }

    /// Adds one metadata field, keeping earlier insertion order.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    pub fn component_context(&self) -> Option<&str> {
        self.component_context.as_deref()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}
