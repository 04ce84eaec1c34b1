//! Text rendering for crash log entries and file headers.
//!
//! # Invariants
//! - Rendering is pure and locale-independent.
//! - Every populated field of a `LogEntry` appears in its block.

use super::entry::LogEntry;
use chrono::{DateTime, SecondsFormat, Utc};

/// Width of the rule line that delimits entry blocks.
pub const RULE_WIDTH: usize = 80;

const FILE_TITLE: &str = "=== App Crash Log File ===";
const ROTATED_FILE_TITLE: &str = "=== App Crash Log File (Rotated) ===";

/// ISO-8601 UTC timestamp with millisecond precision and `Z` suffix.
pub fn iso_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Renders the header written when the log file is created or rotated.
pub fn format_header(created: DateTime<Utc>, platform: &str, rotated: bool) -> String {
    let title = if rotated {
        ROTATED_FILE_TITLE
    } else {
        FILE_TITLE
    };
    format!(
        "{title}\nCreated: {}\nPlatform: {platform}\n\n",
        iso_timestamp(created)
    )
}

/// Renders one entry as a self-delimited block.
pub fn format_entry(entry: &LogEntry) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut block = String::with_capacity(256 + entry.message().len());

    block.push('\n');
    block.push_str(&rule);
    block.push('\n');
    block.push_str(&format!(
        "[{}] {}\n",
        entry.kind().label(),
        iso_timestamp(entry.timestamp())
    ));
    block.push_str(&format!("Message: {}\n", entry.message()));

    if let Some(stack) = entry.stack_trace() {
        block.push_str(&format!("Stack Trace:\n{stack}\n"));
    }
    if let Some(context) = entry.component_context() {
        block.push_str(&format!("Component Stack:\n{context}\n"));
    }
    if let Some(metadata) = entry.metadata() {
        // Serialization failure drops only the metadata block.
        if let Ok(pretty) = serde_json::to_string_pretty(metadata) {
            block.push_str(&format!("Metadata:\n{pretty}\n"));
        }
    }

    block.push_str(&rule);
    block.push_str("\n\n");
    block
}
