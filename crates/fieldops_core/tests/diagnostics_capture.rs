//! Process-wide hooks (`log` backend, panic hook) can only be installed once,
//! so this file holds a single test that walks through the whole flow.

use fieldops_core::crash_log::{install_log_interceptor, install_panic_hook};
use fieldops_core::{init_logging, logging_status, CrashCapture, CrashLogConfig, CrashLogger};
use log::{LevelFilter, Log, Metadata, Record};
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

struct DiscardLogger;

impl Log for DiscardLogger {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, _: &Record<'_>) {}

    fn flush(&self) {}
}

#[test]
fn init_logging_captures_records_and_panics() {
    let diagnostics_dir = tempfile::tempdir().unwrap();
    let crash_dir = tempfile::tempdir().unwrap();
    let logger = CrashLogger::new(CrashLogConfig::new(crash_dir.path())).unwrap();
    let dir_str = diagnostics_dir.path().to_str().unwrap().to_string();

    init_logging("info", &dir_str, Some(CrashCapture::from_logger(&logger)))
        .expect("first init should succeed");
    init_logging("info", &dir_str, None).expect("same config should be idempotent");
    let level_error = init_logging("debug", &dir_str, None).expect_err("level conflict");
    assert!(level_error.contains("refusing to switch"));

    let (level, dir, capturing) = logging_status().expect("logging should be active");
    assert_eq!(level, "info");
    assert_eq!(dir, diagnostics_dir.path());
    assert!(capturing);

    // Installing again must not add a second capture path.
    assert_eq!(
        install_log_interceptor(logger.clone(), Box::new(DiscardLogger), LevelFilter::Info),
        Ok(false)
    );
    assert!(!install_panic_hook(logger.clone(), "linux"));

    log::info!("event=ticket_open module=test status=ok");
    log::warn!("gps signal lost");
    log::error!(error = "connection reset", ticket = "INC-7"; "ticket upload failed");

    let worker = thread::Builder::new()
        .name("ticket-worker".to_string())
        .spawn(|| panic!("attachment index out of range"))
        .unwrap();
    assert!(worker.join().is_err());
    assert!(logger.flush(WAIT));

    let logs = logger.get_logs();
    assert!(!logs.contains("ticket_open"));
    assert!(logs.contains("[WARNING] "));
    assert!(logs.contains("Message: gps signal lost\n"));
    assert!(logs.contains("Message: connection reset\n"));
    assert!(logs.contains("\"logMessage\": \"ticket upload failed\""));
    assert!(logs.contains("\"ticket\": \"INC-7\""));
    assert!(logs.contains("[CRASH] "));
    assert_eq!(logs.matches("Message: attachment index out of range\n").count(), 1);
    assert_eq!(logs.matches("Message: gps signal lost\n").count(), 1);
    assert_eq!(logs.matches("[CRASH] ").count(), 1);
    assert!(logs.contains("\"isFatal\": false"));
    assert!(logs.contains("diagnostics_capture.rs"));
    // Side-channel records from the logger itself never loop back.
    assert!(!logs.contains("event=crash_log_init"));
}
