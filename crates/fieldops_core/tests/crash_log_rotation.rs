use fieldops_core::crash_log::{CrashLogConfig, CrashLogger, MAX_LOG_SIZE};
use std::fs;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn pad_log_to(path: &std::path::Path, target_len: u64) -> String {
    let mut content = fs::read_to_string(path).unwrap();
    let missing = target_len as usize - content.len();
    content.push_str(&"#".repeat(missing));
    fs::write(path, &content).unwrap();
    content
}

#[test]
fn oversized_file_rotates_before_next_append() {
    let dir = tempfile::tempdir().unwrap();
    let logger = CrashLogger::new(CrashLogConfig::new(dir.path())).unwrap();
    assert!(logger.initialize());
    let log_path = logger.config().log_path();
    let before = pad_log_to(&log_path, 5_242_881);

    logger.log_info("first after rotation", None);
    assert!(logger.flush(WAIT));

    let backup = fs::read_to_string(logger.config().backup_path()).unwrap();
    assert_eq!(backup, before);

    let primary = fs::read_to_string(&log_path).unwrap();
    assert!(primary.starts_with("=== App Crash Log File (Rotated) ===\n"));
    assert_eq!(primary.matches("[INFO]").count(), 1);
    assert!(primary.contains("Message: first after rotation\n"));
    assert!(!primary.contains('#'));
    assert!((primary.len() as u64) < MAX_LOG_SIZE);
}

#[test]
fn file_at_exact_limit_is_not_rotated() {
    let dir = tempfile::tempdir().unwrap();
    let logger = CrashLogger::new(CrashLogConfig::new(dir.path())).unwrap();
    assert!(logger.initialize());
    pad_log_to(&logger.config().log_path(), MAX_LOG_SIZE);

    logger.log_info("still appended", None);
    assert!(logger.flush(WAIT));

    assert!(!logger.config().backup_path().exists());
    let size = fs::metadata(logger.config().log_path()).unwrap().len();
    assert!(size > MAX_LOG_SIZE);
}

#[test]
fn rotation_is_checked_before_write_not_after() {
    let dir = tempfile::tempdir().unwrap();
    let config = CrashLogConfig::new(dir.path()).with_max_size_bytes(400);
    let logger = CrashLogger::new(config).unwrap();

    // Header plus this entry crosses the limit, but nothing rotates yet.
    logger.log_warning("x".repeat(500), None);
    assert!(logger.flush(WAIT));
    assert!(!logger.config().backup_path().exists());
    assert!(fs::metadata(logger.config().log_path()).unwrap().len() > 400);

    logger.log_warning("triggers rotation", None);
    assert!(logger.flush(WAIT));

    let backup = fs::read_to_string(logger.config().backup_path()).unwrap();
    assert!(backup.contains(&"x".repeat(500)));
    assert!(!backup.contains("triggers rotation"));
    let primary = logger.get_logs();
    assert!(primary.starts_with("=== App Crash Log File (Rotated) ===\n"));
    assert!(primary.contains("Message: triggers rotation\n"));
}

#[test]
fn repeated_rotation_keeps_only_latest_backup() {
    let dir = tempfile::tempdir().unwrap();
    let config = CrashLogConfig::new(dir.path()).with_max_size_bytes(300);
    let logger = CrashLogger::new(config).unwrap();

    for generation in ["alpha", "bravo", "charlie"] {
        logger.log_info(generation.repeat(60), None);
        assert!(logger.flush(WAIT));
    }

    let backup = fs::read_to_string(logger.config().backup_path()).unwrap();
    assert!(backup.contains(&"bravo".repeat(60)));
    assert!(!backup.contains(&"alpha".repeat(60)));
    let file_count = fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(file_count, 2);
}
