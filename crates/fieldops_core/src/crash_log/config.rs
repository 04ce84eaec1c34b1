//! Crash log configuration.
//!
//! # Invariants
//! - `log_dir` is non-empty and absolute once validated.
//! - File names are bare names, never paths.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Primary log file name inside `log_dir`.
pub const LOG_FILE_NAME: &str = "app_crash_logs.txt";
/// Single-generation backup file name inside `log_dir`.
pub const BACKUP_FILE_NAME: &str = "app_crash_logs_backup.txt";
/// Rotation triggers when the primary file grows beyond this size.
pub const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
/// Files at or below this size hold a header and nothing else.
pub const MEANINGFUL_CONTENT_BYTES: u64 = 200;

/// Settings for one crash log instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CrashLogConfig {
    pub log_dir: PathBuf,
    pub file_name: String,
    pub backup_file_name: String,
    pub max_size_bytes: u64,
    pub meaningful_content_bytes: u64,
    pub platform: String,
}

impl Default for CrashLogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::new(),
            file_name: LOG_FILE_NAME.to_string(),
            backup_file_name: BACKUP_FILE_NAME.to_string(),
            max_size_bytes: MAX_LOG_SIZE,
            meaningful_content_bytes: MEANINGFUL_CONTENT_BYTES,
            platform: std::env::consts::OS.to_string(),
        }
    }
}

impl CrashLogConfig {
    /// Default settings rooted at `log_dir`.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_max_size_bytes(mut self, value: u64) -> Self {
        self.max_size_bytes = value;
        self
    }

    pub fn with_meaningful_content_bytes(mut self, value: u64) -> Self {
        self.meaningful_content_bytes = value;
        self
    }

    pub fn with_platform(mut self, value: impl Into<String>) -> Self {
        self.platform = value.into();
        self
    }

    pub fn with_file_names(mut self, file: impl Into<String>, backup: impl Into<String>) -> Self {
        self.file_name = file.into();
        self.backup_file_name = backup.into();
        self
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(&self.file_name)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.log_dir.join(&self.backup_file_name)
    }

    /// Checks that the configuration can address a log file.
    ///
    /// # Errors
    /// - `log_dir` is empty or relative.
    /// - A file name is empty, contains a separator, or both names collide.
    /// - `max_size_bytes` is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.log_dir.as_os_str().is_empty() {
            return Err("log_dir cannot be empty".to_string());
        }
        if !self.log_dir.is_absolute() {
            return Err(format!(
                "log_dir must be an absolute path, got `{}`",
                self.log_dir.display()
            ));
        }
        validate_file_name("file_name", &self.file_name)?;
        validate_file_name("backup_file_name", &self.backup_file_name)?;
        if self.file_name == self.backup_file_name {
            return Err(format!(
                "backup_file_name must differ from file_name `{}`",
                self.file_name
            ));
        }
        if self.max_size_bytes == 0 {
            return Err("max_size_bytes must be greater than zero".to_string());
        }
        Ok(())
    }
}

fn validate_file_name(field: &str, value: &str) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{field} cannot be empty"));
    }
    if Path::new(trimmed).components().count() != 1 || trimmed.contains(['/', '\\']) {
        return Err(format!("{field} must be a bare file name, got `{trimmed}`"));
    }
    Ok(())
}
