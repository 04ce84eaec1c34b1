//! On-disk crash log target.
//!
//! # Responsibility
//! - Own the primary log file and its single backup generation.
//! - Provide create/size/rotate/append/read/clear primitives.
//!
//! # Invariants
//! - No concurrency logic lives here; callers serialize access.
//! - `ensure_exists` never rewrites a file that is already present.
//! - After `clear` or `rotate_if_oversized` the primary file exists with a
//!   fresh header.

use super::config::CrashLogConfig;
use super::format::format_header;
use super::fs::LogFs;
use chrono::Utc;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage failure tagged with the operation and file it hit.
#[derive(Debug)]
pub struct StoreError {
    pub op: &'static str,
    pub path: PathBuf,
    pub source: io::Error,
}

impl StoreError {
    fn new(op: &'static str, path: &Path, source: io::Error) -> Self {
        Self {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "crash log {} failed for `{}`: {}",
            self.op,
            self.path.display(),
            self.source
        )
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Primary + backup log files addressed through a `LogFs`.
pub struct LogStore<F> {
    fs: F,
    dir: PathBuf,
    path: PathBuf,
    backup_path: PathBuf,
    platform: String,
    max_size_bytes: u64,
    meaningful_content_bytes: u64,
}

impl<F: LogFs> LogStore<F> {
    pub fn new(fs: F, config: &CrashLogConfig) -> Self {
        Self {
            fs,
            dir: config.log_dir.clone(),
            path: config.log_path(),
            backup_path: config.backup_path(),
            platform: config.platform.clone(),
            max_size_bytes: config.max_size_bytes,
            meaningful_content_bytes: config.meaningful_content_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Path of the primary file, only when it currently exists.
    pub fn location(&self) -> Option<&Path> {
        self.fs.exists(&self.path).then_some(self.path.as_path())
    }

    /// Creates the directory and the primary file with a header when absent.
    ///
    /// Returns `true` when a new file was created.
    pub fn ensure_exists(&self) -> StoreResult<bool> {
        if self.fs.exists(&self.path) {
            return Ok(false);
        }
        self.fs
            .create_dir_all(&self.dir)
            .map_err(|err| StoreError::new("create_dir", &self.dir, err))?;
        self.write_header(false)?;
        Ok(true)
    }

    /// Current primary file size; `0` when absent.
    pub fn size_bytes(&self) -> StoreResult<u64> {
        match self.fs.file_len(&self.path) {
            Ok(len) => Ok(len),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(StoreError::new("stat", &self.path, err)),
        }
    }

    /// Moves an oversized primary file to the backup slot and starts a new one.
    ///
    /// Returns `true` when a rotation happened.
    pub fn rotate_if_oversized(&self) -> StoreResult<bool> {
        if self.size_bytes()? <= self.max_size_bytes {
            return Ok(false);
        }
        self.fs
            .copy(&self.path, &self.backup_path)
            .map_err(|err| StoreError::new("rotate", &self.backup_path, err))?;
        self.write_header(true)?;
        Ok(true)
    }

    /// Appends raw text, creating the file with a header first when absent.
    pub fn append(&self, text: &str) -> StoreResult<()> {
        self.ensure_exists()?;
        self.fs
            .append(&self.path, text)
            .map_err(|err| StoreError::new("append", &self.path, err))
    }

    /// Full primary file contents; `None` when the file does not exist.
    pub fn read_all(&self) -> StoreResult<Option<String>> {
        if !self.fs.exists(&self.path) {
            return Ok(None);
        }
        self.fs
            .read_to_string(&self.path)
            .map(Some)
            .map_err(|err| StoreError::new("read", &self.path, err))
    }

    /// Deletes the primary file and immediately recreates it with a header.
    pub fn clear(&self) -> StoreResult<()> {
        if self.fs.exists(&self.path) {
            self.fs
                .remove_file(&self.path)
                .map_err(|err| StoreError::new("clear", &self.path, err))?;
        }
        self.ensure_exists().map(|_| ())
    }

    /// Size rendered for display, e.g. `12.50 KB` or `1.20 MB`.
    pub fn size_human(&self) -> StoreResult<String> {
        self.size_bytes().map(format_size)
    }

    /// Whether the file holds more than a bare header.
    pub fn has_meaningful_content(&self) -> StoreResult<bool> {
        Ok(self.size_bytes()? > self.meaningful_content_bytes)
    }

    fn write_header(&self, rotated: bool) -> StoreResult<()> {
        let header = format_header(Utc::now(), &self.platform, rotated);
        let op = if rotated { "rotate" } else { "create" };
        self.fs
            .write(&self.path, &header)
            .map_err(|err| StoreError::new(op, &self.path, err))
    }
}

/// Formats a byte count as KB below one MiB and MB above.
pub fn format_size(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < MIB {
        format!("{:.2} KB", bytes / KIB)
    } else {
        format!("{:.2} MB", bytes / MIB)
    }
}
