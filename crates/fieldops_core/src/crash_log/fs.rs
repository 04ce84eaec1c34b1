//! Filesystem capability consumed by the log store.
//!
//! The store never touches `std::fs` directly; going through `LogFs` lets
//! callers substitute an instrumented or failing implementation.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

/// Minimal file operations needed by the crash log store.
pub trait LogFs: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    /// Length in bytes; errors with `NotFound` when absent.
    fn file_len(&self, path: &Path) -> io::Result<u64>;
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
    /// Creates or truncates `path` with `contents`.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
    /// Appends `contents`, creating the file when absent.
    fn append(&self, path: &Path, contents: &str) -> io::Result<()>;
    /// Copies `from` over `to`, replacing any existing file.
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// `LogFs` backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl LogFs for StdFs {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn file_len(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn append(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(contents.as_bytes())?;
        file.flush()
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::copy(from, to).map(|_| ())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

impl<T: LogFs + ?Sized> LogFs for Arc<T> {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn file_len(&self, path: &Path) -> io::Result<u64> {
        (**self).file_len(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        (**self).read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        (**self).write(path, contents)
    }

    fn append(&self, path: &Path, contents: &str) -> io::Result<()> {
        (**self).append(path, contents)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        (**self).copy(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        (**self).remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        (**self).create_dir_all(path)
    }
}

#[cfg(test)]
mod tests {
    use super::{LogFs, StdFs};

    #[test]
    fn append_creates_then_extends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");

        StdFs.append(&path, "one").unwrap();
        StdFs.append(&path, "two").unwrap();

        assert_eq!(StdFs.read_to_string(&path).unwrap(), "onetwo");
        assert_eq!(StdFs.file_len(&path).unwrap(), 6);
    }

    #[test]
    fn copy_replaces_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("from.txt");
        let to = dir.path().join("to.txt");
        StdFs.write(&from, "fresh").unwrap();
        StdFs.write(&to, "stale and longer").unwrap();

        StdFs.copy(&from, &to).unwrap();

        assert_eq!(StdFs.read_to_string(&to).unwrap(), "fresh");
    }

    #[test]
    fn len_of_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = StdFs.file_len(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        assert!(!StdFs.exists(&dir.path().join("missing")));
    }
}
