//! Cross-platform advisory locking for the progress journal and destination
//! directories, used to keep concurrent workers from writing the same file
//! or the same journal line at once.
//!
//! Grounded on the RAII lock-file pattern: a lock is a file handle held open
//! with an exclusive advisory lock, released automatically when the guard
//! drops. Unlike a raw `flock`/`LockFileEx` call, `fs2` gives us one API for
//! both platforms.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::StorageError;

/// An exclusive lock on a single file, released when dropped.
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Opens (creating if necessary) `path` and blocks until an exclusive
    /// lock is acquired.
    pub fn acquire(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| StorageError::Lock {
                path: path.to_path_buf(),
                source: e,
            })?;

        file.lock_exclusive().map_err(|e| StorageError::Lock {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Acquires a lock on `<dir>/.docmover.lock`, creating `dir` if needed.
pub fn acquire_dir_lock(dir: &Path) -> Result<FileLock, StorageError> {
    std::fs::create_dir_all(dir).map_err(|e| StorageError::CreateDirectory {
        path: dir.to_path_buf(),
        source: e,
    })?;
    FileLock::acquire(&dir.join(".docmover.lock"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("test.lock");
        {
            let _lock = FileLock::acquire(&lock_path).unwrap();
            assert!(lock_path.exists());
        }
        // second acquisition after drop should not block
        let _lock2 = FileLock::acquire(&lock_path).unwrap();
    }

    #[test]
    fn test_acquire_dir_lock_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested/sub");
        let _lock = acquire_dir_lock(&nested).unwrap();
        assert!(nested.exists());
        assert!(nested.join(".docmover.lock").exists());
    }
}
