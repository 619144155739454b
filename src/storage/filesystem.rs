//! Atomic file placement and moves.
//!
//! Two operations matter here: writing a brand-new file into the
//! destination directory without ever clobbering an existing one, and
//! moving a source file elsewhere (quarantine, or out of the way once
//! processed) without leaving it half-written if the process is killed
//! mid-move.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::error::StorageError;
use crate::sanitize;

const MOVE_ATTEMPTS: u32 = 3;
const MOVE_RETRY_BASE: Duration = Duration::from_millis(100);

pub struct FileStorage {
    output_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Writes `content` under the output directory as `<stem>.<extension>`,
    /// resolving a name collision per [`sanitize::resolve_conflict`] and
    /// writing atomically (temp file + fsync + rename) so a reader never
    /// observes a partially written file.
    pub fn store(
        &self,
        content: &[u8],
        stem: &str,
        extension: &str,
    ) -> Result<PathBuf, StorageError> {
        ensure_directory(&self.output_directory)?;
        let filename = sanitize::resolve_conflict(stem, &self.output_directory, extension);
        let dest = self.output_directory.join(filename);
        atomic_write(&dest, content)?;
        Ok(dest)
    }
}

/// Creates `path` (and parents) if it doesn't already exist.
pub fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Writes `content` to `path` without ever leaving a truncated file behind:
/// the data lands in a sibling `.tmp` file first, is flushed and fsynced,
/// then renamed into place. The temp file is removed if any step fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    let tmp_path = sibling_tmp_path(path);

    let write_result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        });
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        });
    }

    Ok(())
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("tmp");
    path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
}

/// Moves `src` to `dst`. Tries a plain rename up to [`MOVE_ATTEMPTS`] times
/// with a short backoff between attempts (handles transient "file locked by
/// antivirus/indexer" errors on some platforms), then falls back to
/// copy + delete for cross-device moves.
pub fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if !src.exists() {
        return Err(StorageError::NotFound(src.to_path_buf()));
    }

    if let Some(parent) = dst.parent() {
        ensure_directory(parent)?;
    }

    for attempt in 0..MOVE_ATTEMPTS {
        match std::fs::rename(src, dst) {
            Ok(()) => return Ok(()),
            Err(_) if attempt + 1 < MOVE_ATTEMPTS => {
                thread::sleep(MOVE_RETRY_BASE * (attempt + 1));
            }
            Err(_) => break,
        }
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let path = storage.store(b"Hello, World!", "test", "pdf").unwrap();

        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_store_file_conflict_resolution() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let path1 = storage.store(b"First", "document", "pdf").unwrap();
        assert!(path1.ends_with("document.pdf"));

        let path2 = storage.store(b"Second", "document", "pdf").unwrap();
        assert!(path2.ends_with("document_1.pdf"));

        let path3 = storage.store(b"Third", "document", "pdf").unwrap();
        assert!(path3.ends_with("document_2.pdf"));
    }

    #[test]
    fn test_store_creates_output_directory() {
        let temp_dir = TempDir::new().unwrap();
        let output_dir = temp_dir.path().join("nested/output");
        let storage = FileStorage::new(&output_dir);

        let path = storage.store(b"data", "file", "txt").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_store_empty_content() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let path = storage.store(&[], "file", "bin").unwrap();
        assert!(path.exists());
        assert!(std::fs::read(&path).unwrap().is_empty());
    }

    #[test]
    fn test_atomic_write_leaves_no_tmp_file_on_success() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("out.txt");
        atomic_write(&dest, b"content").unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].to_str().unwrap(), "out.txt");
    }

    #[test]
    fn test_move_file_same_filesystem() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src.txt");
        let dst = temp_dir.path().join("sub/dst.txt");
        std::fs::write(&src, b"payload").unwrap();

        move_file(&src, &dst).unwrap();

        assert!(!src.exists());
        assert!(dst.exists());
        assert_eq!(std::fs::read(&dst).unwrap(), b"payload");
    }

    #[test]
    fn test_move_file_missing_source_errors() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("missing.txt");
        let dst = temp_dir.path().join("dst.txt");

        let result = move_file(&src, &dst);
        assert!(matches!(result, Err(StorageError::NotFound(ref p)) if p == &src));
    }
}
