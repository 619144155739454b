//! Progress journal: an append-only record of basenames that have already
//! been moved out of the input directory, so a restarted run doesn't
//! reprocess them.

use std::collections::HashSet;
use std::io::{BufRead, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::JournalError;
use crate::storage::FileLock;

/// Loads the journal, reconciled against what's actually still sitting in
/// `input_dir`. An entry survives only if its source file is gone --
/// meaning the move it records really happened. A crash between writing
/// the journal line and moving the file would otherwise silently skip
/// reprocessing a file that never left the input directory.
pub fn load(journal_path: &Path, input_dir: &Path) -> Result<HashSet<String>, JournalError> {
    if !journal_path.exists() {
        return Ok(HashSet::new());
    }

    let file = std::fs::File::open(journal_path).map_err(|e| JournalError::Read {
        path: journal_path.to_path_buf(),
        source: e,
    })?;

    let mut reconciled = HashSet::new();
    for line in std::io::BufReader::new(file).lines() {
        let line = line.map_err(|e| JournalError::Read {
            path: journal_path.to_path_buf(),
            source: e,
        })?;
        let basename = line.trim();
        if basename.is_empty() {
            continue;
        }
        if !input_dir.join(basename).exists() {
            reconciled.insert(basename.to_string());
        }
    }

    Ok(reconciled)
}

/// Deletes the journal file, if present.
pub fn reset(journal_path: &Path) -> Result<(), JournalError> {
    match std::fs::remove_file(journal_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(JournalError::Write {
            path: journal_path.to_path_buf(),
            source: e,
        }),
    }
}

/// Appends `basename` to the journal under an exclusive lock, so concurrent
/// workers serialize their writes instead of interleaving lines.
pub fn record(journal_path: &Path, basename: &str) -> Result<(), JournalError> {
    let lock = FileLock::acquire(journal_path).map_err(|_| JournalError::Lock {
        path: journal_path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Other, "failed to acquire journal lock"),
    })?;

    let mut file = lock.file();
    file.seek(SeekFrom::End(0))
        .and_then(|_| file.write_all(basename.as_bytes()))
        .and_then(|_| file.write_all(b"\n"))
        .and_then(|_| file.sync_all())
        .map_err(|e| JournalError::Write {
            path: journal_path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_journal_returns_empty() {
        let dir = TempDir::new().unwrap();
        let journal = dir.path().join(".progress");
        let result = load(&journal, dir.path()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_record_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let journal = dir.path().join(".progress");

        record(&journal, "invoice.pdf").unwrap();
        record(&journal, "receipt.pdf").unwrap();

        // neither source file exists in the input dir, so both survive reconciliation
        let result = load(&journal, dir.path()).unwrap();
        assert!(result.contains("invoice.pdf"));
        assert!(result.contains("receipt.pdf"));
    }

    #[test]
    fn test_load_drops_entries_whose_source_still_exists() {
        let dir = TempDir::new().unwrap();
        let journal = dir.path().join(".progress");

        record(&journal, "stale.pdf").unwrap();
        record(&journal, "crashed.pdf").unwrap();
        // crashed.pdf's move never actually happened -- source file is still there
        std::fs::write(dir.path().join("crashed.pdf"), b"x").unwrap();

        let result = load(&journal, dir.path()).unwrap();
        assert!(result.contains("stale.pdf"));
        assert!(!result.contains("crashed.pdf"));
    }

    #[test]
    fn test_reset_removes_journal() {
        let dir = TempDir::new().unwrap();
        let journal = dir.path().join(".progress");
        record(&journal, "a.pdf").unwrap();
        assert!(journal.exists());

        reset(&journal).unwrap();
        assert!(!journal.exists());
    }

    #[test]
    fn test_reset_missing_journal_is_ok() {
        let dir = TempDir::new().unwrap();
        let journal = dir.path().join(".progress");
        assert!(reset(&journal).is_ok());
    }

    #[test]
    fn test_record_appends_without_truncating() {
        let dir = TempDir::new().unwrap();
        let journal = dir.path().join(".progress");

        record(&journal, "one.pdf").unwrap();
        record(&journal, "two.pdf").unwrap();
        record(&journal, "three.pdf").unwrap();

        let content = std::fs::read_to_string(&journal).unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}
