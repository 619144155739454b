//! Directory enumeration for a batch run: lists eligible files at the top
//! level of the input directory, skipping anything already recorded in the
//! progress journal.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::WorkerError;
use crate::extract::SUPPORTED_EXTENSIONS;

/// Returns true for dotfiles and macOS AppleDouble sidecar files
/// (`._foo.pdf`), which regularly show up in directories synced from a Mac
/// and should never be treated as documents.
fn is_hidden_or_sidecar(name: &str) -> bool {
    name.starts_with('.')
}

/// Lists the supported documents directly under `input_dir` (no recursion
/// into subdirectories), excluding anything whose basename is already in
/// `already_processed`.
pub fn scan(input_dir: &Path, already_processed: &HashSet<String>) -> Result<Vec<PathBuf>, WorkerError> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
    {
        let entry = entry.map_err(|e| WorkerError::ScanFailed {
            path: input_dir.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        if path.is_dir() {
            continue;
        }

        let basename = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };

        if is_hidden_or_sidecar(basename) {
            continue;
        }
        if already_processed.contains(basename) {
            continue;
        }

        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);

        if supported {
            paths.push(path.to_path_buf());
        }
    }

    paths.sort();
    Ok(paths)
}
