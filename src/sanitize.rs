//! Filename sanitization and destination-conflict resolution.
//!
//! `sanitize` is pure and total: every input string maps to a valid,
//! non-empty filename stem. `resolve_conflict` probes the destination
//! directory for an available name without ever overwriting an existing
//! file.

use std::path::{Path, PathBuf};

use chrono::Utc;
use unicode_normalization::UnicodeNormalization;

const MAX_NAME_LEN: usize = 160;
const MAX_CONFLICT_PROBES: u32 = 1000;

/// Normalizes a raw LLM filename proposal into a filesystem-safe stem.
///
/// Unicode is decomposed (NFKD) and anything that doesn't collapse to
/// `[A-Za-z0-9_]` is dropped. An empty result falls back to one of three
/// timestamped placeholders depending on why sanitization emptied it.
pub fn sanitize(proposal: &str) -> String {
    let decomposed: String = proposal.nfkd().collect();

    let cleaned: String = decomposed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    let stem = if cleaned.trim().is_empty() {
        if proposal.is_empty() {
            format!("empty_file_{}", timestamp())
        } else if proposal.chars().all(|c| c.is_whitespace()) {
            format!("invalid_name_{}", timestamp())
        } else {
            format!("untitled_document_{}", timestamp())
        }
    } else {
        cleaned
    };

    truncate_chars(&stem, MAX_NAME_LEN)
}

/// UTC `YYYYMMDDHHMMSS`, used by both `sanitize`'s fallbacks and the
/// pipeline's synthesized names (`empty_file_*`, `network_error_*`, ...).
pub fn timestamp() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Finds a filename in `destination_dir` derived from `name` that doesn't
/// collide with an existing entry. Tries `name.ext`, then `name_1.ext`,
/// `name_2.ext`, ... up to 1000 candidates, then falls back to a
/// Unix-epoch-suffixed name as a last resort. Never overwrites anything;
/// existence is re-checked for every candidate.
pub fn resolve_conflict(name: &str, destination_dir: &Path, extension: &str) -> String {
    let candidate = format!("{name}.{extension}");
    if !destination_dir.join(&candidate).exists() {
        return candidate;
    }

    for n in 1..=MAX_CONFLICT_PROBES {
        let candidate = format!("{name}_{n}.{extension}");
        if !destination_dir.join(&candidate).exists() {
            return candidate;
        }
    }

    format!("{name}_{}.{extension}", Utc::now().timestamp())
}

/// Convenience wrapper returning the full destination path.
pub fn resolve_conflict_path(name: &str, destination_dir: &Path, extension: &str) -> PathBuf {
    destination_dir.join(resolve_conflict(name, destination_dir, extension))
}
