//! Helpers for keeping sensitive data out of logs and tracing spans.
//!
//! Error-log lines and span fields are safe to share for debugging — these
//! functions ensure no file path, credential, or API key leaks into them.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Returns a short deterministic hash of a path for correlation without
/// exposing the actual path.
pub fn hash_path(path: &Path) -> String {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    let hash = hasher.finish();
    format!("{:016x}", hash)
}

/// Replaces substrings matching a known API-key shape with `[REDACTED]`.
/// Covers the common `sk-...`, `sk-ant-...`, and bare 32+ hex/base64-ish
/// token shapes providers hand out, plus anything following `key=`/`token=`.
pub fn redact_secrets(message: &str) -> String {
    static PATTERNS: std::sync::OnceLock<Vec<regex::Regex>> = std::sync::OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        vec![
            regex::Regex::new(r"sk-ant-[A-Za-z0-9_\-]{10,}").unwrap(),
            regex::Regex::new(r"sk-[A-Za-z0-9_\-]{10,}").unwrap(),
            regex::Regex::new(r"AIza[A-Za-z0-9_\-]{10,}").unwrap(),
            regex::Regex::new(r"(?i)(key|token|secret)\s*[:=]\s*[A-Za-z0-9_\-]{8,}").unwrap(),
        ]
    });

    let mut redacted = message.to_string();
    for pattern in patterns {
        redacted = pattern.replace_all(&redacted, "[REDACTED]").into_owned();
    }
    redacted
}
