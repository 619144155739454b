//! Retry & Error Classifier (C6): maps a failure to a recoverability
//! category with a suggested backoff, and drives the bounded-attempt retry
//! loop every pipeline step runs through.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::Duration;

pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RecoverablePermission,
    FileLocked,
    SyncConflict,
    Network,
    RateLimit,
    ServerError,
    UnsupportedFormat,
    Permanent,
}

#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub kind: ErrorKind,
    pub recoverable: bool,
    pub suggested_backoff_secs: f64,
    pub retry_recommended: bool,
}

/// Classifies a failure message (first match wins, case-insensitive
/// substring checks) into a recoverability category with a base backoff.
pub fn classify(message: &str) -> Classification {
    let lowered = message.to_lowercase();

    if lowered.contains("permission denied") || lowered.contains("eacces") {
        return recoverable(ErrorKind::RecoverablePermission, 2.0);
    }
    if lowered.contains("ebusy") || lowered.contains("file is being used") || lowered.contains("locked") {
        return recoverable(ErrorKind::FileLocked, 1.5);
    }
    if ["onedrive", "dropbox", "sync", "conflicted copy"]
        .iter()
        .any(|m| lowered.contains(m))
    {
        return recoverable(ErrorKind::SyncConflict, 3.0);
    }
    if ["timeout", "timed out", "connection", "network", "unreachable"]
        .iter()
        .any(|m| lowered.contains(m))
    {
        return recoverable(ErrorKind::Network, 5.0);
    }
    if ["unsupported", "invalid format", "corrupted", "not a valid"]
        .iter()
        .any(|m| lowered.contains(m))
    {
        return Classification {
            kind: ErrorKind::UnsupportedFormat,
            recoverable: false,
            suggested_backoff_secs: 0.0,
            retry_recommended: false,
        };
    }
    if ["rate limit", "429", "throttle", "quota"].iter().any(|m| lowered.contains(m)) {
        return recoverable(ErrorKind::RateLimit, 5.0);
    }
    if ["500", "502", "503", "504", "server error", "service unavailable"]
        .iter()
        .any(|m| lowered.contains(m))
    {
        return recoverable(ErrorKind::ServerError, 5.0);
    }

    Classification {
        kind: ErrorKind::Permanent,
        recoverable: false,
        suggested_backoff_secs: 0.0,
        retry_recommended: false,
    }
}

fn recoverable(kind: ErrorKind, backoff: f64) -> Classification {
    Classification { kind, recoverable: true, suggested_backoff_secs: backoff, retry_recommended: true }
}

/// Process-wide cancellation flag, flipped by the SIGINT handler installed
/// in the batch driver. Pending sleeps check this between increments so a
/// Ctrl-C aborts retries promptly instead of waiting out the backoff.
pub fn cancellation_flag() -> &'static AtomicBool {
    static FLAG: OnceLock<AtomicBool> = OnceLock::new();
    FLAG.get_or_init(|| AtomicBool::new(false))
}

pub fn request_cancellation() {
    cancellation_flag().store(true, Ordering::SeqCst);
}

pub fn is_cancelled() -> bool {
    cancellation_flag().load(Ordering::SeqCst)
}

/// Process-wide counters for session statistics (§3 Session Statistics).
#[derive(Debug, Default)]
pub struct RetryStats {
    pub successful_retries: u64,
    pub recoverable_retry_events: u64,
    files_with_recoverable_issues: HashSet<String>,
}

impl RetryStats {
    pub fn unique_files_with_recoverable_issues(&self) -> usize {
        self.files_with_recoverable_issues.len()
    }
}

pub fn stats() -> &'static Mutex<RetryStats> {
    static STATS: OnceLock<Mutex<RetryStats>> = OnceLock::new();
    STATS.get_or_init(|| Mutex::new(RetryStats::default()))
}

/// Runs `op` up to [`MAX_ATTEMPTS`] times. Convenience wrapper around
/// [`execute_with_retry_attempts`] for call sites that don't need a
/// configurable cap.
pub fn execute_with_retry<T, E>(
    filename: &str,
    op: impl FnMut() -> Result<T, E>,
    describe: impl Fn(&E) -> String,
) -> Result<T, E> {
    execute_with_retry_attempts(filename, MAX_ATTEMPTS, op, describe)
}

/// Runs `op` up to `max_attempts` times. `describe` turns the operation's
/// error into a message the classifier can inspect (propagating the
/// original error type back out on the final failure).
pub fn execute_with_retry_attempts<T, E>(
    filename: &str,
    max_attempts: u32,
    mut op: impl FnMut() -> Result<T, E>,
    describe: impl Fn(&E) -> String,
) -> Result<T, E> {
    let max_attempts = max_attempts.max(1);
    let mut last_err = None;

    // Cancellation is only consulted between attempts, never before the
    // first one: an already-dequeued job always gets to run its current
    // operation once, even if Ctrl-C landed a moment earlier.
    for attempt in 1..=max_attempts {
        match op() {
            Ok(value) => {
                if attempt > 1 {
                    stats().lock().unwrap().successful_retries += 1;
                }
                return Ok(value);
            }
            Err(e) => {
                let message = describe(&e);
                let classification = classify(&message);

                {
                    let mut s = stats().lock().unwrap();
                    if classification.recoverable {
                        s.recoverable_retry_events += 1;
                        s.files_with_recoverable_issues.insert(filename.to_string());
                    }
                }

                let should_retry = classification.recoverable
                    && classification.retry_recommended
                    && attempt < max_attempts
                    && !is_cancelled();

                last_err = Some(e);

                if !should_retry {
                    break;
                }

                let backoff = classification.suggested_backoff_secs * 2f64.powi((attempt - 1) as i32);
                let jitter = backoff * 0.1 * jitter_fraction(attempt);
                sleep_cancellable(Duration::from_secs_f64(backoff + jitter));
            }
        }
    }

    Err(last_err.expect("the loop always calls op() at least once, populating last_err on any Err"))
}

/// Deterministic pseudo-jitter derived from the attempt number, avoiding a
/// `rand` dependency for a ≤10% wobble on the backoff.
fn jitter_fraction(attempt: u32) -> f64 {
    ((attempt as f64 * 37.0) % 10.0) / 10.0
}

fn sleep_cancellable(duration: Duration) {
    const POLL_INTERVAL: Duration = Duration::from_millis(100);
    let mut remaining = duration;
    while remaining > Duration::ZERO {
        if is_cancelled() {
            return;
        }
        let step = remaining.min(POLL_INTERVAL);
        thread::sleep(step);
        remaining -= step;
    }
}
