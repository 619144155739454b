use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type. Each pipeline stage raises its own sub-enum; this
/// wraps them for callers that don't care which stage failed.
#[derive(Error, Debug)]
pub enum DocMoverError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config validation failed: {message}")]
    Validation { message: String },
}

/// Errors raised by the content extractor (C4). These carry the original
/// kind where the extractor already knows it (encrypted, too large, ...) so
/// the retry classifier doesn't need to re-derive it from a message string.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("document is password protected")]
    Encrypted,

    #[error("document is corrupt or malformed: {0}")]
    Corrupt(String),

    #[error("unsupported document format: {0}")]
    Unsupported(String),

    #[error("file exceeds the maximum allowed size ({size} bytes > {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },

    #[error("failed to read file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("path escapes the configured input root: {0}")]
    PathTraversal(PathBuf),
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("authentication failed for provider '{provider}': {message}")]
    Auth { provider: String, message: String },

    #[error("rate limited by provider '{provider}'")]
    RateLimit { provider: String },

    #[error("request to provider '{provider}' timed out")]
    Timeout { provider: String },

    #[error("network error contacting provider '{provider}': {message}")]
    Network { provider: String, message: String },

    #[error("provider '{provider}' returned an unparseable response: {message}")]
    BadResponse { provider: String, message: String },

    #[error("provider '{provider}' refused the request on content-policy grounds")]
    ContentPolicy { provider: String },

    #[error("provider '{provider}' does not support this request")]
    Unsupported { provider: String },

    #[error("server error from provider '{provider}': {status}")]
    ServerError { provider: String, status: u16 },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to acquire lock on '{path}': {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("failed to read journal '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write journal '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to lock journal '{path}': {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("journal reconciliation failed: {0}")]
    Journal(#[from] JournalError),
}

pub type Result<T> = std::result::Result<T, DocMoverError>;
