use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("content extraction failed: {0}")]
    Extract(#[from] crate::error::ExtractError),

    #[error("filename proposal failed: {0}")]
    Provider(#[from] crate::error::ProviderError),

    #[error("storage failed: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("journal write failed: {0}")]
    Journal(#[from] crate::error::JournalError),
}

#[derive(Debug, Clone)]
pub enum PipelineWarning {
    FellBackToOriginalName { reason: String },
    QualityDowngraded,
}
