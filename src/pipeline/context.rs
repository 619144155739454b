use std::path::PathBuf;

use crate::extract::ExtractedContent;

use super::error::PipelineWarning;

/// A single file discovered in the input directory, carried through the
/// coordinator's steps.
#[derive(Debug, Clone)]
pub struct Job {
    pub source_path: PathBuf,
    pub basename: String,
}

impl Job {
    pub fn new(source_path: PathBuf) -> Self {
        let basename = source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { source_path, basename }
    }
}

pub struct PipelineContext {
    pub job: Job,

    /// Step C4 result — guaranteed Some after step_extract.
    pub extracted: Option<ExtractedContent>,

    /// Step C5 result — guaranteed Some after step_propose.
    pub proposed_name: Option<String>,

    /// Step C1+C2 result — the path the file ended up at, wherever it landed.
    pub final_path: Option<PathBuf>,

    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            extracted: None,
            proposed_name: None,
            final_path: None,
            warnings: Vec::new(),
        }
    }
}
