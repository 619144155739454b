use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info_span, warn};

use crate::error::{ExtractError, ProviderError};
use crate::extract::{self, ocr::OcrProcessor, Quality};
use crate::journal;
use crate::provider::{Adapter, LlmAdapter};
use crate::redact;
use crate::retry::{self, ErrorKind};
use crate::sanitize;
use crate::storage;

use super::config::PipelineConfig;
use super::context::{Job, PipelineContext};
use super::progress::{Phase, ProgressEvent, ProgressReporter};

/// Where a file ended up after one trip through the coordinator.
#[derive(Debug, Clone)]
pub enum Outcome {
    Placed { final_path: PathBuf },
    Quarantined { final_path: PathBuf, reason: String },
    /// The worker pool declined to start this job after an interrupt; the
    /// source file is left exactly where it was. Never produced by
    /// [`Pipeline::run`] itself -- only by the pool for jobs it pulls off
    /// the queue after cancellation, so it never reaches [`Pipeline::finish`].
    Cancelled,
}

/// File Pipeline Coordinator (C7): drives one file through extraction,
/// filename proposal, and placement, falling back to quarantine whenever a
/// step can't recover.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    ocr: Option<OcrProcessor>,
    adapter: Arc<Adapter>,
}

impl Pipeline {
    pub fn new(config: Arc<PipelineConfig>, ocr: Option<OcrProcessor>, adapter: Arc<Adapter>) -> Self {
        Self { config, ocr, adapter }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.config.destination_directory.join(".progress")
    }

    /// Runs the full coordinator for one file. Never returns an `Err` --
    /// every unrecoverable failure is represented as [`Outcome::Quarantined`]
    /// so the batch driver always has somewhere to put the file.
    pub fn run(&self, job: Job, progress: &dyn ProgressReporter) -> (Outcome, PipelineContext) {
        let _span = info_span!("pipeline", filename = %job.basename).entered();
        progress.report(ProgressEvent::Started { filename: job.basename.clone() });

        let mut ctx = PipelineContext::new(job);

        let extracted = {
            let _step = info_span!("extract").entered();
            progress.report(ProgressEvent::StatusChanged {
                filename: ctx.job.basename.clone(),
                phase: Phase::Extracting,
                message: "Extracting content...".to_string(),
            });
            self.step_extract(&ctx.job)
        };

        let extracted = match extracted {
            Ok(content) => content,
            Err(e) => {
                let outcome = self.quarantine(&ctx.job, &e.to_string());
                return self.finish(ctx, outcome, progress);
            }
        };

        if extracted.quality == Quality::Failed && extracted.text.trim().is_empty() && extracted.page_image.is_none() {
            // Empty-file shortcut: nothing to send to a provider, so fall
            // straight through to a sanitize()-derived fallback name instead
            // of quarantining a merely-empty document.
            ctx.warnings.push(super::error::PipelineWarning::FellBackToOriginalName {
                reason: "empty or unreadable content".to_string(),
            });
            let stem = sanitize::sanitize("");
            ctx.extracted = Some(extracted);
            let outcome = self.place(&ctx.job, &stem, progress);
            return self.finish(ctx, outcome, progress);
        }

        ctx.extracted = Some(extracted);
        let content = ctx.extracted.as_ref().expect("just set");

        let proposed = {
            let _step = info_span!("propose").entered();
            progress.report(ProgressEvent::StatusChanged {
                filename: ctx.job.basename.clone(),
                phase: Phase::Proposing,
                message: "Proposing filename...".to_string(),
            });
            self.step_propose(&ctx.job, content)
        };

        let proposed = match proposed {
            Ok(name) => name,
            Err(ProviderError::Auth { provider, message }) => {
                // Credentials are validated once before a batch starts; an
                // Auth failure mid-run means they stopped being valid (key
                // revoked, quota account disabled). That's a session-wide
                // problem, not a per-file one -- stop handing out new work
                // but still let this file reach a terminal state.
                warn!(filename = %ctx.job.basename, provider, auth_error = %redact::redact_secrets(&message), "auth failure, cancelling session");
                retry::request_cancellation();
                let outcome = self.quarantine(&ctx.job, &format!("authentication failed for provider '{provider}': {message}"));
                return self.finish(ctx, outcome, progress);
            }
            Err(e) => {
                // Every other exhausted-retry outcome gets a synthesized
                // name and still flows through placement -- only extraction
                // failures (encrypted/corrupt) and placement failures
                // divert to quarantine.
                let reason = e.to_string();
                ctx.warnings.push(super::error::PipelineWarning::FellBackToOriginalName { reason: reason.clone() });
                let classification = retry::classify(&reason);
                if classification.kind == ErrorKind::Network {
                    format!("network_error_{}", sanitize::timestamp())
                } else {
                    format!("untitled_document_{}", sanitize::timestamp())
                }
            }
        };

        let stem = sanitize::sanitize(&proposed);
        ctx.proposed_name = Some(stem.clone());

        let outcome = self.place(&ctx.job, &stem, progress);
        self.finish(ctx, outcome, progress)
    }

    fn step_extract(&self, job: &Job) -> Result<extract::ExtractedContent, ExtractError> {
        let ocr = self.ocr.clone();
        retry::execute_with_retry_attempts(
            &job.basename,
            self.config.max_attempts,
            || extract::extract(&job.source_path, &self.config.input_directory, ocr.as_ref(), None),
            |e: &ExtractError| e.to_string(),
        )
    }

    fn step_propose(&self, job: &Job, content: &extract::ExtractedContent) -> Result<String, ProviderError> {
        retry::execute_with_retry_attempts(
            &job.basename,
            self.config.max_attempts,
            || self.adapter.propose_filename(&content.text, content.page_image.as_deref()),
            |e: &ProviderError| e.to_string(),
        )
    }

    /// Moves `job`'s source file into the destination directory under
    /// `stem`, preserving the original extension and resolving a name
    /// collision the same way [`storage::FileStorage::store`] would.
    /// Recoverable move failures (permission/lock/sync) are retried per
    /// the configured attempt budget before falling through to quarantine.
    fn place(&self, job: &Job, stem: &str, progress: &dyn ProgressReporter) -> Outcome {
        let extension = job
            .source_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        if let Err(e) = storage::ensure_directory(&self.config.destination_directory) {
            return self.quarantine(job, &e.to_string());
        }

        let dest = sanitize::resolve_conflict_path(stem, &self.config.destination_directory, extension);

        let result = retry::execute_with_retry_attempts(
            &job.basename,
            self.config.max_attempts,
            || storage::move_file(&job.source_path, &dest),
            |e: &crate::error::StorageError| e.to_string(),
        );

        match result {
            Ok(()) => {
                progress.report(ProgressEvent::StatusChanged {
                    filename: job.basename.clone(),
                    phase: Phase::Placing,
                    message: format!("Placed at {}", dest.display()),
                });
                Outcome::Placed { final_path: dest }
            }
            Err(e) => self.quarantine(job, &e.to_string()),
        }
    }

    /// Moves `job`'s source file into the quarantine directory, preserving
    /// its original name (with the usual numbered-suffix collision
    /// handling) so a human can see what failed and why.
    fn quarantine(&self, job: &Job, reason: &str) -> Outcome {
        let reason = redact::redact_secrets(reason);
        warn!(filename = %job.basename, reason = %reason, "quarantining file");

        let stem = job
            .source_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed");
        let extension = job
            .source_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        if let Err(e) = storage::ensure_directory(&self.config.quarantine_directory) {
            // Nothing more we can do -- leave the file where it is and
            // surface the compounded error.
            return Outcome::Quarantined {
                final_path: job.source_path.clone(),
                reason: format!("{reason}; additionally failed to prepare quarantine directory: {e}"),
            };
        }

        let dest = sanitize::resolve_conflict_path(stem, &self.config.quarantine_directory, extension);

        match storage::move_file(&job.source_path, &dest) {
            Ok(()) => Outcome::Quarantined { final_path: dest, reason: reason.to_string() },
            Err(e) => Outcome::Quarantined {
                final_path: job.source_path.clone(),
                reason: format!("{reason}; additionally failed to move to quarantine: {e}"),
            },
        }
    }

    fn finish(&self, mut ctx: PipelineContext, outcome: Outcome, progress: &dyn ProgressReporter) -> (Outcome, PipelineContext) {
        match &outcome {
            Outcome::Placed { final_path } => {
                ctx.final_path = Some(final_path.clone());
                progress.report(ProgressEvent::Succeeded {
                    filename: ctx.job.basename.clone(),
                    output_path: final_path.display().to_string(),
                });
            }
            Outcome::Quarantined { final_path, reason } => {
                ctx.final_path = Some(final_path.clone());
                progress.report(ProgressEvent::Failed {
                    filename: ctx.job.basename.clone(),
                    error: reason.clone(),
                });
            }
            Outcome::Cancelled => return (outcome, ctx),
        }

        if let Err(e) = storage::ensure_directory(&self.config.destination_directory) {
            warn!(filename = %ctx.job.basename, error = %e, "failed to prepare destination directory for journal");
        } else if let Err(e) = journal::record(&self.journal_path(), &ctx.job.basename) {
            warn!(filename = %ctx.job.basename, error = %e, "failed to record journal entry");
        }

        (outcome, ctx)
    }
}
