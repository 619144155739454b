//! Batch Driver (C8): the top-level entry point for one run over an input
//! directory. Reconciles the progress journal, enumerates eligible files,
//! drives them through the worker pool, and reports session statistics.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::WorkerError;
use crate::journal;
use crate::pipeline::{Job, Outcome, Pipeline, PipelineConfig, ProgressReporter};
use crate::provider::Adapter;
use crate::retry;
use crate::worker::pool::WorkerPool;
use crate::worker::scanner;

#[derive(Debug, Default, Clone)]
pub struct BatchSummary {
    pub total_files: usize,
    pub placed: usize,
    pub quarantined: usize,
    pub successful_retries: u64,
    pub unique_files_with_recoverable_issues: usize,
}

/// Installs the process-wide SIGINT handler so Ctrl-C aborts pending
/// retries and the in-flight work item instead of killing the process
/// mid-write. Safe to call more than once; `ctrlc` itself only allows a
/// single registration per process, so later calls are ignored.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(|| {
        info!("received interrupt, cancelling pending retries");
        retry::request_cancellation();
    });
}

/// Runs one batch: reconciles the journal, scans the input directory, and
/// drives every eligible file through the pipeline coordinator.
pub fn run_batch(
    config: &Config,
    adapter: Adapter,
    ocr: Option<crate::extract::ocr::OcrProcessor>,
    progress: Arc<dyn ProgressReporter>,
) -> Result<BatchSummary, WorkerError> {
    let journal_path = config.journal_path();

    if config.reset_progress {
        journal::reset(&journal_path)?;
    }

    let already_processed = journal::load(&journal_path, &config.input_dir)?;

    let files = scanner::scan(&config.input_dir, &already_processed)?;
    info!(count = files.len(), "scanned input directory");

    let pipeline_config = Arc::new(PipelineConfig::from_config(config));
    let pipeline = Arc::new(Pipeline::new(pipeline_config, ocr, Arc::new(adapter)));

    let pool = WorkerPool::new(Arc::clone(&pipeline), config.worker_count, Arc::clone(&progress));

    // Every submitted job is guaranteed exactly one result, whether it runs
    // to completion or the pool declines to start it after an interrupt
    // (Outcome::Cancelled) -- so it's `submitted`, not `files.len()`, results
    // we wait for below. Waiting for the full file count would hang forever
    // on files a SIGINT stopped us from ever handing to the pool.
    let mut submitted = 0usize;
    for path in &files {
        if retry::is_cancelled() {
            break;
        }
        pool.submit(Job::new(path.clone()))?;
        submitted += 1;
    }

    let mut summary = BatchSummary { total_files: files.len(), ..Default::default() };

    for _ in 0..submitted {
        match pool.recv_result() {
            Some(result) => match result.outcome {
                Outcome::Placed { .. } => summary.placed += 1,
                Outcome::Quarantined { .. } => summary.quarantined += 1,
                Outcome::Cancelled => {}
            },
            None => break,
        }
    }

    pool.request_shutdown();
    pool.wait();

    let stats = retry::stats().lock().unwrap();
    summary.successful_retries = stats.successful_retries;
    summary.unique_files_with_recoverable_issues = stats.unique_files_with_recoverable_issues();

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;
    use crate::pipeline::NoopProgress;
    use crate::provider::local::LocalAdapter;
    use serial_test::serial;
    use tempfile::TempDir;

    fn base_config(root: &std::path::Path) -> Config {
        Config {
            input_dir: root.join("in"),
            destination_dir: root.join("out"),
            quarantine_dir: root.join("quarantine"),
            provider: Provider::Local,
            model: None,
            ocr_language: "eng".to_string(),
            reset_progress: false,
            max_attempts: 1,
            worker_count: 2,
        }
    }

    #[test]
    #[serial(cancellation_flag)]
    fn test_run_batch_places_empty_file_without_provider_call() {
        let root = TempDir::new().unwrap();
        let config = base_config(root.path());
        std::fs::create_dir_all(&config.input_dir).unwrap();
        std::fs::write(config.input_dir.join("a.pdf"), b"").unwrap();

        let adapter = Adapter::Local(LocalAdapter::new(
            "nope".to_string(),
            Some("http://127.0.0.1:1".to_string()),
        ));

        let summary = run_batch(&config, adapter, None, Arc::new(NoopProgress)).unwrap();
        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.placed, 1);
        assert_eq!(summary.quarantined, 0);
    }

    #[test]
    #[serial(cancellation_flag)]
    fn test_run_batch_reconciles_stale_journal_entry_against_input_dir() {
        let root = TempDir::new().unwrap();
        let config = base_config(root.path());
        std::fs::create_dir_all(&config.input_dir).unwrap();
        std::fs::create_dir_all(&config.destination_dir).unwrap();
        std::fs::write(config.input_dir.join("a.pdf"), b"").unwrap();

        // Pre-seed the journal as if "a.pdf" were already moved out.
        journal::record(&config.journal_path(), "a.pdf").unwrap();

        let adapter = Adapter::Local(LocalAdapter::new(
            "nope".to_string(),
            Some("http://127.0.0.1:1".to_string()),
        ));

        let summary = run_batch(&config, adapter, None, Arc::new(NoopProgress)).unwrap();
        // a.pdf is still sitting in input_dir, so reconciliation treats the
        // journal entry as stale and reprocesses it rather than skipping it.
        assert_eq!(summary.total_files, 1);
    }

    #[test]
    #[serial(cancellation_flag)]
    fn test_run_batch_returns_promptly_instead_of_hanging_when_already_cancelled() {
        // A SIGINT landing before (or during) submission must not make
        // run_batch wait forever for results from files it never handed to
        // the pool, and must not panic a worker thread either.
        let root = TempDir::new().unwrap();
        let config = base_config(root.path());
        std::fs::create_dir_all(&config.input_dir).unwrap();
        for i in 0..5 {
            std::fs::write(config.input_dir.join(format!("doc{i}.pdf")), b"content").unwrap();
        }

        let adapter = Adapter::Local(LocalAdapter::new(
            "nope".to_string(),
            Some("http://127.0.0.1:1".to_string()),
        ));

        retry::request_cancellation();
        let result = run_batch(&config, adapter, None, Arc::new(NoopProgress));
        retry::cancellation_flag().store(false, std::sync::atomic::Ordering::SeqCst);

        let summary = result.unwrap();
        assert_eq!(summary.total_files, 5);
        assert_eq!(summary.placed + summary.quarantined, 0, "nothing should have been processed");

        let remaining = std::fs::read_dir(&config.input_dir).unwrap().count();
        assert_eq!(remaining, 5, "every file must be left untouched in input_dir");
    }
}
