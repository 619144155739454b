//! Bounded thread pool (C8): each worker blocks on I/O running one document
//! through the pipeline coordinator at a time. Native threads rather than an
//! async runtime, since every collaborator downstream (reqwest's blocking
//! client, `leptess`, shelling out to `pdftoppm`) is itself blocking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::{Job, Outcome, Pipeline, ProgressReporter};
use crate::retry;

pub struct WorkItem {
    pub job: Job,
}

pub struct WorkResult {
    pub job: Job,
    pub outcome: Outcome,
}

pub struct WorkerPool {
    job_sender: Sender<WorkItem>,
    result_receiver: Receiver<WorkResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(pipeline: Arc<Pipeline>, worker_count: usize, progress: Arc<dyn ProgressReporter>) -> Self {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = bounded::<WorkItem>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<WorkResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let pipeline = Arc::clone(&pipeline);
            let progress = Arc::clone(&progress);

            workers.push(thread::spawn(move || {
                run_worker(worker_id, job_rx, result_tx, shutdown_flag, pipeline, progress);
            }));
        }

        info!(count = worker_count, "started worker pool");

        Self { job_sender, result_receiver, workers, shutdown }
    }

    pub fn submit(&self, job: Job) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }
        self.job_sender.send(WorkItem { job }).map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn recv_result(&self) -> Option<WorkResult> {
        self.result_receiver.recv().ok()
    }

    pub fn try_recv_result(&self) -> Option<WorkResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Drops the submission side (so workers drain and exit once the job
    /// queue empties) and joins every worker thread.
    pub fn wait(self) {
        drop(self.job_sender);
        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!(worker_id = i, "worker thread panicked: {:?}", e);
            } else {
                debug!(worker_id = i, "worker thread finished");
            }
        }
        info!("all workers stopped");
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<WorkItem>,
    result_sender: Sender<WorkResult>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
    progress: Arc<dyn ProgressReporter>,
) {
    debug!(worker_id, "worker started");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!(worker_id, "worker received shutdown signal");
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(item) => {
                // A SIGINT between this dequeue and the last one means this
                // job was only ever buffered, never started -- leave its
                // file untouched rather than beginning a fresh pipeline run.
                if retry::is_cancelled() {
                    let basename = item.job.basename.clone();
                    debug!(worker_id, filename = %basename, "dropping buffered job after interrupt");
                    if result_sender.send(WorkResult { job: item.job, outcome: Outcome::Cancelled }).is_err() {
                        error!(worker_id, "failed to send result, receiver gone");
                        break;
                    }
                    continue;
                }

                let job = item.job.clone();
                let (outcome, _ctx) = pipeline.run(item.job, progress.as_ref());
                if result_sender.send(WorkResult { job, outcome }).is_err() {
                    error!(worker_id, "failed to send result, receiver gone");
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if retry::is_cancelled() {
                    debug!(worker_id, "worker observed interrupt while idle");
                    break;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!(worker_id, "job channel disconnected");
                break;
            }
        }
    }

    debug!(worker_id, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{NoopProgress, PipelineConfig};
    use crate::provider::local::LocalAdapter;
    use crate::provider::Adapter;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial(cancellation_flag)]
    fn test_pool_processes_submitted_job() {
        let root = TempDir::new().unwrap();
        let input = root.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        let source = input.join("empty.pdf");
        std::fs::write(&source, b"").unwrap();

        let config = Arc::new(PipelineConfig {
            input_directory: input.clone(),
            destination_directory: root.path().join("out"),
            quarantine_directory: root.path().join("quarantine"),
            max_attempts: 1,
        });
        let adapter = Arc::new(Adapter::Local(LocalAdapter::new(
            "nope".to_string(),
            Some("http://127.0.0.1:1".to_string()),
        )));
        let pipeline = Arc::new(Pipeline::new(config, None, adapter));
        let pool = WorkerPool::new(pipeline, 1, Arc::new(NoopProgress));

        pool.submit(Job::new(source)).unwrap();
        let result = pool.recv_result().unwrap();

        match result.outcome {
            Outcome::Placed { .. } => {}
            Outcome::Quarantined { reason, .. } => panic!("expected placement: {reason}"),
            Outcome::Cancelled => panic!("no cancellation was requested"),
        }

        pool.request_shutdown();
        pool.wait();
    }

    #[test]
    #[serial(cancellation_flag)]
    fn test_pool_drops_buffered_job_without_processing_it_once_cancelled() {
        let root = TempDir::new().unwrap();
        let input = root.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        let source = input.join("doc.pdf");
        std::fs::write(&source, b"content").unwrap();

        let config = Arc::new(PipelineConfig {
            input_directory: input.clone(),
            destination_directory: root.path().join("out"),
            quarantine_directory: root.path().join("quarantine"),
            max_attempts: 1,
        });
        let adapter = Arc::new(Adapter::Local(LocalAdapter::new(
            "nope".to_string(),
            Some("http://127.0.0.1:1".to_string()),
        )));
        let pipeline = Arc::new(Pipeline::new(config, None, adapter));
        let pool = WorkerPool::new(pipeline, 1, Arc::new(NoopProgress));

        crate::retry::request_cancellation();
        pool.submit(Job::new(source.clone())).unwrap();
        let result = pool.recv_result().unwrap();
        crate::retry::cancellation_flag().store(false, Ordering::SeqCst);

        assert!(matches!(result.outcome, Outcome::Cancelled));
        assert!(source.exists(), "cancelled job must leave its source file untouched");

        pool.request_shutdown();
        pool.wait();
    }
}
