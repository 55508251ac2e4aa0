//! Isolated worker threads. One OS thread per job, with the whole job body
//! behind `catch_unwind` so a panic becomes a `WorkerCrash` message instead
//! of taking the controller down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc;

use super::result_store::ResultStore;
use super::types::{
    FailureKind, JobId, PartialProgress, ScanOutcome, ScanRequest, WorkerMessage,
};
use crate::pipeline::aggregate::QualityReport;
use crate::pipeline::extraction::orchestrator::panic_message;
use crate::pipeline::processor::{DocumentProcessor, ProcessingError};
use crate::pipeline::progress::{CancellationToken, Phase, ProgressSink, ProgressUpdate};

pub(crate) type ProgressSender = mpsc::Sender<(JobId, WorkerMessage)>;

/// Runs one scan to completion on the calling thread.
pub trait ScanExecutor: Send + Sync + 'static {
    /// Reject a request before it is queued.
    fn validate(&self, _request: &ScanRequest) -> Result<(), String> {
        Ok(())
    }

    fn execute(
        &self,
        job_id: JobId,
        request: &ScanRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<QualityReport, ProcessingError>;
}

impl ScanExecutor for DocumentProcessor {
    fn validate(&self, request: &ScanRequest) -> Result<(), String> {
        self.validate_checkers(&request.enabled_checkers)
            .map_err(|e| e.to_string())
    }

    fn execute(
        &self,
        job_id: JobId,
        request: &ScanRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<QualityReport, ProcessingError> {
        self.process(
            job_id,
            &request.bytes,
            request.format_hint.as_deref(),
            &request.enabled_checkers,
            progress,
            cancel,
        )
    }
}

/// Forwards progress to the controller and remembers what it forwarded.
struct ChannelSink {
    job_id: JobId,
    tx: ProgressSender,
    partial: PartialProgress,
}

impl ChannelSink {
    fn send(&self, message: WorkerMessage) {
        // The controller has gone (shutdown); nothing left to tell.
        if self.tx.blocking_send((self.job_id, message)).is_err() {
            tracing::debug!(job_id = %self.job_id, "Progress channel closed");
        }
    }
}

impl ProgressSink for ChannelSink {
    fn report(&mut self, update: ProgressUpdate) {
        self.partial.phase = Some(update.phase);
        self.partial.percent = self.partial.percent.max(update.percent);
        if let Some(id) = &update.completed_checker {
            self.partial.completed_checkers.push(id.clone());
        }
        self.send(WorkerMessage::Progress(update));
    }
}

/// Handle the controller keeps for a running job.
pub(crate) struct WorkerHandle {
    pub thread: JoinHandle<()>,
    pub cancel: CancellationToken,
}

impl WorkerHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

/// Start `request` on its own thread named `scan-<id>`.
pub(crate) fn spawn_worker(
    job_id: JobId,
    request: ScanRequest,
    executor: Arc<dyn ScanExecutor>,
    store: Arc<dyn ResultStore>,
    tx: ProgressSender,
) -> std::io::Result<WorkerHandle> {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let thread = std::thread::Builder::new()
        .name(format!("scan-{job_id}"))
        .spawn(move || run_job(job_id, &request, executor.as_ref(), store.as_ref(), tx, &token))?;
    Ok(WorkerHandle { thread, cancel })
}

fn run_job(
    job_id: JobId,
    request: &ScanRequest,
    executor: &dyn ScanExecutor,
    store: &dyn ResultStore,
    tx: ProgressSender,
    cancel: &CancellationToken,
) {
    tracing::info!(job_id = %job_id, bytes = request.bytes.len(), "Scan worker started");
    let mut sink = ChannelSink {
        job_id,
        tx,
        partial: PartialProgress::default(),
    };

    let result = catch_unwind(AssertUnwindSafe(|| {
        executor.execute(job_id, request, &mut sink, cancel)
    }));

    let message = match result {
        Ok(Ok(report)) if cancel.is_cancelled() => {
            // The controller has already recorded this job's outcome.
            tracing::info!(job_id = %job_id, "Scan finished after cancellation, report discarded");
            WorkerMessage::Failed {
                kind: FailureKind::JobCancelled,
                phase: Some(Phase::Finalizing),
                message: "report finished after cancellation and was discarded".into(),
                partial: PartialProgress {
                    discarded_findings: report.metrics.total_findings,
                    ..sink.partial.clone()
                },
            }
        }
        Ok(Ok(report)) => match store.save_if_absent(&ScanOutcome::Report(report)) {
            Ok(report_path) => {
                tracing::info!(job_id = %job_id, path = %report_path.display(), "Scan worker finished");
                WorkerMessage::Done { report_path }
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to store scan report");
                WorkerMessage::Failed {
                    kind: FailureKind::ResultStore,
                    phase: Some(Phase::Finalizing),
                    message: format!("could not store report: {e}"),
                    partial: sink.partial.clone(),
                }
            }
        },
        Ok(Err(e)) => failure_message(&e, &sink.partial),
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::warn!(job_id = %job_id, reason = %reason, "Scan worker panicked");
            WorkerMessage::Failed {
                kind: FailureKind::WorkerCrash,
                phase: sink.partial.phase,
                message: format!("worker crashed: {reason}"),
                partial: sink.partial.clone(),
            }
        }
    };
    sink.send(message);
    tracing::debug!(job_id = %job_id, "Scan worker exiting");
}

fn failure_message(error: &ProcessingError, seen: &PartialProgress) -> WorkerMessage {
    match error {
        ProcessingError::InvalidCheckers(_) => WorkerMessage::Failed {
            kind: FailureKind::InvalidRequest,
            phase: Some(error.phase()),
            message: error.to_string(),
            partial: seen.clone(),
        },
        ProcessingError::Extraction(_) => WorkerMessage::Failed {
            kind: FailureKind::ExtractionFailure,
            phase: Some(error.phase()),
            message: error.to_string(),
            partial: seen.clone(),
        },
        ProcessingError::Cancelled {
            completed_checkers,
            discarded_findings,
            ..
        } => WorkerMessage::Failed {
            kind: FailureKind::JobCancelled,
            phase: Some(error.phase()),
            message: error.to_string(),
            partial: PartialProgress {
                phase: Some(error.phase()),
                percent: seen.percent,
                completed_checkers: completed_checkers.clone(),
                discarded_findings: *discarded_findings,
            },
        },
    }
}
