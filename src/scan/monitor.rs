//! Job table and the monitor task that drives it.
//!
//! Workers report over one shared bounded channel. The monitor applies each
//! message in arrival order, then sweeps the table: deadlines, the grace
//! period after a stop request, workers that exited silently, and queued jobs
//! waiting for a free slot. It never waits on the channel longer than one
//! tick.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;

use super::result_store::ResultStore;
use super::types::{
    FailureKind, JobId, JobSnapshot, JobStatus, PartialProgress, ScanFailure, ScanOutcome,
    ScanRequest, WorkerMessage,
};
use super::worker::{spawn_worker, ProgressSender, ScanExecutor, WorkerHandle};
use crate::config::ControllerConfig;
use crate::pipeline::progress::{Phase, ProgressUpdate};
use crate::time_estimation::estimate_remaining_secs;

/// Termination requested for a running job.
#[derive(Debug, Clone, Copy)]
pub(super) struct StopRequest {
    /// `JobTimeout` or `JobCancelled`.
    pub reason: FailureKind,
    /// When the worker is abandoned if it has not stopped on its own.
    pub kill_at: Instant,
}

pub(super) struct JobEntry {
    pub snapshot: JobSnapshot,
    /// Held until the job leaves the queue.
    pub request: Option<ScanRequest>,
    pub timeout: Duration,
    pub worker: Option<WorkerHandle>,
    pub started: Option<Instant>,
    pub deadline: Option<Instant>,
    pub stop: Option<StopRequest>,
    /// Set on the first sweep that finds the thread gone.
    pub exit_noticed: bool,
    pub finished: Option<Instant>,
}

impl JobEntry {
    pub fn new(job_id: JobId, request: ScanRequest, timeout: Duration) -> Self {
        Self {
            snapshot: JobSnapshot::queued(job_id),
            request: Some(request),
            timeout,
            worker: None,
            started: None,
            deadline: None,
            stop: None,
            exit_noticed: false,
            finished: None,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.snapshot.job_id
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some() && !self.snapshot.is_terminal()
    }

    pub fn refresh_eta(&mut self) {
        self.snapshot.eta_secs = self
            .started
            .and_then(|s| estimate_remaining_secs(s.elapsed(), self.snapshot.percent));
    }

    fn apply_progress(&mut self, update: ProgressUpdate) {
        let snapshot = &mut self.snapshot;
        if snapshot.phase_history.last() != Some(&update.phase) {
            snapshot.phase_history.push(update.phase);
        }
        snapshot.phase = Some(update.phase);
        snapshot.status = JobStatus::for_phase(update.phase);
        snapshot.percent = snapshot.percent.max(update.percent);
        snapshot.message = update.message;
        if let Some(checker) = update.completed_checker {
            snapshot.completed_checkers.push(checker);
        }
        self.refresh_eta();
    }

    /// Signal the worker to stop; it is abandoned at `kill_at`.
    pub fn request_stop(&mut self, reason: FailureKind, kill_at: Instant) {
        if self.stop.is_some() {
            return;
        }
        if let Some(worker) = &self.worker {
            worker.cancel.cancel();
        }
        self.stop = Some(StopRequest { reason, kill_at });
    }

    fn complete(&mut self, report_path: std::path::PathBuf) {
        let snapshot = &mut self.snapshot;
        snapshot.status = JobStatus::Complete;
        snapshot.percent = 100.0;
        snapshot.message = "Complete".into();
        snapshot.eta_secs = Some(0);
        snapshot.report_path = Some(report_path);
        snapshot.finished_at = Some(Utc::now());
        self.finished = Some(Instant::now());
        self.worker = None;
    }
}

/// Persist a failure record and move the job to its terminal status.
pub(super) fn finish_failure(
    store: &dyn ResultStore,
    entry: &mut JobEntry,
    kind: FailureKind,
    phase: Option<Phase>,
    message: String,
    partial: PartialProgress,
) {
    let failure = ScanFailure {
        job_id: entry.job_id(),
        kind,
        phase,
        message,
        partial,
        failed_at: Utc::now(),
    };
    match store.save(&ScanOutcome::Failure(failure.clone())) {
        Ok(path) => entry.snapshot.report_path = Some(path),
        Err(e) => {
            tracing::warn!(job_id = %entry.job_id(), error = %e, "Failed to persist failure record");
        }
    }
    tracing::info!(
        job_id = %entry.job_id(),
        status = %kind.status(),
        phase = ?phase,
        reason = %failure.message,
        "Scan job ended without a report"
    );

    let snapshot = &mut entry.snapshot;
    snapshot.status = kind.status();
    snapshot.message = failure.message.clone();
    snapshot.eta_secs = None;
    snapshot.failure = Some(failure);
    snapshot.finished_at = Some(Utc::now());
    entry.finished = Some(Instant::now());
    entry.worker = None;
    entry.request = None;
}

#[derive(Default)]
pub(super) struct JobTable {
    pub jobs: HashMap<JobId, JobEntry>,
    pub queue: VecDeque<JobId>,
    /// Workers given up on after the grace period. Each holds a worker slot
    /// until its thread actually exits.
    pub abandoned: Vec<WorkerHandle>,
}

impl JobTable {
    /// Live worker threads: running jobs plus abandoned threads still alive.
    pub fn running(&self) -> usize {
        let active = self.jobs.values().filter(|e| e.is_running()).count();
        active + self.abandoned.iter().filter(|w| !w.is_finished()).count()
    }
}

/// When a worker asked to stop at `now` is abandoned. Saturates at `now`.
pub(super) fn kill_deadline(now: Instant, grace: Duration) -> Instant {
    now.checked_add(grace).unwrap_or(now)
}

/// State shared by the controller handle and the monitor task.
pub(super) struct Shared {
    pub config: ControllerConfig,
    pub executor: Arc<dyn ScanExecutor>,
    pub store: Arc<dyn ResultStore>,
    pub tx: ProgressSender,
    pub table: Mutex<JobTable>,
    pub stopped: AtomicBool,
}

impl Shared {
    pub fn lock(&self) -> MutexGuard<'_, JobTable> {
        // The table stays consistent between statements; a panic elsewhere
        // while holding the lock does not invalidate it.
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Start queued jobs while worker slots are free.
    pub fn start_queued(&self, table: &mut JobTable) {
        while table.running() < self.config.max_workers {
            let Some(job_id) = table.queue.pop_front() else {
                break;
            };
            let Some(entry) = table.jobs.get_mut(&job_id) else {
                continue;
            };
            let now = Instant::now();
            let Some(deadline) = now.checked_add(entry.timeout) else {
                let partial = entry.snapshot.partial();
                let message = format!("timeout of {}s is out of range", entry.timeout.as_secs());
                finish_failure(
                    self.store.as_ref(),
                    entry,
                    FailureKind::InvalidRequest,
                    None,
                    message,
                    partial,
                );
                continue;
            };
            let Some(request) = entry.request.take() else {
                continue;
            };
            match spawn_worker(
                job_id,
                request,
                Arc::clone(&self.executor),
                Arc::clone(&self.store),
                self.tx.clone(),
            ) {
                Ok(worker) => {
                    entry.worker = Some(worker);
                    entry.started = Some(now);
                    entry.deadline = Some(deadline);
                    entry.snapshot.started_at = Some(Utc::now());
                    entry.snapshot.message = "Starting".into();
                    tracing::info!(
                        job_id = %job_id,
                        timeout_ms = entry.timeout.as_millis() as u64,
                        "Scan job started"
                    );
                }
                Err(e) => {
                    let partial = entry.snapshot.partial();
                    finish_failure(
                        self.store.as_ref(),
                        entry,
                        FailureKind::WorkerCrash,
                        None,
                        format!("could not spawn worker thread: {e}"),
                        partial,
                    );
                }
            }
        }
    }

    /// Apply one worker message. Messages for terminal jobs are dropped; they
    /// come from abandoned workers.
    pub fn apply(&self, job_id: JobId, message: WorkerMessage) {
        let mut table = self.lock();
        let Some(entry) = table.jobs.get_mut(&job_id) else {
            tracing::debug!(job_id = %job_id, "Message for unknown job dropped");
            return;
        };
        if entry.snapshot.is_terminal() {
            tracing::debug!(job_id = %job_id, "Message for finished job dropped");
            return;
        }

        match message {
            WorkerMessage::Progress(update) => {
                entry.apply_progress(update);
                return;
            }
            WorkerMessage::Done { report_path } => {
                tracing::info!(job_id = %job_id, path = %report_path.display(), "Scan job complete");
                entry.complete(report_path);
            }
            WorkerMessage::Failed {
                kind,
                phase,
                message,
                partial,
            } => {
                // A worker that honoured a timeout stop reports a plain
                // cancellation.
                let (kind, message) = match entry.stop {
                    Some(stop)
                        if stop.reason == FailureKind::JobTimeout
                            && kind == FailureKind::JobCancelled =>
                    {
                        (FailureKind::JobTimeout, timeout_message(entry.timeout))
                    }
                    _ => (kind, message),
                };
                finish_failure(self.store.as_ref(), entry, kind, phase, message, partial);
            }
        }
        self.start_queued(&mut table);
    }

    /// Enforce deadlines and grace periods, detect silent exits, refill slots.
    pub fn sweep(&self, now: Instant) {
        let grace = self.config.grace_period();
        let mut table = self.lock();
        let JobTable { jobs, abandoned, .. } = &mut *table;

        let before = abandoned.len();
        abandoned.retain(|w| !w.is_finished());
        if abandoned.len() < before {
            tracing::debug!(exited = before - abandoned.len(), "Abandoned workers exited");
        }

        for entry in jobs.values_mut().filter(|e| e.is_running()) {
            if entry.stop.is_none() && entry.deadline.is_some_and(|d| now >= d) {
                tracing::warn!(
                    job_id = %entry.job_id(),
                    timeout_ms = entry.timeout.as_millis() as u64,
                    "Scan job exceeded its timeout, requesting termination"
                );
                entry.request_stop(FailureKind::JobTimeout, kill_deadline(now, grace));
            }

            if let Some(stop) = entry.stop {
                if now >= stop.kill_at {
                    tracing::warn!(
                        job_id = %entry.job_id(),
                        "Worker ignored termination within grace period, abandoning it"
                    );
                    let message = match stop.reason {
                        FailureKind::JobTimeout => timeout_message(entry.timeout),
                        _ => format!("worker did not stop within {}ms of cancellation", grace.as_millis()),
                    };
                    let partial = entry.snapshot.partial();
                    let phase = entry.snapshot.phase;
                    if let Some(worker) = entry.worker.take() {
                        abandoned.push(worker);
                    }
                    finish_failure(self.store.as_ref(), entry, stop.reason, phase, message, partial);
                    continue;
                }
            }

            let exited = entry.worker.as_ref().is_some_and(|w| w.is_finished());
            if exited {
                // Anything it sent before exiting was drained before this
                // sweep, so a second sighting means no terminal message exists.
                if entry.exit_noticed {
                    let partial = entry.snapshot.partial();
                    let phase = entry.snapshot.phase;
                    finish_failure(
                        self.store.as_ref(),
                        entry,
                        FailureKind::WorkerCrash,
                        phase,
                        "worker exited without reporting a result".into(),
                        partial,
                    );
                } else {
                    entry.exit_noticed = true;
                }
            }
        }

        self.start_queued(&mut table);
    }
}

fn timeout_message(timeout: Duration) -> String {
    format!("job exceeded its timeout of {}ms", timeout.as_millis())
}

/// Monitor loop. Exits once the controller stops.
pub(super) async fn run(shared: Arc<Shared>, mut rx: mpsc::Receiver<(JobId, WorkerMessage)>) {
    let tick = shared.config.monitor_tick();
    let drain_limit = shared.config.progress_channel_capacity.max(1);
    tracing::info!(tick_ms = tick.as_millis() as u64, "Scan monitor started");

    while !shared.is_stopped() {
        match tokio::time::timeout(tick, rx.recv()).await {
            Ok(Some((job_id, message))) => {
                shared.apply(job_id, message);
                for _ in 0..drain_limit {
                    match rx.try_recv() {
                        Ok((job_id, message)) => shared.apply(job_id, message),
                        Err(_) => break,
                    }
                }
            }
            Ok(None) => break,
            Err(_) => {}
        }
        shared.sweep(Instant::now());
    }
    tracing::info!("Scan monitor stopped");
}
