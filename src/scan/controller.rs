use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::error::{ControllerError, SubmitError};
use super::monitor::{self, finish_failure, kill_deadline, JobEntry, JobTable, Shared};
use super::result_store::ResultStore;
use super::types::{FailureKind, JobId, JobSnapshot, ScanOutcome, ScanRequest};
use super::worker::ScanExecutor;
use crate::config::ControllerConfig;

/// Runs scan jobs on isolated worker threads and tracks their progress.
///
/// Must be created inside a tokio runtime: the monitor runs as a task on it.
/// Every method other than `wait` and `shutdown` is synchronous and returns
/// without waiting on workers.
pub struct ScanController {
    shared: Arc<Shared>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl ScanController {
    pub fn new(
        config: ControllerConfig,
        executor: Arc<dyn ScanExecutor>,
        store: Arc<dyn ResultStore>,
    ) -> Result<Self, ControllerError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ControllerError::NoRuntime)?;
        let (tx, rx) = mpsc::channel(config.progress_channel_capacity.max(1));
        let shared = Arc::new(Shared {
            config,
            executor,
            store,
            tx,
            table: Mutex::new(JobTable::default()),
            stopped: AtomicBool::new(false),
        });
        let monitor = runtime.spawn(monitor::run(Arc::clone(&shared), rx));
        Ok(Self {
            shared,
            monitor: Mutex::new(Some(monitor)),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }

    /// Queue a scan. Starts immediately when a worker slot is free; rejected
    /// at once when the queue is full.
    pub fn submit(&self, request: ScanRequest) -> Result<JobId, SubmitError> {
        if self.shared.is_stopped() {
            return Err(SubmitError::ShutDown);
        }
        let config = &self.shared.config;
        let timeout = request.timeout.unwrap_or_else(|| config.default_timeout());
        // The deadline and the abandon time after it must both be representable.
        let representable = timeout
            .checked_add(config.grace_period())
            .and_then(|t| Instant::now().checked_add(t))
            .is_some();
        if timeout.is_zero() || !representable {
            return Err(SubmitError::InvalidTimeout);
        }
        self.shared
            .executor
            .validate(&request)
            .map_err(SubmitError::InvalidCheckers)?;

        let mut table = self.shared.lock();
        if table.running() >= config.max_workers && table.queue.len() >= config.max_queue_depth {
            tracing::warn!(depth = table.queue.len(), "Scan rejected, queue full");
            return Err(SubmitError::QueueFull {
                depth: table.queue.len(),
            });
        }

        let job_id = Uuid::new_v4();
        tracing::info!(
            job_id = %job_id,
            bytes = request.bytes.len(),
            format_hint = request.format_hint.as_deref().unwrap_or("none"),
            "Scan job submitted"
        );
        table.jobs.insert(job_id, JobEntry::new(job_id, request, timeout));
        table.queue.push_back(job_id);
        self.shared.start_queued(&mut table);
        Ok(job_id)
    }

    pub fn poll(&self, job_id: JobId) -> Option<JobSnapshot> {
        let mut table = self.shared.lock();
        let entry = table.jobs.get_mut(&job_id)?;
        if entry.is_running() {
            entry.refresh_eta();
        }
        Some(entry.snapshot.clone())
    }

    /// Request cancellation. Queued jobs end at once; running ones are asked
    /// to stop and abandoned after the grace period. A no-op on finished jobs.
    pub fn cancel(&self, job_id: JobId) -> Result<(), ControllerError> {
        let mut table = self.shared.lock();
        let table = &mut *table;
        let entry = table
            .jobs
            .get_mut(&job_id)
            .ok_or(ControllerError::UnknownJob(job_id))?;
        if entry.snapshot.is_terminal() {
            return Ok(());
        }

        if entry.worker.is_none() {
            table.queue.retain(|id| *id != job_id);
            let partial = entry.snapshot.partial();
            finish_failure(
                self.shared.store.as_ref(),
                entry,
                FailureKind::JobCancelled,
                None,
                "cancelled before start".into(),
                partial,
            );
            return Ok(());
        }

        tracing::info!(job_id = %job_id, "Cancellation requested");
        entry.request_stop(
            FailureKind::JobCancelled,
            kill_deadline(Instant::now(), self.shared.config.grace_period()),
        );
        Ok(())
    }

    /// Load the durable outcome of a finished job.
    pub fn result(&self, job_id: JobId) -> Result<ScanOutcome, ControllerError> {
        let snapshot = self.poll(job_id).ok_or(ControllerError::UnknownJob(job_id))?;
        if !snapshot.is_terminal() {
            return Err(ControllerError::NotFinished(job_id));
        }
        Ok(self.shared.store.load(job_id)?)
    }

    /// Poll until the job is terminal or `limit` elapses.
    pub async fn wait(&self, job_id: JobId, limit: Duration) -> Result<JobSnapshot, ControllerError> {
        let tick = self.shared.config.monitor_tick();
        let poll_until_done = async {
            loop {
                match self.poll(job_id) {
                    None => return Err(ControllerError::UnknownJob(job_id)),
                    Some(snapshot) if snapshot.is_terminal() => return Ok(snapshot),
                    Some(_) => tokio::time::sleep(tick).await,
                }
            }
        };
        tokio::time::timeout(limit, poll_until_done)
            .await
            .map_err(|_| ControllerError::WaitTimedOut(job_id))?
    }

    /// Drop terminal jobs that finished longer ago than the retention window.
    /// Their durable results stay in the result store.
    pub fn prune_finished(&self) -> usize {
        let retention = Duration::from_secs(self.shared.config.retention_secs);
        let mut table = self.shared.lock();
        let before = table.jobs.len();
        table.jobs.retain(|_, e| {
            !(e.snapshot.is_terminal() && e.finished.is_some_and(|f| f.elapsed() >= retention))
        });
        let pruned = before - table.jobs.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned finished scan jobs");
        }
        pruned
    }

    /// Stop the monitor and ask running workers to stop. New submissions are
    /// rejected afterwards.
    pub async fn shutdown(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        {
            let table = self.shared.lock();
            for entry in table.jobs.values().filter(|e| e.is_running()) {
                if let Some(worker) = &entry.worker {
                    worker.cancel.cancel();
                }
            }
        }
        let handle = self
            .monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Scan monitor ended abnormally");
            }
        }
        tracing::info!("Scan controller shut down");
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        // The monitor notices on its next tick.
        self.shared.stopped.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReviewConfig;
    use crate::pipeline::aggregate::QualityReport;
    use crate::pipeline::processor::{build_processor, DocumentProcessor, ProcessingError};
    use crate::pipeline::progress::{
        CancellationToken, NoopProgress, Phase, ProgressSink, ProgressUpdate,
    };
    use crate::scan::result_store::FsResultStore;
    use crate::scan::types::JobStatus;

    const WAIT: Duration = Duration::from_secs(10);

    /// Real processor, except for a few scripted format hints.
    struct Scripted {
        inner: DocumentProcessor,
        release: Arc<AtomicBool>,
    }

    fn checking(progress: &mut dyn ProgressSink, checker: &str) {
        progress.report(ProgressUpdate {
            phase: Phase::Checking,
            percent: 40.0,
            message: "checking".into(),
            completed_checker: Some(checker.into()),
        });
    }

    impl ScanExecutor for Scripted {
        fn validate(&self, request: &ScanRequest) -> Result<(), String> {
            self.inner.validate(request)
        }

        fn execute(
            &self,
            job_id: JobId,
            request: &ScanRequest,
            progress: &mut dyn ProgressSink,
            cancel: &CancellationToken,
        ) -> Result<QualityReport, ProcessingError> {
            match request.format_hint.as_deref() {
                // Ignores cancellation entirely.
                Some("hang") => {
                    checking(progress, "repeated_words");
                    while !self.release.load(Ordering::SeqCst) {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    Err(ProcessingError::Cancelled {
                        phase: Phase::Checking,
                        completed_checkers: vec![],
                        discarded_findings: 0,
                    })
                }
                // Stops at the next checkpoint once cancelled.
                Some("cooperative") => {
                    checking(progress, "repeated_words");
                    while !cancel.is_cancelled() && !self.release.load(Ordering::SeqCst) {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    Err(ProcessingError::Cancelled {
                        phase: Phase::Checking,
                        completed_checkers: vec!["repeated_words".into()],
                        discarded_findings: 3,
                    })
                }
                // Ignores cancellation, then produces a real report.
                Some("stubborn") => {
                    checking(progress, "repeated_words");
                    std::thread::sleep(Duration::from_millis(300));
                    self.inner.execute(job_id, request, &mut NoopProgress, &CancellationToken::new())
                }
                Some("panic") => {
                    checking(progress, "repeated_words");
                    panic!("scripted crash");
                }
                _ => self.inner.execute(job_id, request, progress, cancel),
            }
        }
    }

    struct Harness {
        controller: ScanController,
        release: Arc<AtomicBool>,
        _dir: tempfile::TempDir,
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            self.release.store(true, Ordering::SeqCst);
        }
    }

    fn harness(tweak: impl FnOnce(&mut ControllerConfig)) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ControllerConfig {
            grace_period_ms: 100,
            monitor_tick_ms: 10,
            ..ControllerConfig::default()
        };
        tweak(&mut config);
        let release = Arc::new(AtomicBool::new(false));
        let executor = Arc::new(Scripted {
            inner: build_processor(&ReviewConfig::default(), None),
            release: Arc::clone(&release),
        });
        let store = Arc::new(FsResultStore::new(dir.path().join("results")).unwrap());
        Harness {
            controller: ScanController::new(config, executor, store).unwrap(),
            release,
            _dir: dir,
        }
    }

    fn document() -> ScanRequest {
        ScanRequest::new(
            b"The contractor shall deliver the the report. Delivery is TBD.".to_vec(),
        )
        .with_format_hint("txt")
    }

    fn scripted(hint: &str) -> ScanRequest {
        ScanRequest::new(b"scripted".to_vec()).with_format_hint(hint)
    }

    async fn wait_for_status(controller: &ScanController, id: JobId, status: JobStatus) {
        tokio::time::timeout(WAIT, async {
            while controller.poll(id).map(|s| s.status) != Some(status) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn job_completes_with_durable_report() {
        let h = harness(|_| {});
        let id = h.controller.submit(document()).unwrap();
        let snapshot = h.controller.wait(id, WAIT).await.unwrap();

        assert_eq!(snapshot.status, JobStatus::Complete);
        assert_eq!(snapshot.percent, 100.0);
        assert_eq!(snapshot.phase_history.first(), Some(&Phase::Extracting));
        assert_eq!(snapshot.phase_history.last(), Some(&Phase::Finalizing));
        assert!(snapshot.phase_history.windows(2).all(|w| w[0] < w[1]));
        assert!(snapshot.report_path.as_ref().unwrap().exists());

        match h.controller.result(id).unwrap() {
            ScanOutcome::Report(report) => {
                assert_eq!(report.job_id, id);
                assert!(report.issues.iter().any(|i| i.rule_id == "REPEAT-001"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn hung_worker_times_out_while_others_complete() {
        let h = harness(|_| {});
        let started = Instant::now();
        let hung = h
            .controller
            .submit(scripted("hang").with_timeout(Duration::from_millis(150)))
            .unwrap();
        let normal = h.controller.submit(document()).unwrap();

        let done = h.controller.wait(normal, WAIT).await.unwrap();
        assert_eq!(done.status, JobStatus::Complete);

        let snapshot = h.controller.wait(hung, WAIT).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::TimedOut);
        // timeout + grace + scheduling slack
        assert!(started.elapsed() < Duration::from_millis(150 + 100 + 2_000));

        let failure = snapshot.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::JobTimeout);
        assert_eq!(failure.phase, Some(Phase::Checking));
        assert_eq!(failure.partial.completed_checkers, vec!["repeated_words"]);
        assert!(matches!(h.controller.result(hung).unwrap(), ScanOutcome::Failure(_)));
    }

    async fn wait_for_abandoned_exit(controller: &ScanController) {
        tokio::time::timeout(WAIT, async {
            while !controller.shared.lock().abandoned.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn late_report_does_not_replace_timeout_record() {
        let h = harness(|c| c.grace_period_ms = 50);
        let id = h
            .controller
            .submit(scripted("stubborn").with_timeout(Duration::from_millis(50)))
            .unwrap();
        let snapshot = h.controller.wait(id, WAIT).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::TimedOut);
        assert!(matches!(h.controller.result(id).unwrap(), ScanOutcome::Failure(_)));

        // The abandoned worker runs to completion.
        wait_for_abandoned_exit(&h.controller).await;
        assert_eq!(h.controller.poll(id).unwrap().status, JobStatus::TimedOut);
        match h.controller.result(id).unwrap() {
            ScanOutcome::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::JobTimeout);
                assert_eq!(failure.partial.completed_checkers, vec!["repeated_words"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn abandoned_worker_keeps_its_slot_until_it_exits() {
        let h = harness(|c| {
            c.max_workers = 1;
            c.grace_period_ms = 20;
        });
        let hung = h
            .controller
            .submit(scripted("hang").with_timeout(Duration::from_millis(30)))
            .unwrap();
        assert_eq!(h.controller.wait(hung, WAIT).await.unwrap().status, JobStatus::TimedOut);

        let next = h.controller.submit(document()).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(h.controller.poll(next).unwrap().status, JobStatus::Queued);
        assert_eq!(h.controller.shared.lock().running(), 1);

        h.release.store(true, Ordering::SeqCst);
        let snapshot = h.controller.wait(next, WAIT).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Complete);
    }

    #[tokio::test]
    async fn cooperative_timeout_is_still_timed_out() {
        let h = harness(|c| c.grace_period_ms = 5_000);
        let id = h
            .controller
            .submit(scripted("cooperative").with_timeout(Duration::from_millis(50)))
            .unwrap();
        let snapshot = h.controller.wait(id, WAIT).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::TimedOut);
        assert_eq!(snapshot.failure.unwrap().kind, FailureKind::JobTimeout);
    }

    #[tokio::test]
    async fn panicking_worker_is_contained() {
        let h = harness(|_| {});
        let crashed = h.controller.submit(scripted("panic")).unwrap();
        let snapshot = h.controller.wait(crashed, WAIT).await.unwrap();

        assert_eq!(snapshot.status, JobStatus::Failed);
        let failure = snapshot.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::WorkerCrash);
        assert_eq!(failure.phase, Some(Phase::Checking));

        // The controller keeps serving.
        let next = h.controller.submit(document()).unwrap();
        assert_eq!(h.controller.wait(next, WAIT).await.unwrap().status, JobStatus::Complete);
    }

    #[tokio::test]
    async fn cancel_discards_findings_and_keeps_counts() {
        let h = harness(|_| {});
        let id = h.controller.submit(scripted("cooperative")).unwrap();
        wait_for_status(&h.controller, id, JobStatus::Checking).await;

        h.controller.cancel(id).unwrap();
        let snapshot = h.controller.wait(id, WAIT).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Cancelled);
        let failure = snapshot.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::JobCancelled);
        assert_eq!(failure.partial.discarded_findings, 3);
        assert_eq!(failure.partial.completed_checkers, vec!["repeated_words"]);

        // Idempotent on finished jobs.
        h.controller.cancel(id).unwrap();
    }

    #[tokio::test]
    async fn worker_ignoring_cancel_is_abandoned_after_grace() {
        let h = harness(|_| {});
        let id = h.controller.submit(scripted("hang")).unwrap();
        wait_for_status(&h.controller, id, JobStatus::Checking).await;

        h.controller.cancel(id).unwrap();
        let snapshot = h.controller.wait(id, WAIT).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Cancelled);
        assert!(snapshot.message.contains("did not stop"));
    }

    #[tokio::test]
    async fn queue_overflow_rejected_immediately() {
        let h = harness(|c| {
            c.max_workers = 1;
            c.max_queue_depth = 1;
        });
        let running = h.controller.submit(scripted("hang")).unwrap();
        let queued = h.controller.submit(scripted("hang")).unwrap();
        assert_eq!(h.controller.poll(queued).unwrap().status, JobStatus::Queued);

        let err = h.controller.submit(document()).unwrap_err();
        assert!(matches!(err, SubmitError::QueueFull { depth: 1 }));

        // A cancelled queued job ends without ever starting.
        h.controller.cancel(queued).unwrap();
        let snapshot = h.controller.poll(queued).unwrap();
        assert_eq!(snapshot.status, JobStatus::Cancelled);
        assert!(snapshot.started_at.is_none());
        assert_ne!(h.controller.poll(running).unwrap().status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn queued_job_starts_when_slot_frees() {
        let h = harness(|c| c.max_workers = 1);
        let first = h.controller.submit(scripted("cooperative")).unwrap();
        let second = h.controller.submit(document()).unwrap();
        assert_eq!(h.controller.poll(second).unwrap().status, JobStatus::Queued);

        h.controller.cancel(first).unwrap();
        let snapshot = h.controller.wait(second, WAIT).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Complete);
    }

    #[tokio::test]
    async fn silent_worker_exit_is_a_crash() {
        let h = harness(|_| {});
        let id = Uuid::new_v4();
        {
            let mut table = h.controller.shared.lock();
            let mut entry = JobEntry::new(id, ScanRequest::default(), Duration::from_secs(60));
            entry.request = None;
            entry.worker = Some(super::super::worker::WorkerHandle {
                thread: std::thread::spawn(|| {}),
                cancel: CancellationToken::new(),
            });
            entry.started = Some(Instant::now());
            entry.deadline = Some(Instant::now() + Duration::from_secs(60));
            table.jobs.insert(id, entry);
        }
        let snapshot = h.controller.wait(id, WAIT).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.failure.unwrap().kind, FailureKind::WorkerCrash);
    }

    #[tokio::test]
    async fn invalid_requests_rejected_at_submit() {
        let h = harness(|_| {});
        let err = h.controller.submit(document().with_checkers(["nope"])).unwrap_err();
        assert!(matches!(err, SubmitError::InvalidCheckers(_)));
        let err = h.controller.submit(document().with_timeout(Duration::ZERO)).unwrap_err();
        assert!(matches!(err, SubmitError::InvalidTimeout));
        for timeout in [Duration::from_secs(u64::MAX), Duration::MAX] {
            let err = h.controller.submit(document().with_timeout(timeout)).unwrap_err();
            assert!(matches!(err, SubmitError::InvalidTimeout));
        }
        // Nothing was queued or started.
        let table = h.controller.shared.lock();
        assert!(table.jobs.is_empty());
        assert_eq!(table.running(), 0);
    }

    #[tokio::test]
    async fn unknown_and_unfinished_jobs() {
        let h = harness(|_| {});
        let ghost = Uuid::new_v4();
        assert!(h.controller.poll(ghost).is_none());
        assert!(matches!(h.controller.cancel(ghost), Err(ControllerError::UnknownJob(_))));

        let id = h.controller.submit(scripted("hang")).unwrap();
        assert!(matches!(h.controller.result(id), Err(ControllerError::NotFinished(_))));
    }

    #[tokio::test]
    async fn prune_drops_finished_jobs_only() {
        let h = harness(|c| c.retention_secs = 0);
        let done = h.controller.submit(document()).unwrap();
        h.controller.wait(done, WAIT).await.unwrap();
        let running = h.controller.submit(scripted("hang")).unwrap();

        assert_eq!(h.controller.prune_finished(), 1);
        assert!(h.controller.poll(done).is_none());
        assert!(h.controller.poll(running).is_some());
    }

    #[tokio::test]
    async fn shutdown_rejects_new_work() {
        let h = harness(|_| {});
        h.controller.shutdown().await;
        assert!(matches!(h.controller.submit(document()), Err(SubmitError::ShutDown)));
    }

    #[test]
    fn requires_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsResultStore::new(dir.path()).unwrap());
        let executor = Arc::new(build_processor(&ReviewConfig::default(), None));
        let result = ScanController::new(ControllerConfig::default(), executor, store);
        assert!(matches!(result, Err(ControllerError::NoRuntime)));
    }
}
