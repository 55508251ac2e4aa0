use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::aggregate::QualityReport;
use crate::pipeline::progress::{Phase, ProgressUpdate};

pub type JobId = Uuid;

/// Lifecycle of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Extracting,
    Checking,
    Aggregating,
    Complete,
    Failed,
    Cancelled,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }

    /// Running status a worker in `phase` is in.
    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Extracting | Phase::Parsing => Self::Extracting,
            Phase::Checking | Phase::NlpAnalysis | Phase::StructuralAnalysis => Self::Checking,
            Phase::Aggregating | Phase::Finalizing => Self::Aggregating,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Extracting => "extracting",
            Self::Checking => "checking",
            Self::Aggregating => "aggregating",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job ended without a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ExtractionFailure,
    JobTimeout,
    JobCancelled,
    WorkerCrash,
    /// The report was produced but could not be persisted.
    ResultStore,
    /// The request named checkers the registry cannot run.
    InvalidRequest,
}

impl FailureKind {
    /// Terminal status for a failure of this kind.
    pub fn status(&self) -> JobStatus {
        match self {
            Self::JobTimeout => JobStatus::TimedOut,
            Self::JobCancelled => JobStatus::Cancelled,
            Self::ExtractionFailure
            | Self::WorkerCrash
            | Self::ResultStore
            | Self::InvalidRequest => JobStatus::Failed,
        }
    }
}

/// Progress a job had made when it stopped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialProgress {
    pub phase: Option<Phase>,
    pub percent: f32,
    pub completed_checkers: Vec<String>,
    /// Findings produced before the stop and left out of any result.
    pub discarded_findings: usize,
}

/// Durable record of a job that ended without a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub job_id: JobId,
    pub kind: FailureKind,
    pub phase: Option<Phase>,
    pub message: String,
    pub partial: PartialProgress,
    pub failed_at: DateTime<Utc>,
}

/// Final result of a job, as stored in the result store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    Report(QualityReport),
    Failure(ScanFailure),
}

impl ScanOutcome {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Report(r) => r.job_id,
            Self::Failure(f) => f.job_id,
        }
    }
}

/// A document to scan.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub bytes: Vec<u8>,
    /// Extension, file name or MIME type.
    pub format_hint: Option<String>,
    /// Checker ids to run; empty runs every registered checker.
    pub enabled_checkers: Vec<String>,
    /// Overrides the controller's default job timeout.
    pub timeout: Option<Duration>,
    pub source: Option<PathBuf>,
}

impl ScanRequest {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            ..Self::default()
        }
    }

    /// Read `path`; its file name becomes the format hint.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self {
            bytes,
            format_hint: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            source: Some(path.to_path_buf()),
            ..Self::default()
        })
    }

    pub fn with_format_hint(mut self, hint: impl Into<String>) -> Self {
        self.format_hint = Some(hint.into());
        self
    }

    pub fn with_checkers<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_checkers = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Point-in-time view of a job returned by `poll`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub phase: Option<Phase>,
    pub percent: f32,
    pub message: String,
    pub eta_secs: Option<u64>,
    pub failure: Option<ScanFailure>,
    /// Durable result location once the job is terminal.
    pub report_path: Option<PathBuf>,
    pub completed_checkers: Vec<String>,
    /// Phases in the order the worker entered them.
    pub phase_history: Vec<Phase>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    pub(crate) fn queued(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Queued,
            phase: None,
            percent: 0.0,
            message: "Queued".into(),
            eta_secs: None,
            failure: None,
            report_path: None,
            completed_checkers: Vec::new(),
            phase_history: Vec::new(),
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub(crate) fn partial(&self) -> PartialProgress {
        PartialProgress {
            phase: self.phase,
            percent: self.percent,
            completed_checkers: self.completed_checkers.clone(),
            discarded_findings: 0,
        }
    }
}

/// What a worker sends over the shared progress channel. Reports never
/// cross the channel, only their storage location.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    Progress(ProgressUpdate),
    Done {
        report_path: PathBuf,
    },
    Failed {
        kind: FailureKind,
        phase: Option<Phase>,
        message: String,
        partial: PartialProgress,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_map_to_running_statuses() {
        assert_eq!(JobStatus::for_phase(Phase::Parsing), JobStatus::Extracting);
        assert_eq!(JobStatus::for_phase(Phase::NlpAnalysis), JobStatus::Checking);
        assert_eq!(JobStatus::for_phase(Phase::Finalizing), JobStatus::Aggregating);
        assert!(!JobStatus::Checking.is_terminal());
    }

    #[test]
    fn failure_kinds_map_to_terminal_statuses() {
        assert_eq!(FailureKind::JobTimeout.status(), JobStatus::TimedOut);
        assert_eq!(FailureKind::JobCancelled.status(), JobStatus::Cancelled);
        assert_eq!(FailureKind::WorkerCrash.status(), JobStatus::Failed);
        assert!(FailureKind::ExtractionFailure.status().is_terminal());
    }

    #[test]
    fn request_from_path_uses_file_name_as_hint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.txt");
        std::fs::write(&path, "The plan shall be approved.").unwrap();

        let request = ScanRequest::from_path(&path).unwrap();
        assert_eq!(request.format_hint.as_deref(), Some("plan.txt"));
        assert_eq!(request.source.as_deref(), Some(path.as_path()));
        assert_eq!(request.bytes, b"The plan shall be approved.");
    }

    #[test]
    fn failure_outcome_serializes_with_tag() {
        let outcome = ScanOutcome::Failure(ScanFailure {
            job_id: Uuid::nil(),
            kind: FailureKind::JobTimeout,
            phase: Some(Phase::Checking),
            message: "timed out".into(),
            partial: PartialProgress::default(),
            failed_at: Utc::now(),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["kind"], "job_timeout");
        assert_eq!(json["phase"], "checking");
    }
}
