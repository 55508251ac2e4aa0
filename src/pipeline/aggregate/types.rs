use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::checkers::{CheckerDiagnostic, Location, Severity};
use crate::pipeline::extraction::ExtractionMetadata;

/// Grade reported when the document had no usable text.
pub const NOT_APPLICABLE_GRADE: &str = "N/A";

/// One deduplicated issue: every finding sharing a deduplication key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Deduplication key: rule id plus normalized message prefix.
    pub key: String,
    pub rule_id: String,
    pub category: String,
    pub severity: Severity,
    pub message: String,
    pub checker_ids: BTreeSet<String>,
    pub locations: BTreeSet<Location>,
    pub flagged_text: BTreeSet<String>,
    pub occurrences: usize,
    pub confidence: f32,
}

impl Issue {
    pub fn first_location(&self) -> Option<&Location> {
        self.locations.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMetrics {
    /// Keyed by `Severity::as_str`.
    pub issues_by_severity: BTreeMap<String, usize>,
    pub issues_by_category: BTreeMap<String, usize>,
    /// Distinct observations before deduplication.
    pub total_findings: usize,
    /// Observations folded into an existing issue.
    pub merged_findings: usize,
    /// Findings dropped by learning-adjusted confidence.
    pub suppressed_findings: usize,
    pub word_count: usize,
    pub checkers_run: usize,
    pub checkers_failed: usize,
}

/// Final, scored report for one scan job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub job_id: Uuid,
    /// 0..=100.
    pub score: f32,
    pub grade: String,
    pub issues: Vec<Issue>,
    pub metrics: ReportMetrics,
    pub extraction: ExtractionMetadata,
    pub diagnostics: Vec<CheckerDiagnostic>,
    pub generated_at: DateTime<Utc>,
}

impl QualityReport {
    pub fn is_scored(&self) -> bool {
        self.grade != NOT_APPLICABLE_GRADE
    }
}
