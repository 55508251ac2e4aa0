//! Issue aggregation: deduplicate findings, score and grade the document.

pub mod types;
pub mod dedup;
pub mod score;

pub use dedup::{dedup_key, normalize_message};
pub use score::{GradeThreshold, ScoringConfig, SeverityPoints};
pub use types::*;

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::pipeline::checkers::{Finding, PipelineOutput};
use crate::pipeline::extraction::ExtractionMetadata;

/// Deduplicate, score and order `findings` into a report.
///
/// A document without usable text scores 0 with grade `N/A` and no issues,
/// whatever findings are supplied.
pub fn aggregate(
    job_id: Uuid,
    findings: &[Finding],
    extraction: &ExtractionMetadata,
    config: &ScoringConfig,
) -> QualityReport {
    let mut metrics = ReportMetrics {
        word_count: extraction.word_count,
        ..ReportMetrics::default()
    };

    if !extraction.usable_text {
        tracing::info!(job_id = %job_id, "No usable text, report not scored");
        return QualityReport {
            job_id,
            score: 0.0,
            grade: NOT_APPLICABLE_GRADE.to_string(),
            issues: Vec::new(),
            metrics,
            extraction: extraction.clone(),
            diagnostics: Vec::new(),
            generated_at: Utc::now(),
        };
    }

    let deduplicated = dedup::deduplicate(findings, config.dedup_prefix_chars);
    let issues = deduplicated.issues;
    let score = config.score(&issues);
    let grade = config.grade(score).to_string();

    let mut by_severity: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
    for issue in &issues {
        *by_severity.entry(issue.severity.as_str().to_string()).or_default() += 1;
        *by_category.entry(issue.category.clone()).or_default() += 1;
    }
    metrics.issues_by_severity = by_severity;
    metrics.issues_by_category = by_category;
    metrics.total_findings = deduplicated.distinct_findings;
    metrics.merged_findings = deduplicated.distinct_findings - issues.len();

    tracing::info!(
        job_id = %job_id,
        issues = issues.len(),
        findings = metrics.total_findings,
        score,
        grade = %grade,
        "Report aggregated"
    );

    QualityReport {
        job_id,
        score,
        grade,
        issues,
        metrics,
        extraction: extraction.clone(),
        diagnostics: Vec::new(),
        generated_at: Utc::now(),
    }
}

/// `aggregate` over a pipeline run, carrying its diagnostics into the report.
pub fn aggregate_output(
    job_id: Uuid,
    output: &PipelineOutput,
    extraction: &ExtractionMetadata,
    config: &ScoringConfig,
) -> QualityReport {
    let mut report = aggregate(job_id, &output.findings, extraction, config);
    report.metrics.suppressed_findings = output.suppressed;
    report.metrics.checkers_run = output.checkers_run.len();
    report.metrics.checkers_failed = output.checkers_failed();
    report.diagnostics = output.diagnostics.clone();
    report
}
