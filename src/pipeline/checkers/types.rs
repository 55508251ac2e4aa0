use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pipeline::progress::Phase;

/// Issue severity, ordered so that `max` is the most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::Major,
        Severity::Minor,
        Severity::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Execution group. Groups run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckerGroup {
    Core,
    Style,
    Nlp,
    Structural,
}

impl CheckerGroup {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Core | Self::Style => Phase::Checking,
            Self::Nlp => Phase::NlpAnalysis,
            Self::Structural => Phase::StructuralAnalysis,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Style => "style",
            Self::Nlp => "nlp",
            Self::Structural => "structural",
        }
    }
}

/// Where a finding points in the normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub paragraph: usize,
    /// Byte offset into `ExtractedDocument::text`.
    pub offset: usize,
    /// Byte length of the flagged span.
    pub length: usize,
}

/// One raw observation from one checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub checker_id: String,
    pub rule_id: String,
    pub category: String,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    pub flagged_text: String,
    pub raw_confidence: f32,
    /// `raw_confidence` after learning adjustments; equal to it until the
    /// pipeline applies them.
    pub adjusted_confidence: f32,
}

impl Finding {
    pub const DEFAULT_CONFIDENCE: f32 = 0.7;

    pub fn new(
        checker_id: &str,
        rule_id: &str,
        category: &str,
        severity: Severity,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Self {
            checker_id: checker_id.to_string(),
            rule_id: rule_id.to_string(),
            category: category.to_string(),
            severity,
            location,
            message: message.into(),
            flagged_text: String::new(),
            raw_confidence: Self::DEFAULT_CONFIDENCE,
            adjusted_confidence: Self::DEFAULT_CONFIDENCE,
        }
    }

    pub fn flagged(mut self, text: impl Into<String>) -> Self {
        self.flagged_text = text.into();
        self
    }

    pub fn confidence(mut self, confidence: f32) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        self.raw_confidence = confidence;
        self.adjusted_confidence = confidence;
        self
    }
}

/// Named string lists a checker hands to the checkers that depend on it.
pub type Artifacts = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default)]
pub struct CheckerOutput {
    pub findings: Vec<Finding>,
    pub artifacts: Artifacts,
}

impl CheckerOutput {
    pub fn findings(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            artifacts: Artifacts::new(),
        }
    }

    pub fn with_artifact(mut self, name: &str, values: Vec<String>) -> Self {
        self.artifacts.insert(name.to_string(), values);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckerStatus {
    Ok,
    Failed,
    Panicked,
}

/// Per-checker execution record carried into the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckerDiagnostic {
    pub checker_id: String,
    pub group: CheckerGroup,
    pub status: CheckerStatus,
    pub message: Option<String>,
    /// Findings kept after suppression.
    pub findings: usize,
    pub suppressed: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<CheckerDiagnostic>,
    pub suppressed: usize,
    pub checkers_run: Vec<String>,
}

impl PipelineOutput {
    pub fn checkers_failed(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.status != CheckerStatus::Ok)
            .count()
    }
}

/// Cancellation observed between checker groups. Findings gathered so far
/// are dropped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("checker pipeline cancelled after {} checkers ({discarded_findings} findings discarded)", .completed_checkers.len())]
pub struct PipelineCancelled {
    pub completed_checkers: Vec<String>,
    pub discarded_findings: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid checker selection: {0}")]
    Selection(#[from] super::registry::RegistryError),

    #[error(transparent)]
    Cancelled(#[from] PipelineCancelled),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_max_is_most_severe() {
        let worst = [Severity::Minor, Severity::Critical, Severity::Info]
            .into_iter()
            .max();
        assert_eq!(worst, Some(Severity::Critical));
    }

    #[test]
    fn groups_map_to_phases() {
        assert_eq!(CheckerGroup::Core.phase(), Phase::Checking);
        assert_eq!(CheckerGroup::Style.phase(), Phase::Checking);
        assert_eq!(CheckerGroup::Nlp.phase(), Phase::NlpAnalysis);
        assert_eq!(CheckerGroup::Structural.phase(), Phase::StructuralAnalysis);
    }

    #[test]
    fn confidence_builder_clamps() {
        let loc = Location { paragraph: 0, offset: 0, length: 1 };
        let f = Finding::new("c", "R-1", "style", Severity::Minor, loc, "m").confidence(1.7);
        assert_eq!(f.raw_confidence, 1.0);
        assert_eq!(f.adjusted_confidence, 1.0);
    }

    #[test]
    fn cancelled_display_counts_checkers() {
        let c = PipelineCancelled {
            completed_checkers: vec!["a".into(), "b".into()],
            discarded_findings: 7,
        };
        assert_eq!(
            c.to_string(),
            "checker pipeline cancelled after 2 checkers (7 findings discarded)"
        );
    }
}
