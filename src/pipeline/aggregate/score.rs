use serde::{Deserialize, Serialize};

use super::types::Issue;
use crate::pipeline::checkers::Severity;

/// Per-severity point values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityPoints {
    pub critical: f32,
    pub major: f32,
    pub minor: f32,
    pub info: f32,
}

impl SeverityPoints {
    pub fn get(&self, severity: Severity) -> f32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::Major => self.major,
            Severity::Minor => self.minor,
            Severity::Info => self.info,
        }
    }

    fn all_non_negative(&self) -> bool {
        Severity::ALL.iter().all(|s| {
            let v = self.get(*s);
            v.is_finite() && v >= 0.0
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeThreshold {
    pub grade: String,
    pub min_score: f32,
}

/// Score curve, grade bands and deduplication tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub baseline: f32,
    /// Characters of normalized message that form the deduplication key.
    pub dedup_prefix_chars: usize,
    /// Deduction for each issue.
    pub weights: SeverityPoints,
    /// Extra deduction per additional location of an issue.
    pub repeat_weights: SeverityPoints,
    /// Additional locations beyond this add nothing.
    pub repeat_cap: usize,
    /// Highest band first.
    pub grades: Vec<GradeThreshold>,
    /// Grade for scores under every band.
    pub lowest_grade: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            baseline: 100.0,
            dedup_prefix_chars: 48,
            weights: SeverityPoints {
                critical: 15.0,
                major: 5.0,
                minor: 1.5,
                info: 0.0,
            },
            repeat_weights: SeverityPoints {
                critical: 3.0,
                major: 1.0,
                minor: 0.25,
                info: 0.0,
            },
            repeat_cap: 10,
            grades: [("A", 90.0), ("B", 80.0), ("C", 70.0), ("D", 60.0)]
                .into_iter()
                .map(|(grade, min_score)| GradeThreshold {
                    grade: grade.to_string(),
                    min_score,
                })
                .collect(),
            lowest_grade: "F".to_string(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.baseline.is_finite() && self.baseline > 0.0 && self.baseline <= 100.0) {
            return Err("scoring.baseline must be within (0, 100]".into());
        }
        if self.dedup_prefix_chars == 0 {
            return Err("scoring.dedup_prefix_chars must be at least 1".into());
        }
        if !self.weights.all_non_negative() || !self.repeat_weights.all_non_negative() {
            return Err("scoring weights must be non-negative".into());
        }
        if self.lowest_grade.trim().is_empty() || self.grades.iter().any(|g| g.grade.trim().is_empty()) {
            return Err("grade names must not be empty".into());
        }
        if self.grades.windows(2).any(|w| w[0].min_score <= w[1].min_score) {
            return Err("grade thresholds must be strictly descending".into());
        }
        Ok(())
    }

    /// Deduction for one issue. Never negative.
    pub fn deduction(&self, issue: &Issue) -> f32 {
        let repeats = issue.locations.len().saturating_sub(1).min(self.repeat_cap);
        self.weights.get(issue.severity) + self.repeat_weights.get(issue.severity) * repeats as f32
    }

    /// Baseline minus every deduction, floored at zero.
    pub fn score(&self, issues: &[Issue]) -> f32 {
        let total: f32 = issues.iter().map(|i| self.deduction(i)).sum();
        (self.baseline - total).max(0.0)
    }

    pub fn grade(&self, score: f32) -> &str {
        self.grades
            .iter()
            .find(|g| score >= g.min_score)
            .map_or(self.lowest_grade.as_str(), |g| g.grade.as_str())
    }
}
