use std::collections::BTreeMap;

use super::types::{Artifacts, CheckerGroup, CheckerOutput, Location};
use super::{CheckerError, PipelineConfig};
use crate::learning::LearningDomain;
use crate::pipeline::extraction::{DocumentStructure, ExtractedDocument, Paragraph};

/// Learning-derived confidence adjustment for one learning domain.
pub trait ConfidenceFn: Send + Sync {
    /// Delta to add to a raw confidence. Zero when nothing is known.
    fn delta(&self, category: &str, candidate: &str, context: &[String]) -> f32;
}

/// Source of per-domain confidence functions (the learning store).
pub trait ConfidenceProvider: Send + Sync {
    fn confidence_fn(&self, domain: LearningDomain) -> Box<dyn ConfidenceFn + '_>;
}

/// Everything a checker may read while it runs.
pub struct CheckContext<'a> {
    pub document: &'a ExtractedDocument,
    /// Outputs of checkers that ran earlier, keyed by checker id.
    pub artifacts: &'a BTreeMap<String, Artifacts>,
    /// Present when a learning store is attached and the checker declared a
    /// candidate domain.
    pub confidence: Option<&'a dyn ConfidenceFn>,
    pub config: &'a PipelineConfig,
}

impl<'a> CheckContext<'a> {
    pub fn text(&self) -> &'a str {
        &self.document.text
    }

    pub fn structure(&self) -> &'a DocumentStructure {
        &self.document.structure
    }

    /// Non-heading paragraphs.
    pub fn body_paragraphs(&self) -> impl Iterator<Item = &'a Paragraph> {
        self.document
            .structure
            .paragraphs
            .iter()
            .filter(|p| !p.is_heading())
    }

    /// Values a dependency published under `name`; empty when the dependency
    /// did not run.
    pub fn artifact(&self, checker_id: &str, name: &str) -> &'a [String] {
        self.artifacts
            .get(checker_id)
            .and_then(|a| a.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Learning delta for a candidate, zero without a learning store.
    pub fn learned_delta(&self, category: &str, candidate: &str) -> f32 {
        match self.confidence {
            Some(f) => f.delta(category, candidate, &[]),
            None => 0.0,
        }
    }

    /// Location of a span given relative to a paragraph.
    pub fn locate(&self, paragraph: &Paragraph, local_offset: usize, length: usize) -> Location {
        Location {
            paragraph: paragraph.index,
            offset: paragraph.start + local_offset,
            length,
        }
    }
}

/// An independent analyzer run by the checker pipeline.
pub trait Checker: Send + Sync {
    /// Stable identifier, used for enabling, dependencies and diagnostics.
    fn id(&self) -> &'static str;

    fn group(&self) -> CheckerGroup;

    fn description(&self) -> &'static str;

    /// Checkers whose artifacts this one reads.
    fn depends_on(&self) -> &'static [&'static str] {
        &[]
    }

    /// Learning domain consulted while choosing candidates, if any.
    fn candidate_domain(&self) -> Option<LearningDomain> {
        None
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckerOutput, CheckerError>;
}
