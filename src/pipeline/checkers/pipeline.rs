use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use super::context::{CheckContext, Checker, ConfidenceFn, ConfidenceProvider};
use super::lexicon::words;
use super::registry::{CheckerRegistry, RegistryError};
use super::types::{
    Artifacts, CheckerDiagnostic, CheckerGroup, CheckerStatus, Finding, PipelineCancelled,
    PipelineError, PipelineOutput,
};
use super::PipelineConfig;
use crate::learning::LearningDomain;
use crate::pipeline::extraction::orchestrator::panic_message;
use crate::pipeline::extraction::ExtractedDocument;
use crate::pipeline::progress::{CancellationToken, ProgressSink, ProgressUpdate};

/// Words on each side of a finding captured as learning context.
const CONTEXT_WINDOW_WORDS: usize = 3;

/// Runs enabled checkers one after another over an extracted document.
pub struct CheckerPipeline {
    registry: Arc<CheckerRegistry>,
    config: PipelineConfig,
    learning: Option<Arc<dyn ConfidenceProvider>>,
}

impl CheckerPipeline {
    pub fn new(registry: Arc<CheckerRegistry>, config: PipelineConfig) -> Self {
        Self {
            registry,
            config,
            learning: None,
        }
    }

    /// Attach a learning store for confidence adjustments.
    pub fn with_learning(mut self, learning: Arc<dyn ConfidenceProvider>) -> Self {
        self.learning = Some(learning);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Resolve the execution order for `enabled` (empty means all).
    pub fn plan(&self, enabled: &[String]) -> Result<Vec<Arc<dyn Checker>>, RegistryError> {
        self.registry.execution_order(enabled)
    }

    pub fn run(
        &self,
        document: &ExtractedDocument,
        enabled: &[String],
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput, PipelineError> {
        let plan = self.plan(enabled)?;
        Ok(self.run_plan(document, &plan, progress, cancel)?)
    }

    fn run_plan(
        &self,
        document: &ExtractedDocument,
        plan: &[Arc<dyn Checker>],
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput, PipelineCancelled> {
        let findings_fn = self
            .learning
            .as_ref()
            .map(|l| l.confidence_fn(LearningDomain::DocumentFindings));
        let weights = &self.config.phase_weights;

        let mut output = PipelineOutput::default();
        let mut artifacts: BTreeMap<String, Artifacts> = BTreeMap::new();
        let mut current_group: Option<CheckerGroup> = None;

        for (position, checker) in plan.iter().enumerate() {
            let group = checker.group();
            if current_group != Some(group) {
                if cancel.is_cancelled() {
                    tracing::info!(
                        completed = output.checkers_run.len(),
                        group = group.as_str(),
                        "Checker pipeline cancelled at group boundary"
                    );
                    return Err(PipelineCancelled {
                        completed_checkers: output.checkers_run,
                        discarded_findings: output.findings.len(),
                    });
                }
                current_group = Some(group);
            }

            let phase = group.phase();
            let in_phase: Vec<_> = plan.iter().filter(|c| c.group().phase() == phase).collect();
            let done_in_phase = plan[..position]
                .iter()
                .filter(|c| c.group().phase() == phase)
                .count();

            let candidate_fn = match (&self.learning, checker.candidate_domain()) {
                (Some(l), Some(domain)) => Some(l.confidence_fn(domain)),
                _ => None,
            };
            let ctx = CheckContext {
                document,
                artifacts: &artifacts,
                confidence: candidate_fn.as_deref(),
                config: &self.config,
            };

            let started = Instant::now();
            let result = catch_unwind(AssertUnwindSafe(|| checker.check(&ctx)));
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let mut diagnostic = CheckerDiagnostic {
                checker_id: checker.id().to_string(),
                group,
                status: CheckerStatus::Ok,
                message: None,
                findings: 0,
                suppressed: 0,
                elapsed_ms,
            };

            match result {
                Ok(Ok(checker_output)) => {
                    let mut findings = checker_output.findings;
                    if findings.len() > self.config.max_findings_per_checker {
                        tracing::warn!(
                            checker = checker.id(),
                            produced = findings.len(),
                            limit = self.config.max_findings_per_checker,
                            "Checker output truncated"
                        );
                        findings.truncate(self.config.max_findings_per_checker);
                    }
                    let (kept, suppressed) =
                        self.adjust(document, findings, findings_fn.as_deref());
                    diagnostic.findings = kept.len();
                    diagnostic.suppressed = suppressed;
                    output.suppressed += suppressed;
                    output.findings.extend(kept);
                    artifacts.insert(checker.id().to_string(), checker_output.artifacts);
                    tracing::debug!(
                        checker = checker.id(),
                        findings = diagnostic.findings,
                        suppressed,
                        elapsed_ms,
                        "Checker finished"
                    );
                }
                Ok(Err(e)) => {
                    tracing::warn!(checker = checker.id(), error = %e, "Checker failed, findings dropped");
                    diagnostic.status = CheckerStatus::Failed;
                    diagnostic.message = Some(e.to_string());
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!(checker = checker.id(), panic = %message, "Checker panicked, findings dropped");
                    diagnostic.status = CheckerStatus::Panicked;
                    diagnostic.message = Some(message);
                }
            }

            output.checkers_run.push(checker.id().to_string());
            output.diagnostics.push(diagnostic);

            let fraction = (done_in_phase + 1) as f32 / in_phase.len().max(1) as f32;
            progress.report(ProgressUpdate {
                phase,
                percent: weights.percent(phase, fraction),
                message: format!("Ran {}", checker.id()),
                completed_checker: Some(checker.id().to_string()),
            });
        }

        Ok(output)
    }

    /// Apply learning deltas and drop findings under the suppression floor.
    fn adjust(
        &self,
        document: &ExtractedDocument,
        findings: Vec<Finding>,
        confidence: Option<&dyn ConfidenceFn>,
    ) -> (Vec<Finding>, usize) {
        let mut kept = Vec::with_capacity(findings.len());
        let mut suppressed = 0;
        for mut finding in findings {
            let delta = match confidence {
                Some(f) => {
                    let context = finding_context(document, &finding);
                    let candidate = if finding.flagged_text.is_empty() {
                        finding.message.as_str()
                    } else {
                        finding.flagged_text.as_str()
                    };
                    f.delta(&finding.rule_id, candidate, &context)
                }
                None => 0.0,
            };
            finding.adjusted_confidence = (finding.raw_confidence + delta).clamp(0.0, 1.0);
            if finding.adjusted_confidence < self.config.suppress_below {
                suppressed += 1;
            } else {
                kept.push(finding);
            }
        }
        (kept, suppressed)
    }
}

/// Context tokens for a finding: document format, checker id and the words
/// around the flagged span.
pub fn finding_context(document: &ExtractedDocument, finding: &Finding) -> Vec<String> {
    let mut tokens = vec![
        format!("format:{}", document.format.as_str()),
        format!("checker:{}", finding.checker_id),
    ];
    let Some(paragraph) = document.structure.paragraphs.get(finding.location.paragraph) else {
        return tokens;
    };
    let local_start = finding.location.offset.saturating_sub(paragraph.start);
    let local_end = local_start + finding.location.length;
    let paragraph_words: Vec<(usize, &str)> = words(&paragraph.text).collect();
    let before = paragraph_words
        .iter()
        .filter(|(start, _)| *start < local_start)
        .rev()
        .take(CONTEXT_WINDOW_WORDS);
    let after = paragraph_words
        .iter()
        .filter(|(start, _)| *start >= local_end)
        .take(CONTEXT_WINDOW_WORDS);
    tokens.extend(before.chain(after).map(|(_, w)| w.to_lowercase()));
    tokens
}
