//! Document processing orchestrator.
//!
//! Single entry point that drives one scan job through the pipeline:
//! extract → parse → check → aggregate → finalize.
//!
//! Engines are injected (extraction chain, checker pipeline, optional
//! learning provider) so the orchestrator stays testable with mock backends
//! and checkers. Cancellation is cooperative and observed at phase
//! boundaries and between checker groups.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::ReviewConfig;
use crate::pipeline::aggregate::{aggregate_output, QualityReport, ScoringConfig};
use crate::pipeline::checkers::{
    CheckerPipeline, CheckerRegistry, ConfidenceProvider, PipelineError, PipelineOutput,
    RegistryError,
};
use crate::pipeline::extraction::{ExtractionChain, ExtractionFailure};
use crate::pipeline::progress::{CancellationToken, Phase, ProgressSink, ProgressUpdate};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Terminal outcomes of a job other than a report.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionFailure),

    #[error("Invalid checker selection: {0}")]
    InvalidCheckers(#[from] RegistryError),

    #[error("Cancelled during {phase} after {} checkers ({discarded_findings} findings discarded)", .completed_checkers.len())]
    Cancelled {
        phase: Phase,
        completed_checkers: Vec<String>,
        discarded_findings: usize,
    },
}

impl ProcessingError {
    /// Phase the job had reached when it stopped.
    pub fn phase(&self) -> Phase {
        match self {
            Self::Extraction(_) => Phase::Extracting,
            Self::InvalidCheckers(_) => Phase::Checking,
            Self::Cancelled { phase, .. } => *phase,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives extraction, checking and aggregation for one document at a time.
///
/// Pure pipeline logic: no threads, no channels. Isolation and timeouts
/// belong to the scan controller.
pub struct DocumentProcessor {
    chain: ExtractionChain,
    pipeline: CheckerPipeline,
    scoring: ScoringConfig,
}

impl DocumentProcessor {
    pub fn new(chain: ExtractionChain, pipeline: CheckerPipeline, scoring: ScoringConfig) -> Self {
        Self {
            chain,
            pipeline,
            scoring,
        }
    }

    /// Reject checker selections the registry cannot order.
    pub fn validate_checkers(&self, enabled: &[String]) -> Result<(), RegistryError> {
        self.pipeline.plan(enabled).map(|_| ())
    }

    /// Process `bytes` into a scored report.
    pub fn process(
        &self,
        job_id: Uuid,
        bytes: &[u8],
        format_hint: Option<&str>,
        enabled: &[String],
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<QualityReport, ProcessingError> {
        let mut progress = PhaseTracker::new(progress);
        let weights = self.pipeline.config().phase_weights.clone();

        checkpoint(cancel, Phase::Extracting, &[], 0)?;
        progress.report(ProgressUpdate {
            phase: Phase::Extracting,
            percent: weights.start_percent(Phase::Extracting),
            message: "Extracting text".into(),
            completed_checker: None,
        });
        tracing::info!(job_id = %job_id, bytes = bytes.len(), "Processing: starting extraction");
        let document = self.chain.extract(bytes, format_hint)?;
        let extraction = document.metadata();
        tracing::info!(
            job_id = %job_id,
            format = %document.format,
            backend = document.backend.as_deref().unwrap_or("none"),
            words = document.word_count,
            warnings = document.warnings.len(),
            "Processing: extraction complete"
        );

        progress.report(ProgressUpdate {
            phase: Phase::Parsing,
            percent: weights.percent(Phase::Parsing, 1.0),
            message: format!(
                "Parsed {} paragraphs, {} headings",
                document.structure.paragraphs.len(),
                document.structure.headings.len()
            ),
            completed_checker: None,
        });
        checkpoint(cancel, Phase::Parsing, &[], 0)?;

        let output = if document.has_usable_text() {
            self.pipeline
                .run(&document, enabled, &mut progress, cancel)
                .map_err(|e| match e {
                    PipelineError::Selection(e) => ProcessingError::InvalidCheckers(e),
                    PipelineError::Cancelled(c) => ProcessingError::Cancelled {
                        phase: progress.last_phase(),
                        completed_checkers: c.completed_checkers,
                        discarded_findings: c.discarded_findings,
                    },
                })?
        } else {
            tracing::info!(job_id = %job_id, "No usable text, skipping checkers");
            PipelineOutput::default()
        };

        checkpoint(
            cancel,
            Phase::Aggregating,
            &output.checkers_run,
            output.findings.len(),
        )?;
        progress.report(ProgressUpdate {
            phase: Phase::Aggregating,
            percent: weights.start_percent(Phase::Aggregating),
            message: format!("Aggregating {} findings", output.findings.len()),
            completed_checker: None,
        });
        let report = aggregate_output(job_id, &output, &extraction, &self.scoring);

        progress.report(ProgressUpdate {
            phase: Phase::Finalizing,
            percent: weights.percent(Phase::Finalizing, 1.0),
            message: format!("Score {:.1} ({})", report.score, report.grade),
            completed_checker: None,
        });
        tracing::info!(
            job_id = %job_id,
            score = report.score,
            grade = %report.grade,
            issues = report.issues.len(),
            "Processing complete"
        );
        Ok(report)
    }
}

fn checkpoint(
    cancel: &CancellationToken,
    phase: Phase,
    completed: &[String],
    discarded: usize,
) -> Result<(), ProcessingError> {
    if cancel.is_cancelled() {
        tracing::info!(phase = %phase, "Processing cancelled at checkpoint");
        return Err(ProcessingError::Cancelled {
            phase,
            completed_checkers: completed.to_vec(),
            discarded_findings: discarded,
        });
    }
    Ok(())
}

/// Forwards updates and remembers the latest phase.
struct PhaseTracker<'a> {
    inner: &'a mut dyn ProgressSink,
    last: Phase,
}

impl<'a> PhaseTracker<'a> {
    fn new(inner: &'a mut dyn ProgressSink) -> Self {
        Self {
            inner,
            last: Phase::Extracting,
        }
    }

    fn last_phase(&self) -> Phase {
        self.last
    }
}

impl ProgressSink for PhaseTracker<'_> {
    fn report(&mut self, update: ProgressUpdate) {
        self.last = update.phase;
        self.inner.report(update);
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build a `DocumentProcessor` with the standard backends and built-in
/// checkers. `learning` adjusts confidence when present.
pub fn build_processor(
    config: &ReviewConfig,
    learning: Option<Arc<dyn ConfidenceProvider>>,
) -> DocumentProcessor {
    let chain = ExtractionChain::standard(config.extraction.clone());
    let mut pipeline = CheckerPipeline::new(
        Arc::new(CheckerRegistry::builtin()),
        config.pipeline.clone(),
    );
    if let Some(learning) = learning {
        pipeline = pipeline.with_learning(learning);
    }
    DocumentProcessor::new(chain, pipeline, config.scoring.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::{Decision, LearningDomain, LearningStore};
    use crate::pipeline::aggregate::NOT_APPLICABLE_GRADE;
    use crate::pipeline::progress::NoopProgress;

    const SAMPLE: &str = "# Scope\n\n\
        The contractor shall deliver the the report. The report was written by the team.\n\n\
        # Schedule\n\n\
        Delivery is TBD and the vendor will provide adequate support.";

    fn processor() -> DocumentProcessor {
        build_processor(&ReviewConfig::default(), None)
    }

    #[test]
    fn text_document_full_pipeline() {
        let mut updates: Vec<ProgressUpdate> = Vec::new();
        let report = processor()
            .process(
                Uuid::new_v4(),
                SAMPLE.as_bytes(),
                Some("md"),
                &[],
                &mut updates,
                &CancellationToken::new(),
            )
            .unwrap();

        assert!(report.is_scored());
        assert!(report.score < 100.0);
        let rules: Vec<&str> = report.issues.iter().map(|i| i.rule_id.as_str()).collect();
        assert!(rules.contains(&"REPEAT-001"), "{rules:?}");
        assert!(rules.contains(&"WEAK-002"), "{rules:?}");
        assert_eq!(report.metrics.checkers_run, 8);

        assert_eq!(updates.first().map(|u| u.phase), Some(Phase::Extracting));
        assert_eq!(updates.last().map(|u| u.percent), Some(100.0));
        assert!(updates.windows(2).all(|w| w[0].percent <= w[1].percent));
        assert!(updates.windows(2).all(|w| w[0].phase <= w[1].phase));
    }

    #[test]
    fn selected_checkers_only() {
        let report = processor()
            .process(
                Uuid::new_v4(),
                SAMPLE.as_bytes(),
                Some("txt"),
                &["repeated_words".to_string()],
                &mut NoopProgress,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(report.metrics.checkers_run, 1);
        assert!(report.issues.iter().all(|i| i.rule_id == "REPEAT-001"));
    }

    #[test]
    fn whitespace_document_is_not_scored() {
        let report = processor()
            .process(
                Uuid::new_v4(),
                b"   \n\n  ",
                Some("txt"),
                &[],
                &mut NoopProgress,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(report.score, 0.0);
        assert_eq!(report.grade, NOT_APPLICABLE_GRADE);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn cancelled_before_extraction() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = processor()
            .process(Uuid::new_v4(), SAMPLE.as_bytes(), None, &[], &mut NoopProgress, &cancel)
            .unwrap_err();
        match err {
            ProcessingError::Cancelled {
                phase,
                completed_checkers,
                discarded_findings,
            } => {
                assert_eq!(phase, Phase::Extracting);
                assert!(completed_checkers.is_empty());
                assert_eq!(discarded_findings, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    /// Cancels once the first checker has finished.
    struct CancelAfterFirstChecker(CancellationToken);

    impl ProgressSink for CancelAfterFirstChecker {
        fn report(&mut self, update: ProgressUpdate) {
            if update.completed_checker.is_some() {
                self.0.cancel();
            }
        }
    }

    #[test]
    fn cancelled_between_groups_reports_partial_progress() {
        let cancel = CancellationToken::new();
        let mut sink = CancelAfterFirstChecker(cancel.clone());
        let err = processor()
            .process(Uuid::new_v4(), SAMPLE.as_bytes(), Some("txt"), &[], &mut sink, &cancel)
            .unwrap_err();
        match err {
            ProcessingError::Cancelled {
                phase,
                completed_checkers,
                ..
            } => {
                // Core group finishes before the style group boundary is checked.
                assert_eq!(phase, Phase::Checking);
                assert_eq!(completed_checkers, vec!["repeated_words", "requirements_language"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn oversized_document_is_extraction_failure() {
        let mut config = ReviewConfig::default();
        config.extraction.max_document_bytes = 10;
        let err = build_processor(&config, None)
            .process(
                Uuid::new_v4(),
                SAMPLE.as_bytes(),
                None,
                &[],
                &mut NoopProgress,
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Extraction(ExtractionFailure::TooLarge { .. })));
        assert_eq!(err.phase(), Phase::Extracting);
    }

    #[test]
    fn learned_rejection_suppresses_finding() {
        let store = Arc::new(LearningStore::in_memory(Default::default()).unwrap());
        for _ in 0..3 {
            store
                .record(LearningDomain::DocumentFindings, "REPEAT-001", "the the", Decision::Reject, &[])
                .unwrap();
        }
        let processor = build_processor(&ReviewConfig::default(), Some(store));
        let report = processor
            .process(
                Uuid::new_v4(),
                SAMPLE.as_bytes(),
                Some("txt"),
                &["repeated_words".to_string()],
                &mut NoopProgress,
                &CancellationToken::new(),
            )
            .unwrap();
        // 0.9 - 0.4 stays above the suppression floor but confidence drops.
        let issue = report.issues.iter().find(|i| i.rule_id == "REPEAT-001").unwrap();
        assert!((issue.confidence - 0.5).abs() < 1e-4, "{}", issue.confidence);
    }

    #[test]
    fn unknown_checker_fails_validation() {
        assert!(processor().validate_checkers(&["nope".into()]).is_err());
        assert!(processor().validate_checkers(&[]).is_ok());
    }

    #[test]
    fn unknown_checker_passed_to_process_is_an_error() {
        let err = processor()
            .process(
                Uuid::new_v4(),
                SAMPLE.as_bytes(),
                Some("txt"),
                &["passive_voice".to_string(), "typo".to_string()],
                &mut NoopProgress,
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::InvalidCheckers(RegistryError::UnknownChecker(ref id)) if id == "typo"
        ));
    }
}
