use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use base64::Engine;
use sha2::{Digest, Sha256};

use super::backends::standard_backends;
use super::format::detect_format;
use super::sanitize::usable_chars;
use super::structure::{normalize, NormalizedText};
use super::types::{
    AttemptOutcome, BackendAttempt, DocumentFormat, ExtractedDocument, ExtractionBackend,
    ExtractionWarning, RawExtraction,
};
use super::{BackendError, ExtractionConfig, ExtractionFailure};

/// Ordered, timeout-wrapped backend attempts for one document.
pub struct ExtractionChain {
    backends: Vec<Arc<dyn ExtractionBackend>>,
    config: ExtractionConfig,
}

/// Output that ran but fell short of the quality bar.
struct Candidate {
    backend: &'static str,
    normalized: NormalizedText,
    lossy: bool,
    chars: usize,
}

enum RunResult {
    Extracted(RawExtraction),
    Failed(AttemptOutcome),
}

impl ExtractionChain {
    /// Chain over the built-in backends.
    pub fn standard(config: ExtractionConfig) -> Self {
        Self::new(standard_backends(), config)
    }

    /// Chain over `backends`, tried in the order given.
    pub fn new(backends: Vec<Arc<dyn ExtractionBackend>>, config: ExtractionConfig) -> Self {
        Self { backends, config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Backends tried for `format`, in priority order.
    pub fn route(&self, format: DocumentFormat) -> Vec<&'static str> {
        self.backends
            .iter()
            .filter(|b| b.handles(format))
            .map(|b| b.name())
            .collect()
    }

    pub fn extract(
        &self,
        bytes: &[u8],
        format_hint: Option<&str>,
    ) -> Result<ExtractedDocument, ExtractionFailure> {
        if bytes.len() > self.config.max_document_bytes {
            return Err(ExtractionFailure::TooLarge {
                size: bytes.len(),
                limit: self.config.max_document_bytes,
            });
        }

        let detection = detect_format(bytes, format_hint);
        let format = detection.format;
        let mut warnings = Vec::new();
        if detection.hint_mismatch() {
            if let Some(hinted) = detection.hint {
                tracing::warn!(
                    hinted = hinted.as_str(),
                    detected = format.as_str(),
                    "Format hint contradicts document content"
                );
                warnings.push(ExtractionWarning::FormatHintMismatch {
                    hinted,
                    detected: format,
                });
            }
        }
        let content_hash = content_hash(bytes);

        if bytes.is_empty() {
            warnings.push(ExtractionWarning::EmptyDocument { backends: vec![] });
            return Ok(empty_document(format, Vec::new(), warnings, content_hash));
        }

        tracing::info!(
            format = format.as_str(),
            bytes = bytes.len(),
            "Starting text extraction"
        );

        let shared: Arc<[u8]> = Arc::from(bytes);
        let mut attempts = Vec::new();
        let mut succeeded: Vec<String> = Vec::new();
        let mut best: Option<Candidate> = None;

        for backend in self.backends.iter().filter(|b| b.handles(format)) {
            let name = backend.name();
            if self.config.disabled_backends.contains(name) || !backend.is_available() {
                tracing::debug!(backend = name, "Backend unavailable");
                attempts.push(BackendAttempt {
                    backend: name.to_string(),
                    outcome: AttemptOutcome::Unavailable,
                    elapsed_ms: 0,
                });
                continue;
            }

            let budget = self.config.budget_for(name, format);
            let started = Instant::now();
            let result = run_with_budget(Arc::clone(backend), Arc::clone(&shared), budget);
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let raw = match result {
                RunResult::Extracted(raw) => raw,
                RunResult::Failed(outcome) => {
                    tracing::warn!(
                        backend = name,
                        elapsed_ms,
                        outcome = ?outcome,
                        "Extraction backend failed, falling back"
                    );
                    attempts.push(BackendAttempt {
                        backend: name.to_string(),
                        outcome,
                        elapsed_ms,
                    });
                    continue;
                }
            };

            succeeded.push(name.to_string());
            let normalized = normalize(&raw);
            let chars = usable_chars(&normalized.text);

            if chars >= self.config.min_usable_chars {
                attempts.push(BackendAttempt {
                    backend: name.to_string(),
                    outcome: AttemptOutcome::Selected,
                    elapsed_ms,
                });
                tracing::info!(backend = name, chars, elapsed_ms, "Extraction backend selected");
                return Ok(finish(
                    format,
                    name,
                    normalized,
                    raw.lossy,
                    attempts,
                    warnings,
                    content_hash,
                ));
            }

            tracing::warn!(
                backend = name,
                chars,
                min = self.config.min_usable_chars,
                "Extraction output below quality threshold"
            );
            attempts.push(BackendAttempt {
                backend: name.to_string(),
                outcome: AttemptOutcome::LowQuality { chars },
                elapsed_ms,
            });
            let longer = best.as_ref().map_or(true, |b| chars > b.chars);
            if chars > 0 && longer {
                best = Some(Candidate {
                    backend: name,
                    normalized,
                    lossy: raw.lossy,
                    chars,
                });
            }
        }

        if let Some(best) = best {
            warnings.push(ExtractionWarning::LowTextYield {
                chars: best.chars,
                backend: best.backend.to_string(),
            });
            return Ok(finish(
                format,
                best.backend,
                best.normalized,
                best.lossy,
                attempts,
                warnings,
                content_hash,
            ));
        }

        if !succeeded.is_empty() {
            tracing::warn!(backends = ?succeeded, "Document contains no extractable text");
            warnings.push(ExtractionWarning::EmptyDocument {
                backends: succeeded,
            });
            return Ok(empty_document(format, attempts, warnings, content_hash));
        }

        let failure = ExtractionFailure::NoBackendSucceeded { format, attempts };
        tracing::warn!(error = %failure, "Extraction failed");
        Err(failure)
    }
}

/// Run one backend on its own thread and wait at most `budget`.
/// A backend that overruns is abandoned; its late result goes nowhere.
fn run_with_budget(
    backend: Arc<dyn ExtractionBackend>,
    bytes: Arc<[u8]>,
    budget: Duration,
) -> RunResult {
    let (tx, rx) = mpsc::channel::<std::thread::Result<Result<RawExtraction, BackendError>>>();
    let spawned = std::thread::Builder::new()
        .name(format!("extract-{}", backend.name()))
        .spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| backend.extract(&bytes)));
            let _ = tx.send(result);
        });
    if let Err(e) = spawned {
        return RunResult::Failed(AttemptOutcome::Failed {
            message: format!("could not start backend thread: {e}"),
        });
    }

    match rx.recv_timeout(budget) {
        Ok(Ok(Ok(raw))) => RunResult::Extracted(raw),
        Ok(Ok(Err(e))) => RunResult::Failed(AttemptOutcome::Failed {
            message: e.to_string(),
        }),
        Ok(Err(payload)) => RunResult::Failed(AttemptOutcome::Panicked {
            message: panic_message(payload.as_ref()),
        }),
        Err(mpsc::RecvTimeoutError::Timeout) => RunResult::Failed(AttemptOutcome::TimedOut {
            budget_ms: budget.as_millis() as u64,
        }),
        Err(mpsc::RecvTimeoutError::Disconnected) => RunResult::Failed(AttemptOutcome::Panicked {
            message: "backend thread exited without a result".into(),
        }),
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn content_hash(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    base64::engine::general_purpose::STANDARD.encode(hash)
}

fn finish(
    format: DocumentFormat,
    backend: &str,
    normalized: NormalizedText,
    lossy: bool,
    attempts: Vec<BackendAttempt>,
    mut warnings: Vec<ExtractionWarning>,
    content_hash: String,
) -> ExtractedDocument {
    let word_count = normalized.word_count();
    warnings.extend(normalized.warnings);
    if lossy {
        warnings.push(ExtractionWarning::LossyDecoding {
            backend: backend.to_string(),
        });
    }
    ExtractedDocument {
        text: normalized.text,
        structure: normalized.structure,
        format,
        backend: Some(backend.to_string()),
        attempts,
        warnings,
        content_hash,
        word_count,
    }
}

fn empty_document(
    format: DocumentFormat,
    attempts: Vec<BackendAttempt>,
    warnings: Vec<ExtractionWarning>,
    content_hash: String,
) -> ExtractedDocument {
    ExtractedDocument {
        text: String::new(),
        structure: Default::default(),
        format,
        backend: None,
        attempts,
        warnings,
        content_hash,
        word_count: 0,
    }
}
