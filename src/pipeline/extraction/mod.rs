pub mod types;
pub mod format;
pub mod sanitize;
pub mod column_detect;
pub mod structure;
pub mod backends;
pub mod orchestrator;

pub use types::*;
pub use format::{detect_format, FormatDetection};
pub use orchestrator::ExtractionChain;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised by a single backend. Never terminal on its own.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Text encoding error: {0}")]
    Encoding(String),

    #[error("Unsupported content: {0}")]
    Unsupported(String),
}

impl From<zip::result::ZipError> for BackendError {
    fn from(e: zip::result::ZipError) -> Self {
        BackendError::Malformed(format!("zip container: {e}"))
    }
}

/// Terminal extraction outcome: no backend produced text.
#[derive(Error, Debug, Clone)]
pub enum ExtractionFailure {
    #[error("no backend could extract {format} content ({})", describe_attempts(.attempts))]
    NoBackendSucceeded {
        format: DocumentFormat,
        attempts: Vec<BackendAttempt>,
    },

    #[error("document is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

impl ExtractionFailure {
    pub fn attempts(&self) -> &[BackendAttempt] {
        match self {
            Self::NoBackendSucceeded { attempts, .. } => attempts,
            Self::TooLarge { .. } => &[],
        }
    }
}

fn describe_attempts(attempts: &[BackendAttempt]) -> String {
    if attempts.is_empty() {
        return "no backend registered".to_string();
    }
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Budgets and quality gates for the extraction chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Output with fewer non-whitespace characters falls through to the next backend.
    pub min_usable_chars: usize,
    pub max_document_bytes: usize,
    pub pdf_timeout_secs: u64,
    pub docx_timeout_secs: u64,
    pub rtf_timeout_secs: u64,
    pub text_timeout_secs: u64,
    /// Budget for the last-resort string scanner, whatever the format.
    pub legacy_timeout_secs: u64,
    /// Per-backend budget overrides, in milliseconds.
    pub backend_timeout_overrides_ms: BTreeMap<String, u64>,
    /// Backends treated as unavailable.
    pub disabled_backends: BTreeSet<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_usable_chars: 20,
            max_document_bytes: 100 * 1024 * 1024,
            pdf_timeout_secs: 90,
            docx_timeout_secs: 45,
            rtf_timeout_secs: 20,
            text_timeout_secs: 10,
            legacy_timeout_secs: 15,
            backend_timeout_overrides_ms: BTreeMap::new(),
            disabled_backends: BTreeSet::new(),
        }
    }
}

impl ExtractionConfig {
    /// Timeout for `backend` on a document of `format`.
    pub fn budget_for(&self, backend: &str, format: DocumentFormat) -> Duration {
        if let Some(ms) = self.backend_timeout_overrides_ms.get(backend) {
            return Duration::from_millis(*ms);
        }
        if backend == backends::legacy::LEGACY_BACKEND {
            return Duration::from_secs(self.legacy_timeout_secs);
        }
        let secs = match format {
            DocumentFormat::Pdf => self.pdf_timeout_secs,
            DocumentFormat::Docx => self.docx_timeout_secs,
            DocumentFormat::Rtf => self.rtf_timeout_secs,
            DocumentFormat::PlainText => self.text_timeout_secs,
            DocumentFormat::Unknown => self.legacy_timeout_secs,
        };
        Duration::from_secs(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slower_formats_get_longer_budgets() {
        let config = ExtractionConfig::default();
        let pdf = config.budget_for("pdf-content", DocumentFormat::Pdf);
        let docx = config.budget_for("docx-structural", DocumentFormat::Docx);
        let text = config.budget_for("text-utf8", DocumentFormat::PlainText);
        assert!(pdf > docx);
        assert!(docx > text);
    }

    #[test]
    fn override_wins_over_format_budget() {
        let mut config = ExtractionConfig::default();
        config
            .backend_timeout_overrides_ms
            .insert("pdf-content".into(), 250);
        assert_eq!(
            config.budget_for("pdf-content", DocumentFormat::Pdf),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn failure_message_names_every_backend() {
        let failure = ExtractionFailure::NoBackendSucceeded {
            format: DocumentFormat::Pdf,
            attempts: vec![
                BackendAttempt {
                    backend: "a".into(),
                    outcome: AttemptOutcome::Failed { message: "boom".into() },
                    elapsed_ms: 1,
                },
                BackendAttempt {
                    backend: "b".into(),
                    outcome: AttemptOutcome::TimedOut { budget_ms: 50 },
                    elapsed_ms: 50,
                },
            ],
        };
        let message = failure.to_string();
        assert!(message.contains("a: error (boom)"));
        assert!(message.contains("b: timed out after 50ms"));
    }
}
