use serde::{Deserialize, Serialize};

use super::BackendError;

/// Document containers the chain knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Docx,
    Pdf,
    Rtf,
    PlainText,
    Unknown,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 5] = [
        Self::Docx,
        Self::Pdf,
        Self::Rtf,
        Self::PlainText,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pdf => "pdf",
            Self::Rtf => "rtf",
            Self::PlainText => "plain_text",
            Self::Unknown => "unknown",
        }
    }

    /// Interpret a caller-supplied hint: a file extension, a file name or a MIME type.
    pub fn from_hint(hint: &str) -> Option<Self> {
        let hint = hint.trim().to_ascii_lowercase();
        let ext = hint.rsplit('.').next().unwrap_or(&hint);
        match ext {
            "docx" | "docm" | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "pdf" | "application/pdf" => Some(Self::Pdf),
            "rtf" | "application/rtf" | "text/rtf" => Some(Self::Rtf),
            "txt" | "text" | "md" | "markdown" | "text/plain" | "text/markdown" | "plain_text" => {
                Some(Self::PlainText)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Backend output
// ═══════════════════════════════════════════

/// What a block of extracted text is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Paragraph,
    Heading { level: u8 },
}

/// A paragraph-level unit from a structural parser.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBlock {
    pub text: String,
    pub kind: BlockKind,
    /// 1-based page number.
    pub page: usize,
}

impl RawBlock {
    pub fn paragraph(text: impl Into<String>, page: usize) -> Self {
        Self {
            text: text.into(),
            kind: BlockKind::Paragraph,
            page,
        }
    }

    pub fn heading(text: impl Into<String>, level: u8, page: usize) -> Self {
        Self {
            text: text.into(),
            kind: BlockKind::Heading { level },
            page,
        }
    }
}

/// Backend output before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawContent {
    /// Blocks with known boundaries and kinds.
    Blocks(Vec<RawBlock>),
    /// Positional, line-oriented text per page. Paragraphs and reading order
    /// are inferred, so multi-column detection applies.
    Pages(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawExtraction {
    pub content: RawContent,
    /// True when undecodable bytes were replaced.
    pub lossy: bool,
}

impl RawExtraction {
    pub fn blocks(blocks: Vec<RawBlock>) -> Self {
        Self {
            content: RawContent::Blocks(blocks),
            lossy: false,
        }
    }

    pub fn pages(pages: Vec<String>) -> Self {
        Self {
            content: RawContent::Pages(pages),
            lossy: false,
        }
    }

    pub fn with_lossy(mut self, lossy: bool) -> Self {
        self.lossy = lossy;
        self
    }
}

/// Pluggable converter from document bytes to text.
///
/// Backends run on their own thread under their own timeout, so they may block
/// or fail freely; the chain contains whatever they do.
pub trait ExtractionBackend: Send + Sync {
    /// Stable identifier used in attempts, config overrides and logs.
    fn name(&self) -> &'static str;

    /// Whether this backend should be tried for the format.
    fn handles(&self, format: DocumentFormat) -> bool;

    /// Whether the backend can run in this installation at all.
    fn is_available(&self) -> bool {
        true
    }

    fn extract(&self, bytes: &[u8]) -> Result<RawExtraction, BackendError>;
}

// ═══════════════════════════════════════════
// Normalized document
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub index: usize,
    pub text: String,
    /// Byte offset of the paragraph within `ExtractedDocument::text`.
    pub start: usize,
    pub page: usize,
    pub heading_level: Option<u8>,
}

impl Paragraph {
    pub fn is_heading(&self) -> bool {
        self.heading_level.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub paragraph: usize,
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSpan {
    pub number: usize,
    pub first_paragraph: usize,
    pub paragraph_count: usize,
}

/// Paragraph / heading / page map over the normalized text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub paragraphs: Vec<Paragraph>,
    pub headings: Vec<Heading>,
    pub pages: Vec<PageSpan>,
}

/// Quality warnings; none of these are failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionWarning {
    /// Gutter detected; text was reordered left column first.
    MultiColumnLayout { page: usize },
    /// No backend met the minimum usable length; best output kept.
    LowTextYield { chars: usize, backend: String },
    /// Backends ran successfully and found no text at all.
    EmptyDocument { backends: Vec<String> },
    /// The caller's format hint disagreed with the content.
    FormatHintMismatch { hinted: DocumentFormat, detected: DocumentFormat },
    /// Undecodable bytes were replaced during decoding.
    LossyDecoding { backend: String },
}

/// How a single backend attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Selected,
    Unavailable,
    Failed { message: String },
    Panicked { message: String },
    TimedOut { budget_ms: u64 },
    /// Ran, but the output failed the minimum-quality heuristic.
    LowQuality { chars: usize },
}

impl AttemptOutcome {
    /// The backend ran to completion (whatever the quality of its output).
    pub fn ran(&self) -> bool {
        matches!(self, Self::Selected | Self::LowQuality { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendAttempt {
    pub backend: String,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

impl std::fmt::Display for BackendAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            AttemptOutcome::Selected => write!(f, "{}: selected", self.backend),
            AttemptOutcome::Unavailable => write!(f, "{}: unavailable", self.backend),
            AttemptOutcome::Failed { message } => write!(f, "{}: error ({message})", self.backend),
            AttemptOutcome::Panicked { message } => write!(f, "{}: panicked ({message})", self.backend),
            AttemptOutcome::TimedOut { budget_ms } => {
                write!(f, "{}: timed out after {budget_ms}ms", self.backend)
            }
            AttemptOutcome::LowQuality { chars } => {
                write!(f, "{}: low quality ({chars} chars)", self.backend)
            }
        }
    }
}

/// Normalized text plus structure produced by the extraction chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// Paragraph texts joined by blank lines.
    pub text: String,
    pub structure: DocumentStructure,
    pub format: DocumentFormat,
    /// Backend whose output was kept; None for an empty document.
    pub backend: Option<String>,
    pub attempts: Vec<BackendAttempt>,
    pub warnings: Vec<ExtractionWarning>,
    /// SHA-256 of the input bytes (base64).
    pub content_hash: String,
    pub word_count: usize,
}

impl ExtractedDocument {
    /// False for documents that must short-circuit to the zero-score result.
    pub fn has_usable_text(&self) -> bool {
        !self.text.trim().is_empty()
            && !self
                .warnings
                .iter()
                .any(|w| matches!(w, ExtractionWarning::EmptyDocument { .. }))
    }

    pub fn metadata(&self) -> ExtractionMetadata {
        ExtractionMetadata {
            format: self.format,
            backend: self.backend.clone(),
            attempts: self.attempts.clone(),
            warnings: self.warnings.clone(),
            content_hash: self.content_hash.clone(),
            word_count: self.word_count,
            paragraph_count: self.structure.paragraphs.len(),
            page_count: self.structure.pages.len(),
            usable_text: self.has_usable_text(),
        }
    }
}

/// Extraction facts carried into the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub format: DocumentFormat,
    pub backend: Option<String>,
    pub attempts: Vec<BackendAttempt>,
    pub warnings: Vec<ExtractionWarning>,
    pub content_hash: String,
    pub word_count: usize,
    pub paragraph_count: usize,
    pub page_count: usize,
    pub usable_text: bool,
}
