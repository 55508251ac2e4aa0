use crate::pipeline::extraction::types::{
    DocumentFormat, ExtractionBackend, RawBlock, RawExtraction,
};
use crate::pipeline::extraction::BackendError;

pub const LEGACY_BACKEND: &str = "legacy-strings";

/// Shortest printable run worth keeping.
const MIN_RUN: usize = 8;

/// Share of a run's characters that must be letters or spaces.
const MIN_WORDLIKE_RATIO: f64 = 0.75;

/// Last-resort scanner: keeps printable ASCII runs that read like words.
/// Works on any container, damaged ones included.
pub struct LegacyStringsBackend;

impl ExtractionBackend for LegacyStringsBackend {
    fn name(&self) -> &'static str {
        LEGACY_BACKEND
    }

    fn handles(&self, _format: DocumentFormat) -> bool {
        true
    }

    fn extract(&self, bytes: &[u8]) -> Result<RawExtraction, BackendError> {
        let blocks = printable_runs(bytes)
            .into_iter()
            .filter(|run| is_wordlike(run))
            .map(|run| RawBlock::paragraph(run, 1))
            .collect();
        Ok(RawExtraction::blocks(blocks))
    }
}

fn printable_runs(bytes: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for &b in bytes {
        if (0x20..=0x7E).contains(&b) || b == b'\t' {
            current.push(b as char);
        } else if !current.is_empty() {
            if current.trim().len() >= MIN_RUN {
                runs.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.trim().len() >= MIN_RUN {
        runs.push(current);
    }
    runs
}

fn is_wordlike(run: &str) -> bool {
    let trimmed = run.trim();
    let total = trimmed.chars().count();
    if total < MIN_RUN {
        return false;
    }
    let letters = trimmed
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || *c == ' ')
        .count();
    let words = trimmed
        .split_whitespace()
        .filter(|w| w.chars().filter(|c| c.is_ascii_alphabetic()).count() >= 2)
        .count();
    words >= 2 && letters as f64 / total as f64 >= MIN_WORDLIKE_RATIO
}
