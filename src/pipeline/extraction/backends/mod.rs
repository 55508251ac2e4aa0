//! Built-in extraction backends, one adapter per converter.

pub mod docx;
pub mod legacy;
pub mod pdf;
pub mod rtf;
pub mod text;

use std::sync::Arc;

use super::types::{ExtractionBackend, RawBlock};

/// The fixed priority table. Per format, the chain tries the backends that
/// handle it in this order: structural parser, fast converter, legacy scanner.
pub fn standard_backends() -> Vec<Arc<dyn ExtractionBackend>> {
    vec![
        Arc::new(docx::DocxStructuralBackend),
        Arc::new(docx::DocxFlatBackend),
        Arc::new(pdf::PdfContentBackend),
        Arc::new(pdf::PdfStringsBackend),
        Arc::new(text::Utf8TextBackend),
        Arc::new(text::LossyTextBackend),
        Arc::new(rtf::RtfTextBackend),
        Arc::new(legacy::LegacyStringsBackend),
    ]
}

/// Split decoded plain text into blocks.
///
/// Blank lines separate paragraphs, a form feed starts a new page and lines
/// starting with `#` (markdown style) become headings.
pub fn blocks_from_plain_text(text: &str) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    for (i, page_text) in text.split('\u{000C}').enumerate() {
        let page = i + 1;
        let mut current: Vec<&str> = Vec::new();
        for line in page_text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                flush(&mut current, &mut blocks, page);
                continue;
            }
            if let Some((level, title)) = markdown_heading(trimmed) {
                flush(&mut current, &mut blocks, page);
                blocks.push(RawBlock::heading(title, level, page));
                continue;
            }
            current.push(trimmed);
        }
        flush(&mut current, &mut blocks, page);
    }
    blocks
}

fn flush(current: &mut Vec<&str>, blocks: &mut Vec<RawBlock>, page: usize) {
    if !current.is_empty() {
        blocks.push(RawBlock::paragraph(current.join(" "), page));
        current.clear();
    }
}

fn markdown_heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    let title = rest.trim().trim_end_matches('#').trim();
    (!title.is_empty()).then_some((hashes as u8, title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::types::{BlockKind, DocumentFormat};

    #[test]
    fn registry_order_is_fixed() {
        let names: Vec<&str> = standard_backends().iter().map(|b| b.name()).collect();
        assert_eq!(
            names,
            vec![
                "docx-structural",
                "docx-flat",
                "pdf-content",
                "pdf-strings",
                "text-utf8",
                "text-lossy",
                "rtf-text",
                "legacy-strings",
            ]
        );
    }

    #[test]
    fn legacy_is_last_for_every_format() {
        let backends = standard_backends();
        for format in [
            DocumentFormat::Docx,
            DocumentFormat::Pdf,
            DocumentFormat::PlainText,
            DocumentFormat::Rtf,
        ] {
            let route: Vec<&str> = backends
                .iter()
                .filter(|b| b.handles(format))
                .map(|b| b.name())
                .collect();
            assert!(route.len() >= 2, "{format} needs a fallback");
            assert_eq!(route.last(), Some(&"legacy-strings"));
        }
        let unknown: Vec<&str> = backends
            .iter()
            .filter(|b| b.handles(DocumentFormat::Unknown))
            .map(|b| b.name())
            .collect();
        assert_eq!(unknown, vec!["legacy-strings"]);
    }

    #[test]
    fn plain_text_blocks() {
        let blocks = blocks_from_plain_text(
            "# Scope\nThe system\nshall log.\n\nSecond paragraph.\u{000C}## Page two\nBody.",
        );
        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[0].kind, BlockKind::Heading { level: 1 });
        assert_eq!(blocks[1].text, "The system shall log.");
        assert_eq!(blocks[3].kind, BlockKind::Heading { level: 2 });
        assert_eq!(blocks[3].page, 2);
        assert_eq!(blocks[4].page, 2);
    }

    #[test]
    fn hash_without_space_is_not_heading() {
        let blocks = blocks_from_plain_text("#hashtag line");
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
    }
}
