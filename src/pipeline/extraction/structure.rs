//! Turns backend output into the normalized text and its structural map.
//!
//! Paragraphs are joined by a blank line. `Paragraph::start` is the byte
//! offset of each paragraph in the joined text, which is what finding
//! locations point into.

use super::column_detect::reorder_columns;
use super::sanitize::{sanitize_page, sanitize_paragraph};
use super::types::{
    BlockKind, DocumentStructure, ExtractionWarning, Heading, PageSpan, Paragraph, RawContent,
    RawExtraction,
};

pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Normalized text plus the warnings produced while normalizing.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedText {
    pub text: String,
    pub structure: DocumentStructure,
    pub warnings: Vec<ExtractionWarning>,
}

impl NormalizedText {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// One paragraph before offsets are assigned.
struct Pending {
    text: String,
    page: usize,
    heading_level: Option<u8>,
}

pub fn normalize(raw: &RawExtraction) -> NormalizedText {
    let mut warnings = Vec::new();
    let mut page_count = 0;
    let pending: Vec<Pending> = match &raw.content {
        RawContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|block| {
                let page = block.page.max(1);
                page_count = page_count.max(page);
                let text = sanitize_paragraph(&block.text);
                if text.is_empty() {
                    return None;
                }
                let heading_level = match block.kind {
                    BlockKind::Heading { level } => Some(level.clamp(1, 9)),
                    BlockKind::Paragraph => None,
                };
                Some(Pending {
                    text,
                    page,
                    heading_level,
                })
            })
            .collect(),
        RawContent::Pages(pages) => {
            page_count = pages.len();
            let mut out = Vec::new();
            for (i, page_text) in pages.iter().enumerate() {
                let page = i + 1;
                let cleaned = sanitize_page(page_text);
                let ordered = match reorder_columns(&cleaned) {
                    Some(reordered) => {
                        tracing::debug!(page, "Reordered multi-column page");
                        warnings.push(ExtractionWarning::MultiColumnLayout { page });
                        reordered
                    }
                    None => cleaned,
                };
                out.extend(split_paragraphs(&ordered).into_iter().map(|text| Pending {
                    text,
                    page,
                    heading_level: None,
                }));
            }
            out
        }
    };

    let (text, structure) = assemble(pending, page_count);
    NormalizedText {
        text,
        structure,
        warnings,
    }
}

/// Blank-line separated paragraphs, each sanitized to a single line.
fn split_paragraphs(page: &str) -> Vec<String> {
    page.split("\n\n")
        .map(sanitize_paragraph)
        .filter(|p| !p.is_empty())
        .collect()
}

fn assemble(pending: Vec<Pending>, page_count: usize) -> (String, DocumentStructure) {
    let mut text = String::new();
    let mut structure = DocumentStructure::default();

    for (index, p) in pending.into_iter().enumerate() {
        if index > 0 {
            text.push_str(PARAGRAPH_SEPARATOR);
        }
        let start = text.len();
        text.push_str(&p.text);
        if let Some(level) = p.heading_level {
            structure.headings.push(Heading {
                paragraph: index,
                level,
                text: p.text.clone(),
            });
        }
        structure.paragraphs.push(Paragraph {
            index,
            text: p.text,
            start,
            page: p.page,
            heading_level: p.heading_level,
        });
    }

    // Pages without paragraphs still count; their span is empty.
    for number in 1..=page_count {
        let mut on_page = structure.paragraphs.iter().filter(|p| p.page == number);
        let first = on_page.next().map(|p| p.index);
        let paragraph_count = first.map_or(0, |_| 1 + on_page.count());
        let first_paragraph = first.unwrap_or_else(|| {
            structure
                .paragraphs
                .iter()
                .position(|p| p.page > number)
                .unwrap_or(structure.paragraphs.len())
        });
        structure.pages.push(PageSpan {
            number,
            first_paragraph,
            paragraph_count,
        });
    }

    (text, structure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::types::RawBlock;

    #[test]
    fn offsets_point_at_paragraph_text() {
        let raw = RawExtraction::blocks(vec![
            RawBlock::heading("1 Scope", 1, 1),
            RawBlock::paragraph("The system shall log events.", 1),
            RawBlock::paragraph("  ", 1),
            RawBlock::paragraph("Logs are kept.", 2),
        ]);
        let normalized = normalize(&raw);
        assert_eq!(
            normalized.text,
            "1 Scope\n\nThe system shall log events.\n\nLogs are kept."
        );
        for p in &normalized.structure.paragraphs {
            assert_eq!(&normalized.text[p.start..p.start + p.text.len()], p.text);
        }
        assert_eq!(normalized.structure.paragraphs.len(), 3, "blank block dropped");
        assert_eq!(normalized.word_count(), 10);
    }

    #[test]
    fn headings_and_pages_mapped() {
        let raw = RawExtraction::blocks(vec![
            RawBlock::heading("Intro", 1, 1),
            RawBlock::paragraph("Body one.", 1),
            RawBlock::heading("Detail", 2, 3),
        ]);
        let s = normalize(&raw).structure;
        assert_eq!(s.headings.len(), 2);
        assert_eq!(s.headings[1].paragraph, 2);
        assert_eq!(s.headings[1].level, 2);
        assert_eq!(s.pages.len(), 3);
        assert_eq!(s.pages[0].paragraph_count, 2);
        assert_eq!(s.pages[1].paragraph_count, 0, "page two has no text");
        assert_eq!(s.pages[1].first_paragraph, 2);
        assert_eq!(s.pages[2].first_paragraph, 2);
    }

    #[test]
    fn pages_split_on_blank_lines() {
        let raw = RawExtraction::pages(vec![
            "First paragraph\nwraps here.\n\nSecond one.".to_string(),
            "Third on page two.".to_string(),
        ]);
        let normalized = normalize(&raw);
        let texts: Vec<&str> = normalized
            .structure
            .paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec!["First paragraph wraps here.", "Second one.", "Third on page two."]
        );
        assert_eq!(normalized.structure.paragraphs[2].page, 2);
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn multi_column_page_warns_and_reorders() {
        let page = "The contractor shall          Reports are due on the\n\
                    deliver the test plan         first working day of\n\
                    before the design review      each month and shall\n\
                    and maintain it after.        cover open risks.";
        let normalized = normalize(&RawExtraction::pages(vec![page.to_string()]));
        assert_eq!(
            normalized.warnings,
            vec![ExtractionWarning::MultiColumnLayout { page: 1 }]
        );
        assert_eq!(normalized.structure.paragraphs.len(), 2);
        assert!(normalized.structure.paragraphs[0]
            .text
            .ends_with("and maintain it after."));
    }

    #[test]
    fn empty_content_has_no_paragraphs() {
        let normalized = normalize(&RawExtraction::blocks(vec![]));
        assert!(normalized.text.is_empty());
        assert!(normalized.structure.paragraphs.is_empty());
        assert!(normalized.structure.pages.is_empty());
    }
}
