use std::io::{Cursor, Read};
use std::sync::LazyLock;

use regex::Regex;

use super::blocks_from_plain_text;
use crate::pipeline::extraction::types::{
    DocumentFormat, ExtractionBackend, RawBlock, RawExtraction,
};
use crate::pipeline::extraction::BackendError;

const DOCUMENT_ENTRY: &str = "word/document.xml";

/// Cap on the inflated main document part.
const MAX_DOCUMENT_XML_BYTES: u64 = 256 * 1024 * 1024;

static PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:p(?:\s[^>]*[^/])?>(.*?)</w:p>").unwrap()
});

static PARAGRAPH_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<w:pStyle\s+w:val="([^"]+)""#).unwrap()
});

/// Run text, tabs, page breaks and line breaks, in document order.
static RUN_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?s)<w:t(?:\s[^>]*)?>(?P<text>.*?)</w:t>",
        r"|(?P<tab><w:tab\s*/>)",
        r#"|(?P<page><w:br\s[^>]*w:type="page"[^>]*/>|<w:lastRenderedPageBreak\s*/>)"#,
        r"|(?P<line><w:br\s*/>|<w:cr\s*/>)",
    ))
    .unwrap()
});

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

fn read_document_xml(bytes: &[u8]) -> Result<String, BackendError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let entry = archive
        .by_name(DOCUMENT_ENTRY)
        .map_err(|_| BackendError::Malformed(format!("missing {DOCUMENT_ENTRY}")))?;
    let mut xml = String::new();
    entry
        .take(MAX_DOCUMENT_XML_BYTES)
        .read_to_string(&mut xml)
        .map_err(|e| BackendError::Encoding(format!("{DOCUMENT_ENTRY}: {e}")))?;
    if !xml.contains("<w:body") {
        return Err(BackendError::Malformed("document part has no body".into()));
    }
    Ok(xml)
}

/// Decode the five predefined XML entities and numeric character references.
pub(crate) fn decode_xml_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &after[..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// `Heading1`..`Heading9` (and localized `heading 1`) map to levels; `Title` is level 1.
fn heading_level(style: &str) -> Option<u8> {
    let lower = style.to_ascii_lowercase();
    if lower == "title" {
        return Some(1);
    }
    let digits = lower.strip_prefix("heading")?.trim_start();
    digits.parse::<u8>().ok().filter(|l| (1..=9).contains(l))
}

/// WordprocessingML parser: paragraphs, heading styles and page breaks.
pub struct DocxStructuralBackend;

impl ExtractionBackend for DocxStructuralBackend {
    fn name(&self) -> &'static str {
        "docx-structural"
    }

    fn handles(&self, format: DocumentFormat) -> bool {
        format == DocumentFormat::Docx
    }

    fn extract(&self, bytes: &[u8]) -> Result<RawExtraction, BackendError> {
        let xml = read_document_xml(bytes)?;
        let mut blocks = Vec::new();
        let mut page = 1;

        for para in PARAGRAPH.captures_iter(&xml) {
            let inner = para.get(1).map_or("", |m| m.as_str());
            let level = PARAGRAPH_STYLE
                .captures(inner)
                .and_then(|c| c.get(1))
                .and_then(|m| heading_level(m.as_str()));

            let mut text = String::new();
            let mut break_after = false;
            for token in RUN_TOKEN.captures_iter(inner) {
                if let Some(t) = token.name("text") {
                    text.push_str(&decode_xml_entities(t.as_str()));
                } else if token.name("tab").is_some() || token.name("line").is_some() {
                    text.push(' ');
                } else if token.name("page").is_some() {
                    if text.trim().is_empty() {
                        page += 1;
                    } else {
                        break_after = true;
                    }
                }
            }

            if !text.trim().is_empty() {
                blocks.push(match level {
                    Some(level) => RawBlock::heading(text, level, page),
                    None => RawBlock::paragraph(text, page),
                });
            }
            if break_after {
                page += 1;
            }
        }

        Ok(RawExtraction::blocks(blocks))
    }
}

/// Markup stripper: paragraph ends become blank lines, every tag goes.
pub struct DocxFlatBackend;

impl ExtractionBackend for DocxFlatBackend {
    fn name(&self) -> &'static str {
        "docx-flat"
    }

    fn handles(&self, format: DocumentFormat) -> bool {
        format == DocumentFormat::Docx
    }

    fn extract(&self, bytes: &[u8]) -> Result<RawExtraction, BackendError> {
        let xml = read_document_xml(bytes)?;
        let marked = xml
            .replace("</w:p>", "\n\n")
            .replace("<w:tab/>", " ")
            .replace("<w:br/>", " ");
        let stripped = ANY_TAG.replace_all(&marked, "");
        let text = decode_xml_entities(&stripped);
        Ok(RawExtraction::blocks(blocks_from_plain_text(&text)))
    }
}

#[cfg(test)]
pub(crate) fn docx_fixture(body: &str) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("[Content_Types].xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"<Types/>").unwrap();
    writer
        .start_file(DOCUMENT_ENTRY, SimpleFileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::types::{BlockKind, RawContent};

    fn blocks(raw: RawExtraction) -> Vec<RawBlock> {
        match raw.content {
            RawContent::Blocks(blocks) => blocks,
            RawContent::Pages(_) => panic!("expected blocks"),
        }
    }

    const BODY: &str = r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Scope</w:t></w:r></w:p><w:p w:rsidR="00A1"><w:r><w:t xml:space="preserve">The vendor </w:t></w:r><w:r><w:t>shall deliver R&amp;D reports.</w:t></w:r></w:p><w:p/><w:p><w:r><w:br w:type="page"/></w:r></w:p><w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr><w:r><w:t>Schedule</w:t><w:tab/><w:t>Q3</w:t></w:r></w:p>"#;

    #[test]
    fn structural_reads_headings_runs_and_pages() {
        let blocks = blocks(DocxStructuralBackend.extract(&docx_fixture(BODY)).unwrap());
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].kind, BlockKind::Heading { level: 1 });
        assert_eq!(blocks[0].text, "Scope");
        assert_eq!(blocks[1].text, "The vendor shall deliver R&D reports.");
        assert_eq!(blocks[1].page, 1);
        assert_eq!(blocks[2].kind, BlockKind::Heading { level: 2 });
        assert_eq!(blocks[2].text, "Schedule Q3");
        assert_eq!(blocks[2].page, 2);
    }

    #[test]
    fn flat_keeps_text_without_styles() {
        let blocks = blocks(DocxFlatBackend.extract(&docx_fixture(BODY)).unwrap());
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Scope", "The vendor shall deliver R&D reports.", "Schedule Q3"]
        );
        assert!(blocks.iter().all(|b| b.kind == BlockKind::Paragraph));
    }

    #[test]
    fn not_a_zip_is_malformed() {
        let err = DocxStructuralBackend.extract(b"PK\x03\x04garbage").unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)));
    }

    #[test]
    fn zip_without_document_part_is_malformed() {
        use std::io::Write;
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<x/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        let err = DocxFlatBackend.extract(&bytes).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn entities_decoded() {
        assert_eq!(decode_xml_entities("a &lt;b&gt; &#233;&#x2014;"), "a <b> é\u{2014}");
        assert_eq!(decode_xml_entities("AT&T & co"), "AT&T & co");
    }

    #[test]
    fn heading_styles() {
        assert_eq!(heading_level("Heading3"), Some(3));
        assert_eq!(heading_level("heading 2"), Some(2));
        assert_eq!(heading_level("Title"), Some(1));
        assert_eq!(heading_level("BodyText"), None);
        assert_eq!(heading_level("Heading0"), None);
    }
}
