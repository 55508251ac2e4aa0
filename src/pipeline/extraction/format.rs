use super::types::DocumentFormat;

/// How many leading bytes may precede the `%PDF-` header.
const PDF_HEADER_WINDOW: usize = 1024;

/// Bytes inspected when deciding whether content is text.
const TEXT_SNIFF_WINDOW: usize = 8192;

/// Result of sniffing a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDetection {
    /// Format the chain routes on.
    pub format: DocumentFormat,
    /// Format the content itself indicated.
    pub sniffed: DocumentFormat,
    pub hint: Option<DocumentFormat>,
}

impl FormatDetection {
    /// The hint named a format the content contradicts.
    pub fn hint_mismatch(&self) -> bool {
        matches!(self.hint, Some(h) if h != self.format)
    }
}

/// Detect the document format from magic bytes, honoring a compatible hint.
///
/// Binary signatures (PDF, DOCX, RTF) always win over the hint. When the
/// content is not recognizable the hint decides, so a damaged PDF submitted
/// as `.pdf` still walks the PDF backends before the legacy scanner.
pub fn detect_format(bytes: &[u8], hint: Option<&str>) -> FormatDetection {
    let hint = hint.and_then(DocumentFormat::from_hint);
    let sniffed = sniff(bytes);

    let format = match (sniffed, hint) {
        (DocumentFormat::Unknown, Some(h)) => h,
        // Headerless RTF submitted as RTF.
        (DocumentFormat::PlainText, Some(DocumentFormat::Rtf)) if looks_like_rtf(bytes) => {
            DocumentFormat::Rtf
        }
        (s, _) => s,
    };

    FormatDetection {
        format,
        sniffed,
        hint,
    }
}

fn sniff(bytes: &[u8]) -> DocumentFormat {
    let head = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    if find(head, b"%PDF-").is_some() {
        return DocumentFormat::Pdf;
    }
    if bytes.starts_with(b"PK\x03\x04") {
        // Entry names are stored uncompressed in local headers and the
        // central directory.
        return if find(bytes, b"word/document.xml").is_some() {
            DocumentFormat::Docx
        } else {
            DocumentFormat::Unknown
        };
    }
    if strip_utf8_bom(bytes).starts_with(b"{\\rtf") {
        return DocumentFormat::Rtf;
    }
    if bytes.starts_with(&[0xFF, 0xFE]) || bytes.starts_with(&[0xFE, 0xFF]) {
        return DocumentFormat::PlainText;
    }
    if looks_like_text(bytes) {
        return DocumentFormat::PlainText;
    }
    DocumentFormat::Unknown
}

fn strip_utf8_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes)
}

/// No NUL bytes and almost no control bytes. Invalid UTF-8 still counts:
/// legacy 8-bit text is text, the lossy decoder deals with it.
fn looks_like_text(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(TEXT_SNIFF_WINDOW)];
    if window.is_empty() || window.contains(&0) {
        return false;
    }
    let control = window
        .iter()
        .filter(|b| **b < 0x20 && !matches!(**b, b'\t' | b'\n' | b'\r' | 0x0C))
        .count();
    control * 20 < window.len()
}

fn looks_like_rtf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(TEXT_SNIFF_WINDOW)];
    find(window, b"\\par").is_some() || find(window, b"\\pard").is_some()
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_pdf_header() {
        let detection = detect_format(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n", None);
        assert_eq!(detection.format, DocumentFormat::Pdf);
        assert!(!detection.hint_mismatch());
    }

    #[test]
    fn pdf_header_after_junk_prefix() {
        let mut bytes = vec![b' '; 100];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert_eq!(detect_format(&bytes, None).format, DocumentFormat::Pdf);
    }

    #[test]
    fn zip_needs_word_document_entry() {
        let docx = b"PK\x03\x04....word/document.xml....";
        let other = b"PK\x03\x04....xl/workbook.xml....";
        assert_eq!(detect_format(docx, None).format, DocumentFormat::Docx);
        assert_eq!(detect_format(other, None).format, DocumentFormat::Unknown);
    }

    #[test]
    fn sniffs_rtf_and_text() {
        assert_eq!(detect_format(br"{\rtf1\ansi Hello}", None).format, DocumentFormat::Rtf);
        assert_eq!(detect_format(b"Plain words.", None).format, DocumentFormat::PlainText);
        assert_eq!(
            detect_format(&[0xFF, 0xFE, b'H', 0, b'i', 0], None).format,
            DocumentFormat::PlainText
        );
    }

    #[test]
    fn binary_signature_beats_hint() {
        let detection = detect_format(b"%PDF-1.5 rest", Some("report.docx"));
        assert_eq!(detection.format, DocumentFormat::Pdf);
        assert_eq!(detection.hint, Some(DocumentFormat::Docx));
        assert!(detection.hint_mismatch());
    }

    #[test]
    fn hint_decides_unrecognizable_content() {
        let corrupted = [0x00, 0x13, 0x88, 0xFE, 0x00, 0x42];
        assert_eq!(detect_format(&corrupted, None).format, DocumentFormat::Unknown);
        assert_eq!(detect_format(&corrupted, Some("pdf")).format, DocumentFormat::Pdf);
    }

    #[test]
    fn latin1_text_is_still_text() {
        assert_eq!(detect_format(b"Caf\xE9 cr\xE8me", None).format, DocumentFormat::PlainText);
    }

    #[test]
    fn empty_input_is_unknown() {
        assert_eq!(detect_format(&[], None).format, DocumentFormat::Unknown);
    }

    #[test]
    fn find_locates_needle() {
        assert_eq!(find(b"abcdef", b"cd"), Some(2));
        assert_eq!(find(b"abc", b"abcd"), None);
        assert_eq!(find(b"abc", b""), None);
    }
}
