use std::borrow::Cow;

use super::blocks_from_plain_text;
use crate::pipeline::extraction::types::{DocumentFormat, ExtractionBackend, RawExtraction};
use crate::pipeline::extraction::BackendError;

enum Bom {
    Utf8,
    Utf16Le,
    Utf16Be,
}

fn split_bom(bytes: &[u8]) -> (Option<Bom>, &[u8]) {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        (Some(Bom::Utf8), rest)
    } else if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        (Some(Bom::Utf16Le), rest)
    } else if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        (Some(Bom::Utf16Be), rest)
    } else {
        (None, bytes)
    }
}

fn utf16_units(bytes: &[u8], little_endian: bool) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect()
}

/// Strict decoder: UTF-8 (optional BOM) or BOM-marked UTF-16.
pub struct Utf8TextBackend;

impl ExtractionBackend for Utf8TextBackend {
    fn name(&self) -> &'static str {
        "text-utf8"
    }

    fn handles(&self, format: DocumentFormat) -> bool {
        format == DocumentFormat::PlainText
    }

    fn extract(&self, bytes: &[u8]) -> Result<RawExtraction, BackendError> {
        let text = match split_bom(bytes) {
            (Some(Bom::Utf16Le), body) | (Some(Bom::Utf16Be), body) if body.len() % 2 != 0 => {
                return Err(BackendError::Encoding("odd byte count for UTF-16".into()));
            }
            (Some(Bom::Utf16Le), body) => String::from_utf16(&utf16_units(body, true))
                .map_err(|e| BackendError::Encoding(e.to_string()))?,
            (Some(Bom::Utf16Be), body) => String::from_utf16(&utf16_units(body, false))
                .map_err(|e| BackendError::Encoding(e.to_string()))?,
            (_, body) => {
                if body.contains(&0) {
                    return Err(BackendError::Unsupported("binary content (NUL bytes)".into()));
                }
                std::str::from_utf8(body)
                    .map_err(|e| BackendError::Encoding(e.to_string()))?
                    .to_string()
            }
        };
        Ok(RawExtraction::blocks(blocks_from_plain_text(&text)))
    }
}

/// Lossy decoder: replaces undecodable sequences instead of failing.
pub struct LossyTextBackend;

impl ExtractionBackend for LossyTextBackend {
    fn name(&self) -> &'static str {
        "text-lossy"
    }

    fn handles(&self, format: DocumentFormat) -> bool {
        format == DocumentFormat::PlainText
    }

    fn extract(&self, bytes: &[u8]) -> Result<RawExtraction, BackendError> {
        let (text, lossy) = match split_bom(bytes) {
            (Some(Bom::Utf16Le), body) => {
                let text = String::from_utf16_lossy(&utf16_units(body, true));
                let lossy = text.contains('\u{FFFD}') || body.len() % 2 != 0;
                (text, lossy)
            }
            (Some(Bom::Utf16Be), body) => {
                let text = String::from_utf16_lossy(&utf16_units(body, false));
                let lossy = text.contains('\u{FFFD}') || body.len() % 2 != 0;
                (text, lossy)
            }
            (_, body) => match String::from_utf8_lossy(body) {
                Cow::Borrowed(s) => (s.to_string(), false),
                Cow::Owned(s) => (s, true),
            },
        };
        Ok(RawExtraction::blocks(blocks_from_plain_text(&text)).with_lossy(lossy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::types::RawContent;

    fn texts(raw: &RawExtraction) -> Vec<String> {
        match &raw.content {
            RawContent::Blocks(blocks) => blocks.iter().map(|b| b.text.clone()).collect(),
            RawContent::Pages(pages) => pages.clone(),
        }
    }

    #[test]
    fn strict_decodes_utf8_with_bom() {
        let raw = Utf8TextBackend
            .extract(b"\xEF\xBB\xBFThe operator shall sign.")
            .unwrap();
        assert_eq!(texts(&raw), vec!["The operator shall sign."]);
        assert!(!raw.lossy);
    }

    #[test]
    fn strict_decodes_utf16le() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Résumé".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let raw = Utf8TextBackend.extract(&bytes).unwrap();
        assert_eq!(texts(&raw), vec!["Résumé"]);
    }

    #[test]
    fn strict_rejects_invalid_utf8() {
        let err = Utf8TextBackend.extract(b"caf\xE9 latte").unwrap_err();
        assert!(matches!(err, BackendError::Encoding(_)));
    }

    #[test]
    fn strict_rejects_binary() {
        let err = Utf8TextBackend.extract(b"ab\x00cd").unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
    }

    #[test]
    fn lossy_replaces_and_flags() {
        let raw = LossyTextBackend.extract(b"caf\xE9 latte").unwrap();
        assert!(raw.lossy);
        assert_eq!(texts(&raw), vec!["caf\u{FFFD} latte"]);
    }

    #[test]
    fn lossy_clean_input_not_flagged() {
        let raw = LossyTextBackend.extract(b"clean text").unwrap();
        assert!(!raw.lossy);
    }
}
