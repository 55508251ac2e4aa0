use super::blocks_from_plain_text;
use crate::pipeline::extraction::types::{DocumentFormat, ExtractionBackend, RawExtraction};
use crate::pipeline::extraction::BackendError;

/// Destination groups whose content is never document text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "header",
    "headerl",
    "headerr",
    "footer",
    "footerl",
    "footerr",
    "footnote",
    "themedata",
    "datastore",
    "colorschememapping",
    "generator",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "xmlnstbl",
    "latentstyles",
    "filetbl",
    "mmathPr",
];

/// Control-word stripper for RTF.
pub struct RtfTextBackend;

impl ExtractionBackend for RtfTextBackend {
    fn name(&self) -> &'static str {
        "rtf-text"
    }

    fn handles(&self, format: DocumentFormat) -> bool {
        format == DocumentFormat::Rtf
    }

    fn extract(&self, bytes: &[u8]) -> Result<RawExtraction, BackendError> {
        let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
        if !body.starts_with(b"{\\rtf") {
            return Err(BackendError::Malformed("missing {\\rtf header".into()));
        }
        let text = strip_rtf(body)?;
        Ok(RawExtraction::blocks(blocks_from_plain_text(&text)))
    }
}

#[derive(Clone, Copy)]
struct GroupState {
    skip: bool,
    /// Fallback characters to drop after a `\u` escape.
    uc: usize,
}

fn strip_rtf(bytes: &[u8]) -> Result<String, BackendError> {
    let mut out = String::new();
    let mut stack: Vec<GroupState> = Vec::new();
    let mut state = GroupState { skip: false, uc: 1 };
    let mut pending_fallback = 0usize;
    // Set right after `{`: the next control word may name a destination.
    let mut group_start = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'{' => {
                stack.push(state);
                group_start = true;
                i += 1;
                continue;
            }
            b'}' => {
                state = stack
                    .pop()
                    .ok_or_else(|| BackendError::Malformed("unbalanced closing brace".into()))?;
                pending_fallback = 0;
                i += 1;
            }
            b'\\' => {
                i += 1;
                let Some(&next) = bytes.get(i) else { break };
                if next.is_ascii_alphabetic() {
                    let start = i;
                    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word = std::str::from_utf8(&bytes[start..i]).unwrap_or_default();
                    let num_start = i;
                    if i < bytes.len() && bytes[i] == b'-' {
                        i += 1;
                    }
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                    let param: Option<i32> = std::str::from_utf8(&bytes[num_start..i])
                        .ok()
                        .and_then(|s| s.parse().ok());
                    // A single space delimits the control word.
                    if i < bytes.len() && bytes[i] == b' ' {
                        i += 1;
                    }

                    if group_start && SKIPPED_DESTINATIONS.contains(&word) {
                        state.skip = true;
                    }
                    group_start = false;
                    if state.skip {
                        continue;
                    }
                    match word {
                        "par" | "sect" => out.push_str("\n\n"),
                        "line" => out.push('\n'),
                        "page" => out.push('\u{000C}'),
                        "tab" | "cell" => out.push(' '),
                        "row" => out.push('\n'),
                        "emdash" => out.push('\u{2014}'),
                        "endash" => out.push('\u{2013}'),
                        "lquote" => out.push('\u{2018}'),
                        "rquote" => out.push('\u{2019}'),
                        "ldblquote" => out.push('\u{201C}'),
                        "rdblquote" => out.push('\u{201D}'),
                        "bullet" => out.push('\u{2022}'),
                        "uc" => state.uc = param.unwrap_or(1).max(0) as usize,
                        "u" => {
                            if let Some(n) = param {
                                let code = (if n < 0 { n + 65536 } else { n }) as u32;
                                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                                pending_fallback = state.uc;
                            }
                        }
                        _ => {}
                    }
                    continue;
                }
                i += 1;
                match next {
                    b'*' => {
                        if group_start {
                            state.skip = true;
                        }
                    }
                    b'\'' => {
                        let hex = bytes.get(i..i + 2).and_then(|h| std::str::from_utf8(h).ok());
                        let value = hex.and_then(|h| u8::from_str_radix(h, 16).ok());
                        i += 2;
                        if let Some(v) = value {
                            if !state.skip && !consume_fallback(&mut pending_fallback) {
                                out.push(cp1252(v));
                            }
                        }
                    }
                    b'\\' | b'{' | b'}' if !state.skip => {
                        if !consume_fallback(&mut pending_fallback) {
                            out.push(next as char);
                        }
                    }
                    b'~' if !state.skip => out.push(' '),
                    b'_' if !state.skip => out.push('-'),
                    b'\n' | b'\r' if !state.skip => out.push_str("\n\n"),
                    _ => {}
                }
                group_start = false;
                continue;
            }
            b'\r' | b'\n' => {
                i += 1;
            }
            _ => {
                if !state.skip && !consume_fallback(&mut pending_fallback) {
                    out.push(b as char);
                }
                i += 1;
            }
        }
        group_start = false;
    }

    if !stack.is_empty() && out.trim().is_empty() {
        return Err(BackendError::Malformed("unterminated group".into()));
    }
    Ok(out)
}

fn consume_fallback(pending: &mut usize) -> bool {
    if *pending > 0 {
        *pending -= 1;
        true
    } else {
        false
    }
}

/// Windows-1252 for the 0x80..=0x9F block, Latin-1 elsewhere.
fn cp1252(b: u8) -> char {
    match b {
        0x80 => '€',
        0x85 => '…',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x99 => '™',
        0x80..=0x9F => '\u{FFFD}',
        b => b as char,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::types::{RawBlock, RawContent};

    fn blocks(rtf: &str) -> Vec<RawBlock> {
        match RtfTextBackend.extract(rtf.as_bytes()).unwrap().content {
            RawContent::Blocks(blocks) => blocks,
            RawContent::Pages(_) => panic!("expected blocks"),
        }
    }

    #[test]
    fn strips_tables_and_keeps_paragraphs() {
        let rtf = r"{\rtf1\ansi{\fonttbl{\f0 Times;}}{\colortbl;\red0\green0\blue0;}
\pard\f0 The supplier shall deliver.\par
Second paragraph.\par}";
        let texts: Vec<String> = blocks(rtf).into_iter().map(|b| b.text).collect();
        assert_eq!(texts, vec!["The supplier shall deliver.", "Second paragraph."]);
    }

    #[test]
    fn decodes_hex_and_unicode_escapes() {
        let rtf = r"{\rtf1 Caf\'e9 \u8212? done\par}";
        assert_eq!(blocks(rtf)[0].text, "Café \u{2014} done");
    }

    #[test]
    fn ignored_destinations_are_skipped() {
        let rtf = r"{\rtf1{\*\generator Writer 1.0;}Visible text\par}";
        assert_eq!(blocks(rtf)[0].text, "Visible text");
    }

    #[test]
    fn escaped_braces_are_literal() {
        let rtf = r"{\rtf1 Use \{braces\} and \\slashes\par}";
        assert_eq!(blocks(rtf)[0].text, r"Use {braces} and \slashes");
    }

    #[test]
    fn missing_header_is_malformed() {
        let err = RtfTextBackend.extract(b"plain text").unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)));
    }

    #[test]
    fn unbalanced_brace_is_malformed() {
        let err = RtfTextBackend.extract(br"{\rtf1 text}}").unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)));
    }
}
