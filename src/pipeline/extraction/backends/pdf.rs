//! PDF backends. `pdf-content` walks the page tree and interprets the text
//! operators of each page's content streams; `pdf-strings` only scans for
//! string literals fed to show-text operators.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::sync::LazyLock;

use flate2::read::ZlibDecoder;
use regex::bytes::Regex;

use crate::pipeline::extraction::format::find;
use crate::pipeline::extraction::types::{DocumentFormat, ExtractionBackend, RawExtraction};
use crate::pipeline::extraction::BackendError;

/// Cap on a single inflated stream.
const MAX_INFLATED_STREAM: u64 = 64 * 1024 * 1024;

/// Page tree nesting beyond this is treated as a cycle.
const MAX_TREE_DEPTH: usize = 32;

/// Vertical gap, in multiples of the font size, that separates paragraphs.
const PARAGRAPH_GAP: f32 = 1.6;

/// TJ displacement (thousandths of an em) that reads as a word space.
const KERNING_SPACE: f32 = -200.0;

static OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s-u)(\d+)\s+\d+\s+obj\b(.*?)\bendobj").unwrap());
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?-u)(\d+)\s+\d+\s+R\b").unwrap());
static ROOT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?-u)/Root\s+(\d+)\s+\d+\s+R").unwrap());
static PAGES_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)/Pages\s+(\d+)\s+\d+\s+R").unwrap());
static KIDS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s-u)/Kids\s*\[([^\]]*)\]").unwrap());
static CONTENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s-u)/Contents\s*(?:\[([^\]]*)\]|(\d+\s+\d+\s+R))").unwrap()
});
static LENGTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)/Length\s+(\d+)(\s+\d+\s+R)?").unwrap());
static TYPE_PAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?-u)/Type\s*/Page\b").unwrap());
static SHOWN_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s-u)\(((?:[^()\\]|\\.)*)\)\s*(?:Tj|'|")|\[((?:[^\]\\]|\\.)*)\]\s*TJ"#).unwrap()
});
static LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s-u)\(((?:[^()\\]|\\.)*)\)").unwrap());

// ═══════════════════════════════════════════
// File layer
// ═══════════════════════════════════════════

/// Indirect objects of a PDF, found by scanning (no xref parsing, so files
/// with damaged cross-reference tables still open).
struct PdfFile<'a> {
    bytes: &'a [u8],
    objects: BTreeMap<u32, &'a [u8]>,
    /// Object numbers in file order.
    order: Vec<u32>,
}

impl<'a> PdfFile<'a> {
    fn parse(bytes: &'a [u8]) -> Result<Self, BackendError> {
        if find(&bytes[..bytes.len().min(1024)], b"%PDF-").is_none() {
            return Err(BackendError::Malformed("missing %PDF header".into()));
        }
        if find(bytes, b"/Encrypt").is_some() {
            return Err(BackendError::Unsupported("encrypted PDF".into()));
        }
        let mut objects = BTreeMap::new();
        let mut order = Vec::new();
        for cap in OBJECT.captures_iter(bytes) {
            let (Some(num), Some(body)) = (cap.get(1), cap.get(2)) else {
                continue;
            };
            let Some(num) = parse_u32(num.as_bytes()) else {
                continue;
            };
            // Incremental updates append newer versions; the last one wins.
            if objects.insert(num, body.as_bytes()).is_none() {
                order.push(num);
            }
        }
        if objects.is_empty() {
            return Err(BackendError::Malformed("no indirect objects".into()));
        }
        Ok(Self {
            bytes,
            objects,
            order,
        })
    }

    fn object(&self, num: u32) -> Option<&'a [u8]> {
        self.objects.get(&num).copied()
    }

    /// Page objects in reading order: the page tree when it can be walked,
    /// otherwise every `/Type /Page` object in file order.
    fn pages(&self) -> Vec<u32> {
        let mut pages = Vec::new();
        let root = ROOT
            .captures_iter(self.bytes)
            .last()
            .and_then(|c| c.get(1))
            .and_then(|m| parse_u32(m.as_bytes()));
        let tree = root
            .and_then(|r| self.object(r))
            .and_then(|catalog| PAGES_REF.captures(catalog))
            .and_then(|c| c.get(1))
            .and_then(|m| parse_u32(m.as_bytes()));
        if let Some(tree) = tree {
            let mut seen = BTreeSet::new();
            self.walk(tree, 0, &mut seen, &mut pages);
        }
        if pages.is_empty() {
            pages = self
                .order
                .iter()
                .copied()
                .filter(|n| self.object(*n).is_some_and(|body| is_page(body)))
                .collect();
        }
        pages
    }

    fn walk(&self, num: u32, depth: usize, seen: &mut BTreeSet<u32>, out: &mut Vec<u32>) {
        if depth > MAX_TREE_DEPTH || !seen.insert(num) {
            return;
        }
        let Some(body) = self.object(num) else { return };
        if is_page(body) {
            out.push(num);
            return;
        }
        if let Some(kids) = KIDS.captures(dictionary_part(body)).and_then(|c| c.get(1)) {
            for kid in references(kids.as_bytes()) {
                self.walk(kid, depth + 1, seen, out);
            }
        }
    }

    /// Concatenated, decoded content streams of a page.
    fn page_content(&self, page: u32) -> Option<Vec<u8>> {
        let body = self.object(page)?;
        let cap = CONTENTS.captures(dictionary_part(body))?;
        let refs = cap
            .get(1)
            .or_else(|| cap.get(2))
            .map(|m| references(m.as_bytes()))
            .unwrap_or_default();
        let mut content = Vec::new();
        let mut any = false;
        for r in refs {
            if let Some(data) = self.object(r).and_then(decode_stream) {
                content.extend_from_slice(&data);
                content.push(b'\n');
                any = true;
            }
        }
        any.then_some(content)
    }

    /// Every stream that decodes, in file order.
    fn decoded_streams(&self) -> Vec<Vec<u8>> {
        self.order
            .iter()
            .filter_map(|n| self.object(*n))
            .filter_map(decode_stream)
            .collect()
    }
}

fn is_page(body: &[u8]) -> bool {
    TYPE_PAGE.is_match(dictionary_part(body))
}

/// The object's dictionary: everything before `stream`, if any.
fn dictionary_part(body: &[u8]) -> &[u8] {
    match find(body, b"stream") {
        Some(pos) => &body[..pos],
        None => body,
    }
}

fn references(list: &[u8]) -> Vec<u32> {
    REFERENCE
        .captures_iter(list)
        .filter_map(|c| c.get(1))
        .filter_map(|m| parse_u32(m.as_bytes()))
        .collect()
}

fn parse_u32(digits: &[u8]) -> Option<u32> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Raw or FlateDecode stream data; streams with other filters yield `None`.
fn decode_stream(body: &[u8]) -> Option<Vec<u8>> {
    let keyword = find(body, b"stream")?;
    let dict = &body[..keyword];
    let mut start = keyword + b"stream".len();
    if body.get(start) == Some(&b'\r') {
        start += 1;
    }
    if body.get(start) == Some(&b'\n') {
        start += 1;
    }
    let end = body
        .windows(b"endstream".len())
        .rposition(|w| w == b"endstream")
        .filter(|end| *end >= start)?;
    // A direct /Length is exact; otherwise drop the EOL before `endstream`.
    let data = match declared_length(dict) {
        Some(len) if start + len <= end => &body[start..start + len],
        _ => strip_eol(&body[start..end]),
    };

    let filtered = find(dict, b"/Filter").is_some();
    if !filtered {
        return Some(data.to_vec());
    }
    if find(dict, b"/FlateDecode").is_none() || has_other_filter(dict) {
        return None;
    }
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .take(MAX_INFLATED_STREAM)
        .read_to_end(&mut out)
        .ok()?;
    Some(out)
}

fn has_other_filter(dict: &[u8]) -> bool {
    [
        b"/DCTDecode" as &[u8],
        b"/LZWDecode",
        b"/ASCII85Decode",
        b"/ASCIIHexDecode",
        b"/RunLengthDecode",
        b"/JBIG2Decode",
        b"/JPXDecode",
        b"/CCITTFaxDecode",
    ]
    .iter()
    .any(|f| find(dict, f).is_some())
}

fn declared_length(dict: &[u8]) -> Option<usize> {
    let cap = LENGTH.captures(dict)?;
    if cap.get(2).is_some() {
        // Indirect length object.
        return None;
    }
    std::str::from_utf8(cap.get(1)?.as_bytes()).ok()?.parse().ok()
}

fn strip_eol(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n")
        .or_else(|| data.strip_suffix(b"\n"))
        .or_else(|| data.strip_suffix(b"\r"))
        .unwrap_or(data)
}

/// PDF text strings: UTF-16BE with a byte-order mark, otherwise single bytes
/// read as Latin-1 (close enough to PDFDocEncoding for body text).
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|p| u16::from_be_bytes([p[0], p[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

// ═══════════════════════════════════════════
// Content-stream lexer
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f32),
    Str(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Name,
    Dict,
    Op(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Number(f32),
    Str(Vec<u8>),
    Array(Vec<Operand>),
    Other,
}

struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

impl<'a> Lexer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn next_token(&mut self) -> Option<Token> {
        loop {
            let b = self.peek()?;
            if b.is_ascii_whitespace() || b == 0 {
                self.pos += 1;
            } else if b == b'%' {
                while self.peek().is_some_and(|c| c != b'\n' && c != b'\r') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
        let b = self.peek()?;
        match b {
            b'(' => {
                self.pos += 1;
                Some(Token::Str(self.literal()))
            }
            b'<' if self.data.get(self.pos + 1) == Some(&b'<') => {
                self.pos += 2;
                Some(Token::Dict)
            }
            b'>' if self.data.get(self.pos + 1) == Some(&b'>') => {
                self.pos += 2;
                Some(Token::Dict)
            }
            b'<' => {
                self.pos += 1;
                Some(Token::Str(self.hex()))
            }
            b'[' => {
                self.pos += 1;
                Some(Token::ArrayStart)
            }
            b']' => {
                self.pos += 1;
                Some(Token::ArrayEnd)
            }
            b'/' => {
                self.pos += 1;
                self.regular();
                Some(Token::Name)
            }
            b')' | b'>' | b'{' | b'}' => {
                self.pos += 1;
                Some(Token::Dict)
            }
            _ => {
                let word = self.regular();
                let numeric = word
                    .first()
                    .is_some_and(|c| c.is_ascii_digit() || matches!(c, b'+' | b'-' | b'.'));
                if numeric {
                    let value = std::str::from_utf8(word).ok().and_then(|s| s.parse().ok());
                    Some(value.map_or(Token::Dict, Token::Number))
                } else {
                    Some(Token::Op(String::from_utf8_lossy(word).into_owned()))
                }
            }
        }
    }

    fn regular(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_ascii_whitespace() && c != 0 && !is_delimiter(c))
        {
            self.pos += 1;
        }
        if self.pos == start {
            // Keep the lexer moving on stray bytes.
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    /// Body of a literal string; the opening parenthesis is consumed.
    fn literal(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut depth = 1;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'\\' => {
                    let Some(e) = self.peek() else { break };
                    self.pos += 1;
                    match e {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'0'..=b'7' => {
                            let mut value = u32::from(e - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push((value & 0xFF) as u8);
                        }
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        other => out.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b);
                }
                _ => out.push(b),
            }
        }
        out
    }

    /// Body of a hex string; the opening angle bracket is consumed.
    fn hex(&mut self) -> Vec<u8> {
        let mut digits = Vec::new();
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'>' {
                break;
            }
            if let Some(d) = (b as char).to_digit(16) {
                digits.push(d as u8);
            }
        }
        if digits.len() % 2 == 1 {
            digits.push(0);
        }
        digits.chunks_exact(2).map(|p| p[0] << 4 | p[1]).collect()
    }

    /// Skip inline image data after `ID`, up to and including `EI`.
    fn skip_inline_image(&mut self) {
        while self.pos + 2 <= self.data.len() {
            let at_ei = &self.data[self.pos..self.pos + 2] == b"EI";
            let before = self.pos == 0 || self.data[self.pos - 1].is_ascii_whitespace();
            let after = self
                .data
                .get(self.pos + 2)
                .map_or(true, |c| c.is_ascii_whitespace());
            if at_ei && before && after {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
        self.pos = self.data.len();
    }
}

// ═══════════════════════════════════════════
// Text assembly
// ═══════════════════════════════════════════

/// Line and paragraph reconstruction from text positioning operators.
struct TextState {
    lines: Vec<String>,
    line: String,
    font_size: f32,
    scale: f32,
    leading: f32,
    /// Baseline of the current text line, in user space.
    y: f32,
    /// Baseline at which text was last shown.
    shown_y: Option<f32>,
    space_pending: bool,
}

impl TextState {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            line: String::new(),
            font_size: 12.0,
            scale: 1.0,
            leading: 0.0,
            y: 0.0,
            shown_y: None,
            space_pending: false,
        }
    }

    fn effective_font(&self) -> f32 {
        let size = (self.font_size * self.scale).abs();
        if size > 0.0 {
            size
        } else {
            12.0
        }
    }

    fn break_line(&mut self, paragraph: bool) {
        if !self.line.trim().is_empty() {
            self.lines.push(std::mem::take(&mut self.line).trim_end().to_string());
        } else {
            self.line.clear();
        }
        if paragraph && self.lines.last().is_some_and(|l| !l.is_empty()) {
            self.lines.push(String::new());
        }
        self.space_pending = false;
    }

    fn next_line(&mut self) {
        let step = if self.leading > 0.0 {
            self.leading * self.scale
        } else {
            self.effective_font() * 1.2
        };
        self.y -= step;
    }

    fn move_to_line(&mut self, tx: f32, ty: f32) {
        self.y += ty * self.scale;
        if ty.abs() < f32::EPSILON && tx.abs() > f32::EPSILON {
            self.space_pending = true;
        }
    }

    fn show(&mut self, bytes: &[u8]) {
        if let Some(prev) = self.shown_y {
            let gap = (prev - self.y).abs();
            if gap > 0.5 {
                self.break_line(gap > self.effective_font() * PARAGRAPH_GAP);
            }
        }
        self.shown_y = Some(self.y);
        let text = decode_pdf_string(bytes);
        if text.is_empty() {
            return;
        }
        if self.space_pending
            && !self.line.is_empty()
            && !self.line.ends_with(' ')
            && !text.starts_with(' ')
        {
            self.line.push(' ');
        }
        self.space_pending = false;
        self.line.push_str(&text);
    }

    fn show_array(&mut self, items: &[Operand]) {
        for item in items {
            match item {
                Operand::Str(s) => self.show(s),
                Operand::Number(n) if *n < KERNING_SPACE => self.space_pending = true,
                _ => {}
            }
        }
    }

    fn finish(mut self) -> String {
        self.break_line(false);
        while self.lines.last().is_some_and(|l| l.is_empty()) {
            self.lines.pop();
        }
        self.lines.join("\n")
    }
}

fn number(operands: &[Operand], index_from_end: usize) -> Option<f32> {
    let i = operands.len().checked_sub(index_from_end + 1)?;
    match operands.get(i) {
        Some(Operand::Number(n)) => Some(*n),
        _ => None,
    }
}

/// Interpret the text operators of one page's content.
fn page_text(content: &[u8]) -> String {
    let mut lexer = Lexer::new(content);
    let mut state = TextState::new();
    let mut operands: Vec<Operand> = Vec::new();
    let mut arrays: Vec<Vec<Operand>> = Vec::new();

    while let Some(token) = lexer.next_token() {
        let operand = match token {
            Token::Number(n) => Operand::Number(n),
            Token::Str(s) => Operand::Str(s),
            Token::Name | Token::Dict => Operand::Other,
            Token::ArrayStart => {
                arrays.push(Vec::new());
                continue;
            }
            Token::ArrayEnd => match arrays.pop() {
                Some(items) => Operand::Array(items),
                None => continue,
            },
            Token::Op(op) => {
                // An operator inside an array means the array was never closed.
                arrays.clear();
                apply_operator(&op, &operands, &mut state, &mut lexer);
                operands.clear();
                continue;
            }
        };
        match arrays.last_mut() {
            Some(array) => array.push(operand),
            None => operands.push(operand),
        }
    }
    state.finish()
}

fn apply_operator(op: &str, operands: &[Operand], state: &mut TextState, lexer: &mut Lexer<'_>) {
    match op {
        "BT" => {
            state.y = 0.0;
            state.scale = 1.0;
        }
        "Tf" => {
            if let Some(size) = number(operands, 0) {
                state.font_size = size;
            }
        }
        "TL" => {
            if let Some(leading) = number(operands, 0) {
                state.leading = leading;
            }
        }
        "Td" => {
            if let (Some(tx), Some(ty)) = (number(operands, 1), number(operands, 0)) {
                state.move_to_line(tx, ty);
            }
        }
        "TD" => {
            if let (Some(tx), Some(ty)) = (number(operands, 1), number(operands, 0)) {
                state.leading = -ty;
                state.move_to_line(tx, ty);
            }
        }
        "Tm" => {
            if let (Some(d), Some(f)) = (number(operands, 2), number(operands, 0)) {
                state.scale = if d.abs() > f32::EPSILON { d.abs() } else { 1.0 };
                if (state.y - f).abs() < f32::EPSILON {
                    state.space_pending = true;
                }
                state.y = f;
            }
        }
        "T*" => state.next_line(),
        "Tj" => {
            if let Some(Operand::Str(s)) = operands.last() {
                state.show(s);
            }
        }
        "'" | "\"" => {
            state.next_line();
            if let Some(Operand::Str(s)) = operands.last() {
                state.show(s);
            }
        }
        "TJ" => {
            if let Some(Operand::Array(items)) = operands.last() {
                state.show_array(items);
            }
        }
        "ID" => lexer.skip_inline_image(),
        _ => {}
    }
}

// ═══════════════════════════════════════════
// Backends
// ═══════════════════════════════════════════

/// Page-tree walker with a content-stream text interpreter.
pub struct PdfContentBackend;

impl ExtractionBackend for PdfContentBackend {
    fn name(&self) -> &'static str {
        "pdf-content"
    }

    fn handles(&self, format: DocumentFormat) -> bool {
        format == DocumentFormat::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<RawExtraction, BackendError> {
        let file = PdfFile::parse(bytes)?;
        let page_ids = file.pages();
        if page_ids.is_empty() {
            return Err(BackendError::Malformed("no page objects".into()));
        }
        let mut readable = 0;
        let pages: Vec<String> = page_ids
            .iter()
            .map(|id| match file.page_content(*id) {
                Some(content) => {
                    readable += 1;
                    page_text(&content)
                }
                None => String::new(),
            })
            .collect();
        if readable == 0 {
            return Err(BackendError::Malformed("no readable content streams".into()));
        }
        Ok(RawExtraction::pages(pages))
    }
}

/// String-literal scanner over raw and inflated streams.
pub struct PdfStringsBackend;

impl ExtractionBackend for PdfStringsBackend {
    fn name(&self) -> &'static str {
        "pdf-strings"
    }

    fn handles(&self, format: DocumentFormat) -> bool {
        format == DocumentFormat::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<RawExtraction, BackendError> {
        let file = PdfFile::parse(bytes)?;
        let mut chunks = Vec::new();
        for stream in file.decoded_streams() {
            let shown = shown_strings(&stream);
            if !shown.is_empty() {
                chunks.push(shown.join(" "));
            }
        }
        Ok(RawExtraction::pages(vec![chunks.join("\n\n")]))
    }
}

fn shown_strings(data: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    for cap in SHOWN_STRING.captures_iter(data) {
        if let Some(single) = cap.get(1) {
            out.push(decode_pdf_string(&unescape(single.as_bytes())));
        } else if let Some(array) = cap.get(2) {
            let joined: String = LITERAL
                .captures_iter(array.as_bytes())
                .filter_map(|c| c.get(1))
                .map(|m| decode_pdf_string(&unescape(m.as_bytes())))
                .collect();
            out.push(joined);
        }
    }
    out.retain(|s| !s.trim().is_empty());
    out
}

/// Unescape the body of a literal string.
fn unescape(body: &[u8]) -> Vec<u8> {
    let mut wrapped = body.to_vec();
    wrapped.push(b')');
    Lexer::new(&wrapped).literal()
}

#[cfg(test)]
pub(crate) fn pdf_fixture(page_contents: &[&str], compress: bool) -> Vec<u8> {
    use std::io::Write;

    let mut objects: Vec<String> = Vec::new();
    let mut streams: Vec<Vec<u8>> = Vec::new();
    let n = page_contents.len();
    // 1: catalog, 2: page tree, then (page, content) pairs.
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".into());
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
    objects.push(format!("<< /Type /Pages /Kids [{}] /Count {n} >>", kids.join(" ")));
    for (i, content) in page_contents.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R >>",
            4 + 2 * i
        ));
        let data = if compress {
            let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(content.as_bytes()).unwrap();
            enc.finish().unwrap()
        } else {
            content.as_bytes().to_vec()
        };
        let filter = if compress { " /Filter /FlateDecode" } else { "" };
        objects.push(format!("<< /Length {}{filter} >>", data.len()));
        streams.push(data);
    }

    let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut stream_iter = streams.into_iter();
    for (i, dict) in objects.iter().enumerate() {
        let num = i + 1;
        out.extend_from_slice(format!("{num} 0 obj\n{dict}\n").as_bytes());
        // Content objects are the even-numbered ones from 4 on.
        if num >= 4 && num % 2 == 0 {
            if let Some(data) = stream_iter.next() {
                out.extend_from_slice(b"stream\n");
                out.extend_from_slice(&data);
                out.extend_from_slice(b"\nendstream\n");
            }
        }
        out.extend_from_slice(b"endobj\n");
    }
    out.extend_from_slice(b"trailer\n<< /Root 1 0 R >>\n%%EOF\n");
    out
}
