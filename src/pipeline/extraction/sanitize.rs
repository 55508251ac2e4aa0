/// Sanitize one paragraph of extracted text.
/// Strips control characters and collapses every whitespace run (line breaks
/// included) to a single space.
pub fn sanitize_paragraph(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if is_stripped(c) {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

/// Sanitize positional page text while keeping its line layout.
/// Control characters go, tabs become spaces, trailing whitespace is trimmed
/// and runs of blank lines shrink to one. Interior spacing survives so that
/// column gutters stay measurable.
pub fn sanitize_page(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut last_blank = true;
    for line in raw.lines() {
        let cleaned: String = line
            .chars()
            .filter_map(|c| match c {
                '\t' => Some(' '),
                c if is_stripped(c) => None,
                c => Some(c),
            })
            .collect();
        let cleaned = cleaned.trim_end().to_string();
        let blank = cleaned.trim().is_empty();
        if blank && last_blank {
            continue;
        }
        lines.push(if blank { String::new() } else { cleaned });
        last_blank = blank;
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Count of non-whitespace characters; the quality heuristic's measure.
pub fn usable_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

fn is_stripped(c: char) -> bool {
    // U+FFFD stays: it marks lossy decoding and is the caller's evidence.
    (c.is_control() && !c.is_whitespace())
        || matches!(c, '\u{200B}' | '\u{FEFF}' | '\u{00AD}')
}
