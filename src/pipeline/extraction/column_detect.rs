// Whitespace-gutter column detection for positional page text.
// Content-stream text from two-column pages interleaves the columns line by
// line. When a consistent gutter is found the page is rewritten left column
// first, then right column.

/// Share of lines that must have a gutter near the same position.
const GUTTER_LINE_THRESHOLD: f64 = 0.50;

/// Minimum run of spaces that counts as a gutter.
const MIN_GUTTER_WIDTH: usize = 6;

/// Allowed drift of the gutter midpoint between lines.
const GUTTER_POSITION_TOLERANCE: usize = 4;

/// Pages with fewer non-empty lines are never treated as multi-column.
const MIN_LINES_FOR_DETECTION: usize = 4;

/// A detected two-column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    /// Character column of the gutter midpoint.
    pub gutter: usize,
    /// Lines that contributed to the winning cluster.
    pub supporting_lines: usize,
}

/// Detect a gutter on the page. `None` for single-column text.
pub fn detect_layout(page: &str) -> Option<ColumnLayout> {
    let lines: Vec<Vec<char>> = page
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().collect())
        .collect();
    if lines.len() < MIN_LINES_FOR_DETECTION {
        return None;
    }

    let midpoints: Vec<usize> = lines.iter().filter_map(|l| gutter_midpoint(l)).collect();
    let (gutter, supporting_lines) = densest_cluster(&midpoints)?;

    let ratio = supporting_lines as f64 / lines.len() as f64;
    (ratio >= GUTTER_LINE_THRESHOLD).then_some(ColumnLayout {
        gutter,
        supporting_lines,
    })
}

/// Reorder a multi-column page left column first.
///
/// Returns `None` when no layout is detected, so the caller can tell a
/// reordered page (and warn about it) from an untouched one. The two columns
/// are separated by a blank line and therefore become separate paragraphs.
pub fn reorder_columns(page: &str) -> Option<String> {
    let layout = detect_layout(page)?;

    let mut left: Vec<String> = Vec::new();
    let mut right: Vec<String> = Vec::new();
    for line in page.lines() {
        let chars: Vec<char> = line.chars().collect();
        if chars.iter().all(|c| c.is_whitespace()) {
            // Paragraph breaks belong to both columns.
            push_break(&mut left);
            push_break(&mut right);
            continue;
        }
        match split_at_gutter(&chars, layout.gutter) {
            Some((l, r)) => {
                if !l.is_empty() {
                    left.push(l);
                }
                if !r.is_empty() {
                    right.push(r);
                }
            }
            None => left.push(line.trim().to_string()),
        }
    }

    let left = left.join("\n");
    let right = right.join("\n");
    let (left, right) = (left.trim(), right.trim());
    Some(if right.is_empty() {
        left.to_string()
    } else {
        format!("{left}\n\n{right}")
    })
}

fn push_break(column: &mut Vec<String>) {
    if column.last().is_some_and(|l| !l.is_empty()) {
        column.push(String::new());
    }
}

/// Midpoint of the first space run of gutter width with text on both sides.
fn gutter_midpoint(line: &[char]) -> Option<usize> {
    let mut i = 0;
    while i < line.len() {
        if line[i] != ' ' {
            i += 1;
            continue;
        }
        let start = i;
        while i < line.len() && line[i] == ' ' {
            i += 1;
        }
        let width = i - start;
        let text_left = line[..start].iter().any(|c| !c.is_whitespace());
        let text_right = line[i..].iter().any(|c| !c.is_whitespace());
        if width >= MIN_GUTTER_WIDTH && text_left && text_right {
            return Some(start + width / 2);
        }
    }
    None
}

/// Position with the most neighbours within tolerance. Ties go to the first.
fn densest_cluster(positions: &[usize]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for &pos in positions {
        let count = positions
            .iter()
            .filter(|&&p| p.abs_diff(pos) <= GUTTER_POSITION_TOLERANCE)
            .count();
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((pos, count));
        }
    }
    best
}

/// Split a line at the widest space run near the gutter.
/// `None` when the line has no such run (it then belongs to the left column).
fn split_at_gutter(line: &[char], gutter: usize) -> Option<(String, String)> {
    let reach = GUTTER_POSITION_TOLERANCE + MIN_GUTTER_WIDTH;
    let lo = gutter.saturating_sub(reach);
    let hi = (gutter + reach).min(line.len());

    let mut best: Option<(usize, usize)> = None;
    let mut i = lo;
    while i < hi {
        if line[i] != ' ' {
            i += 1;
            continue;
        }
        let start = i;
        while i < line.len() && line[i] == ' ' {
            i += 1;
        }
        let width = i - start;
        if width >= MIN_GUTTER_WIDTH && best.map_or(true, |(s, e)| width > e - s) {
            best = Some((start, i));
        }
    }

    let (start, end) = best?;
    let left: String = line[..start].iter().collect();
    let right: String = line[end..].iter().collect();
    Some((left.trim().to_string(), right.trim().to_string()))
}
