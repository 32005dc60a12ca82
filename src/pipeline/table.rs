//! Table recognition answers: OTSL markup to HTML.
//!
//! MinerU-style models answer the table prompt in OTSL, a flat token
//! stream where every cell opens with a marker and every row ends with
//! `<nl>`:
//!
//! | Token    | Meaning                                   |
//! |----------|-------------------------------------------|
//! | `<fcel>` | cell with its own content                 |
//! | `<ecel>` | empty cell                                |
//! | `<lcel>` | merged with the cell to the left          |
//! | `<ucel>` | merged with the cell above                |
//! | `<xcel>` | merged both left and up                   |
//! | `<nl>`   | end of row                                |
//!
//! Merged cells are resolved into `rowspan`/`colspan` attributes. Answers
//! that are already HTML only get their known tag glitches repaired, and
//! token-free answers are read as tab-separated rows.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static RE_OTSL_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<fcel>|<ecel>|<lcel>|<ucel>|<xcel>|<nl>").unwrap());

/// Convert a table answer to an HTML `<table>`.
///
/// Empty input stays empty.
pub fn otsl_to_html(input: &str) -> String {
    let s = input.trim();
    if s.is_empty() {
        return String::new();
    }
    if s.contains("<table") {
        return repair_html_table(s);
    }
    if RE_OTSL_TOKEN.is_match(s) {
        return tokens_to_html(s).unwrap_or_else(|| flatten_tokens(s));
    }
    tsv_to_html(s)
}

fn repair_html_table(html: &str) -> String {
    html.replace("<tdcolspan=", "<td colspan=")
        .replace("<tdrowspan=", "<td rowspan=")
        .replace("<|sn|>", "")
        .replace("<|unk|>", "")
        .replace('\u{FFFF}', "")
}

fn tsv_to_html(text: &str) -> String {
    let mut html = String::from("<table>");
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        html.push_str("<tr>");
        for cell in line.split('\t') {
            html.push_str("<td>");
            html.push_str(&html_escape::encode_text(cell.trim()));
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}

/// Last resort for token streams that cannot be laid out as a grid.
fn flatten_tokens(input: &str) -> String {
    input
        .replace("<nl>", "\n")
        .replace("<ecel>", "\t")
        .replace("<fcel>", "\t")
        .replace("<lcel>", "")
        .replace("<ucel>", "")
        .replace("<xcel>", "")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Filled,
    Empty,
    Left,
    Up,
    Cross,
}

impl Cell {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "<fcel>" => Some(Cell::Filled),
            "<ecel>" => Some(Cell::Empty),
            "<lcel>" => Some(Cell::Left),
            "<ucel>" => Some(Cell::Up),
            "<xcel>" => Some(Cell::Cross),
            _ => None,
        }
    }
}

type Row = Vec<(Cell, String)>;

/// Split the token stream into rows of `(marker, text)`. Text before the
/// first token is returned separately as a caption.
fn parse_rows(input: &str) -> (String, Vec<Row>) {
    let mut rows = Vec::new();
    let mut row: Row = Vec::new();
    let mut open: Option<Cell> = None;
    let mut caption = String::new();
    let mut cursor = 0;

    for token in RE_OTSL_TOKEN.find_iter(input) {
        let text = input[cursor..token.start()].trim();
        match open.take() {
            Some(cell) => row.push((cell, text.to_string())),
            None if rows.is_empty() && row.is_empty() => caption = text.to_string(),
            None => {}
        }
        cursor = token.end();

        match Cell::from_token(token.as_str()) {
            Some(cell) => open = Some(cell),
            None => {
                if !row.is_empty() {
                    rows.push(std::mem::take(&mut row));
                }
            }
        }
    }
    if let Some(cell) = open {
        row.push((cell, input[cursor..].trim().to_string()));
    }
    if !row.is_empty() {
        rows.push(row);
    }
    (caption, rows)
}

/// Lay the rows out on a grid, merge spanning cells and emit HTML.
fn tokens_to_html(input: &str) -> Option<String> {
    let (caption, mut rows) = parse_rows(input);
    let cols = rows.iter().map(Vec::len).max()?;
    if cols == 0 {
        return None;
    }
    for row in &mut rows {
        row.resize(cols, (Cell::Empty, String::new()));
    }
    let n_rows = rows.len();

    let mut sets = DisjointSet::new(n_rows * cols);
    for (r, row) in rows.iter().enumerate() {
        for (c, (cell, _)) in row.iter().enumerate() {
            let idx = r * cols + c;
            let merge_left = matches!(cell, Cell::Left | Cell::Cross) && c > 0;
            let merge_up = matches!(cell, Cell::Up | Cell::Cross) && r > 0;
            if merge_left {
                sets.union(idx, idx - 1);
            }
            if merge_up {
                sets.union(idx, idx - cols);
            }
        }
    }

    // Bounding rectangle and text of every merged region, keyed by root.
    struct Span {
        top: usize,
        left: usize,
        bottom: usize,
        right: usize,
        text: String,
    }
    let mut spans: HashMap<usize, Span> = HashMap::new();
    for (r, row) in rows.iter().enumerate() {
        for (c, (cell, text)) in row.iter().enumerate() {
            let root = sets.find(r * cols + c);
            let span = spans.entry(root).or_insert(Span {
                top: r,
                left: c,
                bottom: r,
                right: c,
                text: String::new(),
            });
            span.top = span.top.min(r);
            span.left = span.left.min(c);
            span.bottom = span.bottom.max(r);
            span.right = span.right.max(c);
            // The anchoring `<fcel>` wins over stray text on merge markers.
            if !text.is_empty() && (span.text.is_empty() || *cell == Cell::Filled) {
                span.text = text.clone();
            }
        }
    }

    let mut html = String::from("<table>");
    if !caption.is_empty() {
        html.push_str("<caption>");
        html.push_str(&html_escape::encode_text(&caption));
        html.push_str("</caption>");
    }
    html.push_str("<tbody>");
    for r in 0..n_rows {
        html.push_str("<tr>");
        for c in 0..cols {
            let root = sets.find(r * cols + c);
            let span = spans.get(&root)?;
            if span.top != r || span.left != c {
                continue;
            }
            html.push_str("<td");
            let rowspan = span.bottom - span.top + 1;
            let colspan = span.right - span.left + 1;
            if rowspan > 1 {
                html.push_str(&format!(" rowspan=\"{rowspan}\""));
            }
            if colspan > 1 {
                html.push_str(&format!(" colspan=\"{colspan}\""));
            }
            html.push('>');
            html.push_str(&html_escape::encode_text(&span.text));
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    Some(html)
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Keep the earlier (top-left) cell as root.
            let (keep, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = keep;
        }
    }
}
