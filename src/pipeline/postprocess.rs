//! Post-processing: deterministic cleanup of recognised region text.
//!
//! Recognition output is short (one region at a time) but still picks up
//! model quirks: stray code fences around the answer, CRLF line endings,
//! zero-width characters, and the occasional runaway loop where the same
//! line is generated until the token limit. Each rule here is a pure
//! `&str → String` pass.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence
//! regex sees the raw answer; repetition is collapsed after trailing
//! whitespace is trimmed so near-identical lines compare equal.

use crate::output::{BLOCK_EQUATION, BLOCK_TABLE};
use crate::pipeline::table::otsl_to_html;
use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum run of identical consecutive lines kept in a block.
const MAX_REPEATED_LINES: usize = 3;

/// Clean the raw recognition answer for a region of `block_type`.
///
/// Rules (applied in order):
/// 1. Strip outer code fences (```` ```markdown ````, ```` ```latex ````, …)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runaway repeated lines
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. For equations, ensure `$$ … $$` display delimiters; for tables,
///    convert OTSL markup to HTML
///
/// The result is trimmed; an empty string means the region had no text.
pub fn clean_block(block_type: &str, raw: &str) -> String {
    let s = strip_code_fences(raw);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_repeated_lines(&s);
    let s = remove_invisible_chars(&s);
    let s = s.trim();

    match block_type {
        BLOCK_EQUATION => ensure_display_math(s),
        BLOCK_TABLE => otsl_to_html(s),
        _ => s.to_string(),
    }
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse runaway repetition ──────────────────────────────────────

fn collapse_repeated_lines(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut run = 0usize;

    for line in input.lines() {
        if !line.is_empty() && out.last() == Some(&line) {
            run += 1;
        } else {
            run = 1;
        }
        if run <= MAX_REPEATED_LINES {
            out.push(line);
        }
    }

    out.join("\n")
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 6: Display-math delimiters for equations ───────────────────────────

/// Wrap bare LaTeX in `$$` delimiters. Content that already carries
/// `$$`, `\[` or a single `$` pair is returned unchanged; empty input stays
/// empty.
fn ensure_display_math(input: &str) -> String {
    let s = input.trim();
    if s.is_empty() {
        return String::new();
    }
    let delimited = (s.starts_with("$$") && s.ends_with("$$") && s.len() >= 4)
        || (s.starts_with("\\[") && s.ends_with("\\]"))
        || (s.starts_with('$') && s.ends_with('$') && s.len() >= 2);
    if delimited {
        s.to_string()
    } else {
        format!("$$\n{s}\n$$")
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        let input = "```markdown\n# Hello\n\nWorld\n```";
        assert_eq!(strip_code_fences(input), "# Hello\n\nWorld");
    }

    #[test]
    fn test_strip_fences_other_lang() {
        let input = "```latex\nE = mc^2\n```\n";
        assert_eq!(strip_code_fences(input), "E = mc^2");
    }

    #[test]
    fn test_no_fences_passthrough() {
        let input = "plain text with ``` in the middle";
        assert_eq!(strip_code_fences(input), input);
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("a  \nb\t\nc"), "a\nb\nc");
    }

    #[test]
    fn test_collapse_repeated_lines() {
        let input = "row\nrow\nrow\nrow\nrow\nend";
        assert_eq!(collapse_repeated_lines(input), "row\nrow\nrow\nend");
    }

    #[test]
    fn test_blank_lines_not_counted_as_repetition() {
        let input = "a\n\n\n\n\nb";
        assert_eq!(collapse_repeated_lines(input), input);
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c"), "abc");
    }

    #[test]
    fn test_display_math_wraps_bare_latex() {
        assert_eq!(ensure_display_math("x^2 + y^2"), "$$\nx^2 + y^2\n$$");
    }

    #[test]
    fn test_display_math_keeps_delimited() {
        assert_eq!(ensure_display_math("$$x$$"), "$$x$$");
        assert_eq!(ensure_display_math("\\[ a=b \\]"), "\\[ a=b \\]");
        assert_eq!(ensure_display_math("$x$"), "$x$");
        assert_eq!(ensure_display_math("   "), "");
    }

    #[test]
    fn test_clean_block_text() {
        let raw = "```\r\nHello   \r\nWorld\u{200B}\r\n```";
        assert_eq!(clean_block("text", raw), "Hello\nWorld");
    }

    #[test]
    fn test_clean_block_table_is_html() {
        let raw = "```\n<fcel>a<fcel>b<nl>\n```";
        assert_eq!(
            clean_block("table", raw),
            "<table><tbody><tr><td>a</td><td>b</td></tr></tbody></table>"
        );
    }

    #[test]
    fn test_clean_block_equation() {
        assert_eq!(clean_block("equation", " \\frac{a}{b} \n"), "$$\n\\frac{a}{b}\n$$");
    }

    #[test]
    fn test_clean_block_blank_stays_blank() {
        assert_eq!(clean_block("text", " \n\t "), "");
        assert_eq!(clean_block("equation", "\u{FEFF}"), "");
    }
}
