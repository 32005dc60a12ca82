//! Markdown rendering of extracted blocks and the output-file writer.
//!
//! The report layout is fixed:
//!
//! ```text
//! ## OCR Results - {name}[ (Multi-page Document)]
//! *Generated at: {timestamp}*
//! [*Total pages: {n}*]
//!
//! ---
//!
//! [### Page {n}]          (multi-page only)
//! {blocks}
//! [---]                   (between pages only)
//!
//! ---
//! *{math viewer note}*
//! ```
//!
//! Block formatting depends only on the block type: `equation` content is
//! already math markup and goes out verbatim, `header`/`footer` are set in
//! emphasis, everything else is a plain paragraph. Blocks without visible
//! content are dropped without a placeholder.

use crate::config::Language;
use crate::error::Ocr2MdError;
use crate::output::{ContentBlock, Document, BLOCK_FOOTER, BLOCK_HEADER};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

const PAGE_SEPARATOR: &str = "\n---\n\n";

/// Mode tag embedded in single-image output filenames.
pub const SINGLE_TAG: &str = "[OCR]";
/// Mode tag embedded in multi-page output filenames.
pub const MULTIPAGE_TAG: &str = "[OCR_Multipage]";

/// Localised labels of the report.
struct Labels {
    title: &'static str,
    multipage_suffix: &'static str,
    generated_at: &'static str,
    total_pages: &'static str,
    math_note: &'static str,
}

impl Labels {
    fn for_language(lang: Language) -> &'static Labels {
        match lang {
            Language::En => &EN_LABELS,
            Language::Zh => &ZH_LABELS,
        }
    }
}

fn page_heading(lang: Language, page_num: usize) -> String {
    match lang {
        Language::En => format!("### Page {page_num}\n\n"),
        Language::Zh => format!("### 第 {page_num} 页\n\n"),
    }
}

static EN_LABELS: Labels = Labels {
    title: "OCR Results",
    multipage_suffix: " (Multi-page Document)",
    generated_at: "Generated at",
    total_pages: "Total pages",
    math_note: "This document contains mathematical formulas. Please ensure your viewing \
environment supports MathJax or KaTeX for proper rendering",
};

static ZH_LABELS: Labels = Labels {
    title: "OCR识别结果",
    multipage_suffix: " (多页文档)",
    generated_at: "生成时间",
    total_pages: "总页数",
    math_note: "本文档包含数学公式，如需正确渲染请确保查看环境支持MathJax或KaTeX",
};

/// Render one page's blocks.
///
/// Each emitted block is followed by a blank line. Blocks whose trimmed
/// content is empty are skipped.
pub fn render_blocks(blocks: &[ContentBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        let Some(text) = block.text() else {
            continue;
        };
        match block.block_type.as_str() {
            BLOCK_HEADER | BLOCK_FOOTER => {
                out.push('*');
                out.push_str(text);
                out.push('*');
            }
            // Equations are already math markup; plain paragraphs need nothing.
            _ => out.push_str(text),
        }
        out.push_str("\n\n");
    }
    out
}

/// Render a full report for `doc`.
///
/// `original_name` is the source file stem; `generated_at` is stamped into
/// the header.
pub fn render_document(
    doc: &Document,
    original_name: &str,
    generated_at: &NaiveDateTime,
    lang: Language,
) -> String {
    let labels = Labels::for_language(lang);
    let mut out = String::new();

    out.push_str(&format!("## {} - {}", labels.title, original_name));
    if doc.is_multipage() {
        out.push_str(labels.multipage_suffix);
    }
    out.push('\n');

    out.push_str(&format!(
        "*{}: {}*\n",
        labels.generated_at,
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));

    match doc {
        Document::Single(blocks) => {
            out.push_str(PAGE_SEPARATOR);
            out.push_str(&render_blocks(blocks));
        }
        Document::Multi(pages) => {
            out.push_str(&format!("*{}: {}*\n", labels.total_pages, pages.len()));
            out.push_str(PAGE_SEPARATOR);
            for (i, blocks) in pages.iter().enumerate() {
                let page_num = i + 1;
                out.push_str(&page_heading(lang, page_num));
                out.push_str(&render_blocks(blocks));
                if page_num < pages.len() {
                    out.push_str(PAGE_SEPARATOR);
                }
            }
        }
    }

    out.push_str("\n---\n");
    out.push('*');
    out.push_str(labels.math_note);
    out.push('*');
    out
}

/// File stem of `path`, used both in the report header and the output name.
pub fn original_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// Output filename for a report: `{stem}_{tag}_{YYYYmmdd_HHMMSS}.md`.
pub fn output_file_name(stem: &str, multipage: bool, stamp: &NaiveDateTime) -> String {
    let tag = if multipage { MULTIPAGE_TAG } else { SINGLE_TAG };
    format!("{}_{}_{}.md", stem, tag, stamp.format("%Y%m%d_%H%M%S"))
}

/// Upper bound on `_N` suffixes tried before giving up.
const MAX_NAME_ATTEMPTS: usize = 10_000;

/// Write `markdown` into `dir` under the report filename.
///
/// The directory is created if missing. The file is opened with
/// `create_new`, so an existing report is never overwritten: when the name
/// is taken, `_1`, `_2`, … is inserted before `.md`.
pub async fn write_markdown(
    dir: &Path,
    stem: &str,
    multipage: bool,
    stamp: &NaiveDateTime,
    markdown: &str,
) -> Result<PathBuf, Ocr2MdError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Ocr2MdError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let base = output_file_name(stem, multipage, stamp);
    let base_stem = base.trim_end_matches(".md");

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            base.clone()
        } else {
            format!("{base_stem}_{attempt}.md")
        };
        let path = dir.join(&name);

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!("Output name taken, trying next: {}", path.display());
                continue;
            }
            Err(e) => return Err(Ocr2MdError::OutputWriteFailed { path, source: e }),
        };

        fill_or_discard(&path, file, markdown).await?;

        info!("Markdown saved to {}", path.display());
        return Ok(path);
    }

    Err(Ocr2MdError::Internal(format!(
        "no free output filename for '{base}' after {MAX_NAME_ATTEMPTS} attempts"
    )))
}

/// Write the whole report into the freshly created `path`. On failure the
/// partial file is removed.
async fn fill_or_discard<W>(path: &Path, mut out: W, markdown: &str) -> Result<(), Ocr2MdError>
where
    W: AsyncWrite + Unpin,
{
    let written = match out.write_all(markdown.as_bytes()).await {
        Ok(()) => out.flush().await,
        Err(e) => Err(e),
    };
    let Err(source) = written else {
        return Ok(());
    };

    drop(out);
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Could not remove partial report {}: {}", path.display(), e);
    }
    Err(Ocr2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(15, 9, 26)
            .unwrap()
    }

    fn blocks(items: &[(&str, &str)]) -> Vec<ContentBlock> {
        items
            .iter()
            .map(|(t, c)| ContentBlock::new(*t, *c))
            .collect()
    }

    #[test]
    fn example_single_page_blocks() {
        let page = blocks(&[("text", "Hello"), ("equation", "x^2"), ("footer", " ")]);
        let md = render_document(&Document::Single(page), "scan", &stamp(), Language::En);
        assert!(md.contains("Hello\n\n"));
        assert!(md.contains("x^2\n\n"));
        assert!(!md.contains("**"), "blank footer must not leave an empty emphasis");
    }

    #[test]
    fn blank_and_missing_content_is_skipped_in_order() {
        let mut page = blocks(&[("text", "one"), ("text", "   "), ("title", "two")]);
        page.push(ContentBlock::empty("image"));
        page.push(ContentBlock::new("text", "three"));
        assert_eq!(render_blocks(&page), "one\n\ntwo\n\nthree\n\n");
    }

    #[test]
    fn header_and_footer_are_emphasised() {
        let page = blocks(&[("header", "  Journal  "), ("footer", "Page 3")]);
        assert_eq!(render_blocks(&page), "*Journal*\n\n*Page 3*\n\n");
    }

    #[test]
    fn other_types_are_plain_and_equations_verbatim() {
        let page = blocks(&[
            ("title", "Intro"),
            ("table", "<table></table>"),
            ("equation", "$$\n\\frac{a}{b}\n$$"),
        ]);
        assert_eq!(
            render_blocks(&page),
            "Intro\n\n<table></table>\n\n$$\n\\frac{a}{b}\n$$\n\n"
        );
    }

    #[test]
    fn single_page_layout() {
        let page = blocks(&[("text", "Hello")]);
        let md = render_document(&Document::Single(page), "scan", &stamp(), Language::En);
        assert_eq!(
            md,
            "## OCR Results - scan\n\
             *Generated at: 2025-03-14 15:09:26*\n\
             \n---\n\n\
             Hello\n\n\
             \n---\n\
             *This document contains mathematical formulas. Please ensure your viewing \
environment supports MathJax or KaTeX for proper rendering*"
        );
    }

    #[test]
    fn multipage_headings_and_separators() {
        let doc = Document::Multi(vec![
            blocks(&[("text", "a")]),
            blocks(&[("text", "b")]),
            blocks(&[("text", "c")]),
        ]);
        let md = render_document(&doc, "paper", &stamp(), Language::En);

        assert!(md.starts_with("## OCR Results - paper (Multi-page Document)\n"));
        assert!(md.contains("*Total pages: 3*\n"));

        let p1 = md.find("### Page 1\n\n").unwrap();
        let p2 = md.find("### Page 2\n\n").unwrap();
        let p3 = md.find("### Page 3\n\n").unwrap();
        assert!(p1 < p2 && p2 < p3);
        assert_eq!(md.matches("### Page ").count(), 3);

        assert!(md.contains("a\n\n\n---\n\n### Page 2"));
        assert!(md.contains("b\n\n\n---\n\n### Page 3"));
        // After the last page only the trailer rule follows.
        assert!(md.contains("c\n\n\n---\n*This document"));
    }

    #[test]
    fn single_and_first_multipage_share_block_lines() {
        let page = blocks(&[("text", "Hello"), ("header", "H"), ("equation", "x^2")]);
        let single = render_document(&Document::Single(page.clone()), "d", &stamp(), Language::En);
        let multi = render_document(&Document::Multi(vec![page.clone()]), "d", &stamp(), Language::En);

        let body = render_blocks(&page);
        let single_body = single
            .split_once("\n---\n\n")
            .map(|(_, rest)| rest)
            .unwrap();
        let multi_body = multi
            .split_once("### Page 1\n\n")
            .map(|(_, rest)| rest)
            .unwrap();
        assert!(single_body.starts_with(&body));
        assert!(multi_body.starts_with(&body));
        assert!(!single.contains("Total pages"));
        assert!(!single.contains("### Page"));
    }

    #[test]
    fn chinese_labels() {
        let doc = Document::Multi(vec![blocks(&[("text", "内容")])]);
        let md = render_document(&doc, "论文", &stamp(), Language::Zh);
        assert!(md.starts_with("## OCR识别结果 - 论文 (多页文档)\n"));
        assert!(md.contains("*生成时间: 2025-03-14 15:09:26*\n"));
        assert!(md.contains("*总页数: 1*\n"));
        assert!(md.contains("### 第 1 页\n\n内容\n\n"));
        assert!(md.ends_with("KaTeX*"));
    }

    #[test]
    fn empty_multipage_document_has_no_headings() {
        let md = render_document(&Document::Multi(vec![]), "empty", &stamp(), Language::En);
        assert!(md.contains("*Total pages: 0*"));
        assert!(!md.contains("### Page"));
    }

    #[test]
    fn file_names() {
        assert_eq!(
            output_file_name("scan", false, &stamp()),
            "scan_[OCR]_20250314_150926.md"
        );
        assert_eq!(
            output_file_name("paper", true, &stamp()),
            "paper_[OCR_Multipage]_20250314_150926.md"
        );
    }

    #[test]
    fn stem_of_paths() {
        assert_eq!(original_stem(Path::new("/tmp/My Scan.PNG")), "My Scan");
        assert_eq!(original_stem(Path::new("archive.tar.pdf")), "archive.tar");
    }

    #[tokio::test]
    async fn write_creates_dir_and_disambiguates() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("output");

        let first = write_markdown(&dir, "scan", false, &stamp(), "one").await.unwrap();
        let second = write_markdown(&dir, "scan", false, &stamp(), "two").await.unwrap();
        let third = write_markdown(&dir, "scan", false, &stamp(), "three").await.unwrap();

        assert_eq!(first.file_name().unwrap(), "scan_[OCR]_20250314_150926.md");
        assert_eq!(second.file_name().unwrap(), "scan_[OCR]_20250314_150926_1.md");
        assert_eq!(third.file_name().unwrap(), "scan_[OCR]_20250314_150926_2.md");
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "two");
    }

    /// Writer that fails every write, as a full disk would.
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::Error::other("no space left on device")))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn failed_write_leaves_no_partial_report() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("scan_[OCR]_20250314_150926.md");
        std::fs::write(&path, "half a rep").unwrap();

        let err = fill_or_discard(&path, FullDisk, "full report").await.unwrap_err();
        assert!(matches!(err, Ocr2MdError::OutputWriteFailed { .. }), "got {err:?}");
        assert!(!path.exists());
    }
}
