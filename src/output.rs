//! Data model shared by the pipeline stages and returned to callers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Block type whose content is already math markup and is emitted verbatim.
pub const BLOCK_EQUATION: &str = "equation";
/// Running page header.
pub const BLOCK_HEADER: &str = "header";
/// Running page footer.
pub const BLOCK_FOOTER: &str = "footer";
/// Table region.
pub const BLOCK_TABLE: &str = "table";
/// Pure picture region; never has text content.
pub const BLOCK_IMAGE: &str = "image";
/// Container around list-item text regions; the items carry the text.
pub const BLOCK_LIST: &str = "list";
/// Container around one or more `equation` regions.
pub const BLOCK_EQUATION_BLOCK: &str = "equation_block";

/// One typed unit of recognised page content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Free-form tag, e.g. `text`, `title`, `equation`, `header`, `footer`.
    #[serde(rename = "type")]
    pub block_type: String,

    /// Recognised content. `None` for regions that carry no text.
    #[serde(default)]
    pub content: Option<String>,

    /// Region on the page as `[x1, y1, x2, y2]`, each in `0.0..=1.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f32; 4]>,
}

impl ContentBlock {
    /// Block with text content and no position.
    pub fn new(block_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            block_type: block_type.into(),
            content: Some(content.into()),
            bbox: None,
        }
    }

    /// Block with no content.
    pub fn empty(block_type: impl Into<String>) -> Self {
        Self {
            block_type: block_type.into(),
            content: None,
            bbox: None,
        }
    }

    pub fn with_bbox(mut self, bbox: [f32; 4]) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Trimmed content, or `None` when absent or whitespace-only.
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Ordered blocks extracted from one image.
pub type Page = Vec<ContentBlock>;

/// Everything extracted during one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "pages", rename_all = "snake_case")]
pub enum Document {
    /// A single image.
    Single(Page),
    /// One page per rasterised PDF page, in page order.
    Multi(Vec<Page>),
}

impl Document {
    pub fn is_multipage(&self) -> bool {
        matches!(self, Document::Multi(_))
    }

    pub fn page_count(&self) -> usize {
        match self {
            Document::Single(_) => 1,
            Document::Multi(pages) => pages.len(),
        }
    }

    /// Total number of blocks across all pages.
    pub fn block_count(&self) -> usize {
        match self {
            Document::Single(blocks) => blocks.len(),
            Document::Multi(pages) => pages.iter().map(Vec::len).sum(),
        }
    }
}

/// Result of one processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutcome {
    /// The rendered Markdown, identical to the file contents.
    pub markdown: String,
    /// Where the Markdown was written.
    pub output_path: PathBuf,
    /// Number of pages processed; 1 for image input.
    pub page_count: usize,
    /// Extracted blocks.
    pub document: Document,
    /// Human-readable status log, one entry per processing step.
    pub status: Vec<String>,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_trims_and_filters_blank() {
        assert_eq!(ContentBlock::new("text", "  hi \n").text(), Some("hi"));
        assert_eq!(ContentBlock::new("text", " \t\n").text(), None);
        assert_eq!(ContentBlock::empty("image").text(), None);
    }

    #[test]
    fn block_serialises_type_field() {
        let b = ContentBlock::new("equation", "x^2");
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["type"], "equation");
        assert_eq!(json["content"], "x^2");
        assert!(json.get("bbox").is_none());
    }

    #[test]
    fn block_deserialises_without_content() {
        let b: ContentBlock = serde_json::from_str(r#"{"type":"image"}"#).unwrap();
        assert_eq!(b.block_type, "image");
        assert!(b.content.is_none());
    }

    #[test]
    fn document_counts() {
        let single = Document::Single(vec![ContentBlock::new("text", "a")]);
        assert_eq!(single.page_count(), 1);
        assert!(!single.is_multipage());

        let multi = Document::Multi(vec![
            vec![ContentBlock::new("text", "a"), ContentBlock::new("text", "b")],
            vec![],
            vec![ContentBlock::new("text", "c")],
        ]);
        assert_eq!(multi.page_count(), 3);
        assert_eq!(multi.block_count(), 3);
        assert!(multi.is_multipage());
    }
}
