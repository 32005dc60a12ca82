//! Task prompts for the two-step extraction protocol.
//!
//! MinerU-style document models are fine-tuned on a handful of short task
//! prompts rather than free-form instructions: one for layout detection and
//! one per recognition task. Sending anything else degrades output badly, so
//! every prompt lives here and nowhere else.

use crate::output::{BLOCK_EQUATION, BLOCK_EQUATION_BLOCK, BLOCK_IMAGE, BLOCK_LIST, BLOCK_TABLE};

/// Step one: list every region on the page with its type.
pub const LAYOUT_PROMPT: &str = "\nLayout Detection:";

/// Step two, prose regions (text, titles, captions, headers, footers, …).
pub const TEXT_PROMPT: &str = "\nText Recognition:";

/// Step two, table regions. The model answers with HTML/OTSL table markup.
pub const TABLE_PROMPT: &str = "\nTable Recognition:";

/// Step two, display-formula regions. The model answers with LaTeX.
pub const FORMULA_PROMPT: &str = "\nFormula Recognition:";

/// Neutral system message; the task prompt carries the instruction.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Recognition prompt for a region of `block_type`, or `None` when the
/// region has no text of its own: pictures, and the `list` /
/// `equation_block` containers whose children are recognised separately.
pub fn recognition_prompt(block_type: &str) -> Option<&'static str> {
    match block_type {
        BLOCK_IMAGE | BLOCK_LIST | BLOCK_EQUATION_BLOCK => None,
        BLOCK_TABLE => Some(TABLE_PROMPT),
        BLOCK_EQUATION => Some(FORMULA_PROMPT),
        _ => Some(TEXT_PROMPT),
    }
}
