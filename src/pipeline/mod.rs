//! Pipeline stages for image/PDF-to-Markdown processing.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested on its own and the two seams ([`rasterize::PageRasterizer`],
//! [`extract::ExtractionClient`]) can be swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ rasterize ──▶ extract ──▶ llm ──▶ layout ──▶ encode ──▶ postprocess
//! (ext)     (pdfium)      (image)     (VLM)   (regions)  (base64)   (cleanup)
//! ```
//!
//! 1. [`input`]: classify by extension, check the file exists
//! 2. [`rasterize`]: render PDF pages to `page_NNN.png`; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`extract`]: load one image and hand it to the extraction client
//! 4. [`llm`]: the two-step extraction against a vision provider;
//!    the only stage with network I/O
//! 5. [`layout`]: parse the region list and crop regions from the page
//! 6. [`encode`]: PNG-encode and base64-wrap images for the request body
//! 7. [`postprocess`]: deterministic per-block text cleanup, with
//!    [`table`] turning OTSL table answers into HTML

pub mod encode;
pub mod extract;
pub mod input;
pub mod layout;
pub mod llm;
pub mod postprocess;
pub mod rasterize;
pub mod table;
