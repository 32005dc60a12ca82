//! # edgequake-ocr2md
//!
//! Turn scanned images and PDF documents into Markdown with a MinerU-style
//! vision model.
//!
//! ## Why this crate?
//!
//! Document-parsing VLMs such as MinerU2.5 answer a small set of task
//! prompts: first "where are the regions and what are they", then "read
//! this region". This crate does the plumbing around that protocol: it
//! rasterises PDFs, runs the two-step extraction per page through any
//! provider `edgequake-llm` can reach, and writes one Markdown report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Classify  extension → PDF or image (jpg, jpeg, png, bmp)
//!  ├─ 2. Render    PDF pages → page_NNN.png via pdfium (spawn_blocking)
//!  ├─ 3. Layout    page → typed regions on a 0–1000 grid
//!  ├─ 4. Read      each region crop → text / table / LaTeX
//!  ├─ 5. Polish    per-block cleanup (fences, whitespace, $$ … $$)
//!  └─ 6. Output    {stem}_[OCR]_{timestamp}.md in the output directory
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ocr2md::{OcrConfig, OcrSession};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // vLLM serving MinerU2.5 behind an OpenAI-compatible endpoint
//!     let config = OcrConfig::builder()
//!         .provider_name("openai")
//!         .model("MinerU2.5-2509-1.2B")
//!         .build()?;
//!     let mut session = OcrSession::new(config);
//!     session.load_model()?;
//!
//!     let outcome = session.process_file(Path::new("scan.pdf"), None).await?;
//!     for line in &outcome.status {
//!         eprintln!("{line}");
//!     }
//!     println!("{}", outcome.output_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2md` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ocr2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod markdown;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
mod status;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Language, OcrConfig, OcrConfigBuilder};
pub use convert::{process_file, process_file_sync};
pub use error::{ErrorKind, Ocr2MdError};
pub use markdown::{render_blocks, render_document};
pub use output::{ContentBlock, Document, Page, ProcessOutcome};
pub use pipeline::extract::{extract_image, ExtractionClient};
pub use pipeline::input::{classify, InputKind};
pub use pipeline::llm::VlmExtractionClient;
pub use pipeline::rasterize::{rasterize_to_dir, PageRasterizer, PdfiumRasterizer, RasterizedPages};
pub use progress::{NoopProgressCallback, ProgressCallback};
pub use session::OcrSession;
