//! Input dispatch: one file in, one Markdown report out.
//!
//! [`process_file`] classifies the input by extension and drives the
//! matching path:
//!
//! ```text
//! .pdf ──▶ rasterize ──▶ extract page 1..N ──▶ render (multi-page) ──▶ write
//! image ─────────────────▶ extract ──────────▶ render (single-page) ─▶ write
//! ```
//!
//! Pages are extracted strictly in order, one at a time. The first failure
//! aborts the run; the temporary page directory is removed either way.

use crate::config::OcrConfig;
use crate::error::Ocr2MdError;
use crate::markdown::{original_stem, render_document, write_markdown};
use crate::output::{Document, Page, ProcessOutcome};
use crate::pipeline::extract::{extract_image, ExtractionClient};
use crate::pipeline::input::{classify, validate, InputKind};
use crate::pipeline::rasterize::{rasterize_to_dir, PageRasterizer};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::status::StatusLog;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Process one PDF or image file and write its Markdown report.
///
/// # Arguments
/// * `input`: path to a `.pdf`, `.jpg`, `.jpeg`, `.png` or `.bmp` file
/// * `client`: performs the two-step extraction for each image
/// * `rasterizer`: renders PDF pages; unused for image input
/// * `config`: DPI, output directory, label language, …
/// * `progress`: optional event sink
///
/// # Errors
/// Any failure aborts the run and no report is written. Unsupported
/// extensions are rejected before the file is touched. The status lines
/// written up to the failure, plus one describing the error, have already
/// been delivered through [`ProgressCallback::on_status`].
pub async fn process_file(
    input: &Path,
    client: &dyn ExtractionClient,
    rasterizer: Arc<dyn PageRasterizer>,
    config: &OcrConfig,
    progress: Option<&dyn ProgressCallback>,
) -> Result<ProcessOutcome, Ocr2MdError> {
    let noop = NoopProgressCallback;
    let progress = progress.unwrap_or(&noop);
    let mut status = StatusLog::new(config.language, progress);

    match run(input, client, rasterizer, config, progress, &mut status).await {
        Ok(mut outcome) => {
            outcome.status = status.into_lines();
            Ok(outcome)
        }
        Err(e) => {
            status.processing_error(&e);
            Err(e)
        }
    }
}

async fn run(
    input: &Path,
    client: &dyn ExtractionClient,
    rasterizer: Arc<dyn PageRasterizer>,
    config: &OcrConfig,
    progress: &dyn ProgressCallback,
    status: &mut StatusLog<'_>,
) -> Result<ProcessOutcome, Ocr2MdError> {
    let total_start = Instant::now();

    // ── Step 1: Classify ─────────────────────────────────────────────────
    let kind = classify(input)?;
    validate(input, kind)?;
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    status.file_detected(&file_name);
    progress.on_file_detected(input, kind);
    debug!("Dispatching {} via {}", input.display(), client.name());

    // ── Step 2: Extract ──────────────────────────────────────────────────
    let document = match kind {
        InputKind::Pdf => process_pdf(input, client, rasterizer, config, progress, status).await?,
        InputKind::Image => process_image(input, client, progress, status).await?,
    };

    // ── Step 3: Render and write ─────────────────────────────────────────
    let stamp = chrono::Local::now().naive_local();
    let stem = original_stem(input);
    let markdown = render_document(&document, &stem, &stamp, config.language);
    let output_path = write_markdown(
        &config.output_dir,
        &stem,
        document.is_multipage(),
        &stamp,
        &markdown,
    )
    .await?;
    progress.on_markdown_written(&output_path);
    status.ocr_completed(&output_path);

    let duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Processed {} ({} pages, {} blocks) in {}ms",
        input.display(),
        document.page_count(),
        document.block_count(),
        duration_ms
    );

    Ok(ProcessOutcome {
        markdown,
        output_path,
        page_count: document.page_count(),
        document,
        status: Vec::new(),
        duration_ms,
    })
}

/// Synchronous wrapper around [`process_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_file_sync(
    input: &Path,
    client: &dyn ExtractionClient,
    rasterizer: Arc<dyn PageRasterizer>,
    config: &OcrConfig,
    progress: Option<&dyn ProgressCallback>,
) -> Result<ProcessOutcome, Ocr2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Ocr2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_file(input, client, rasterizer, config, progress))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn process_pdf(
    input: &Path,
    client: &dyn ExtractionClient,
    rasterizer: Arc<dyn PageRasterizer>,
    config: &OcrConfig,
    progress: &dyn ProgressCallback,
    status: &mut StatusLog<'_>,
) -> Result<Document, Ocr2MdError> {
    status.pdf_detected();

    // Owns the temporary directory; dropping it on any `?` below cleans up.
    let rasterized =
        rasterize_to_dir(rasterizer, input, config.raster_dir.as_deref(), config.dpi).await?;
    let total = rasterized.len();
    status.pdf_converted(total);
    progress.on_pdf_rasterized(rasterized.dir(), total);

    let mut pages: Vec<Page> = Vec::with_capacity(total);
    for (i, page_path) in rasterized.pages.iter().enumerate() {
        let page_num = i + 1;
        progress.on_page_start(page_num, total);
        let blocks = extract_image(page_path, client).await?;
        progress.on_page_complete(page_num, total, blocks.len());
        status.page_processed(page_num);
        pages.push(blocks);
    }

    rasterized.close()?;
    Ok(Document::Multi(pages))
}

async fn process_image(
    input: &Path,
    client: &dyn ExtractionClient,
    progress: &dyn ProgressCallback,
    status: &mut StatusLog<'_>,
) -> Result<Document, Ocr2MdError> {
    status.image_detected();
    progress.on_page_start(1, 1);
    let blocks = extract_image(input, client).await?;
    progress.on_page_complete(1, 1, blocks.len());
    status.image_processed();
    Ok(Document::Single(blocks))
}
