//! CLI binary for edgequake-ocr2md.
//!
//! A thin shim over the library crate that maps CLI flags to `OcrConfig`,
//! runs one file through an `OcrSession` and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ocr2md::{
    classify, ErrorKind, InputKind, Language, Ocr2MdError, OcrConfig, OcrSession, ProcessOutcome,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while the input is prepared, then
/// a page bar once the page count is known.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
    status: Mutex<Vec<String>>,
}

impl CliProgressCallback {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Self {
            bar,
            page_started: Mutex::new(None),
            status: Mutex::new(Vec::new()),
        }
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for CliProgressCallback {
    fn on_file_detected(&self, path: &Path, kind: InputKind) {
        let what = match kind {
            InputKind::Pdf => "PDF",
            InputKind::Image => "image",
        };
        self.bar.set_message(format!("{what} {}", path.display()));
    }

    fn on_pdf_rasterized(&self, _dir: &Path, page_count: usize) {
        self.activate_bar(page_count);
        self.bar.println(format!(
            "{} Rendered {} pages",
            green("◆"),
            bold(&page_count.to_string())
        ));
    }

    fn on_page_start(&self, page_num: usize, total: usize) {
        if total == 1 && self.bar.length() == Some(0) {
            self.activate_bar(1);
        }
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, block_count: usize) {
        let elapsed_ms = self
            .page_started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{block_count:>4} blocks")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_markdown_written(&self, _path: &Path) {
        self.finish();
    }

    fn on_status(&self, line: &str) {
        if let Ok(mut lines) = self.status.lock() {
            lines.push(line.to_string());
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scan an image
  ocr2md receipt.jpg

  # Multi-page PDF, Chinese labels, custom output directory
  ocr2md --lang zh --output-dir reports paper.pdf

  # MinerU2.5 served by vLLM on an OpenAI-compatible endpoint
  OPENAI_BASE_URL=http://localhost:8000/v1 OPENAI_API_KEY=none \
    ocr2md --provider openai --model MinerU2.5-2509-1.2B paper.pdf

  # Keep the rendered page images
  ocr2md --keep-pages pages/ --dpi 300 paper.pdf

  # Machine-readable result
  ocr2md --json scan.png > result.json

SUPPORTED INPUT:
  .pdf                     rasterised page by page, multi-page report
  .jpg .jpeg .png .bmp     single-page report

OUTPUT:
  {output-dir}/{stem}_[OCR]_{YYYYmmdd_HHMMSS}.md            images
  {output-dir}/{stem}_[OCR_Multipage]_{YYYYmmdd_HHMMSS}.md  PDFs
  An existing file is never overwritten; _1, _2, … is appended instead.

EXIT CODES:
  0  success
  1  upstream failure (rasterisation, model request, disk)
  2  unsupported input (format, missing file, bad flags)
  3  capability missing (pdfium, vision provider)

ENVIRONMENT VARIABLES:
  EDGEQUAKE_LLM_PROVIDER  Provider used when --provider is not given
  EDGEQUAKE_MODEL         Model used together with EDGEQUAKE_LLM_PROVIDER
  OPENAI_API_KEY          Provider API keys, read by the provider factory
  PDFIUM_LIB_PATH         Directory (or file) of an existing libpdfium
  RUST_LOG                Overrides the log filter
"#;

/// Convert scanned images and PDFs to Markdown with a vision OCR model.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2md",
    version,
    about = "Convert scanned images and PDFs to Markdown with a vision OCR model",
    long_about = "Convert images (jpg, jpeg, png, bmp) and PDF documents to Markdown using a \
MinerU-style two-step vision model (layout detection, then per-region recognition). Works with \
any provider edgequake-llm supports, including OpenAI-compatible servers such as vLLM.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or image file to process.
    input: PathBuf,

    /// Directory the Markdown report is written to.
    #[arg(short, long, env = "OCR2MD_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Rendering DPI for PDF pages (72–600).
    #[arg(long, env = "OCR2MD_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Vision provider: openai, anthropic, gemini, ollama, …
    #[arg(long, env = "OCR2MD_PROVIDER")]
    provider: Option<String>,

    /// Model ID. Default: MinerU2.5-2509-1.2B.
    #[arg(long, env = "OCR2MD_MODEL")]
    model: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "OCR2MD_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max output tokens per request.
    #[arg(long, env = "OCR2MD_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Square size in pixels of the image sent for layout detection.
    #[arg(long, env = "OCR2MD_LAYOUT_SIZE", default_value_t = 1036)]
    layout_size: u32,

    /// Label language of the report and status messages.
    #[arg(long, env = "OCR2MD_LANG", value_enum, default_value = "en")]
    lang: LangArg,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "OCR2MD_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "OCR2MD_PASSWORD")]
    password: Option<String>,

    /// Keep rendered page images in this directory instead of a temporary one.
    #[arg(long, env = "OCR2MD_KEEP_PAGES")]
    keep_pages: Option<PathBuf>,

    /// Print the full outcome as JSON instead of the output path.
    #[arg(long, env = "OCR2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR2MD_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LangArg {
    En,
    Zh,
}

impl From<LangArg> for Language {
    fn from(v: LangArg) -> Self {
        match v {
            LangArg::En => Language::En,
            LangArg::Zh => Language::Zh,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar and the final status lines carry the normal
    // feedback, so library logs stay at warn unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);

    let result = run(&cli, progress.as_ref()).await;
    if let Some(ref p) = progress {
        p.finish();
    }

    match result {
        Ok(outcome) => {
            report(&cli, &outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let kind = e
                .downcast_ref::<Ocr2MdError>()
                .map(Ocr2MdError::kind)
                .unwrap_or(ErrorKind::UpstreamFailure);
            // What ran before the failure; the last line restates the error.
            if let Some(ref p) = progress {
                if let Ok(lines) = p.status.lock() {
                    for line in lines.iter().take(lines.len().saturating_sub(1)) {
                        eprintln!("{}", dim(line));
                    }
                }
            }
            eprintln!("{} [{}] {:#}", red("✘"), kind, e);
            ExitCode::from(exit_code(kind))
        }
    }
}

async fn run(cli: &Cli, progress: Option<&CliProgressCallback>) -> Result<ProcessOutcome> {
    // Reject unusable input before any provider is contacted.
    classify(&cli.input)?;

    let config = build_config(cli)?;
    let mut session = OcrSession::new(config);
    session
        .load_model()
        .context("Failed to set up the vision provider")?;

    let progress = progress.map(|p| p as &dyn ProgressCallback);
    session
        .process_file(&cli.input, progress)
        .await
        .with_context(|| format!("Failed to process {}", cli.input.display()))
}

/// Print the outcome: status log to stderr, result to stdout.
fn report(cli: &Cli, outcome: &ProcessOutcome) {
    if cli.json {
        match serde_json::to_string_pretty(outcome) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("{} Failed to serialise outcome: {e}", red("✘")),
        }
        return;
    }

    if !cli.quiet {
        for line in &outcome.status {
            eprintln!("{line}");
        }
        eprintln!(
            "{}  {} pages  {} blocks  {}ms",
            green("✔"),
            outcome.page_count,
            outcome.document.block_count(),
            outcome.duration_ms,
        );
    }
    println!("{}", outcome.output_path.display());
}

/// Map CLI args to `OcrConfig`.
fn build_config(cli: &Cli) -> Result<OcrConfig> {
    let mut builder = OcrConfig::builder()
        .dpi(cli.dpi)
        .output_dir(&cli.output_dir)
        .language(cli.lang.into())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .layout_image_size(cli.layout_size);

    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p);
    }
    if let Some(ref m) = cli.model {
        builder = builder.model(m);
    }
    if let Some(ref dir) = cli.pdfium_lib {
        builder = builder.pdfium_lib_dir(dir);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(ref dir) = cli.keep_pages {
        builder = builder.raster_dir(dir);
    }

    builder.build().context("Invalid configuration")
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::UpstreamFailure => 1,
        ErrorKind::UnsupportedInput => 2,
        ErrorKind::CapabilityMissing => 3,
    }
}
