//! Error types for the edgequake-ocr2md library.
//!
//! Every failure is an [`Ocr2MdError`] variant carrying the context a user
//! needs to act on it. Callers that only care about the *class* of failure
//! call [`Ocr2MdError::kind`], which folds the variants into the three-way
//! [`ErrorKind`] classification:
//!
//! * [`ErrorKind::CapabilityMissing`]: the environment lacks something the
//!   run needs (pdfium library, a configured vision provider).
//! * [`ErrorKind::UnsupportedInput`]: the request itself is wrong (unknown
//!   extension, missing file, model not loaded). Fix the input and retry.
//! * [`ErrorKind::UpstreamFailure`]: a dependency failed while working
//!   (rasterisation, image decoding, extraction, disk writes).
//!
//! There are no page-level errors: a failure on any page aborts the whole
//! document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-ocr2md library.
#[derive(Debug, Error)]
pub enum Ocr2MdError {
    // ── Capability errors ─────────────────────────────────────────────────
    /// Could not bind to a pdfium library, so PDF input cannot be handled.
    #[error(
        "PDF support is unavailable: failed to bind to pdfium: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/dir containing libpdfium.\n\
  • Pass --pdfium-lib <DIR>.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumUnavailable(String),

    /// The vision provider is not initialised (missing API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Extension is not one of pdf, jpg, jpeg, png, bmp.
    #[error("Unsupported file format '{extension}' for '{path}'\nSupported: .pdf, .jpg, .jpeg, .png, .bmp")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The file has a `.pdf` extension but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The session was asked to process a file before a model was loaded.
    #[error("No extraction model is loaded. Load the model before processing files.")]
    ModelNotLoaded,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Upstream errors ───────────────────────────────────────────────────
    /// pdfium failed to open or render the document.
    #[error("Rasterisation of '{path}' failed: {detail}")]
    Rasterization { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The image crate could not decode an input image.
    #[error("Failed to load image '{path}': {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A rasterised page could not be written to the page directory.
    #[error("Failed to save page image '{path}': {source}")]
    PageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The extraction client failed for a page or image.
    #[error("Extraction failed ({stage}): {detail}")]
    ExtractionFailed { stage: String, detail: String },

    /// Could not create a directory or save a page image.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`Ocr2MdError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required capability (pdfium, vision provider) is absent.
    CapabilityMissing,
    /// The caller supplied input the pipeline cannot process.
    UnsupportedInput,
    /// A dependency failed while processing.
    UpstreamFailure,
}

impl ErrorKind {
    /// `true` when the user can fix the problem by changing the request.
    pub fn is_user_error(self) -> bool {
        self == ErrorKind::UnsupportedInput
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::CapabilityMissing => "capability missing",
            ErrorKind::UnsupportedInput => "unsupported input",
            ErrorKind::UpstreamFailure => "upstream failure",
        };
        f.write_str(s)
    }
}

impl Ocr2MdError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Ocr2MdError::PdfiumUnavailable(_) | Ocr2MdError::ProviderNotConfigured { .. } => {
                ErrorKind::CapabilityMissing
            }
            Ocr2MdError::UnsupportedFormat { .. }
            | Ocr2MdError::FileNotFound { .. }
            | Ocr2MdError::NotAPdf { .. }
            | Ocr2MdError::ModelNotLoaded
            | Ocr2MdError::InvalidConfig(_) => ErrorKind::UnsupportedInput,
            Ocr2MdError::Rasterization { .. }
            | Ocr2MdError::PasswordRequired { .. }
            | Ocr2MdError::WrongPassword { .. }
            | Ocr2MdError::ImageLoad { .. }
            | Ocr2MdError::PageSave { .. }
            | Ocr2MdError::ExtractionFailed { .. }
            | Ocr2MdError::Io { .. }
            | Ocr2MdError::OutputWriteFailed { .. }
            | Ocr2MdError::Internal(_) => ErrorKind::UpstreamFailure,
        }
    }
}
