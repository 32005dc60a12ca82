//! Input classification: decide which pipeline path a file takes.
//!
//! The decision is made from the file extension alone (case-insensitive),
//! before anything is read. A `.pdf` file is then checked for the `%PDF`
//! magic bytes so callers get a meaningful error rather than a pdfium
//! failure.

use crate::error::Ocr2MdError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Image extensions accepted for single-page processing.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Which pipeline path an input takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Rasterise, extract each page, render multi-page.
    Pdf,
    /// Extract once, render single-page.
    Image,
}

/// Lower-cased extension of `path` including the leading dot, or `""`.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Classify `path` by extension.
pub fn classify(path: &Path) -> Result<InputKind, Ocr2MdError> {
    let ext = dotted_extension(path);
    let bare = ext.trim_start_matches('.');

    if bare == "pdf" {
        Ok(InputKind::Pdf)
    } else if IMAGE_EXTENSIONS.contains(&bare) {
        Ok(InputKind::Image)
    } else {
        Err(Ocr2MdError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: ext,
        })
    }
}

/// Check that `path` exists and, for PDFs, starts with `%PDF`.
pub fn validate(path: &Path, kind: InputKind) -> Result<(), Ocr2MdError> {
    if !path.is_file() {
        return Err(Ocr2MdError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    if kind == InputKind::Pdf {
        let io_err = |e| Ocr2MdError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        let mut head = Vec::with_capacity(4);
        std::fs::File::open(path)
            .map_err(io_err)?
            .take(4)
            .read_to_end(&mut head)
            .map_err(io_err)?;
        // Files shorter than the magic are padded with zeros in the report.
        if head != b"%PDF" {
            let mut magic = [0u8; 4];
            magic[..head.len()].copy_from_slice(&head);
            return Err(Ocr2MdError::NotAPdf {
                path: path.to_path_buf(),
                magic,
            });
        }
    }

    debug!("Validated {:?} input: {}", kind, path.display());
    Ok(())
}
