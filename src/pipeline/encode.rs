//! Image encoding for vision requests: `DynamicImage` → base64 PNG `ImageData`.
//!
//! PNG keeps glyph edges intact; JPEG artefacts around small text and
//! formula subscripts measurably hurt recognition on crops.

use crate::error::Ocr2MdError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode `img` as PNG bytes.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Wrap `img` as a high-detail PNG attachment.
///
/// `stage` names the request the image belongs to and only appears in
/// error messages.
pub fn encode_image(img: &DynamicImage, stage: &str) -> Result<ImageData, Ocr2MdError> {
    let buf = png_bytes(img).map_err(|e| Ocr2MdError::ExtractionFailed {
        stage: stage.to_string(),
        detail: format!("PNG encoding failed: {e}"),
    })?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} {} image → {} bytes base64",
        img.width(),
        img.height(),
        stage,
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
