//! Extraction seam: one image in, ordered typed blocks out.

use crate::error::Ocr2MdError;
use crate::output::ContentBlock;
use async_trait::async_trait;
use image::DynamicImage;
use std::path::Path;
use tracing::info;

/// A client that turns a page image into content blocks.
///
/// The production implementation is [`crate::pipeline::llm::VlmExtractionClient`];
/// tests and embedders can supply their own.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Detect the page layout, then recognise each region.
    ///
    /// Blocks come back in reading order as reported by the model.
    async fn two_step_extract(&self, image: &DynamicImage)
        -> Result<Vec<ContentBlock>, Ocr2MdError>;
}

/// Load the image at `image_path` and run it through `client`.
///
/// Decoding relies entirely on the `image` crate; a failure there is
/// returned as [`Ocr2MdError::ImageLoad`].
pub async fn extract_image(
    image_path: &Path,
    client: &dyn ExtractionClient,
) -> Result<Vec<ContentBlock>, Ocr2MdError> {
    info!("Processing image: {}", image_path.display());

    let path = image_path.to_path_buf();
    let image = tokio::task::spawn_blocking(move || {
        image::open(&path).map_err(|e| Ocr2MdError::ImageLoad { path, source: e })
    })
    .await
    .map_err(|e| Ocr2MdError::Internal(format!("Image decode task panicked: {}", e)))??;

    client.two_step_extract(&image).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    struct SizeReporter;

    #[async_trait]
    impl ExtractionClient for SizeReporter {
        fn name(&self) -> &str {
            "size-reporter"
        }

        async fn two_step_extract(
            &self,
            image: &DynamicImage,
        ) -> Result<Vec<ContentBlock>, Ocr2MdError> {
            Ok(vec![ContentBlock::new(
                "text",
                format!("{}x{}", image.width(), image.height()),
            )])
        }
    }

    #[tokio::test]
    async fn loads_and_extracts() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scan.png");
        RgbImage::from_pixel(12, 7, Rgb([0, 0, 0])).save(&path).unwrap();

        let blocks = extract_image(&path, &SizeReporter).await.unwrap();
        assert_eq!(blocks, vec![ContentBlock::new("text", "12x7")]);
    }

    #[tokio::test]
    async fn undecodable_image_is_image_load_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let err = extract_image(&path, &SizeReporter).await.unwrap_err();
        assert!(matches!(err, Ocr2MdError::ImageLoad { .. }), "got {err}");
    }
}
