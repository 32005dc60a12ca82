//! PDF rasterisation: render every page to a numbered PNG in a directory.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-aware. Rendering and PNG encoding run on tokio's blocking pool so
//! the runtime's worker threads never stall.
//!
//! ## Directory lifetime
//!
//! Without an explicit directory, pages go to a fresh `pdf_ocr_*` temporary
//! directory owned by [`RasterizedPages`]. Dropping the value removes the
//! directory, so cleanup happens exactly once on every exit path, including
//! `?` early returns and panics.

use crate::config::OcrConfig;
use crate::error::Ocr2MdError;
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

/// PDF user-space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Prefix of temporary rasterisation directories.
pub const TEMP_DIR_PREFIX: &str = "pdf_ocr_";

/// Source of page images for a PDF.
///
/// Implementations are called from a blocking thread and must not assume an
/// async context.
pub trait PageRasterizer: Send + Sync {
    /// Fail with [`Ocr2MdError::PdfiumUnavailable`] (or another
    /// capability error) when rasterisation cannot work in this environment.
    fn check_available(&self) -> Result<(), Ocr2MdError> {
        Ok(())
    }

    /// Render every page of `pdf_path` at `dpi`, in page order.
    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<DynamicImage>, Ocr2MdError>;
}

/// [`PageRasterizer`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
    password: Option<String>,
}

impl PdfiumRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rasteriser using the pdfium location and password from `config`.
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            library_path: config.pdfium_lib_dir.clone(),
            password: config.password.clone(),
        }
    }

    /// Load pdfium from this file, or from the platform library inside this
    /// directory.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Bind to pdfium.
    ///
    /// Search order: explicit path, `PDFIUM_LIB_PATH`, the working
    /// directory, then the system library.
    fn bind(&self) -> Result<Pdfium, Ocr2MdError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) if path.is_file() => Pdfium::bind_to_library(&path),
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
            }
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| Ocr2MdError::PdfiumUnavailable(e.to_string()))?;

        Ok(Pdfium::new(bindings))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn check_available(&self) -> Result<(), Ocr2MdError> {
        self.bind().map(|_| ())
    }

    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<DynamicImage>, Ocr2MdError> {
        let pdfium = self.bind()?;
        let password = self.password.as_deref();

        let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    Ocr2MdError::WrongPassword {
                        path: pdf_path.to_path_buf(),
                    }
                } else {
                    Ocr2MdError::PasswordRequired {
                        path: pdf_path.to_path_buf(),
                    }
                }
            } else {
                Ocr2MdError::Rasterization {
                    path: pdf_path.to_path_buf(),
                    detail: err_str,
                }
            }
        })?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let scale = dpi as f32 / POINTS_PER_INCH;
        let mut images = Vec::with_capacity(pages.len() as usize);

        for (idx, page) in pages.iter().enumerate() {
            let render_config = PdfRenderConfig::new()
                .set_target_width(((page.width().value * scale) as i32).max(1))
                .set_target_height(((page.height().value * scale) as i32).max(1));

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                Ocr2MdError::Rasterization {
                    path: pdf_path.to_path_buf(),
                    detail: format!("page {}: {:?}", idx + 1, e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }

        Ok(images)
    }
}

/// Where the page images live.
#[derive(Debug)]
enum RasterDir {
    /// Created by us; removed on drop.
    Temporary(TempDir),
    /// Supplied by the caller; left in place.
    Provided(PathBuf),
}

/// Page images written by [`rasterize_to_dir`].
#[derive(Debug)]
pub struct RasterizedPages {
    /// Saved page images, in page order.
    pub pages: Vec<PathBuf>,
    dir: RasterDir,
}

impl RasterizedPages {
    /// Directory holding the page images.
    pub fn dir(&self) -> &Path {
        match &self.dir {
            RasterDir::Temporary(t) => t.path(),
            RasterDir::Provided(p) => p,
        }
    }

    /// `true` when the directory is removed on drop.
    pub fn is_temporary(&self) -> bool {
        matches!(self.dir, RasterDir::Temporary(_))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Remove a temporary directory now, reporting failures instead of
    /// ignoring them as drop does.
    pub fn close(self) -> Result<(), Ocr2MdError> {
        match self.dir {
            RasterDir::Temporary(t) => {
                let path = t.path().to_path_buf();
                t.close().map_err(|e| Ocr2MdError::Io { path: path.clone(), source: e })?;
                debug!("Removed temporary page directory {}", path.display());
                Ok(())
            }
            RasterDir::Provided(_) => Ok(()),
        }
    }
}

/// Filename of the page image for 1-indexed `page_num`.
pub fn page_file_name(page_num: usize) -> String {
    format!("page_{page_num:03}.png")
}

/// Rasterise `pdf_path` and save one PNG per page.
///
/// Availability is checked before any directory is created. With
/// `output_dir = None` the images go to a temporary directory owned by the
/// returned value.
pub async fn rasterize_to_dir(
    rasterizer: Arc<dyn PageRasterizer>,
    pdf_path: &Path,
    output_dir: Option<&Path>,
    dpi: u32,
) -> Result<RasterizedPages, Ocr2MdError> {
    rasterizer.check_available()?;

    let dir = match output_dir {
        Some(d) => {
            tokio::fs::create_dir_all(d)
                .await
                .map_err(|e| Ocr2MdError::Io {
                    path: d.to_path_buf(),
                    source: e,
                })?;
            RasterDir::Provided(d.to_path_buf())
        }
        None => {
            let tmp = tempfile::Builder::new()
                .prefix(TEMP_DIR_PREFIX)
                .tempdir()
                .map_err(|e| Ocr2MdError::Io {
                    path: std::env::temp_dir(),
                    source: e,
                })?;
            RasterDir::Temporary(tmp)
        }
    };

    let mut result = RasterizedPages {
        pages: Vec::new(),
        dir,
    };
    info!("Converting PDF to images in {}", result.dir().display());

    let path = pdf_path.to_path_buf();
    let target = result.dir().to_path_buf();

    let pages = tokio::task::spawn_blocking(move || {
        let images = rasterizer.rasterize(&path, dpi)?;
        save_pages(&images, &target)
    })
    .await
    .map_err(|e| Ocr2MdError::Internal(format!("Rasterisation task panicked: {}", e)))??;

    result.pages = pages;
    Ok(result)
}

/// Save `images` as `page_001.png`, `page_002.png`, … inside `dir`.
fn save_pages(images: &[DynamicImage], dir: &Path) -> Result<Vec<PathBuf>, Ocr2MdError> {
    let mut paths = Vec::with_capacity(images.len());
    for (i, image) in images.iter().enumerate() {
        let path = dir.join(page_file_name(i + 1));
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| Ocr2MdError::PageSave {
                path: path.clone(),
                source: e,
            })?;
        debug!("Saved page {}: {}", i + 1, path.display());
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    struct SolidPages(u32);

    impl PageRasterizer for SolidPages {
        fn rasterize(&self, _pdf: &Path, _dpi: u32) -> Result<Vec<DynamicImage>, Ocr2MdError> {
            Ok((0..self.0)
                .map(|i| DynamicImage::ImageRgb8(RgbImage::from_pixel(8 + i, 8, Rgb([255, 255, 255]))))
                .collect())
        }
    }

    struct Missing;

    impl PageRasterizer for Missing {
        fn check_available(&self) -> Result<(), Ocr2MdError> {
            Err(Ocr2MdError::PdfiumUnavailable("not installed".into()))
        }

        fn rasterize(&self, _pdf: &Path, _dpi: u32) -> Result<Vec<DynamicImage>, Ocr2MdError> {
            unreachable!("availability is checked first")
        }
    }

    #[test]
    fn page_names_are_padded_and_one_based() {
        assert_eq!(page_file_name(1), "page_001.png");
        assert_eq!(page_file_name(42), "page_042.png");
        assert_eq!(page_file_name(1234), "page_1234.png");
    }

    #[tokio::test]
    async fn temporary_dir_holds_pages_until_dropped() {
        let pages = rasterize_to_dir(Arc::new(SolidPages(3)), Path::new("x.pdf"), None, 200)
            .await
            .unwrap();

        assert!(pages.is_temporary());
        assert_eq!(pages.len(), 3);
        let names: Vec<_> = pages
            .pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["page_001.png", "page_002.png", "page_003.png"]);
        assert!(pages.pages.iter().all(|p| p.starts_with(pages.dir()) && p.exists()));
        assert!(pages
            .dir()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(TEMP_DIR_PREFIX));

        let dir = pages.dir().to_path_buf();
        drop(pages);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn close_removes_temporary_dir() {
        let pages = rasterize_to_dir(Arc::new(SolidPages(1)), Path::new("x.pdf"), None, 72)
            .await
            .unwrap();
        let dir = pages.dir().to_path_buf();
        pages.close().unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn provided_dir_is_kept() {
        let scratch = tempfile::TempDir::new().unwrap();
        let target = scratch.path().join("pages");

        let pages = rasterize_to_dir(Arc::new(SolidPages(2)), Path::new("x.pdf"), Some(&target), 200)
            .await
            .unwrap();
        assert!(!pages.is_temporary());
        assert_eq!(pages.dir(), target.as_path());
        drop(pages);

        assert!(target.join("page_001.png").exists());
        assert!(target.join("page_002.png").exists());
    }

    #[tokio::test]
    async fn missing_capability_fails_before_work() {
        let err = rasterize_to_dir(Arc::new(Missing), Path::new("x.pdf"), None, 200)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CapabilityMissing);
    }

    #[test]
    fn unwritable_page_dir_is_a_save_error() {
        let scratch = tempfile::TempDir::new().unwrap();
        let missing = scratch.path().join("gone");
        let pages = SolidPages(1).rasterize(Path::new("x.pdf"), 72).unwrap();

        let err = save_pages(&pages, &missing).unwrap_err();
        assert!(
            matches!(err, Ocr2MdError::PageSave { ref path, .. } if path.ends_with("page_001.png")),
            "got {err:?}"
        );
        assert_eq!(err.kind(), crate::error::ErrorKind::UpstreamFailure);
    }

    #[test]
    fn pdfium_rasterizer_takes_config() {
        let config = OcrConfig::builder()
            .pdfium_lib_dir("/opt/pdfium")
            .password("pw")
            .build()
            .unwrap();
        let r = PdfiumRasterizer::from_config(&config);
        assert_eq!(r.library_path.as_deref(), Some(Path::new("/opt/pdfium")));
        assert_eq!(r.password.as_deref(), Some("pw"));
    }
}
