//! Configuration types for OCR-to-Markdown processing.
//!
//! Every knob lives in [`OcrConfig`], built via [`OcrConfigBuilder`]. Callers
//! set only what they care about and rely on the documented defaults for the
//! rest.

use crate::error::Ocr2MdError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default rasterisation resolution.
pub const DEFAULT_DPI: u32 = 200;

/// Default directory for generated Markdown files, relative to the working
/// directory.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Default model identifier for the vision provider.
pub const DEFAULT_MODEL: &str = "MinerU2.5-2509-1.2B";

/// Side length the page is resized to for the layout-detection step.
pub const DEFAULT_LAYOUT_IMAGE_SIZE: u32 = 1036;

/// Configuration for one OCR run.
///
/// # Example
/// ```rust
/// use edgequake_ocr2md::{Language, OcrConfig};
///
/// let config = OcrConfig::builder()
///     .dpi(300)
///     .output_dir("reports")
///     .language(Language::Zh)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 300);
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 200.
    pub dpi: u32,

    /// Directory the Markdown file is written to. Created if missing. Default: `output`.
    pub output_dir: PathBuf,

    /// Directory to keep rasterised page images in.
    ///
    /// `None` (the default) rasterises into a fresh temporary directory that
    /// is deleted when processing ends. A directory given here is created if
    /// needed and left in place.
    pub raster_dir: Option<PathBuf>,

    /// Label language of the rendered Markdown and of the status log. Default: English.
    pub language: Language,

    /// Vision provider name (e.g. "openai", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for every extraction request. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens generated per request. Default: 4096.
    pub max_tokens: usize,

    /// Square size, in pixels, of the image sent to the layout step. Default: 1036.
    pub layout_image_size: u32,

    /// Directory containing the pdfium shared library. If None, uses
    /// `PDFIUM_LIB_PATH`, then the working directory, then the system library.
    pub pdfium_lib_dir: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            raster_dir: None,
            language: Language::default(),
            provider_name: None,
            model: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            layout_image_size: DEFAULT_LAYOUT_IMAGE_SIZE,
            pdfium_lib_dir: None,
            password: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("dpi", &self.dpi)
            .field("output_dir", &self.output_dir)
            .field("raster_dir", &self.raster_dir)
            .field("language", &self.language)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("layout_image_size", &self.layout_image_size)
            .field("pdfium_lib_dir", &self.pdfium_lib_dir)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn raster_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.raster_dir = Some(dir.into());
        self
    }

    pub fn language(mut self, lang: Language) -> Self {
        self.config.language = lang;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn layout_image_size(mut self, px: u32) -> Self {
        self.config.layout_image_size = px;
        self
    }

    pub fn pdfium_lib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_dir = Some(dir.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, Ocr2MdError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(Ocr2MdError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.max_tokens == 0 {
            return Err(Ocr2MdError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.layout_image_size < 28 {
            return Err(Ocr2MdError::InvalidConfig(format!(
                "layout image size must be ≥ 28 px, got {}",
                c.layout_image_size
            )));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(Ocr2MdError::InvalidConfig(
                "output directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Label language for the Markdown report and status messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English labels (default).
    #[default]
    En,
    /// Simplified Chinese labels.
    Zh,
}

impl Language {
    /// The other language; used by front-ends with a single toggle button.
    pub fn toggled(self) -> Self {
        match self {
            Language::En => Language::Zh,
            Language::Zh => Language::En,
        }
    }
}

impl std::str::FromStr for Language {
    type Err = Ocr2MdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "zh" | "cn" | "chinese" => Ok(Language::Zh),
            other => Err(Ocr2MdError::InvalidConfig(format!(
                "unknown language '{other}', expected 'en' or 'zh'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_defaults() {
        let c = OcrConfig::default();
        assert_eq!(c.dpi, 200);
        assert_eq!(c.output_dir, PathBuf::from("output"));
        assert!(c.raster_dir.is_none());
        assert_eq!(c.model_or_default(), DEFAULT_MODEL);
    }

    #[test]
    fn dpi_is_clamped() {
        let c = OcrConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);
        let c = OcrConfig::builder().dpi(5000).build().unwrap();
        assert_eq!(c.dpi, 600);
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let err = OcrConfig::builder().max_tokens(0).build().unwrap_err();
        assert!(matches!(err, Ocr2MdError::InvalidConfig(_)));
    }

    #[test]
    fn empty_output_dir_rejected() {
        assert!(OcrConfig::builder().output_dir("").build().is_err());
    }

    #[test]
    fn language_parse_and_toggle() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::En);
        assert_eq!("zh".parse::<Language>().unwrap(), Language::Zh);
        assert!("fr".parse::<Language>().is_err());
        assert_eq!(Language::En.toggled(), Language::Zh);
        assert_eq!(Language::Zh.toggled(), Language::En);
    }

    #[test]
    fn debug_redacts_password() {
        let c = OcrConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
    }
}
