//! Long-lived processing session.
//!
//! An [`OcrSession`] owns the configuration, the rasteriser and, once
//! loaded, the extraction client. Front-ends keep one session for their
//! lifetime and call [`OcrSession::process_file`] per request; asking for
//! work before [`OcrSession::load_model`] fails with
//! [`Ocr2MdError::ModelNotLoaded`].
//!
//! ```rust,no_run
//! use edgequake_ocr2md::{OcrConfig, OcrSession};
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = OcrSession::new(OcrConfig::builder().provider_name("openai").build()?);
//! session.load_model()?;
//! let outcome = session.process_file(Path::new("paper.pdf"), None).await?;
//! println!("{}", outcome.output_path.display());
//! # Ok(())
//! # }
//! ```

use crate::config::{Language, OcrConfig};
use crate::convert;
use crate::error::Ocr2MdError;
use crate::output::ProcessOutcome;
use crate::pipeline::extract::ExtractionClient;
use crate::pipeline::llm::VlmExtractionClient;
use crate::pipeline::rasterize::{PageRasterizer, PdfiumRasterizer};
use crate::progress::ProgressCallback;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Configuration plus the loaded extraction client, if any.
pub struct OcrSession {
    config: OcrConfig,
    client: Option<Arc<dyn ExtractionClient>>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl std::fmt::Debug for OcrSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrSession")
            .field("config", &self.config)
            .field("client", &self.client.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

impl OcrSession {
    /// Unloaded session with a pdfium rasteriser built from `config`.
    pub fn new(config: OcrConfig) -> Self {
        let rasterizer = Arc::new(PdfiumRasterizer::from_config(&config));
        Self {
            config,
            client: None,
            rasterizer,
        }
    }

    /// Use `client` instead of loading the VLM client.
    pub fn with_client(mut self, client: Arc<dyn ExtractionClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Replace the pdfium rasteriser.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Switch the label language for subsequent runs.
    pub fn set_language(&mut self, lang: Language) {
        self.config.language = lang;
    }

    /// Resolve the vision provider and make the session ready.
    ///
    /// Replaces any previously loaded client.
    pub fn load_model(&mut self) -> Result<(), Ocr2MdError> {
        let client = VlmExtractionClient::from_config(&self.config)?;
        self.client = Some(Arc::new(client));
        info!("Model loading completed");
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.client.is_some()
    }

    /// The loaded client, or [`Ocr2MdError::ModelNotLoaded`].
    pub fn client(&self) -> Result<&Arc<dyn ExtractionClient>, Ocr2MdError> {
        self.client.as_ref().ok_or(Ocr2MdError::ModelNotLoaded)
    }

    /// Drop the loaded client.
    pub fn unload(&mut self) {
        self.client = None;
    }

    /// Process one file with the loaded client. See [`convert::process_file`].
    pub async fn process_file(
        &self,
        input: &Path,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<ProcessOutcome, Ocr2MdError> {
        let client = self.client()?;
        convert::process_file(
            input,
            client.as_ref(),
            Arc::clone(&self.rasterizer),
            &self.config,
            progress,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ContentBlock;
    use async_trait::async_trait;
    use image::DynamicImage;

    struct Fixed;

    #[async_trait]
    impl ExtractionClient for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn two_step_extract(
            &self,
            _image: &DynamicImage,
        ) -> Result<Vec<ContentBlock>, Ocr2MdError> {
            Ok(vec![ContentBlock::new("text", "fixed")])
        }
    }

    #[test]
    fn new_session_is_unloaded() {
        let session = OcrSession::new(OcrConfig::default());
        assert!(!session.is_loaded());
        assert!(matches!(session.client(), Err(Ocr2MdError::ModelNotLoaded)));
    }

    #[test]
    fn with_client_loads_and_unload_clears() {
        let mut session = OcrSession::new(OcrConfig::default()).with_client(Arc::new(Fixed));
        assert!(session.is_loaded());
        assert_eq!(session.client().unwrap().name(), "fixed");
        session.unload();
        assert!(!session.is_loaded());
    }

    #[test]
    fn language_can_be_switched() {
        let mut session = OcrSession::new(OcrConfig::default());
        session.set_language(session.config().language.toggled());
        assert_eq!(session.config().language, Language::Zh);
    }

    #[tokio::test]
    async fn unloaded_session_refuses_work() {
        let session = OcrSession::new(OcrConfig::default());
        let err = session
            .process_file(Path::new("scan.png"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Ocr2MdError::ModelNotLoaded));
        assert!(err.kind().is_user_error());
    }
}
