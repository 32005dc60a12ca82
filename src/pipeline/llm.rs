//! VLM extraction client: the two-step protocol over an `LLMProvider`.
//!
//! The model is reached through `edgequake-llm`, so anything that serves
//! a MinerU-style model behind an OpenAI-compatible endpoint (vLLM, SGLang,
//! Ollama) works, as do hosted vision models that follow the prompts well
//! enough.
//!
//! ## Request Layout
//!
//! Every request is the same shape:
//! 1. **System message**: [`SYSTEM_PROMPT`]
//! 2. **User message**: the task prompt plus one PNG attachment
//!
//! The layout request carries the whole page resized to a square; each
//! recognition request carries one full-resolution crop. Requests run one
//! after another and the first failure aborts the page: there is no retry.

use crate::config::OcrConfig;
use crate::error::Ocr2MdError;
use crate::output::ContentBlock;
use crate::pipeline::encode::encode_image;
use crate::pipeline::extract::ExtractionClient;
use crate::pipeline::layout::{crop_region, layout_image, parse_layout};
use crate::pipeline::postprocess::clean_block;
use crate::prompts::{recognition_prompt, LAYOUT_PROMPT, SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One prompt plus one image in, the model's raw answer out.
///
/// The production implementation is [`ProviderChat`]; tests replace it to
/// script the model's answers.
#[async_trait]
pub(crate) trait VisionChat: Send + Sync {
    async fn ask(&self, stage: &str, prompt: &str, image: ImageData) -> Result<String, Ocr2MdError>;
}

/// [`VisionChat`] over an `edgequake-llm` provider.
struct ProviderChat {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

#[async_trait]
impl VisionChat for ProviderChat {
    async fn ask(&self, stage: &str, prompt: &str, image: ImageData) -> Result<String, Ocr2MdError> {
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user_with_images(prompt, vec![image]),
        ];

        let start = Instant::now();
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| Ocr2MdError::ExtractionFailed {
                stage: stage.to_string(),
                detail: e.to_string(),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            stage,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// Extraction client backed by a vision LLM.
pub struct VlmExtractionClient {
    chat: Box<dyn VisionChat>,
    label: String,
    layout_image_size: u32,
}

impl std::fmt::Debug for VlmExtractionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VlmExtractionClient")
            .field("label", &self.label)
            .field("layout_image_size", &self.layout_image_size)
            .finish()
    }
}

impl VlmExtractionClient {
    /// Wrap an already-constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &OcrConfig) -> Self {
        let chat = ProviderChat {
            provider,
            options: build_options(config),
        };
        Self::with_chat(Box::new(chat), config)
    }

    pub(crate) fn with_chat(chat: Box<dyn VisionChat>, config: &OcrConfig) -> Self {
        let label = format!(
            "{}/{}",
            config.provider_name.as_deref().unwrap_or("vlm"),
            config.model_or_default()
        );
        Self {
            chat,
            label,
            layout_image_size: config.layout_image_size,
        }
    }

    /// Resolve a provider from `config` and the environment, then wrap it.
    pub fn from_config(config: &OcrConfig) -> Result<Self, Ocr2MdError> {
        let provider = resolve_provider(config)?;
        let client = Self::new(provider, config);
        info!("Vision extraction client ready: {}", client.label);
        Ok(client)
    }
}

#[async_trait]
impl ExtractionClient for VlmExtractionClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn two_step_extract(
        &self,
        image: &DynamicImage,
    ) -> Result<Vec<ContentBlock>, Ocr2MdError> {
        // Step 1: layout on the resized page
        let resized = layout_image(image, self.layout_image_size);
        let raw_layout = self
            .chat
            .ask("layout", LAYOUT_PROMPT, encode_image(&resized, "layout")?)
            .await?;
        let regions = parse_layout(&raw_layout);
        debug!("Layout: {} regions", regions.len());
        if regions.is_empty() {
            warn!("Layout step found no regions on a {}x{} image", image.width(), image.height());
        }

        // Step 2: recognition on full-resolution crops, in layout order
        let mut blocks = Vec::with_capacity(regions.len());
        for (idx, region) in regions.iter().enumerate() {
            let block = ContentBlock::empty(region.block_type.as_str()).with_bbox(region.bbox);

            let Some(prompt) = recognition_prompt(&region.block_type) else {
                blocks.push(block);
                continue;
            };
            let Some(crop) = crop_region(image, region) else {
                debug!("Region {idx} ({}) has zero area at page resolution", region.block_type);
                blocks.push(block);
                continue;
            };

            let stage = format!("recognition of region {} ({})", idx + 1, region.block_type);
            let raw = self
                .chat
                .ask(&stage, prompt, encode_image(&crop, &stage)?)
                .await?;
            let cleaned = clean_block(&region.block_type, &raw);

            blocks.push(ContentBlock {
                content: Some(cleaned),
                ..block
            });
        }

        Ok(blocks)
    }
}

/// Build `CompletionOptions` from the OCR config.
fn build_options(config: &OcrConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Ocr2MdError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Ocr2MdError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the vision provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key or base URL from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &OcrConfig) -> Result<Arc<dyn LLMProvider>, Ocr2MdError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Ocr2MdError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from the environment.\n\
                Pass --provider/--model, set EDGEQUAKE_LLM_PROVIDER and EDGEQUAKE_MODEL,\n\
                or export a provider API key.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
