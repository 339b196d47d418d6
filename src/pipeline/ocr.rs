//! Text recognition for the identity-document legibility check.
//!
//! The validator only needs "how much text can be read off this image", so
//! recognition sits behind the small [`TextRecognizer`] trait. The default
//! implementation, [`VisionRecognizer`], sends the image to a vision LLM
//! through `edgequake-llm` and returns the transcript. Tests and callers with
//! their own OCR engine plug in a different implementation via
//! [`crate::config::GatePassConfigBuilder::recognizer`].
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Failed calls are retried
//! with exponential backoff (`retry_backoff_ms * 2^attempt`): with 500 ms base
//! and 3 retries the waits are 500 ms → 1 s → 2 s. Each call is bounded by
//! `api_timeout_secs`; a timeout counts as a failed attempt.

use crate::config::GatePassConfig;
use crate::error::GatePassError;
use crate::pipeline::encode::encode_for_vision;
use crate::prompts::{DEFAULT_TRANSCRIPTION_PROMPT, TRANSCRIPTION_REQUEST};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// Converts a raster image of text into a string.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Return the raw text visible in `image`. An image with no readable text
    /// yields an empty string, not an error.
    async fn recognize(&self, image: &DynamicImage) -> Result<String, GatePassError>;
}

/// [`TextRecognizer`] backed by a vision LLM.
pub struct VisionRecognizer {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    system_prompt: String,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
}

impl VisionRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &GatePassConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_PROMPT.to_string()),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }
}

#[async_trait]
impl TextRecognizer for VisionRecognizer {
    async fn recognize(&self, image: &DynamicImage) -> Result<String, GatePassError> {
        let start = Instant::now();
        let image_data = encode_for_vision(image)
            .map_err(|e| GatePassError::Internal(format!("PNG encoding failed: {}", e)))?;

        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images(TRANSCRIPTION_REQUEST, vec![image_data]),
        ];

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Recognition retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(
                self.api_timeout,
                self.provider.chat(&messages, Some(&self.options)),
            )
            .await
            {
                Ok(Ok(response)) => {
                    debug!(
                        "Recognition: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Ok(Err(e)) => {
                    let err_msg = format!("{}", e);
                    warn!("Recognition attempt {} failed: {}", attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
                Err(_) => {
                    let err_msg = format!("timed out after {:?}", self.api_timeout);
                    warn!("Recognition attempt {} {}", attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(GatePassError::RecognitionFailed {
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

/// Build `CompletionOptions` from the config.
fn build_options(config: &GatePassConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, GatePassError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        GatePassError::RecognizerNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the recognizer, from most-specific to least-specific:
///
/// 1. `config.recognizer`, used as-is;
/// 2. `config.provider`, wrapped in a [`VisionRecognizer`];
/// 3. `config.provider_name` + `config.model`;
/// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set;
/// 5. OpenAI when `OPENAI_API_KEY` is set;
/// 6. `ProviderFactory::from_env` auto-detection.
pub fn resolve_recognizer(
    config: &GatePassConfig,
) -> Result<Arc<dyn TextRecognizer>, GatePassError> {
    if let Some(ref recognizer) = config.recognizer {
        return Ok(Arc::clone(recognizer));
    }

    let provider = resolve_provider(config)?;
    Ok(Arc::new(VisionRecognizer::new(provider, config)))
}

fn resolve_provider(config: &GatePassConfig) -> Result<Arc<dyn LLMProvider>, GatePassError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| GatePassError::RecognizerNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
