//! Configuration types for gate pass issuance.
//!
//! All pipeline behaviour is controlled through [`GatePassConfig`], built via
//! its [`GatePassConfigBuilder`]. Stores are *not* part of the config; they
//! are passed to [`crate::submit`] separately as [`crate::store::Stores`] so
//! callers decide where data goes without touching validation settings.

use crate::error::GatePassError;
use crate::pipeline::document::PassComposer;
use crate::pipeline::ocr::TextRecognizer;
use crate::progress::ProgressCallback;
use crate::store::check_key;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Header title printed on every gate pass.
pub const DEFAULT_TITLE: &str = "Gate Pass for Drone Workshop";

/// Subtitle printed under the title.
pub const DEFAULT_SUBTITLE: &str =
    "Skill Stork International School in collaboration with Aerofoil Innovations Pvt Ltd";

/// Largest accepted `max_rendered_pixels`; pdfium takes the target as `i32`.
pub const MAX_RENDERED_PIXELS: u32 = 10_000;

/// Configuration for validating a submission and issuing its gate pass.
///
/// # Example
/// ```rust
/// use gatepass::GatePassConfig;
///
/// let config = GatePassConfig::builder()
///     .size_limits_kb(100, 500)
///     .whiteness_threshold(240)
///     .blob_prefix("gatepasses")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GatePassConfig {
    /// Smallest accepted upload, in KB (1 KB = 1024 bytes). Default: 100.
    pub min_size_kb: u64,

    /// Largest accepted upload, in KB. Default: 500. Both bounds are inclusive.
    pub max_size_kb: u64,

    /// Each corner pixel's channel mean must be strictly above this. Default: 240.
    pub whiteness_threshold: u8,

    /// Recognised text must be strictly longer than this (in characters,
    /// after trimming). Default: 50.
    pub min_text_chars: usize,

    /// Longest edge, in pixels, when rasterising the first page of a PDF
    /// upload. Default: 2000, at most [`MAX_RENDERED_PIXELS`].
    pub max_rendered_pixels: u32,

    /// Minimum side of the generated QR image in pixels. Default: 300.
    pub qr_size_px: u32,

    /// Blob key namespace. Default: `gatepasses`.
    pub blob_prefix: String,

    /// Gate pass header title.
    pub title: String,

    /// Gate pass header subtitle.
    pub subtitle: String,

    /// Builds the gate pass document. If None, a pdfium A4 page is composed.
    pub composer: Option<Arc<dyn PassComposer>>,

    /// Explicit pdfium shared library. If None, `PDFIUM_LIB_PATH` and then the
    /// system loader are tried.
    pub pdfium_lib_path: Option<PathBuf>,

    // ── OCR ──────────────────────────────────────────────────────────────
    /// Pre-built recognizer. Takes precedence over every provider setting.
    pub recognizer: Option<Arc<dyn TextRecognizer>>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Vision model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// Sampling temperature for transcription. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate for one transcription. Default: 2048.
    pub max_tokens: usize,

    /// Retry attempts on a failed recognition call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call recognition timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Custom transcription prompt. If None, uses the built-in one.
    pub system_prompt: Option<String>,

    /// Receives stage events while a submission is processed.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GatePassConfig {
    fn default() -> Self {
        Self {
            min_size_kb: 100,
            max_size_kb: 500,
            whiteness_threshold: 240,
            min_text_chars: 50,
            max_rendered_pixels: 2000,
            qr_size_px: 300,
            blob_prefix: "gatepasses".to_string(),
            title: DEFAULT_TITLE.to_string(),
            subtitle: DEFAULT_SUBTITLE.to_string(),
            composer: None,
            pdfium_lib_path: None,
            recognizer: None,
            provider: None,
            provider_name: None,
            model: None,
            temperature: 0.0,
            max_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GatePassConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatePassConfig")
            .field("min_size_kb", &self.min_size_kb)
            .field("max_size_kb", &self.max_size_kb)
            .field("whiteness_threshold", &self.whiteness_threshold)
            .field("min_text_chars", &self.min_text_chars)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("qr_size_px", &self.qr_size_px)
            .field("blob_prefix", &self.blob_prefix)
            .field("title", &self.title)
            .field("composer", &self.composer.as_ref().map(|_| "<dyn PassComposer>"))
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("recognizer", &self.recognizer.as_ref().map(|_| "<dyn TextRecognizer>"))
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn SubmissionProgressCallback>"),
            )
            .finish()
    }
}

impl GatePassConfig {
    /// Create a new builder for `GatePassConfig`.
    pub fn builder() -> GatePassConfigBuilder {
        GatePassConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GatePassConfig`].
pub struct GatePassConfigBuilder {
    config: GatePassConfig,
}

impl fmt::Debug for GatePassConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatePassConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl GatePassConfigBuilder {
    pub fn size_limits_kb(mut self, min_kb: u64, max_kb: u64) -> Self {
        self.config.min_size_kb = min_kb;
        self.config.max_size_kb = max_kb;
        self
    }

    pub fn whiteness_threshold(mut self, threshold: u8) -> Self {
        self.config.whiteness_threshold = threshold;
        self
    }

    pub fn min_text_chars(mut self, n: usize) -> Self {
        self.config.min_text_chars = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.clamp(100, MAX_RENDERED_PIXELS);
        self
    }

    pub fn qr_size_px(mut self, px: u32) -> Self {
        self.config.qr_size_px = px.clamp(64, 2000);
        self
    }

    pub fn blob_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.blob_prefix = prefix.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.config.subtitle = subtitle.into();
        self
    }

    pub fn composer(mut self, composer: Arc<dyn PassComposer>) -> Self {
        self.config.composer = Some(composer);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
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

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GatePassConfig, GatePassError> {
        let c = &self.config;
        if c.min_size_kb > c.max_size_kb {
            return Err(GatePassError::InvalidConfig(format!(
                "minimum upload size ({} KB) exceeds maximum ({} KB)",
                c.min_size_kb, c.max_size_kb
            )));
        }
        // Same rules as the store applies to every key under the prefix
        if check_key(c.blob_prefix.trim_end_matches('/')).is_err() {
            return Err(GatePassError::InvalidConfig(format!(
                "blob prefix '{}' is not a valid key namespace",
                c.blob_prefix
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(GatePassError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
