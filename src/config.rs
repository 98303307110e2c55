//! Configuration types for per-page PDF analysis.
//!
//! All run behaviour is controlled through [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across runs, serialise them for logging, and
//! diff two runs to understand why their outputs differ.
//!
//! # Design choice: explicit credentials
//! Both remote services need a credential, and neither is read implicitly
//! from the process environment by the pipeline. The keys are named fields
//! on the config; [`AnalysisConfigBuilder::build`] fails fast with a
//! descriptive error when a required credential is absent. Callers that
//! want environment-based setup opt in explicitly with
//! [`AnalysisConfig::from_env`], which copies the variables into the fields
//! at construction time.

use crate::error::PagesumError;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::summarize::TextGenerator;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Environment variable holding the Google Cloud Vision API key.
pub const VISION_KEY_ENV: &str = "GOOGLE_VISION_API_KEY";

/// Environment variable holding the OpenAI API key.
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

/// Configuration for a per-page PDF analysis run.
///
/// Built via [`AnalysisConfig::builder()`] or [`AnalysisConfig::from_env()`].
///
/// # Example
/// ```rust
/// use pagesum::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .vision_api_key("AIza...")
///     .openai_api_key("sk-...")
///     .model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// API key for the OCR service. Required unless [`Self::ocr`] is set.
    pub vision_api_key: Option<String>,

    /// API key for the generation service. Required unless [`Self::generator`] is set.
    pub openai_api_key: Option<String>,

    /// Pre-constructed OCR engine. Takes precedence over `vision_api_key`.
    ///
    /// The injection point for tests and for callers that need custom
    /// middleware (caching, rate-limiting) around the OCR call.
    pub ocr: Option<Arc<dyn OcrEngine>>,

    /// Pre-constructed text generator. Takes precedence over `openai_api_key`.
    pub generator: Option<Arc<dyn TextGenerator>>,

    /// Generation model identifier. Default: "gpt-4o-mini".
    pub model: String,

    /// Sampling temperature for the summary completion. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to the recognised text,
    /// which is what you want when restating amounts and line items.
    pub temperature: f32,

    /// Maximum tokens the generation service may produce per page. Default: 1024.
    ///
    /// Invoice-style summaries are short; dense pages with large tables can
    /// still approach 1 000 output tokens. Setting this too low silently
    /// truncates the summary mid-table.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient service failure. Default: 3.
    ///
    /// Applies to both remote calls. Only transport failures (timeouts,
    /// 429, 5xx) are retried; an error the service itself reports for the
    /// page content is permanent and surfaces immediately.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,

    /// Maximum rendered page dimension (width or height) in pixels. Default: 2000.
    ///
    /// A safety cap on rasterisation: an A0 poster page could otherwise
    /// produce a 13 000 × 18 000 px bitmap and exhaust memory. The longest
    /// edge is capped, the other dimension scales proportionally.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom system instruction for the summariser. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Abort the run at the first page failure instead of recording it. Default: false.
    ///
    /// The default records each failed page in the output and continues, so
    /// one bad page cannot discard the summaries of every other page. Set
    /// this when a partial result is worthless to you.
    pub fail_fast: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-service-call timeout in seconds. Default: 60.
    ///
    /// Applies to each OCR and generation request. Without it a hung remote
    /// call would hang the entire sequential run.
    pub api_timeout_secs: u64,

    /// Progress callback, invoked as each page moves through the pipeline.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            vision_api_key: None,
            openai_api_key: None,
            ocr: None,
            generator: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 1024,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_rendered_pixels: 2000,
            password: None,
            system_prompt: None,
            pages: PageSelection::default(),
            fail_fast: false,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("vision_api_key", &self.vision_api_key.as_ref().map(|_| "<redacted>"))
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("ocr", &self.ocr.as_ref().map(|_| "<dyn OcrEngine>"))
            .field("generator", &self.generator.as_ref().map(|_| "<dyn TextGenerator>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pages", &self.pages)
            .field("fail_fast", &self.fail_fast)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a configuration from the conventional environment variables.
    ///
    /// Copies `GOOGLE_VISION_API_KEY` and `OPENAI_API_KEY` into the
    /// credential fields, then validates. This is the only place the
    /// library touches the process environment; absence of either variable
    /// fails here, before any document is opened.
    pub fn from_env() -> Result<Self, PagesumError> {
        let mut builder = Self::builder();
        if let Ok(key) = std::env::var(VISION_KEY_ENV) {
            if !key.is_empty() {
                builder = builder.vision_api_key(key);
            }
        }
        if let Ok(key) = std::env::var(OPENAI_KEY_ENV) {
            if !key.is_empty() {
                builder = builder.openai_api_key(key);
            }
        }
        builder.build()
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn vision_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.vision_api_key = Some(key.into());
        self
    }

    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.openai_api_key = Some(key.into());
        self
    }

    pub fn ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr = Some(engine);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
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

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn fail_fast(mut self, v: bool) -> Self {
        self.config.fail_fast = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Fails with [`PagesumError::MissingCredential`] when a service has
    /// neither a key nor an injected implementation.
    pub fn build(self) -> Result<AnalysisConfig, PagesumError> {
        let c = &self.config;
        if c.ocr.is_none() && c.vision_api_key.as_deref().map_or(true, str::is_empty) {
            return Err(PagesumError::MissingCredential {
                service: "OCR".into(),
                hint: format!(
                    "Set vision_api_key on the builder (or export {VISION_KEY_ENV} and use AnalysisConfig::from_env)."
                ),
            });
        }
        if c.generator.is_none() && c.openai_api_key.as_deref().map_or(true, str::is_empty) {
            return Err(PagesumError::MissingCredential {
                service: "generation".into(),
                hint: format!(
                    "Set openai_api_key on the builder (or export {OPENAI_KEY_ENV} and use AnalysisConfig::from_env)."
                ),
            });
        }
        if c.model.is_empty() {
            return Err(PagesumError::InvalidConfig("Model id must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(PagesumError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to analyse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Analyse all pages (default).
    #[default]
    All,
    /// Analyse a single page (1-indexed).
    Single(usize),
    /// Analyse a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Analyse specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
