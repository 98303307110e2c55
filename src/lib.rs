//! # pagesum
//!
//! Summarise PDF documents page by page using a cloud OCR service and a
//! text-generation LLM.
//!
//! ## Why this crate?
//!
//! Scanned invoices and receipts carry no text layer, so conventional PDF
//! text extraction returns nothing. This crate rasterises each page,
//! sends the bitmap to an OCR service to recover the text, then asks an
//! LLM to restate that text as a concise invoice-style summary — one
//! labelled result per page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file, URL, or byte buffer
//!  ├─ 2. Render    rasterise one page via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Encode    bitmap → in-memory JPEG
//!  ├─ 4. OCR       Cloud Vision TEXT_DETECTION → recognised text
//!  ├─ 5. Summarise chat completion → invoice-style summary
//!  └─ 6. Record    per-page results, ascending page order
//! ```
//!
//! Pages run strictly one at a time: page N+1 is not rendered until page
//! N's summary (or failure) has been recorded. By default a failed page
//! is recorded and the run continues; set `fail_fast` to abort instead.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagesum::{analyze, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalysisConfig::builder()
//!         .vision_api_key(std::env::var("GOOGLE_VISION_API_KEY")?)
//!         .openai_api_key(std::env::var("OPENAI_API_KEY")?)
//!         .build()?;
//!     let output = analyze("invoice.pdf", &config).await?;
//!     for page in &output.pages {
//!         println!("── Page {} ──\n{}", page.page_num, page.summary);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pagesum` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pagesum = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_from_bytes, analyze_sync, analyze_to_file, inspect};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, PageSelection};
pub use error::{PageError, PagesumError, PipelineStage};
pub use output::{AnalysisOutput, AnalysisStats, DocumentMetadata, PageRecord};
pub use pipeline::ocr::{GoogleVisionOcr, OcrEngine, OcrError};
pub use pipeline::summarize::{Completion, GenerationError, OpenAiChat, TextGenerator};
pub use progress::{AnalysisProgress, NoopProgress, ProgressCallback};
pub use stream::{analyze_stream, analyze_stream_from_bytes, PageStream};
