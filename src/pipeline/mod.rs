//! Pipeline stages for per-page PDF analysis.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch the OCR backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ ocr ──▶ summarize
//! (URL/path) (pdfium)   (JPEG)  (Vision)  (chat LLM)
//! ```
//!
//! 1. [`input`]     — canonicalise the user-supplied path or URL to a local file
//! 2. [`render`]    — rasterise one page on demand; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`encode`]    — JPEG-encode the bitmap in memory for the OCR request body
//! 4. [`ocr`]       — submit the image to the text-detection service
//! 5. [`summarize`] — send the recognised text to the generation service
//!
//! The run loop in [`crate::analyze`] drives one page through stages 2–5
//! before touching the next page; nothing here runs concurrently.

pub mod encode;
pub mod input;
pub mod ocr;
pub mod render;
pub mod summarize;
