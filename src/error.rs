//! Error types for the pagesum library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PagesumError`] — **Fatal**: the run cannot proceed at all (bad input
//!   file, missing credential, every page failed). Returned as
//!   `Err(PagesumError)` from the top-level `analyze*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (render glitch,
//!   OCR rejection, transient API error) but all other pages are fine.
//!   Stored inside [`crate::output::PageRecord`] so callers can inspect
//!   partial success rather than losing the whole document to one bad page.
//!
//! The separation lets callers decide their own tolerance: enable
//! `fail_fast` to abort on the first page failure, or inspect the per-page
//! errors after a full run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pagesum library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageRecord`] rather than propagated here (unless
/// `fail_fast` is enabled).
#[derive(Debug, Error)]
pub enum PagesumError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Service errors ────────────────────────────────────────────────────
    /// A required credential is absent from the configuration.
    ///
    /// Raised at `build()` time, and again as a startup precondition before
    /// any page is processed. Never raised per page.
    #[error("Missing credential for the {service} service.\n{hint}")]
    MissingCredential { service: String, hint: String },

    /// Every selected page failed; output would be empty.
    #[error("All {total} pages failed.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// Some pages succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::AnalysisOutput::into_result`] when the
    /// caller wants to treat any page failure as an error.
    #[error("{failed}/{total} pages failed during analysis")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    /// A page failed while `fail_fast` was enabled.
    ///
    /// The run aborted at this page; no output was produced.
    #[error("Aborted at page {page}: {source}")]
    Aborted {
        page: usize,
        #[source]
        source: PageError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output report file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install libpdfium or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The remote stage a page was in when a transport failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    /// The OCR request.
    Recognition,
    /// The summary-generation request.
    Summarization,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Recognition => write!(f, "recognition"),
            PipelineStage::Summarization => write!(f, "summarization"),
        }
    }
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageRecord`] when a page fails.
/// The overall run continues unless `fail_fast` is set or ALL pages fail.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The OCR service reported an error for this page's image.
    #[error("Page {page}: OCR service rejected the image: {message}")]
    RecognitionFailed { page: usize, message: String },

    /// The generation service reported an error for this page's text.
    #[error("Page {page}: summary generation failed: {message}")]
    GenerationFailed { page: usize, message: String },

    /// A network, auth, or timeout failure that persisted through retries.
    #[error("Page {page}: {stage} request failed after {retries} retries: {detail}")]
    Transport {
        page: usize,
        stage: PipelineStage,
        retries: u32,
        detail: String,
    },
}

impl PageError {
    /// The 1-based page number this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::RecognitionFailed { page, .. }
            | PageError::GenerationFailed { page, .. }
            | PageError::Transport { page, .. } => *page,
        }
    }
}
