//! Progress-callback trait for per-page pipeline events.
//!
//! Inject an [`Arc<dyn AnalysisProgress>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through each page. Events fire from the
//! actual work — a page completes, the callback fires — so a progress bar
//! driven from here always reflects real pipeline state.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a WebSocket, a database record, or a
//! terminal progress bar without the library knowing anything about how
//! the host application communicates.

use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// The pipeline is strictly sequential, so events for one run never
/// overlap; the trait is still `Send + Sync` so one callback can be shared
/// across runs. All methods have default no-op implementations so callers
/// only override what they care about.
pub trait AnalysisProgress: Send + Sync {
    /// Called once after the document is opened, before any page is rendered.
    ///
    /// # Arguments
    /// * `total_pages` — number of pages that will be processed
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is rendered.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — pages selected for this run
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page's summary has been recorded.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `pages_done`  — pages attempted so far, this one included
    /// * `total_pages` — pages selected for this run
    /// * `summary_len` — byte length of the generated summary
    fn on_page_complete(
        &self,
        page_num: usize,
        pages_done: usize,
        total_pages: usize,
        summary_len: usize,
    ) {
        let _ = (page_num, pages_done, total_pages, summary_len);
    }

    /// Called when a page fails after all retries are exhausted.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `pages_done`  — pages attempted so far, this one included
    /// * `total_pages` — pages selected for this run
    /// * `error`       — human-readable error description
    fn on_page_error(&self, page_num: usize, pages_done: usize, total_pages: usize, error: &str) {
        let _ = (page_num, pages_done, total_pages, error);
    }

    /// Called once after all pages have been attempted.
    ///
    /// Not called when `fail_fast` aborts the run mid-way.
    ///
    /// # Arguments
    /// * `total_pages`   — pages selected for this run
    /// * `success_count` — pages that produced a summary
    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl AnalysisProgress for NoopProgress {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgress>;
