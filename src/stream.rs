//! Streaming analysis API: emit page records as they are recorded.
//!
//! ## Why stream?
//!
//! Large documents take minutes — two network round-trips per page. A
//! stream-based API lets callers display each page's summary the moment
//! it lands, wire up progress displays, or write records to disk
//! incrementally instead of buffering the entire document in memory.
//!
//! Unlike the eager [`crate::analyze::analyze`] which returns only after
//! all pages finish, [`analyze_stream`] yields one item per page. The
//! pipeline is strictly sequential, so items always arrive in ascending
//! page order, and a page is not rendered until the previous page's item
//! has been produced.

use crate::analyze::{process_page, render_encoded, resolve_generator, resolve_ocr};
use crate::config::AnalysisConfig;
use crate::error::{PageError, PagesumError};
use crate::output::PageRecord;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::render;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageRecord, PageError>> + Send>>;

/// Analyse a PDF, streaming each page's record as it is recorded.
///
/// Items arrive strictly in ascending page order.
///
/// # Returns
/// - `Ok(PageStream)` — a stream of `Result<PageRecord, PageError>`
/// - `Err(PagesumError)` — fatal error (file not found, not a PDF,
///   missing credential, etc.)
pub async fn analyze_stream(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<PageStream, PagesumError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming analysis: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    stream_resolved(resolved, config).await
}

/// Analyse PDF bytes in memory, streaming each page's record.
///
/// The streaming equivalent of [`crate::analyze::analyze_from_bytes`].
/// The bytes are written to a temporary directory owned by the stream
/// itself; the file is removed when the stream is dropped.
pub async fn analyze_stream_from_bytes(
    bytes: &[u8],
    config: &AnalysisConfig,
) -> Result<PageStream, PagesumError> {
    let temp_dir = TempDir::new().map_err(|e| PagesumError::Internal(format!("tempfile: {e}")))?;
    let path = temp_dir.path().join("upload.pdf");

    if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(PagesumError::NotAPdf { path, magic });
    }

    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| PagesumError::Internal(format!("tempfile write: {e}")))?;

    // The TempDir rides inside ResolvedInput so the file outlives the
    // lazily-rendering stream.
    let resolved = ResolvedInput::Downloaded {
        path,
        _temp_dir: temp_dir,
    };
    stream_resolved(resolved, config).await
}

/// Build the page stream over an already-resolved input.
async fn stream_resolved(
    resolved: ResolvedInput,
    config: &AnalysisConfig,
) -> Result<PageStream, PagesumError> {
    let ocr = resolve_ocr(config)?;
    let generator = resolve_generator(config)?;

    let metadata = render::extract_metadata(resolved.path(), config.password.as_deref()).await?;
    let total_pages = metadata.page_count;

    if total_pages == 0 {
        return Ok(Box::pin(stream::empty()));
    }

    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(PagesumError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }

    let resolved = Arc::new(resolved);
    let config = config.clone();

    let s = stream::iter(page_indices.into_iter()).then(move |idx| {
        let resolved = Arc::clone(&resolved);
        let ocr = Arc::clone(&ocr);
        let generator = Arc::clone(&generator);
        let config = config.clone();
        async move {
            let path = resolved.path().to_path_buf();
            let (mut record, _timings) = process_page(
                &ocr,
                &generator,
                &config,
                idx,
                render_encoded(&path, &config, idx),
            )
            .await;
            match record.error.take() {
                None => Ok(record),
                Some(error) => Err(error),
            }
        }
    });

    Ok(Box::pin(s))
}
