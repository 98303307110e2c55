//! Eager (full-document) analysis entry points.
//!
//! ## Control flow
//!
//! One page at a time, in ascending page order: render → encode → OCR →
//! summarise → record. Page N+1 is not rendered until page N's outcome has
//! been recorded, so at any moment exactly one bitmap and at most one
//! in-flight service call exist. Use [`crate::stream::analyze_stream`]
//! when you want each page's record as soon as it lands instead of waiting
//! for the whole document.

use crate::config::AnalysisConfig;
use crate::error::{PageError, PagesumError};
use crate::output::{AnalysisOutput, AnalysisStats, DocumentMetadata, PageRecord};
use crate::pipeline::ocr::{recognize_with_retry, GoogleVisionOcr, OcrEngine};
use crate::pipeline::summarize::{summarize_with_retry, OpenAiChat, TextGenerator};
use crate::pipeline::{encode, input, render};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Analyse a PDF file or URL page by page.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path or HTTP/HTTPS URL to a PDF
/// * `config` — Run configuration
///
/// # Returns
/// `Ok(AnalysisOutput)` on success, even if some pages failed
/// (check `output.stats.failed_pages`, or call `into_result()`).
///
/// # Errors
/// Returns `Err(PagesumError)` only for fatal errors:
/// - Missing credential
/// - File not found / not a valid PDF
/// - A page failure with `fail_fast` enabled
/// - All pages failed and no output was produced
pub async fn analyze(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, PagesumError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting analysis: {}", input_str);

    // ── Step 1: Startup preconditions ────────────────────────────────────
    // Both credentials are checked before the document is opened; a missing
    // key is a configuration failure, never a per-page one.
    let ocr = resolve_ocr(config)?;
    let generator = resolve_generator(config)?;

    // ── Step 2: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();

    // ── Step 3: Open document, read metadata ─────────────────────────────
    let metadata = render::extract_metadata(&pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;
    info!("PDF has {} pages", total_pages);

    // A zero-page document is legal: empty result set, neither service touched.
    if total_pages == 0 {
        if let Some(ref cb) = config.progress_callback {
            cb.on_run_start(0);
            cb.on_run_complete(0, 0);
        }
        return Ok(AnalysisOutput {
            pages: Vec::new(),
            metadata,
            stats: empty_stats(total_start.elapsed().as_millis() as u64),
        });
    }

    // ── Step 4: Compute page indices ─────────────────────────────────────
    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(PagesumError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }
    debug!("Selected {} pages for analysis", page_indices.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(page_indices.len());
    }

    // ── Step 5: Process pages sequentially ───────────────────────────────
    let (mut pages, timings) = drive_pages(&ocr, &generator, config, &page_indices, |idx| {
        render_encoded(&pdf_path, config, idx)
    })
    .await?;

    // Sort by page number for consistent output. The sequential loop
    // already produces ascending order; this is the documented guarantee.
    pages.sort_by_key(|p| p.page_num);

    // ── Step 6: Compute stats ────────────────────────────────────────────
    let processed = pages.iter().filter(|p| p.error.is_none()).count();
    let failed = pages.len() - processed;

    if processed == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(PagesumError::AllPagesFailed {
            total: pages.len(),
            first_error,
        });
    }

    let stats = AnalysisStats {
        total_pages,
        processed_pages: processed,
        failed_pages: failed,
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms: timings.render_ms,
        ocr_duration_ms: timings.ocr_ms,
        llm_duration_ms: timings.llm_ms,
    };

    info!(
        "Analysis complete: {}/{} pages, {}ms total",
        processed, total_pages, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(page_indices.len(), processed);
    }

    Ok(AnalysisOutput {
        pages,
        metadata,
        stats,
    })
}

/// Analyse PDF bytes in memory.
///
/// This is the upload-shaped API: the caller hands over the raw bytes of
/// the uploaded document. Internally the bytes are written to a managed
/// [`tempfile`] which is removed automatically on return or panic, so no
/// transient artifact survives the run.
pub async fn analyze_from_bytes(
    bytes: &[u8],
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, PagesumError> {
    use std::io::Write;
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| PagesumError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| PagesumError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    // `tmp` is dropped (and the file deleted) when `analyze` returns
    analyze(&path, config).await
}

/// Analyse a PDF and write the rendered report directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn analyze_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisStats, PagesumError> {
    let output = analyze(input_str, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PagesumError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, output.render_report())
        .await
        .map_err(|e| PagesumError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| PagesumError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output.stats)
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, PagesumError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PagesumError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input_str, config))
}

/// Extract PDF metadata without analysing content.
///
/// Touches neither remote service and needs no credentials.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, PagesumError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    let pdf_path = resolved.path().to_path_buf();
    render::extract_metadata(&pdf_path, None).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the OCR engine: injected implementation, else one built from
/// the credential field.
pub(crate) fn resolve_ocr(config: &AnalysisConfig) -> Result<Arc<dyn OcrEngine>, PagesumError> {
    if let Some(ref engine) = config.ocr {
        return Ok(Arc::clone(engine));
    }
    match config.vision_api_key.as_deref() {
        Some(key) if !key.is_empty() => Ok(Arc::new(GoogleVisionOcr::new(
            key,
            config.api_timeout_secs,
        )?)),
        _ => Err(PagesumError::MissingCredential {
            service: "OCR".into(),
            hint: "Set vision_api_key on the builder or inject an OcrEngine.".into(),
        }),
    }
}

/// Resolve the text generator: injected implementation, else one built
/// from the credential field.
pub(crate) fn resolve_generator(
    config: &AnalysisConfig,
) -> Result<Arc<dyn TextGenerator>, PagesumError> {
    if let Some(ref generator) = config.generator {
        return Ok(Arc::clone(generator));
    }
    match config.openai_api_key.as_deref() {
        Some(key) if !key.is_empty() => Ok(Arc::new(OpenAiChat::new(
            key,
            &config.model,
            config.temperature,
            config.max_tokens,
            config.api_timeout_secs,
        )?)),
        _ => Err(PagesumError::MissingCredential {
            service: "generation".into(),
            hint: "Set openai_api_key on the builder or inject a TextGenerator.".into(),
        }),
    }
}

/// Render one page and encode it to JPEG bytes, all in memory.
pub(crate) async fn render_encoded(
    pdf_path: &Path,
    config: &AnalysisConfig,
    page_index: usize,
) -> Result<Vec<u8>, PageError> {
    let image = render::render_page(
        pdf_path,
        config.password.as_deref(),
        page_index,
        config.max_rendered_pixels,
    )
    .await?;
    // The bitmap drops at the end of this function; only the JPEG travels on.
    encode::encode_page(&image).map_err(|e| PageError::RenderFailed {
        page: page_index + 1,
        detail: format!("JPEG encoding failed: {e}"),
    })
}

/// Per-stage wall-clock accumulators for one run.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct StageTimings {
    pub render_ms: u64,
    pub ocr_ms: u64,
    pub llm_ms: u64,
}

impl StageTimings {
    fn add(&mut self, other: StageTimings) {
        self.render_ms += other.render_ms;
        self.ocr_ms += other.ocr_ms;
        self.llm_ms += other.llm_ms;
    }
}

/// Run one page through render → OCR → summarise.
///
/// Always returns a `PageRecord` — the error, if any, is inside it. The
/// caller decides whether a failed record aborts the run.
pub(crate) async fn process_page<Fut>(
    ocr: &Arc<dyn OcrEngine>,
    generator: &Arc<dyn TextGenerator>,
    config: &AnalysisConfig,
    page_index: usize,
    jpeg: Fut,
) -> (PageRecord, StageTimings)
where
    Fut: Future<Output = Result<Vec<u8>, PageError>>,
{
    let page_num = page_index + 1;
    let start = Instant::now();
    let mut timings = StageTimings::default();
    let mut retries = 0u8;

    let stage = Instant::now();
    let image = match jpeg.await {
        Ok(bytes) => bytes,
        Err(e) => {
            timings.render_ms = stage.elapsed().as_millis() as u64;
            return (failed_record(page_num, start, retries, 0, e), timings);
        }
    };
    timings.render_ms = stage.elapsed().as_millis() as u64;

    let stage = Instant::now();
    let (text, ocr_retries) = match recognize_with_retry(ocr, page_num, &image, config).await {
        Ok(result) => result,
        Err(e) => {
            timings.ocr_ms = stage.elapsed().as_millis() as u64;
            let retries = retries_of(&e);
            return (failed_record(page_num, start, retries, 0, e), timings);
        }
    };
    timings.ocr_ms = stage.elapsed().as_millis() as u64;
    retries += ocr_retries;
    drop(image);

    let stage = Instant::now();
    let (completion, gen_retries) =
        match summarize_with_retry(generator, page_num, &text, config).await {
            Ok(result) => result,
            Err(e) => {
                timings.llm_ms = stage.elapsed().as_millis() as u64;
                let retries = retries + retries_of(&e);
                return (
                    failed_record(page_num, start, retries, text.len(), e),
                    timings,
                );
            }
        };
    timings.llm_ms = stage.elapsed().as_millis() as u64;
    retries += gen_retries;

    let record = PageRecord {
        page_num,
        summary: completion.content,
        ocr_chars: text.len(),
        input_tokens: completion.prompt_tokens,
        output_tokens: completion.completion_tokens,
        duration_ms: start.elapsed().as_millis() as u64,
        retries,
        error: None,
    };
    (record, timings)
}

/// Retries consumed by a failed stage, as recorded in its error.
fn retries_of(error: &PageError) -> u8 {
    match error {
        PageError::Transport { retries, .. } => *retries as u8,
        _ => 0,
    }
}

fn failed_record(
    page_num: usize,
    start: Instant,
    retries: u8,
    ocr_chars: usize,
    error: PageError,
) -> PageRecord {
    PageRecord {
        page_num,
        summary: String::new(),
        ocr_chars,
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: start.elapsed().as_millis() as u64,
        retries,
        error: Some(error),
    }
}

/// Drive the selected pages through the pipeline, one at a time.
///
/// `render` is the rasterise-and-encode step for one 0-based page index;
/// it is a parameter so the loop can be exercised without a PDF backend.
/// Fires the configured progress callback around every page. With
/// `fail_fast`, the first failed page aborts with
/// [`PagesumError::Aborted`]; otherwise the failure is recorded and the
/// loop continues.
pub(crate) async fn drive_pages<F, Fut>(
    ocr: &Arc<dyn OcrEngine>,
    generator: &Arc<dyn TextGenerator>,
    config: &AnalysisConfig,
    page_indices: &[usize],
    mut render: F,
) -> Result<(Vec<PageRecord>, StageTimings), PagesumError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<u8>, PageError>>,
{
    let total = page_indices.len();
    let mut records = Vec::with_capacity(total);
    let mut timings = StageTimings::default();

    for (pos, &idx) in page_indices.iter().enumerate() {
        let page_num = idx + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, total);
        }

        let (record, page_timings) =
            process_page(ocr, generator, config, idx, render(idx)).await;
        timings.add(page_timings);
        let pages_done = pos + 1;

        match record.error {
            None => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_complete(page_num, pages_done, total, record.summary.len());
                }
            }
            Some(ref error) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(page_num, pages_done, total, &error.to_string());
                }
                if config.fail_fast {
                    return Err(PagesumError::Aborted {
                        page: page_num,
                        source: error.clone(),
                    });
                }
            }
        }

        records.push(record);
    }

    Ok((records, timings))
}

fn empty_stats(total_duration_ms: u64) -> AnalysisStats {
    AnalysisStats {
        total_pages: 0,
        processed_pages: 0,
        failed_pages: 0,
        total_input_tokens: 0,
        total_output_tokens: 0,
        total_duration_ms,
        render_duration_ms: 0,
        ocr_duration_ms: 0,
        llm_duration_ms: 0,
    }
}
