//! PDF rasterisation: render one page on demand via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! thread pool thread designed for blocking operations, preventing the
//! Tokio worker threads from stalling during CPU-heavy rendering.
//!
//! ## Why one page per call?
//!
//! The run loop processes a page completely (render → OCR → summarise)
//! before touching the next, and a rendered bitmap is dropped as soon as
//! it has been encoded. Rendering on demand keeps at most one page's
//! pixels alive at any moment, so a 400-page scan costs no more memory
//! than a 1-page one. The document is reopened per call; pdfium's open is
//! cheap next to the two network round-trips each page already pays.
//!
//! ## Why cap pixels?
//!
//! Page sizes vary wildly: an A0 poster would produce a 12,000 × 17,000 px
//! bitmap at natural scale. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded and staying well
//! under the OCR service's request-size limit.

use crate::error::{PageError, PagesumError};
use crate::output::DocumentMetadata;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

/// Bind to the pdfium library.
///
/// Honours `PDFIUM_LIB_PATH` when set; otherwise searches the system
/// library paths.
fn bind_pdfium() -> Result<Pdfium, PagesumError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_system_library(),
    };
    bindings
        .map(Pdfium::new)
        .map_err(|e| PagesumError::PdfiumBindingFailed(format!("{:?}", e)))
}

/// Classify a pdfium document-open failure into the fatal error taxonomy.
fn classify_open_error(e: PdfiumError, pdf_path: &Path, password: Option<&str>) -> PagesumError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            PagesumError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            PagesumError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        PagesumError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: err_str,
        }
    }
}

/// Rasterise a single page of a PDF into an image.
///
/// `page_index` is 0-based and must lie in `[0, page_count)` — the caller
/// obtains the page count from [`extract_metadata`] before iterating, so
/// an out-of-range index is a bug in the caller, not a recoverable
/// condition. Runs inside `spawn_blocking` since pdfium operations are
/// CPU-bound.
pub async fn render_page(
    pdf_path: &Path,
    password: Option<&str>,
    page_index: usize,
    max_pixels: u32,
) -> Result<DynamicImage, PageError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || {
        render_page_blocking(&path, pwd.as_deref(), page_index, max_pixels)
    })
    .await
    .map_err(|e| PageError::RenderFailed {
        page: page_index + 1,
        detail: format!("Render task panicked: {}", e),
    })?
}

/// Blocking implementation of single-page rendering.
fn render_page_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    page_index: usize,
    max_pixels: u32,
) -> Result<DynamicImage, PageError> {
    let page_num = page_index + 1;
    let to_page_error = |detail: String| PageError::RenderFailed {
        page: page_num,
        detail,
    };

    let pdfium = bind_pdfium().map_err(|e| to_page_error(e.to_string()))?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| to_page_error(format!("{:?}", e)))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    debug_assert!(
        page_index < total_pages,
        "page index {page_index} out of range (total {total_pages})"
    );
    if page_index >= total_pages {
        return Err(to_page_error(format!(
            "page index {page_index} out of range (total {total_pages})"
        )));
    }

    let page = pages
        .get(page_index as u16)
        .map_err(|e| to_page_error(format!("{:?}", e)))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| to_page_error(format!("{:?}", e)))?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        page_num,
        image.width(),
        image.height()
    );

    Ok(image)
}

/// Extract document metadata from a PDF without rendering any page.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, PagesumError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| PagesumError::Internal(format!("Metadata task panicked: {}", e)))?
}

/// Blocking implementation of metadata extraction.
fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, PagesumError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| classify_open_error(e, pdf_path, password))?;

    let metadata = document.metadata();
    let pages = document.pages();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: pages.len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}
