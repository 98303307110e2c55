//! Output types: per-page records, document metadata, and run statistics.
//!
//! [`AnalysisOutput`] is the result set of a run: one [`PageRecord`] per
//! attempted page, sorted ascending by page number. A record either carries
//! the generated summary or the [`PageError`] that stopped that page, so a
//! caller can always see exactly which pages succeeded and why the rest
//! did not.

use crate::error::{PageError, PagesumError};
use serde::{Deserialize, Serialize};

/// Result of analysing one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// 1-based page number.
    pub page_num: usize,
    /// The generated summary. Empty when `error` is set.
    pub summary: String,
    /// Length in characters of the recognised text submitted for this page.
    ///
    /// Zero is legal — a blank page recognises to an empty string and is
    /// still summarised.
    pub ocr_chars: usize,
    /// Prompt tokens reported by the generation service.
    pub input_tokens: usize,
    /// Completion tokens reported by the generation service.
    pub output_tokens: usize,
    /// Wall-clock time spent on this page (render + OCR + generation).
    pub duration_ms: u64,
    /// Retries consumed across both remote calls for this page.
    pub retries: u8,
    /// Set when the page failed; the run continued unless `fail_fast` was on.
    pub error: Option<PageError>,
}

impl PageRecord {
    /// True when the page produced a summary.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Document metadata extracted from the PDF, without touching either
/// remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    /// Number of renderable pages. Zero is legal.
    pub page_count: usize,
    pub pdf_version: String,
}

/// Aggregate statistics for a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages that produced a summary.
    pub processed_pages: usize,
    /// Pages that failed.
    pub failed_pages: usize,
    /// Prompt tokens across all pages.
    pub total_input_tokens: u64,
    /// Completion tokens across all pages.
    pub total_output_tokens: u64,
    /// End-to-end wall-clock time.
    pub total_duration_ms: u64,
    /// Time spent rasterising pages.
    pub render_duration_ms: u64,
    /// Time spent in OCR calls.
    pub ocr_duration_ms: u64,
    /// Time spent in generation calls.
    pub llm_duration_ms: u64,
}

/// The complete result of a per-page analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// One record per attempted page, ascending by page number.
    pub pages: Vec<PageRecord>,
    /// Metadata of the analysed document.
    pub metadata: DocumentMetadata,
    /// Aggregate run statistics.
    pub stats: AnalysisStats,
}

impl AnalysisOutput {
    /// Render the per-page report the presentation surface displays:
    /// one labelled block per page, ascending, failed pages annotated with
    /// their error message.
    pub fn render_report(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.pages.len());
        for record in &self.pages {
            let body = match &record.error {
                None => record.summary.trim_end().to_string(),
                Some(e) => format!("[failed: {e}]"),
            };
            parts.push(format!("## Page {}\n\n{}\n", record.page_num, body));
        }
        parts.join("\n")
    }

    /// Treat any page failure as a fatal error.
    ///
    /// Returns `self` unchanged when every page succeeded, otherwise
    /// [`PagesumError::PartialFailure`] with the success/failure counts.
    pub fn into_result(self) -> Result<Self, PagesumError> {
        let failed = self.stats.failed_pages;
        if failed == 0 {
            Ok(self)
        } else {
            Err(PagesumError::PartialFailure {
                success: self.stats.processed_pages,
                failed,
                total: self.pages.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(page_num: usize, summary: &str) -> PageRecord {
        PageRecord {
            page_num,
            summary: summary.to_string(),
            ocr_chars: summary.len(),
            input_tokens: 10,
            output_tokens: 5,
            duration_ms: 100,
            retries: 0,
            error: None,
        }
    }

    fn stats(processed: usize, failed: usize) -> AnalysisStats {
        AnalysisStats {
            total_pages: processed + failed,
            processed_pages: processed,
            failed_pages: failed,
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_duration_ms: 0,
            render_duration_ms: 0,
            ocr_duration_ms: 0,
            llm_duration_ms: 0,
        }
    }

    fn metadata(page_count: usize) -> DocumentMetadata {
        DocumentMetadata {
            title: None,
            author: None,
            subject: None,
            creator: None,
            producer: None,
            creation_date: None,
            modification_date: None,
            page_count,
            pdf_version: "1.7".into(),
        }
    }

    #[test]
    fn report_labels_pages_in_order() {
        let output = AnalysisOutput {
            pages: vec![record(1, "Total: 10 EUR"), record(2, "Total: 20 EUR")],
            metadata: metadata(2),
            stats: stats(2, 0),
        };
        let report = output.render_report();
        let page1 = report.find("## Page 1").expect("page 1 header");
        let page2 = report.find("## Page 2").expect("page 2 header");
        assert!(page1 < page2);
        assert!(report.contains("Total: 10 EUR"));
        assert!(report.contains("Total: 20 EUR"));
    }

    #[test]
    fn report_annotates_failed_pages() {
        let mut failed = record(2, "");
        failed.error = Some(PageError::RecognitionFailed {
            page: 2,
            message: "bad payload".into(),
        });
        let output = AnalysisOutput {
            pages: vec![record(1, "ok"), failed],
            metadata: metadata(2),
            stats: stats(1, 1),
        };
        let report = output.render_report();
        assert!(report.contains("[failed:"));
        assert!(report.contains("bad payload"));
    }

    #[test]
    fn into_result_passes_clean_runs() {
        let output = AnalysisOutput {
            pages: vec![record(1, "ok")],
            metadata: metadata(1),
            stats: stats(1, 0),
        };
        assert!(output.into_result().is_ok());
    }

    #[test]
    fn into_result_rejects_partial_runs() {
        let mut failed = record(1, "");
        failed.error = Some(PageError::GenerationFailed {
            page: 1,
            message: "quota".into(),
        });
        let output = AnalysisOutput {
            pages: vec![failed, record(2, "ok")],
            metadata: metadata(2),
            stats: stats(1, 1),
        };
        let err = output.into_result().unwrap_err();
        assert!(matches!(
            err,
            PagesumError::PartialFailure {
                success: 1,
                failed: 1,
                total: 2
            }
        ));
    }

    #[test]
    fn output_serialises_to_json() {
        let output = AnalysisOutput {
            pages: vec![record(1, "ok")],
            metadata: metadata(1),
            stats: stats(1, 0),
        };
        let json = serde_json::to_string(&output).expect("serialise");
        assert!(json.contains("\"page_num\":1"));
    }
}
