//! Prompts for the summary-generation service.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the default steering (e.g.
//!    tightening the table rule) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the exact user message a
//!    page produces without calling a live service.
//!
//! Callers can override the default via
//! [`crate::config::AnalysisConfig::system_prompt`]; the constant here is
//! used only when no override is provided.

/// Default system instruction for summarising one page of recognised text.
///
/// Steers the model toward a concise, accurate, invoice-style summary,
/// rendered as a table when the page contains tabular data. The model is
/// asked, not forced: the response stays free-form.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are given the text recognised from one page of a scanned document. \
Produce a concise, accurate, invoice-style summary of it. \
Keep every amount, date, identifier, and party name exactly as it appears. \
If the page contains tabular data, render it as a table. \
Do not add commentary or information that is not on the page.";

/// Build the user message for one page.
///
/// Embeds the 1-based page number followed by the recognised text. The
/// text may be empty (blank page) — the service is still asked and may
/// return a trivial summary.
pub fn page_message(page_num: usize, page_text: &str) -> String {
    format!("Page {page_num}:\n{page_text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_message_embeds_one_based_number() {
        let msg = page_message(3, "Total: 10");
        assert_eq!(msg, "Page 3:\nTotal: 10");
    }

    #[test]
    fn page_message_accepts_empty_text() {
        let msg = page_message(1, "");
        assert_eq!(msg, "Page 1:\n");
    }
}
