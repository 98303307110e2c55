//! Integration tests for the fatal-error surface of the pipeline.
//!
//! Everything here runs without a pdfium library and without live
//! credentials: these paths fail (by design) before the PDF backend or
//! either remote service is touched. Tests that open a real PDF live in
//! `tests/e2e.rs` behind an env-var gate.

use async_trait::async_trait;
use pagesum::{
    analyze, analyze_from_bytes, analyze_stream_from_bytes, AnalysisConfig, Completion,
    GenerationError, OcrEngine, OcrError, PagesumError, TextGenerator,
};
use std::path::PathBuf;
use std::sync::Arc;

// ── Stub engines ─────────────────────────────────────────────────────────

struct StubOcr;

#[async_trait]
impl OcrEngine for StubOcr {
    async fn recognize(&self, _image: &[u8]) -> Result<String, OcrError> {
        Ok("stub text".to_string())
    }
}

struct StubGenerator;

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn complete(&self, _system: &str, user: &str) -> Result<Completion, GenerationError> {
        Ok(Completion {
            content: format!("summary of: {user}"),
            prompt_tokens: 1,
            completion_tokens: 1,
        })
    }
}

fn stub_config() -> AnalysisConfig {
    AnalysisConfig::builder()
        .ocr(Arc::new(StubOcr))
        .generator(Arc::new(StubGenerator))
        .build()
        .expect("valid config")
}

// ── Startup preconditions ────────────────────────────────────────────────

#[tokio::test]
async fn missing_ocr_credential_fails_before_opening_the_document() {
    let mut config = stub_config();
    config.ocr = None;
    config.vision_api_key = None;

    // The input path does not exist; the credential check must fire first.
    let err = analyze("/no/such/file.pdf", &config).await.unwrap_err();
    assert!(
        matches!(err, PagesumError::MissingCredential { ref service, .. } if service == "OCR"),
        "got: {err}"
    );
}

#[tokio::test]
async fn missing_generation_credential_fails_before_opening_the_document() {
    let mut config = stub_config();
    config.generator = None;
    config.openai_api_key = None;

    let err = analyze("/no/such/file.pdf", &config).await.unwrap_err();
    assert!(
        matches!(err, PagesumError::MissingCredential { ref service, .. } if service == "generation"),
        "got: {err}"
    );
}

// ── Input validation ─────────────────────────────────────────────────────

#[tokio::test]
async fn nonexistent_file_is_fatal() {
    let err = analyze("/definitely/not/a/real/file.pdf", &stub_config())
        .await
        .unwrap_err();
    assert!(matches!(err, PagesumError::FileNotFound { .. }), "got: {err}");
}

#[tokio::test]
async fn non_pdf_bytes_are_rejected() {
    let err = analyze_from_bytes(b"GIF89a not a pdf at all", &stub_config())
        .await
        .unwrap_err();
    match err {
        PagesumError::NotAPdf { path, magic } => {
            assert_eq!(&magic, b"GIF8");
            // The transient file carrying the upload must be gone.
            assert!(!path.exists(), "transient file leaked: {}", path.display());
        }
        other => panic!("expected NotAPdf, got: {other}"),
    }
}

#[tokio::test]
async fn non_pdf_bytes_are_rejected_by_the_stream_api() {
    let err = analyze_stream_from_bytes(b"PK\x03\x04zipfile", &stub_config())
        .await
        .err()
        .expect("stream construction must fail");
    match err {
        PagesumError::NotAPdf { path, .. } => {
            assert!(!path.exists(), "transient file leaked: {}", path.display());
        }
        other => panic!("expected NotAPdf, got: {other}"),
    }
}

#[tokio::test]
async fn non_pdf_local_file_is_rejected_without_deleting_it() {
    use std::io::Write;
    let dir = tempfile::TempDir::new().expect("tempdir");
    let path: PathBuf = dir.path().join("notes.pdf");
    let mut f = std::fs::File::create(&path).expect("create");
    f.write_all(b"plain text masquerading as pdf").expect("write");

    let err = analyze(path.to_str().expect("utf8"), &stub_config())
        .await
        .unwrap_err();
    assert!(matches!(err, PagesumError::NotAPdf { .. }), "got: {err}");
    // User-supplied files are never cleaned up by the library.
    assert!(path.exists());
}
