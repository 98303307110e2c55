//! OCR: submit an encoded page image to the text-detection service.
//!
//! The service boundary is the [`OcrEngine`] trait; the pipeline only ever
//! sees `recognize(bytes) -> text`. [`GoogleVisionOcr`] is the production
//! implementation, speaking the Cloud Vision `images:annotate` REST
//! surface with a `TEXT_DETECTION` feature.
//!
//! ## Error split
//!
//! The service can fail two ways, and the pipeline treats them
//! differently:
//!
//! * [`OcrError::Service`] — the service processed the request and
//!   reported an error for this image (in the per-image `error.message`
//!   field). Permanent for this page; never retried.
//! * [`OcrError::Transport`] — the request itself failed (network, auth,
//!   timeout, 429/5xx). Retried with exponential backoff by
//!   [`recognize_with_retry`].
//!
//! A response with an error message is a failure even when annotations
//! are also present; a response with no annotations at all is a blank
//! page and recognises to the empty string.

use crate::config::AnalysisConfig;
use crate::error::{PageError, PagesumError, PipelineStage};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

const VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Failure modes of one OCR request.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// The service reported an error for this image.
    #[error("{0}")]
    Service(String),
    /// The request failed in transit (network, auth, timeout, throttling).
    #[error("{0}")]
    Transport(String),
}

/// The text-recognition service boundary.
///
/// Implementations must be `Send + Sync`; the pipeline holds one engine
/// for the whole run. Inject a custom implementation via
/// [`crate::config::AnalysisConfigBuilder::ocr`] — tests use this seam to
/// substitute a deterministic stub.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognise all text in an encoded raster image.
    ///
    /// Returns every detected text span newline-joined, in the order the
    /// service reports them (service-defined; not guaranteed to be human
    /// reading order). A blank image yields `Ok("")`.
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError>;
}

// ── Google Cloud Vision ──────────────────────────────────────────────────

/// OCR via the Google Cloud Vision `images:annotate` endpoint.
pub struct GoogleVisionOcr {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GoogleVisionOcr {
    /// Create an engine with the given API key and per-request timeout.
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, PagesumError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PagesumError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: VISION_ENDPOINT.to_string(),
        })
    }

    /// Override the service endpoint (self-hosted proxies, regional hosts).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl OcrEngine for GoogleVisionOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let body = AnnotateRequest {
            requests: vec![ImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(image),
                },
                features: vec![Feature {
                    kind: "TEXT_DETECTION",
                }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| OcrError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(OcrError::Transport(format!(
                "HTTP {status}: {}",
                snippet(&detail)
            )));
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| OcrError::Transport(format!("Malformed response: {e}")))?;

        let image_response = parsed
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::Transport("Empty annotate response".to_string()))?;

        collect_text(image_response)
    }
}

/// Extract the recognised text from one per-image response.
///
/// An error message from the service wins over any annotations that came
/// with it.
fn collect_text(response: ImageResponse) -> Result<String, OcrError> {
    if let Some(status) = response.error {
        if !status.message.is_empty() {
            return Err(OcrError::Service(status.message));
        }
    }

    let text = response
        .text_annotations
        .iter()
        .map(|a| a.description.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    Ok(text)
}

/// Truncate an error body for logs and error messages.
fn snippet(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    body[..end].trim_end()
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct AnnotateRequest {
    requests: Vec<ImageRequest>,
}

#[derive(Serialize)]
struct ImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize, Default)]
struct ImageResponse {
    #[serde(default, rename = "textAnnotations")]
    text_annotations: Vec<TextAnnotation>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

// ── Retry wrapper ────────────────────────────────────────────────────────

/// Recognise one page's image, retrying transport failures.
///
/// Service-reported errors surface immediately as
/// [`PageError::RecognitionFailed`]; transport failures are retried
/// `config.max_retries` times with exponential backoff before surfacing
/// as [`PageError::Transport`]. Returns the recognised text and the
/// number of retries consumed.
pub(crate) async fn recognize_with_retry(
    engine: &Arc<dyn OcrEngine>,
    page_num: usize,
    image: &[u8],
    config: &AnalysisConfig,
) -> Result<(String, u8), PageError> {
    let mut last_err = String::new();

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}: OCR retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match engine.recognize(image).await {
            Ok(text) => {
                debug!("Page {}: {} chars recognised", page_num, text.len());
                return Ok((text, attempt as u8));
            }
            Err(OcrError::Service(message)) => {
                return Err(PageError::RecognitionFailed {
                    page: page_num,
                    message,
                });
            }
            Err(OcrError::Transport(detail)) => {
                warn!("Page {}: OCR attempt {} failed — {}", page_num, attempt + 1, detail);
                last_err = detail;
            }
        }
    }

    Err(PageError::Transport {
        page: page_num,
        stage: PipelineStage::Recognition,
        retries: config.max_retries,
        detail: last_err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ImageResponse {
        let parsed: AnnotateResponse = serde_json::from_str(json).expect("valid json");
        parsed.responses.into_iter().next().expect("one response")
    }

    #[test]
    fn annotations_join_in_service_order() {
        let response = parse(
            r#"{"responses":[{"textAnnotations":[
                {"description":"Total: 10\nDue: 2024-01-31"},
                {"description":"Total:"},
                {"description":"10"}
            ]}]}"#,
        );
        let text = collect_text(response).expect("ok");
        assert_eq!(text, "Total: 10\nDue: 2024-01-31\nTotal:\n10");
    }

    #[test]
    fn blank_page_recognises_to_empty_string() {
        let response = parse(r#"{"responses":[{}]}"#);
        assert_eq!(collect_text(response).expect("ok"), "");
    }

    #[test]
    fn error_message_wins_over_annotations() {
        let response = parse(
            r#"{"responses":[{
                "textAnnotations":[{"description":"partial"}],
                "error":{"code":3,"message":"Bad image data."}
            }]}"#,
        );
        let err = collect_text(response).unwrap_err();
        assert!(matches!(err, OcrError::Service(ref m) if m == "Bad image data."));
    }

    #[test]
    fn empty_error_message_is_not_a_failure() {
        let response = parse(
            r#"{"responses":[{
                "textAnnotations":[{"description":"ok"}],
                "error":{"message":""}
            }]}"#,
        );
        assert_eq!(collect_text(response).expect("ok"), "ok");
    }

    #[test]
    fn request_body_shape() {
        let body = AnnotateRequest {
            requests: vec![ImageRequest {
                image: ImageContent {
                    content: "aGk=".into(),
                },
                features: vec![Feature {
                    kind: "TEXT_DETECTION",
                }],
            }],
        };
        let json = serde_json::to_string(&body).expect("serialise");
        assert!(json.contains("\"type\":\"TEXT_DETECTION\""));
        assert!(json.contains("\"content\":\"aGk=\""));
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let long = "x".repeat(500);
        assert_eq!(snippet(&long).len(), 200);
        assert_eq!(snippet("short"), "short");
    }
}
