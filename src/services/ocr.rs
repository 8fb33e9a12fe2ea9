// OCR capability boundary
//
// The pipeline never talks to a concrete recognizer; it sees `OcrEngine`
// and the production build binds the HTTP-backed implementation below.
// Tests bind deterministic stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::core::errors::{OcrError, OcrResult};

/// One raw candidate region as reported by the OCR capability, before any
/// admission policy is applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrCandidate {
    pub text: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
}

/// Black-box OCR capability: preprocessed raster in, candidate regions out
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text regions in a PNG-encoded image.
    ///
    /// Candidates are returned in the engine's native scan order; callers
    /// must not re-sort them.
    async fn recognize(&self, png_bytes: &[u8]) -> OcrResult<Vec<OcrCandidate>>;
}

/// HTTP-backed OCR engine: POSTs the image to a configured endpoint that
/// answers a JSON candidate list
pub struct HttpOcrEngine {
    endpoint: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    candidates: Vec<OcrCandidate>,
}

impl HttpOcrEngine {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> OcrResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
        })
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    async fn recognize(&self, png_bytes: &[u8]) -> OcrResult<Vec<OcrCandidate>> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "image/png")
            .body(png_bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrError::BadStatus(status.as_u16()));
        }

        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| OcrError::InvalidResponse(e.to_string()))?;

        debug!("OCR capability returned {} candidates", body.candidates.len());
        Ok(body.candidates)
    }
}
