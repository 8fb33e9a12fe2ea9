// Translation capability boundary
//
// Mirrors the OCR boundary: a single black-box call signature behind a
// trait, with the HTTP implementation bound in production and stubs in
// tests. Source language is always auto-detected by the capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::core::errors::{TranslationError, TranslationResult};

/// Result of one capability call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub translated_text: String,
    /// Two-letter code of the language the capability detected in the input
    pub detected_source_language: String,
}

/// Black-box translation capability
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> TranslationResult<Translation>;
}

/// HTTP-backed translation engine
pub struct HttpTranslationEngine {
    endpoint: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
}

impl HttpTranslationEngine {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> TranslationResult<Self> {
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
impl TranslationEngine for HttpTranslationEngine {
    async fn translate(&self, text: &str, target_language: &str) -> TranslationResult<Translation> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&TranslateRequest {
                q: text,
                target: target_language,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::BadStatus(status.as_u16()));
        }

        let translation: Translation = response
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

        debug!(
            "translated {} chars ({} -> {})",
            text.chars().count(),
            translation.detected_source_language,
            target_language
        );
        Ok(translation)
    }
}
