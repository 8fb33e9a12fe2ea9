// Custom error types for better error handling and debugging
//
// Using thiserror for ergonomic error definitions. Only `PipelineError`
// ever crosses the pipeline boundary; the capability errors are absorbed
// where they occur and degrade to passthrough data.

use thiserror::Error;

/// Pipeline orchestration errors.
///
/// Undecodable input is the single hard failure the pipeline surfaces;
/// everything downstream degrades in place.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("image bytes could not be decoded: {0}")]
    InvalidImage(#[from] image::ImageError),
}

/// OCR capability errors
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("OCR endpoint returned status {0}")]
    BadStatus(u16),

    #[error("malformed OCR response: {0}")]
    InvalidResponse(String),
}

/// Translation capability errors
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("translation request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("translation endpoint returned status {0}")]
    BadStatus(u16),

    #[error("malformed translation response: {0}")]
    InvalidResponse(String),
}

/// Image composition errors
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("image operation failed: {0}")]
    Image(#[from] image::ImageError),
}

/// History/session store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored payload is not valid JSON: {0}")]
    CorruptPayload(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    TaskJoinFailed(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("minimum confidence must be finite and non-negative, got {0}")]
    InvalidConfidenceThreshold(f32),

    #[error("invalid extraction config: {0}")]
    InvalidExtractionConfig(String),

    #[error("invalid capability endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("invalid translation config: {0}")]
    InvalidTranslationConfig(String),

    #[error("invalid compose config: {0}")]
    InvalidComposeConfig(String),

    #[error("invalid upload config: {0}")]
    InvalidUploadConfig(String),
}

// Convenience type aliases for Results
pub type OcrResult<T> = Result<T, OcrError>;
pub type TranslationResult<T> = Result<T, TranslationError>;
pub type StorageResult<T> = Result<T, StorageError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
