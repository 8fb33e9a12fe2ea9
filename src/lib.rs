// Library exports for the signboard translation service

pub mod api;
pub mod core;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::Config,
    errors::{ComposeError, ConfigError, OcrError, PipelineError, StorageError, TranslationError},
    types::{AppState, BoundingBox, PipelineOutput, TextFragment},
};

pub use crate::pipeline::{FragmentTranslator, ImageComposer, TextExtractor, TranslationPipeline};

pub use crate::services::{
    FontResolver, HttpOcrEngine, HttpTranslationEngine, OcrCandidate, OcrEngine, ResolvedFont,
    Translation, TranslationEngine,
};

pub use crate::storage::Database;

pub use crate::utils::Metrics;
