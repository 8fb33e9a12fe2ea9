// Shared types for the signboard translation workflow

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<crate::pipeline::TranslationPipeline>,
    pub db: Arc<crate::storage::Database>,
    pub metrics: crate::utils::Metrics,
}

/// Axis-aligned rectangle in original-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// A zero-width or zero-height box carries no drawable region
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One recognized text region with its geometry and recognition confidence.
///
/// The bounding box is fixed at extraction time; translation only ever fills
/// in `translated_text` and `detected_language`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence,
            translated_text: None,
            detected_language: None,
        }
    }

    /// True when the fragment has a translation that differs from the
    /// recognized text, i.e. an overlay would actually change the image.
    pub fn is_visibly_translated(&self) -> bool {
        self.translated_text
            .as_deref()
            .map(|t| t != self.text)
            .unwrap_or(false)
    }
}

/// Output of one end-to-end pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Fragments in OCR emission order, never re-sorted
    pub fragments: Vec<TextFragment>,
    /// Encoded PNG with overlays; `None` when composition failed or no
    /// fragments existed
    pub composed_png: Option<Vec<u8>>,
    /// Decoded dimensions of the uploaded image (width, height)
    pub dimensions: (u32, u32),
    /// Wall-clock time from pipeline entry to exit
    pub elapsed: Duration,
}

impl PipelineOutput {
    pub fn original_texts(&self) -> Vec<String> {
        self.fragments.iter().map(|f| f.text.clone()).collect()
    }

    pub fn translated_texts(&self) -> Vec<String> {
        self.fragments
            .iter()
            .map(|f| f.translated_text.clone().unwrap_or_else(|| f.text.clone()))
            .collect()
    }

    pub fn confidence_scores(&self) -> Vec<f32> {
        self.fragments.iter().map(|f| f.confidence).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_degeneracy() {
        assert!(BoundingBox::new(0, 0, 0, 10).is_degenerate());
        assert!(BoundingBox::new(0, 0, 10, 0).is_degenerate());
        assert!(!BoundingBox::new(5, 5, 1, 1).is_degenerate());
    }

    #[test]
    fn visibly_translated_requires_a_difference() {
        let mut fragment = TextFragment::new("STOP", BoundingBox::new(10, 10, 50, 20), 85.0);
        assert!(!fragment.is_visibly_translated());

        fragment.translated_text = Some("STOP".to_string());
        assert!(!fragment.is_visibly_translated());

        fragment.translated_text = Some("ARRÊT".to_string());
        assert!(fragment.is_visibly_translated());
    }
}
