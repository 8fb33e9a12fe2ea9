// Fragment extraction: OCR capability call plus admission policy
//
// The policy keeps recall high on purpose: only obvious noise is dropped
// (no-signal confidence, single characters, degenerate boxes). OCR failure
// is not fatal; it reads as "no text detected".

use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::config::ExtractionConfig;
use crate::core::types::{BoundingBox, TextFragment};
use crate::services::ocr::{OcrCandidate, OcrEngine};

pub struct TextExtractor {
    engine: Arc<dyn OcrEngine>,
    min_confidence: f32,
    min_text_chars: usize,
}

impl TextExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, config: &ExtractionConfig) -> Self {
        Self {
            engine,
            min_confidence: config.min_confidence,
            min_text_chars: config.min_text_chars,
        }
    }

    /// Extract admitted fragments from a preprocessed PNG, preserving the
    /// OCR capability's emission order.
    pub async fn extract(&self, preprocessed_png: &[u8]) -> Vec<TextFragment> {
        let candidates = match self.engine.recognize(preprocessed_png).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("OCR capability failed, treating as no text: {e}");
                return Vec::new();
            }
        };

        let total = candidates.len();
        let fragments: Vec<TextFragment> = candidates
            .into_iter()
            .filter_map(|c| self.admit(c))
            .collect();
        debug!("admitted {}/{} OCR candidates", fragments.len(), total);
        fragments
    }

    fn admit(&self, candidate: OcrCandidate) -> Option<TextFragment> {
        // Strictly greater: a threshold of 1.0 still rejects the engine's
        // "no signal" rows reported with confidence <= 1.
        if !(candidate.confidence > self.min_confidence) {
            return None;
        }

        let text = candidate.text.trim();
        if text.chars().count() < self.min_text_chars {
            return None;
        }

        let bbox = BoundingBox::new(candidate.x, candidate.y, candidate.width, candidate.height);
        if bbox.is_degenerate() {
            return None;
        }

        Some(TextFragment::new(text, bbox, candidate.confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{OcrError, OcrResult};
    use async_trait::async_trait;

    struct ScriptedOcr(Vec<OcrCandidate>);

    #[async_trait]
    impl OcrEngine for ScriptedOcr {
        async fn recognize(&self, _png_bytes: &[u8]) -> OcrResult<Vec<OcrCandidate>> {
            Ok(self.0.clone())
        }
    }

    struct FailingOcr;

    #[async_trait]
    impl OcrEngine for FailingOcr {
        async fn recognize(&self, _png_bytes: &[u8]) -> OcrResult<Vec<OcrCandidate>> {
            Err(OcrError::InvalidResponse("engine crashed".to_string()))
        }
    }

    fn candidate(text: &str, confidence: f32) -> OcrCandidate {
        OcrCandidate {
            text: text.to_string(),
            x: 10,
            y: 10,
            width: 50,
            height: 20,
            confidence,
        }
    }

    fn extractor(engine: Arc<dyn OcrEngine>) -> TextExtractor {
        TextExtractor::new(engine, &ExtractionConfig::default())
    }

    #[tokio::test]
    async fn drops_no_signal_confidence() {
        let extractor = extractor(Arc::new(ScriptedOcr(vec![
            candidate("EXIT", 0.5),
            candidate("OPEN", 1.0),
            candidate("SALE", 42.0),
        ])));
        let fragments = extractor.extract(b"png").await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, "SALE");
    }

    #[tokio::test]
    async fn drops_single_characters_and_whitespace() {
        let extractor = extractor(Arc::new(ScriptedOcr(vec![
            candidate("A", 90.0),
            candidate("  ", 90.0),
            candidate(" OK ", 90.0),
        ])));
        let fragments = extractor.extract(b"png").await;
        assert_eq!(fragments.len(), 1);
        // Whitespace is trimmed before admission and storage
        assert_eq!(fragments[0].text, "OK");
    }

    #[tokio::test]
    async fn drops_degenerate_boxes() {
        let mut flat = candidate("WIDE", 90.0);
        flat.height = 0;
        let extractor = extractor(Arc::new(ScriptedOcr(vec![flat])));
        assert!(extractor.extract(b"png").await.is_empty());
    }

    #[tokio::test]
    async fn preserves_emission_order() {
        let extractor = extractor(Arc::new(ScriptedOcr(vec![
            candidate("THIRD", 30.0),
            candidate("FIRST", 90.0),
            candidate("SECOND", 60.0),
        ])));
        let fragments = extractor.extract(b"png").await;
        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["THIRD", "FIRST", "SECOND"]);
    }

    #[tokio::test]
    async fn engine_failure_degrades_to_empty() {
        let extractor = extractor(Arc::new(FailingOcr));
        assert!(extractor.extract(b"png").await.is_empty());
    }
}
