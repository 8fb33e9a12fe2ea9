// Per-fragment translation with pass-through fallback
//
// Each fragment is independent: a failing call degrades that fragment to
// its original text and never touches its siblings. Trivial inputs (empty,
// single character, bare numbers) skip the capability entirely.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::types::TextFragment;
use crate::services::translation::TranslationEngine;

/// Result of translating one fragment's text
#[derive(Debug, Clone)]
pub struct TranslationOutcome {
    pub text: String,
    /// Detected source language, when the capability was actually consulted
    pub detected_language: Option<String>,
}

impl TranslationOutcome {
    fn passthrough(text: &str) -> Self {
        Self {
            text: text.to_string(),
            detected_language: None,
        }
    }
}

pub struct FragmentTranslator {
    engine: Arc<dyn TranslationEngine>,
    max_concurrency: usize,
}

impl FragmentTranslator {
    pub fn new(engine: Arc<dyn TranslationEngine>, max_concurrency: usize) -> Self {
        Self {
            engine,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Translate one text. Never fails; every degraded path returns the
    /// input unchanged.
    pub async fn translate(&self, text: &str, target_language: &str) -> TranslationOutcome {
        if text.trim().is_empty() {
            return TranslationOutcome::passthrough(text);
        }

        let trimmed = text.trim();
        if trimmed.chars().count() < 2 || trimmed.chars().all(|c| c.is_ascii_digit()) {
            // Labels and bare numbers: translating "7" or "A" is
            // meaningless and risks mistranslation
            return TranslationOutcome::passthrough(text);
        }

        match self.engine.translate(text, target_language).await {
            Ok(translation) => {
                if translation.detected_source_language == target_language {
                    // Same-language round trips can still alter casing or
                    // spelling; keep the original
                    return TranslationOutcome {
                        text: text.to_string(),
                        detected_language: Some(translation.detected_source_language),
                    };
                }
                debug!(
                    "'{}' -> '{}' ({} -> {})",
                    text, translation.translated_text,
                    translation.detected_source_language, target_language
                );
                TranslationOutcome {
                    text: translation.translated_text,
                    detected_language: Some(translation.detected_source_language),
                }
            }
            Err(e) => {
                warn!("translation failed for '{text}', passing through: {e}");
                TranslationOutcome::passthrough(text)
            }
        }
    }

    /// Translate every fragment in place.
    ///
    /// Calls are issued with bounded concurrency as a pure optimization;
    /// `buffered` yields results in input order, so the fragment sequence
    /// is never reordered.
    pub async fn translate_all(&self, fragments: &mut [TextFragment], target_language: &str) {
        let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();

        let outcomes: Vec<TranslationOutcome> = stream::iter(texts)
            .map(|text| async move { self.translate(&text, target_language).await })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        for (fragment, outcome) in fragments.iter_mut().zip(outcomes) {
            fragment.translated_text = Some(outcome.text);
            fragment.detected_language = outcome.detected_language;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{TranslationError, TranslationResult};
    use crate::core::types::BoundingBox;
    use crate::services::translation::Translation;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Uppercases the input and reports "xx" as the detected language,
    /// counting how often it is consulted
    struct CountingEngine {
        calls: AtomicUsize,
        detected: &'static str,
    }

    impl CountingEngine {
        fn new(detected: &'static str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                detected,
            }
        }
    }

    #[async_trait]
    impl TranslationEngine for CountingEngine {
        async fn translate(
            &self,
            text: &str,
            _target_language: &str,
        ) -> TranslationResult<Translation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Translation {
                translated_text: text.to_uppercase(),
                detected_source_language: self.detected.to_string(),
            })
        }
    }

    /// Fails for one specific input, translates everything else
    struct SelectivelyFailingEngine {
        poison: &'static str,
    }

    #[async_trait]
    impl TranslationEngine for SelectivelyFailingEngine {
        async fn translate(
            &self,
            text: &str,
            _target_language: &str,
        ) -> TranslationResult<Translation> {
            if text == self.poison {
                return Err(TranslationError::BadStatus(503));
            }
            Ok(Translation {
                translated_text: format!("{text}-fr"),
                detected_source_language: "en".to_string(),
            })
        }
    }

    fn fragment(text: &str) -> TextFragment {
        TextFragment::new(text, BoundingBox::new(0, 0, 10, 10), 90.0)
    }

    #[tokio::test]
    async fn whitespace_short_circuits_without_a_call() {
        let engine = Arc::new(CountingEngine::new("xx"));
        let translator = FragmentTranslator::new(engine.clone(), 4);

        let outcome = translator.translate("   ", "fr").await;
        assert_eq!(outcome.text, "   ");
        assert_eq!(outcome.detected_language, None);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn short_and_numeric_inputs_pass_through() {
        let engine = Arc::new(CountingEngine::new("xx"));
        let translator = FragmentTranslator::new(engine.clone(), 4);

        assert_eq!(translator.translate("A", "fr").await.text, "A");
        assert_eq!(translator.translate("1234", "fr").await.text, "1234");
        assert_eq!(translator.translate(" 7 ", "fr").await.text, " 7 ");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn same_detected_language_keeps_original() {
        let engine = Arc::new(CountingEngine::new("fr"));
        let translator = FragmentTranslator::new(engine, 4);

        let outcome = translator.translate("arrêt", "fr").await;
        assert_eq!(outcome.text, "arrêt");
        assert_eq!(outcome.detected_language.as_deref(), Some("fr"));
    }

    #[tokio::test]
    async fn engine_failure_isolated_per_fragment() {
        let engine = Arc::new(SelectivelyFailingEngine { poison: "BROKEN" });
        let translator = FragmentTranslator::new(engine, 4);

        let mut fragments = vec![fragment("HELLO"), fragment("BROKEN"), fragment("WORLD")];
        translator.translate_all(&mut fragments, "fr").await;

        assert_eq!(fragments[0].translated_text.as_deref(), Some("HELLO-fr"));
        assert_eq!(fragments[1].translated_text.as_deref(), Some("BROKEN"));
        assert_eq!(fragments[2].translated_text.as_deref(), Some("WORLD-fr"));
    }

    #[tokio::test]
    async fn batch_preserves_order_under_concurrency() {
        let engine = Arc::new(CountingEngine::new("de"));
        let translator = FragmentTranslator::new(engine, 8);

        let mut fragments: Vec<TextFragment> =
            ["alpha", "beta", "gamma", "delta", "epsilon"]
                .iter()
                .map(|t| fragment(t))
                .collect();
        translator.translate_all(&mut fragments, "en").await;

        let translated: Vec<&str> = fragments
            .iter()
            .map(|f| f.translated_text.as_deref().unwrap())
            .collect();
        assert_eq!(
            translated,
            vec!["ALPHA", "BETA", "GAMMA", "DELTA", "EPSILON"]
        );
    }
}
