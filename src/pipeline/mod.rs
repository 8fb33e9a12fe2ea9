// End-to-end translation pipeline
//
// decode -> preprocess -> extract -> translate -> compose. Decode failure
// is the single hard error; everything after it degrades in place and the
// caller always receives a well-formed result.

pub mod compose;
pub mod extract;
pub mod preprocess;
pub mod translate;

use anyhow::Context;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use crate::core::errors::PipelineError;
use crate::core::types::PipelineOutput;
use crate::utils::image_ops;

pub use compose::ImageComposer;
pub use extract::TextExtractor;
pub use translate::{FragmentTranslator, TranslationOutcome};

pub struct TranslationPipeline {
    extractor: TextExtractor,
    translator: FragmentTranslator,
    composer: Arc<ImageComposer>,
}

impl TranslationPipeline {
    pub fn new(
        extractor: TextExtractor,
        translator: FragmentTranslator,
        composer: ImageComposer,
    ) -> Self {
        Self {
            extractor,
            translator,
            composer: Arc::new(composer),
        }
    }

    /// Run the full pipeline over raw image bytes.
    ///
    /// Fails only when the bytes do not decode to a raster at all. A run
    /// over an image with no recognizable text is a success with an empty
    /// fragment list and an absent composed image.
    #[instrument(skip(self, image_bytes), fields(bytes = image_bytes.len(), target = target_language))]
    pub async fn run(
        &self,
        image_bytes: &[u8],
        target_language: &str,
    ) -> Result<PipelineOutput, PipelineError> {
        let start = Instant::now();

        let original = image_ops::decode_image_async(image_bytes)
            .await
            .map_err(PipelineError::InvalidImage)?;
        let dimensions = (original.width(), original.height());

        // Recognition runs on a normalized copy; the original raster is
        // kept untouched for composition.
        let mut fragments = match self.prepare_for_recognition(&original).await {
            Ok(png) => self.extractor.extract(&png).await,
            Err(e) => {
                warn!("preprocessing failed, treating as no text: {e:#}");
                Vec::new()
            }
        };

        if fragments.is_empty() {
            debug!("no text detected");
            return Ok(PipelineOutput {
                fragments,
                composed_png: None,
                dimensions,
                elapsed: start.elapsed(),
            });
        }

        self.translator
            .translate_all(&mut fragments, target_language)
            .await;

        let composed_png = self.compose_async(original, fragments.clone()).await;

        Ok(PipelineOutput {
            fragments,
            composed_png,
            dimensions,
            elapsed: start.elapsed(),
        })
    }

    /// Grayscale/binarize a copy of the original and encode it for the OCR
    /// capability, off the async runtime.
    async fn prepare_for_recognition(&self, original: &DynamicImage) -> anyhow::Result<Vec<u8>> {
        let img = original.clone();
        tokio::task::spawn_blocking(move || {
            let binary = preprocess::preprocess(&img);
            image_ops::encode_gray_png(&binary)
        })
        .await
        .context("preprocessing task failed")?
    }

    /// Compose off the async runtime; any failure degrades to an absent
    /// image.
    async fn compose_async(
        &self,
        original: DynamicImage,
        fragments: Vec<crate::core::types::TextFragment>,
    ) -> Option<Vec<u8>> {
        let composer = Arc::clone(&self.composer);
        match tokio::task::spawn_blocking(move || composer.compose(&original, &fragments)).await {
            Ok(result) => result,
            Err(e) => {
                warn!("composition task failed: {e}");
                None
            }
        }
    }
}
