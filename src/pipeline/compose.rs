// Overlay composition onto the original raster
//
// Only fragments whose translation actually differs get an overlay; text
// that round-tripped unchanged stays untouched so the result is not
// cluttered. Composition is best effort end to end: any failure yields an
// absent image, never an error for the caller.

use ab_glyph::PxScale;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::io::Cursor;
use tracing::{debug, warn};

use crate::core::config::ComposeConfig;
use crate::core::errors::ComposeError;
use crate::core::types::TextFragment;
use crate::services::fonts::{draw_bitmap_text, FontResolver, ResolvedFont};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const FOREGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

pub struct ImageComposer {
    font: ResolvedFont,
    margin: i32,
    font_size: f32,
}

impl ImageComposer {
    pub fn new(resolver: &FontResolver, config: &ComposeConfig) -> Self {
        Self {
            font: resolver.resolve(),
            margin: config.margin as i32,
            font_size: config.font_size,
        }
    }

    /// Overlay translated fragments onto the original image and encode the
    /// result as PNG. Returns `None` when there are no fragments or when
    /// drawing/encoding fails.
    pub fn compose(&self, original: &DynamicImage, fragments: &[TextFragment]) -> Option<Vec<u8>> {
        if fragments.is_empty() {
            return None;
        }

        match self.try_compose(original, fragments) {
            Ok(png) => Some(png),
            Err(e) => {
                warn!("image composition failed: {e}");
                None
            }
        }
    }

    fn try_compose(
        &self,
        original: &DynamicImage,
        fragments: &[TextFragment],
    ) -> Result<Vec<u8>, ComposeError> {
        let mut canvas = original.to_rgba8();

        let mut drawn = 0usize;
        for fragment in fragments {
            let Some(translated) = fragment.translated_text.as_deref() else {
                continue;
            };
            if translated == fragment.text {
                continue;
            }
            self.draw_overlay(&mut canvas, fragment, translated);
            drawn += 1;
        }
        debug!("drew {drawn} overlays over {} fragments", fragments.len());

        let mut png = Vec::new();
        canvas.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }

    fn draw_overlay(&self, canvas: &mut RgbaImage, fragment: &TextFragment, translated: &str) {
        let bbox = &fragment.bbox;

        // Legibility background: the box expanded by the margin, filled
        // white with a black outline. imageproc clips to the canvas.
        let rect = Rect::at(bbox.x as i32 - self.margin, bbox.y as i32 - self.margin).of_size(
            bbox.width + 2 * self.margin as u32,
            bbox.height + 2 * self.margin as u32,
        );
        draw_filled_rect_mut(canvas, rect, BACKGROUND);
        draw_hollow_rect_mut(canvas, rect, FOREGROUND);

        match &self.font {
            ResolvedFont::Scalable(font) => draw_text_mut(
                canvas,
                FOREGROUND,
                bbox.x as i32,
                bbox.y as i32,
                PxScale::from(self.font_size),
                font,
                translated,
            ),
            ResolvedFont::Builtin(_) => draw_bitmap_text(
                canvas,
                FOREGROUND,
                bbox.x,
                bbox.y,
                self.font_size,
                translated,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BoundingBox;

    const RED: Rgba<u8> = Rgba([200, 30, 30, 255]);

    fn composer() -> ImageComposer {
        ImageComposer::new(&FontResolver::new(None), &ComposeConfig::default())
    }

    fn red_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, RED))
    }

    fn translated_fragment(text: &str, translated: &str) -> TextFragment {
        let mut fragment = TextFragment::new(text, BoundingBox::new(10, 10, 50, 20), 85.0);
        fragment.translated_text = Some(translated.to_string());
        fragment
    }

    fn decode(png: &[u8]) -> RgbaImage {
        image::load_from_memory(png).unwrap().to_rgba8()
    }

    #[test]
    fn no_fragments_yields_absent_image() {
        assert!(composer().compose(&red_image(100, 100), &[]).is_none());
    }

    #[test]
    fn unchanged_translation_draws_nothing() {
        let png = composer()
            .compose(&red_image(100, 100), &[translated_fragment("STOP", "STOP")])
            .unwrap();
        let canvas = decode(&png);
        assert!(canvas.pixels().all(|p| *p == RED));
    }

    #[test]
    fn untranslated_fragment_draws_nothing() {
        let fragment = TextFragment::new("STOP", BoundingBox::new(10, 10, 50, 20), 85.0);
        let png = composer()
            .compose(&red_image(100, 100), &[fragment])
            .unwrap();
        let canvas = decode(&png);
        assert!(canvas.pixels().all(|p| *p == RED));
    }

    #[test]
    fn changed_translation_gets_background_and_outline() {
        let png = composer()
            .compose(
                &red_image(100, 100),
                &[translated_fragment("STOP", "ARRÊT")],
            )
            .unwrap();
        let canvas = decode(&png);

        // Outline corner at the expanded box origin (10-2, 10-2)
        assert_eq!(canvas.get_pixel(8, 8), &FOREGROUND);
        // Just inside the outline, above the text origin: white fill
        assert_eq!(canvas.get_pixel(9, 9), &BACKGROUND);
        // Far outside the box: untouched
        assert_eq!(canvas.get_pixel(90, 90), &RED);
    }

    #[test]
    fn overlay_clips_at_image_border() {
        // Box flush with the top-left corner; the expanded rect would start
        // at negative coordinates
        let mut fragment = TextFragment::new("AB", BoundingBox::new(0, 0, 30, 10), 85.0);
        fragment.translated_text = Some("CD".to_string());

        let png = composer().compose(&red_image(40, 20), &[fragment]).unwrap();
        let canvas = decode(&png);
        assert_eq!(canvas.dimensions(), (40, 20));
    }
}
