// Recognition-oriented image normalization
//
// Order matters: the blur runs before thresholding so sensor noise does not
// fracture the binarized strokes, and the closing pass reconnects strokes
// the threshold broke. Signboards are unevenly lit, so the threshold is
// local rather than global.

use image::{DynamicImage, GrayImage};
use imageproc::contrast::adaptive_threshold;
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::close;

/// Gaussian sigma matching a 5x5 smoothing kernel
const BLUR_SIGMA: f32 = 1.1;

/// Local-threshold window radius (11x11 neighborhood)
const THRESHOLD_BLOCK_RADIUS: u32 = 5;

/// Normalize a decoded raster for text recognition.
///
/// Total over any valid raster; the output is a two-level image with the
/// same dimensions as the input.
pub fn preprocess(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();
    let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);
    let binary = adaptive_threshold(&blurred, THRESHOLD_BLOCK_RADIUS);
    close(&binary, Norm::LInf, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba, RgbaImage};

    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        let mut img = RgbaImage::new(width, height);
        for (x, _y, pixel) in img.enumerate_pixels_mut() {
            let v = (x * 255 / width.max(1)) as u8;
            *pixel = Rgba([v, v, v, 255]);
        }
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn preserves_dimensions() {
        let input = gradient_image(64, 48);
        let output = preprocess(&input);
        assert_eq!(output.dimensions(), (64, 48));
    }

    #[test]
    fn output_is_two_level() {
        let input = gradient_image(32, 32);
        let output = preprocess(&input);
        assert!(output
            .pixels()
            .all(|p| *p == Luma([0u8]) || *p == Luma([255u8])));
    }

    #[test]
    fn total_over_uniform_input() {
        let input = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            16,
            16,
            Rgba([128, 128, 128, 255]),
        ));
        let output = preprocess(&input);
        assert_eq!(output.dimensions(), (16, 16));
    }
}
