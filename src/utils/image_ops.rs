use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, ImageFormat};
use std::io::Cursor;

/// Asynchronously decode raw upload bytes using spawn_blocking.
///
/// Image decoding is CPU-intensive, especially for large uploads. The
/// decoder's error is returned untouched so callers can surface invalid
/// input precisely.
pub async fn decode_image_async(bytes: &[u8]) -> Result<DynamicImage, image::ImageError> {
    let bytes = bytes.to_vec(); // Clone to move into blocking task
    match tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await {
        Ok(result) => result,
        Err(join_error) => Err(image::ImageError::IoError(std::io::Error::other(
            join_error.to_string(),
        ))),
    }
}

/// Encode a single-channel image as PNG bytes.
pub fn encode_gray_png(img: &GrayImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .context("Failed to encode preprocessed image as PNG")?;
    Ok(png_bytes)
}
