//! Raster transform: source bytes in, JPEG bytes at a target height out.
//!
//! Pure function over bytes. Decoding and encoding are CPU-bound; callers
//! on the async runtime wrap this in `tokio::task::spawn_blocking`.

use std::io::Cursor;

use image::imageops::FilterType;
use image::DynamicImage;

/// JPEG quality for derived output.
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// Unreadable or unsupported source bytes. Fatal to this single
    /// transform attempt, never to sibling heights.
    #[error("failed to decode source image: {0}")]
    Decode(image::ImageError),
    #[error("failed to encode derived image: {0}")]
    Encode(image::ImageError),
    /// A zero target height can never produce an image.
    #[error("target height must be positive")]
    ZeroTargetHeight,
}

/// Produce derived JPEG bytes at `target_height`.
///
/// When the source is taller than the target, it is scaled down with the
/// aspect ratio preserved: `new_width = round(w * target / h)`. When the
/// source height is already at or below the target, the image passes
/// through unscaled and is only flattened and re-encoded. Alpha and
/// palette pixels are flattened to opaque RGB; alpha is dropped, not
/// composited.
pub fn transform(source: &[u8], target_height: u32) -> Result<Vec<u8>, TransformError> {
    if target_height == 0 {
        return Err(TransformError::ZeroTargetHeight);
    }

    let decoded = image::load_from_memory(source).map_err(TransformError::Decode)?;
    let (width, height) = (decoded.width(), decoded.height());

    let scaled = if height > target_height {
        let new_width =
            ((width as f64) * (target_height as f64) / (height as f64)).round().max(1.0) as u32;
        decoded.resize_exact(new_width, target_height, FilterType::Triangle)
    } else {
        decoded
    };

    // Drop alpha/palette before JPEG encoding
    let rgb = DynamicImage::ImageRgb8(scaled.to_rgb8());

    let mut buffer = Cursor::new(Vec::new());
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    encoder.encode_image(&rgb).map_err(TransformError::Encode)?;

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([120, 40, 200, 128]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_scales_down_preserving_aspect() {
        let source = png_fixture(500, 1000);
        let out = transform(&source, 200).unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.height(), 200);
        assert_eq!(decoded.width(), 100); // round(500 * 0.2)
    }

    #[test]
    fn test_width_rounds_not_truncates() {
        // 333 * 100/1000 = 33.3 -> 33; 335 * 0.1 = 33.5 -> 34
        let out = transform(&png_fixture(335, 1000), 100).unwrap();
        assert_eq!(image::load_from_memory(&out).unwrap().width(), 34);
    }

    #[test]
    fn test_short_source_passes_through_unscaled() {
        let source = png_fixture(80, 150);
        let out = transform(&source, 200).unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (80, 150));
    }

    #[test]
    fn test_output_is_always_jpeg() {
        let out = transform(&png_fixture(40, 40), 20).unwrap();
        assert_eq!(
            image::guess_format(&out).unwrap(),
            ImageFormat::Jpeg,
            "derived output must be JPEG regardless of input format"
        );
    }

    #[test]
    fn test_corrupt_source_is_decode_error() {
        let err = transform(b"definitely not an image", 200).unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));
    }

    #[test]
    fn test_zero_target_height_is_an_error() {
        let source = png_fixture(100, 100);
        let err = transform(&source, 0).unwrap_err();
        assert!(matches!(err, TransformError::ZeroTargetHeight));
    }
}
