//! Image encoding: `DynamicImage` → in-memory JPEG bytes.
//!
//! The OCR service accepts any common raster encoding inside its request
//! body; JPEG keeps rendered pages an order of magnitude smaller than PNG,
//! which matters because the whole image travels base64-inflated inside a
//! JSON payload. Rendered text compresses cleanly at high quality, so the
//! lossiness does not cost recognition accuracy.
//!
//! The encode happens entirely in memory — the bitmap never touches disk
//! on its way to the OCR request.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// JPEG quality for encoded pages. High enough that glyph edges stay
/// crisp for the OCR service.
const JPEG_QUALITY: u8 = 90;

/// Encode a rasterised page as JPEG bytes ready for the OCR request.
///
/// pdfium bitmaps carry an alpha channel; JPEG has none, so the image is
/// flattened to RGB first.
pub fn encode_page(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;

    debug!(
        "Encoded {}x{} page → {} JPEG bytes",
        rgb.width(),
        rgb.height(),
        buf.len()
    );
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let bytes = encode_page(&img).expect("encode should succeed");
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert!(bytes.len() > 2);
    }

    #[test]
    fn encode_flattens_alpha() {
        // Fully transparent pixels must still encode (alpha is dropped).
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0])));
        let bytes = encode_page(&img).expect("encode should succeed");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
