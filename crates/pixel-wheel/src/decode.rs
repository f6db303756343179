//! Image decoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the RGBA
//! buffer the host graph works on. Alpha matters here: the stretch and the
//! polar warp both leave transparent regions behind.

use crate::types::{RgbaImage, WheelError};

/// Decode raw image bytes to 8-bit RGBA.
///
/// # Errors
///
/// Returns [`WheelError::EmptyInput`] if `bytes` is empty.
/// Returns [`WheelError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, WheelError> {
    if bytes.is_empty() {
        return Err(WheelError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Encode an RGBA image as PNG bytes.
    pub(crate) fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode_rgba(&[]), Err(WheelError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode_rgba(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(WheelError::ImageDecode(_))));
    }

    #[test]
    fn png_round_trip_keeps_alpha() {
        let img = RgbaImage::from_fn(17, 31, |x, _| {
            let alpha = if x % 2 == 0 { 255 } else { 0 };
            image::Rgba([128, 64, 32, alpha])
        });
        let decoded = decode_rgba(&png_bytes(&img)).unwrap();
        assert_eq!(decoded, img);
    }
}
