//! Sub-pixel sampling shared by the geometric remaps.

use image::Rgba;

use crate::types::RgbaImage;

/// Fully transparent black, returned for samples outside the source.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Bilinearly sample `image` at continuous pixel coordinates.
///
/// Pixel centers sit at integer coordinates. Samples more than half a
/// pixel outside the image return [`TRANSPARENT`]; samples within that
/// margin clamp to the nearest edge pixel.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::many_single_char_names
)]
pub fn bilinear(image: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let w = f64::from(image.width());
    let h = f64::from(image.height());
    if !(x.is_finite() && y.is_finite()) || x < -0.5 || y < -0.5 || x > w - 0.5 || y > h - 0.5 {
        return TRANSPARENT;
    }

    let x = x.clamp(0.0, w - 1.0);
    let y = y.clamp(0.0, h - 1.0);
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    // In range by the clamps above.
    let x0 = x0 as u32;
    let y0 = y0 as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);

    let p00 = image.get_pixel(x0, y0).0;
    let p10 = image.get_pixel(x1, y0).0;
    let p01 = image.get_pixel(x0, y1).0;
    let p11 = image.get_pixel(x1, y1).0;

    let mut out = [0u8; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = f64::from(p00[c]).mul_add(1.0 - fx, f64::from(p10[c]) * fx);
        let bottom = f64::from(p01[c]).mul_add(1.0 - fx, f64::from(p11[c]) * fx);
        let v = top.mul_add(1.0 - fy, bottom * fy);
        *slot = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_coordinates_return_exact_pixels() {
        let img = RgbaImage::from_fn(3, 3, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = (x * 10 + y) as u8;
            Rgba([v, v, v, 255])
        });
        assert_eq!(bilinear(&img, 2.0, 1.0), Rgba([21, 21, 21, 255]));
    }

    #[test]
    fn midpoint_averages_neighbours() {
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([200, 100, 50, 255])
            }
        });
        assert_eq!(bilinear(&img, 0.5, 0.0), Rgba([100, 50, 25, 255]));
    }

    #[test]
    fn outside_returns_transparent() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        assert_eq!(bilinear(&img, -1.0, 0.0), TRANSPARENT);
        assert_eq!(bilinear(&img, 0.0, 4.0), TRANSPARENT);
        assert_eq!(bilinear(&img, f64::NAN, 0.0), TRANSPARENT);
        // Half-pixel margin clamps to the edge.
        assert_eq!(bilinear(&img, -0.4, 3.4), Rgba([9, 9, 9, 255]));
    }
}
