//! Opacity stage (`gegl:opacity`): scales the alpha channel.

use crate::schema::{ParamSpec, Schema};
use crate::types::RgbaImage;

/// Declared parameters.
pub const SCHEMA: Schema = Schema::new(&[ParamSpec::double("value", "Opacity", 1.0, -10.0, 10.0)
    .description("Global opacity multiplier")]);

/// Multiply every pixel's alpha by `value`, saturating to `[0, 255]`.
///
/// Values above one restore alpha that a wide blur has spread thin.
#[must_use = "returns the adjusted image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn opacity(image: &RgbaImage, value: f64) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let alpha = (f64::from(pixel[3]) * value).round().clamp(0.0, 255.0);
        pixel[3] = alpha as u8;
    }
    out
}
