//! Median blur stage (`gegl:median-blur`).
//!
//! Wraps [`imageproc::filter::median_filter`]. In the pixel wheel a small
//! radius closes the occasional one-pixel slit the polar warp leaves
//! along its seam.

use crate::schema::{ParamSpec, Schema, Unit};
use crate::types::{Params, RgbaImage, WheelError};

/// Declared parameters.
pub const SCHEMA: Schema = Schema::new(&[ParamSpec::int("radius", "Radius", 3, 0, 100)
    .description("Neighborhood radius")
    .unit(Unit::PixelDistance)]);

/// Read the radius from a stage's parameter set.
///
/// # Errors
///
/// Propagates missing or mistyped parameters.
pub fn radius_from_params(params: &Params) -> Result<u32, WheelError> {
    // The schema keeps it non-negative.
    Ok(u32::try_from(params.int("radius")?).unwrap_or_default())
}

/// Apply a square median filter of the given radius to every channel.
///
/// A radius of zero returns the image unchanged.
#[must_use = "returns the filtered image"]
pub fn median_blur(image: &RgbaImage, radius: u32) -> RgbaImage {
    if radius == 0 {
        return image.clone();
    }
    imageproc::filter::median_filter(image, radius, radius)
}
