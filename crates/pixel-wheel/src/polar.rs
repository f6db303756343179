//! Polar coordinates stage (`gegl:polar-coordinates`).
//!
//! Rolls the image around its center: source columns become angles and
//! source rows become radii, so a horizontally smeared image turns into a
//! wheel of spokes. `depth` blends the radial measure between a square
//! (Chebyshev distance) and a circle (Euclidean distance).

use std::f64::consts::TAU;

use crate::sample;
use crate::schema::{ParamSpec, Schema, Unit};
use crate::types::{Params, RgbaImage, WheelError};

/// Declared parameters.
pub const SCHEMA: Schema = Schema::new(&[
    ParamSpec::double("depth", "Circle depth in percent", 100.0, 0.0, 100.0)
        .description("Square to circle transition")
        .unit(Unit::Percent),
    ParamSpec::boolean("activate", "Activate", true)
        .description("Apply the warp; when unset the image passes through"),
    ParamSpec::boolean("to-polar", "To polar", true)
        .description("Map the image to a circle, or back from one"),
]);

/// Resolved polar warp settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarCoordinates {
    /// `0` maps onto a square, `100` onto a circle.
    pub depth: f64,
    /// Pass-through when `false`.
    pub activate: bool,
    /// Rectangular-to-polar when `true`, the inverse otherwise.
    pub to_polar: bool,
}

impl PolarCoordinates {
    /// Read settings from a stage's parameter set.
    ///
    /// # Errors
    ///
    /// Propagates missing or mistyped parameters.
    pub fn from_params(params: &Params) -> Result<Self, WheelError> {
        Ok(Self {
            depth: params.double("depth")?,
            activate: params.boolean("activate")?,
            to_polar: params.boolean("to-polar")?,
        })
    }

    /// Apply the warp.
    #[must_use]
    pub fn apply(&self, image: &RgbaImage) -> RgbaImage {
        if !self.activate {
            return image.clone();
        }
        let blend = (self.depth / 100.0).clamp(0.0, 1.0);
        if self.to_polar {
            to_polar(image, blend)
        } else {
            from_polar(image, blend)
        }
    }
}

fn to_polar(image: &RgbaImage, blend: f64) -> RgbaImage {
    let (w, h) = image.dimensions();
    let (wf, hf) = (f64::from(w), f64::from(h));
    let cx = wf / 2.0;
    let cy = hf / 2.0;

    RgbaImage::from_fn(w, h, |x, y| {
        let nx = (f64::from(x) + 0.5 - cx) / cx;
        let ny = (f64::from(y) + 0.5 - cy) / cy;
        let circle = nx.hypot(ny);
        let square = nx.abs().max(ny.abs());
        let r = (circle - square).mul_add(blend, square);
        if r > 1.0 {
            return sample::TRANSPARENT;
        }
        // Zero angle points up, increasing clockwise.
        let angle = nx.atan2(-ny).rem_euclid(TAU);
        sample::bilinear(image, angle / TAU * wf - 0.5, r.mul_add(hf, -0.5))
    })
}

fn from_polar(image: &RgbaImage, blend: f64) -> RgbaImage {
    let (w, h) = image.dimensions();
    let (wf, hf) = (f64::from(w), f64::from(h));
    let cx = wf / 2.0;
    let cy = hf / 2.0;

    RgbaImage::from_fn(w, h, |x, y| {
        let angle = (f64::from(x) + 0.5) / wf * TAU;
        let r = (f64::from(y) + 0.5) / hf;
        let (dx, dy) = (angle.sin(), -angle.cos());
        // Point at Chebyshev radius `r` along the same ray.
        let edge = dx.abs().max(dy.abs());
        let (sx, sy) = (dx / edge, dy / edge);
        let px = (dx - sx).mul_add(blend, sx) * r;
        let py = (dy - sy).mul_add(blend, sy) * r;
        sample::bilinear(image, px.mul_add(cx, cx) - 0.5, py.mul_add(cy, cy) - 0.5)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn solid() -> RgbaImage {
        RgbaImage::from_pixel(16, 16, Rgba([40, 80, 120, 255]))
    }

    fn warp(depth: f64, activate: bool, to_polar: bool) -> PolarCoordinates {
        PolarCoordinates {
            depth,
            activate,
            to_polar,
        }
    }

    #[test]
    fn defaults_are_circular_forward_warp() {
        let polar = PolarCoordinates::from_params(&SCHEMA.defaults()).unwrap();
        assert_eq!(polar, warp(100.0, true, true));
    }

    #[test]
    fn inactive_passes_through() {
        let img = RgbaImage::from_fn(5, 3, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = (x * 40 + y) as u8;
            Rgba([v, 0, 0, 255])
        });
        assert_eq!(warp(100.0, false, true).apply(&img), img);
    }

    #[test]
    fn circle_clears_corners() {
        let out = warp(100.0, true, true).apply(&solid());
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(15, 15)[3], 0);
        assert_eq!(out.get_pixel(8, 8), &Rgba([40, 80, 120, 255]));
    }

    #[test]
    fn square_keeps_corners() {
        let out = warp(0.0, true, true).apply(&solid());
        for pixel in out.pixels() {
            assert_eq!(pixel, &Rgba([40, 80, 120, 255]));
        }
    }

    #[test]
    fn top_row_collapses_to_center() {
        // Only the first source row is red; it should land at the center.
        let img = RgbaImage::from_fn(16, 16, |_, y| {
            if y == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let out = warp(100.0, true, true).apply(&img);
        let center = out.get_pixel(8, 8);
        let rim = out.get_pixel(8, 1);
        assert!(center[0] > rim[0], "center {center:?} rim {rim:?}");
        assert_eq!(rim, &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn inverse_samples_stay_inside() {
        let out = warp(100.0, true, false).apply(&solid());
        for pixel in out.pixels() {
            assert_eq!(pixel[3], 255);
        }
    }
}
