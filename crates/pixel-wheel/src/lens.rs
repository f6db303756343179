//! Lens distortion stage (`gegl:lens-distortion`).
//!
//! Radial remap around the image center. In the pixel wheel only the
//! `zoom` control is used, to rescale the image before it is stretched.

use crate::sample;
use crate::schema::{ParamSpec, Schema};
use crate::types::{Params, RgbaImage, WheelError};

/// Declared parameters.
pub const SCHEMA: Schema = Schema::new(&[
    ParamSpec::double("main", "Main", 0.0, -100.0, 100.0)
        .description("Amount of second-order distortion"),
    ParamSpec::double("edge", "Edge", 0.0, -100.0, 100.0)
        .description("Amount of fourth-order distortion"),
    ParamSpec::double("zoom", "Zoom", 0.0, -100.0, 100.0).description("Rescale overall image size"),
]);

/// Resolved lens distortion settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensDistortion {
    /// Second-order coefficient, `[-100, 100]`.
    pub main: f64,
    /// Fourth-order coefficient, `[-100, 100]`.
    pub edge: f64,
    /// Zoom, `[-100, 100]`. Each +100 halves the sampled extent.
    pub zoom: f64,
}

impl LensDistortion {
    /// Read settings from a stage's parameter set.
    ///
    /// # Errors
    ///
    /// Propagates missing or mistyped parameters.
    pub fn from_params(params: &Params) -> Result<Self, WheelError> {
        Ok(Self {
            main: params.double("main")?,
            edge: params.double("edge")?,
            zoom: params.double("zoom")?,
        })
    }

    /// Whether these settings leave every pixel where it is.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.main == 0.0 && self.edge == 0.0 && self.zoom == 0.0
    }

    /// Apply the remap.
    ///
    /// For an output pixel at offset `d` from the center, with `r²` the
    /// squared radius normalized by the half-diagonal, the source is
    /// `center + rescale * (1 + main/200 * r² + edge/200 * r⁴) * d`
    /// where `rescale = 2^(-zoom / 100)`.
    #[must_use]
    pub fn apply(&self, image: &RgbaImage) -> RgbaImage {
        if self.is_identity() {
            return image.clone();
        }

        let (w, h) = image.dimensions();
        let (wf, hf) = (f64::from(w), f64::from(h));
        let cx = wf / 2.0;
        let cy = hf / 2.0;
        let normalise = 4.0 / wf.mul_add(wf, hf * hf);
        let m2 = self.main / 200.0;
        let m4 = self.edge / 200.0;
        let rescale = (-self.zoom / 100.0).exp2();

        RgbaImage::from_fn(w, h, |x, y| {
            let dx = f64::from(x) + 0.5 - cx;
            let dy = f64::from(y) + 0.5 - cy;
            let r2 = dx.mul_add(dx, dy * dy) * normalise;
            let mult = rescale * m4.mul_add(r2 * r2, m2.mul_add(r2, 1.0));
            sample::bilinear(image, dx.mul_add(mult, cx) - 0.5, dy.mul_add(mult, cy) - 0.5)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn quadrants() -> RgbaImage {
        RgbaImage::from_fn(8, 8, |x, y| match (x < 4, y < 4) {
            (true, true) => Rgba([255, 0, 0, 255]),
            (false, true) => Rgba([0, 255, 0, 255]),
            (true, false) => Rgba([0, 0, 255, 255]),
            (false, false) => Rgba([255, 255, 255, 255]),
        })
    }

    #[test]
    fn defaults_are_identity() {
        let lens = LensDistortion::from_params(&SCHEMA.defaults()).unwrap();
        assert!(lens.is_identity());
        let img = quadrants();
        assert_eq!(lens.apply(&img), img);
    }

    #[test]
    fn zoom_in_magnifies_center() {
        let img = quadrants();
        let lens = LensDistortion {
            main: 0.0,
            edge: 0.0,
            zoom: 100.0,
        };
        let out = lens.apply(&img);
        assert_eq!(out.dimensions(), img.dimensions());
        // With 2x magnification the corner pixel samples from inside the
        // same quadrant, closer to the center.
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(7, 7), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn zoom_out_leaves_transparent_border() {
        let img = quadrants();
        let lens = LensDistortion {
            main: 0.0,
            edge: 0.0,
            zoom: -100.0,
        };
        let out = lens.apply(&img);
        assert_eq!(out.get_pixel(0, 0)[3], 0, "corner should fall outside");
        assert_eq!(out.get_pixel(3, 3)[3], 255, "center stays opaque");
    }
}
