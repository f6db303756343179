//! pixel-wheel: circular pixel stretch as a composite image operation
//! (sans-IO).
//!
//! The effect smears every row of an image into horizontal streaks and
//! then rolls the result around its center, producing a wheel of spokes:
//!
//! zoom -> stretch -> polar warp -> seam smoothing
//!
//! The interesting part is not the pixels but the wiring. [`PixelWheel`]
//! is a [`MetaOperation`]: on attach it builds a small graph of stage
//! nodes inside a host [`Graph`], binds its external parameters to stage
//! parameters, and on every later parameter change relinks the same
//! nodes between a circular and a linear [`Topology`].
//!
//! This crate has **no I/O dependencies**. It works on in-memory byte
//! slices and images; reading and writing files lives in
//! `pixel-wheel-cli`.

pub mod blur;
pub mod config;
pub mod decode;
pub mod descriptor;
pub mod graph;
pub mod lens;
pub mod median;
pub mod meta;
pub mod opacity;
pub mod operation;
pub mod pixel_wheel;
pub mod polar;
pub mod sample;
pub mod schema;
pub mod types;

pub use config::PixelWheelConfig;
pub use graph::{Graph, NodeId};
pub use meta::{AttachContext, MetaNode, MetaOperation, OperationKeys, Redirect};
pub use operation::{Operation, OperationKind};
pub use pixel_wheel::{PixelWheel, STRETCH_DESCRIPTOR, Topology, Variant, WheelState};
pub use schema::{ParamSpec, Schema};
pub use types::{ParamValue, Params, RgbaImage, WheelError};

/// Run the pixel wheel on an encoded image.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration,
/// attaches a fresh instance, applies the configuration through the
/// instance's external parameters, and evaluates the active path.
///
/// # Errors
///
/// Returns [`WheelError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`WheelError::ImageDecode`] if the image format is unrecognized.
/// Returns any attach error, such as a descriptor that does not parse.
pub fn process(image_bytes: &[u8], config: &PixelWheelConfig) -> Result<RgbaImage, WheelError> {
    let image = decode::decode_rgba(image_bytes)?;
    let node = config.build()?;
    node.process(&image)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::decode::tests::png_bytes;

    #[test]
    fn process_preserves_dimensions() {
        let img = RgbaImage::from_fn(24, 16, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x * 10 + y) % 256) as u8;
            image::Rgba([v, 255 - v, 128, 255])
        });
        let out = process(&png_bytes(&img), &PixelWheelConfig::default()).unwrap();
        assert_eq!(out.dimensions(), (24, 16));
    }

    #[test]
    fn process_rejects_empty_bytes() {
        assert!(matches!(
            process(&[], &PixelWheelConfig::default()),
            Err(WheelError::EmptyInput)
        ));
    }

    #[test]
    fn process_surfaces_bad_descriptor() {
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]));
        let config = PixelWheelConfig {
            descriptor: "opacity value=loud".to_owned(),
            ..PixelWheelConfig::default()
        };
        assert!(matches!(
            process(&png_bytes(&img), &config),
            Err(WheelError::InvalidDescriptor(_))
        ));
    }
}
