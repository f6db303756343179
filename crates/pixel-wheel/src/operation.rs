//! Stage operations: the opaque image filters a meta-operation wires
//! together.
//!
//! This module defines the [`Operation`] trait every stage implements and
//! the [`OperationKind`] enum that names the available stages. Nodes in a
//! [`Graph`](crate::graph::Graph) are created by name and only ever talk
//! to their stage through this trait and its declared [`Schema`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{ParamSpec, Schema};
use crate::types::{ParamValue, Params, RgbaImage, WheelError};
use crate::{blur, descriptor, lens, median, opacity, polar};

/// Namespace prefix of every registered operation name. Lookups accept
/// names with or without it.
pub const NAMESPACE: &str = "gegl:";

/// Declared parameters of the sub-pipeline stage.
pub const SUB_PIPELINE_SCHEMA: Schema = Schema::new(&[ParamSpec::string("string", "Pipeline", "")
    .description("Chain of operations, see the descriptor module")]);

/// Selects which stage operation a node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// `gegl:lens-distortion`, used for zoom.
    LensDistortion,
    /// `gegl:gegl`, a sub-pipeline configured from a descriptor string.
    SubPipeline,
    /// `gegl:polar-coordinates`.
    PolarCoordinates,
    /// `gegl:median-blur`.
    MedianBlur,
    /// `gegl:gaussian-blur`.
    GaussianBlur,
    /// `gegl:opacity`.
    Opacity,
}

impl OperationKind {
    /// Every registered operation.
    pub const ALL: [Self; 6] = [
        Self::LensDistortion,
        Self::SubPipeline,
        Self::PolarCoordinates,
        Self::MedianBlur,
        Self::GaussianBlur,
        Self::Opacity,
    ];

    /// Fully qualified operation name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LensDistortion => "gegl:lens-distortion",
            Self::SubPipeline => "gegl:gegl",
            Self::PolarCoordinates => "gegl:polar-coordinates",
            Self::MedianBlur => "gegl:median-blur",
            Self::GaussianBlur => "gegl:gaussian-blur",
            Self::Opacity => "gegl:opacity",
        }
    }

    /// Resolve an operation by name, with or without the namespace.
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::UnknownOperation`] if nothing is registered
    /// under `name`.
    pub fn from_name(name: &str) -> Result<Self, WheelError> {
        let qualified = |kind: &Self| {
            let full = kind.name();
            full == name || full.strip_prefix(NAMESPACE) == Some(name)
        };
        Self::ALL
            .into_iter()
            .find(qualified)
            .ok_or_else(|| WheelError::UnknownOperation(name.to_owned()))
    }

    /// The parameters this operation declares.
    #[must_use]
    pub const fn schema(self) -> Schema {
        match self {
            Self::LensDistortion => lens::SCHEMA,
            Self::SubPipeline => SUB_PIPELINE_SCHEMA,
            Self::PolarCoordinates => polar::SCHEMA,
            Self::MedianBlur => median::SCHEMA,
            Self::GaussianBlur => blur::SCHEMA,
            Self::Opacity => opacity::SCHEMA,
        }
    }

    /// Operation-specific validation beyond type and range, run when a
    /// parameter is assigned.
    ///
    /// # Errors
    ///
    /// For the sub-pipeline, any error from parsing the descriptor.
    pub fn validate(self, name: &str, value: &ParamValue) -> Result<(), WheelError> {
        match (self, value) {
            (Self::SubPipeline, ParamValue::Str(text)) if name == "string" => {
                descriptor::parse(text).map(drop)
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trait implemented by every stage.
///
/// Input: one image and the stage's current parameters. Output: one image.
pub trait Operation {
    /// Run the stage.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is missing or mistyped, or if a
    /// sub-pipeline descriptor does not parse.
    fn process(&self, input: &RgbaImage, params: &Params) -> Result<RgbaImage, WheelError>;
}

impl Operation for OperationKind {
    fn process(&self, input: &RgbaImage, params: &Params) -> Result<RgbaImage, WheelError> {
        match *self {
            Self::LensDistortion => Ok(lens::LensDistortion::from_params(params)?.apply(input)),
            Self::SubPipeline => descriptor::parse(params.string("string")?)?.process(input),
            Self::PolarCoordinates => {
                Ok(polar::PolarCoordinates::from_params(params)?.apply(input))
            }
            Self::MedianBlur => Ok(median::median_blur(
                input,
                median::radius_from_params(params)?,
            )),
            Self::GaussianBlur => {
                let (x, y) = blur::deviations_from_params(params)?;
                Ok(blur::gaussian_blur_xy(input, x, y))
            }
            Self::Opacity => Ok(opacity::opacity(input, params.double("value")?)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    #[test]
    fn names_round_trip_with_and_without_namespace() {
        for kind in OperationKind::ALL {
            assert_eq!(OperationKind::from_name(kind.name()).unwrap(), kind);
            let short = kind.name().strip_prefix(NAMESPACE).unwrap();
            assert_eq!(OperationKind::from_name(short).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!(matches!(
            OperationKind::from_name("gegl:zpolar-coordinates"),
            Err(WheelError::UnknownOperation(ref n)) if n == "gegl:zpolar-coordinates"
        ));
    }

    #[test]
    fn defaults_process_without_error() {
        let img = RgbaImage::from_pixel(6, 6, Rgba([50, 60, 70, 255]));
        for kind in OperationKind::ALL {
            let out = kind.process(&img, &kind.schema().defaults()).unwrap();
            assert_eq!(out.dimensions(), img.dimensions(), "{kind}");
        }
    }

    #[test]
    fn missing_parameter_surfaces() {
        let img = RgbaImage::new(2, 2);
        let err = OperationKind::MedianBlur
            .process(&img, &Params::new())
            .unwrap_err();
        assert!(matches!(err, WheelError::MissingParameter { .. }));
    }

    #[test]
    fn sub_pipeline_validates_its_descriptor() {
        let bad = ParamValue::Str("gegl:nope".to_owned());
        assert!(OperationKind::SubPipeline.validate("string", &bad).is_err());
        // Other stages accept any well-typed value.
        assert!(OperationKind::Opacity.validate("value", &bad).is_ok());
    }
}
