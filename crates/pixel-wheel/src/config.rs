//! User-facing configuration for a pixel-wheel run.

use serde::{Deserialize, Serialize};

use crate::meta::MetaNode;
use crate::pixel_wheel::{PixelWheel, STRETCH_DESCRIPTOR, Topology, Variant};
use crate::types::{ParamValue, WheelError};

/// Settings for one pixel-wheel instance.
///
/// Missing fields take their defaults when deserializing, so a JSON
/// config only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelWheelConfig {
    /// Which published form of the operation to run.
    pub variant: Variant,

    /// Zoom in `[-100, 100]`. Positive values zoom in.
    pub zoom: f64,

    /// Keep the polar warp on the path. `false` gives a plain stretch.
    pub circular: bool,

    /// Square (0) to circle (100) blend. Ignored by [`Variant::Simple`].
    pub depth: f64,

    /// Seam-smoothing median radius in `[0, 6]`. Ignored by
    /// [`Variant::Simple`].
    pub radius: i32,

    /// Stretch sub-pipeline descriptor.
    pub descriptor: String,
}

impl PixelWheelConfig {
    /// Default for [`zoom`](Self::zoom).
    pub const DEFAULT_ZOOM: f64 = 0.0;
    /// Default for [`circular`](Self::circular).
    pub const DEFAULT_CIRCULAR: bool = true;
    /// Default for [`depth`](Self::depth).
    pub const DEFAULT_DEPTH: f64 = 100.0;
    /// Default for [`radius`](Self::radius).
    pub const DEFAULT_RADIUS: i32 = 1;

    /// The topology this config selects.
    #[must_use]
    pub const fn topology(&self) -> Topology {
        if self.circular {
            Topology::Circular
        } else {
            Topology::Linear
        }
    }

    /// External parameter writes for the configured variant, in the
    /// order they should be applied.
    #[must_use]
    pub fn writes(&self) -> Vec<(&'static str, ParamValue)> {
        let toggle = self.variant.toggle_value(self.topology());
        let mut writes = vec![
            ("zoom", ParamValue::Double(self.zoom)),
            (self.variant.toggle(), ParamValue::Bool(toggle)),
        ];
        if self.variant == Variant::Full {
            writes.push(("depth", ParamValue::Double(self.depth)));
            writes.push(("radius", ParamValue::Int(self.radius)));
        }
        writes
    }

    /// The operation this config describes.
    #[must_use]
    pub fn operation(&self) -> PixelWheel {
        PixelWheel::new(self.variant).with_descriptor(self.descriptor.as_str())
    }

    /// Attach a fresh instance and apply every write.
    ///
    /// # Errors
    ///
    /// Any attach error (including a bad descriptor) and any error
    /// applying a write.
    pub fn build(&self) -> Result<MetaNode<PixelWheel>, WheelError> {
        let mut node = MetaNode::new(self.operation());
        node.attach()?;
        for (name, value) in self.writes() {
            node.set(name, value)?;
        }
        Ok(node)
    }
}

impl Default for PixelWheelConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            zoom: Self::DEFAULT_ZOOM,
            circular: Self::DEFAULT_CIRCULAR,
            depth: Self::DEFAULT_DEPTH,
            radius: Self::DEFAULT_RADIUS,
            descriptor: STRETCH_DESCRIPTOR.to_owned(),
        }
    }
}
