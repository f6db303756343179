//! The circular pixel stretch.
//!
//! A meta-operation over four stages:
//!
//! ```text
//! input -> lens-distortion -> gegl (stretch) -> polar-coordinates -> median-blur -> output
//! ```
//!
//! The stretch sub-pipeline smears every row into horizontal streaks,
//! the polar warp rolls them into spokes around the center, and a small
//! median closes the seam the warp leaves behind. Turning circular mode
//! off unlinks the polar stage, leaving a plain horizontal stretch.
//!
//! Nodes are created once on attach and never replaced. Switching modes
//! only relinks them, between two statically known chains (see
//! [`Topology::chain`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::graph::{Graph, NodeId};
use crate::meta::{AttachContext, MetaOperation, OperationKeys};
use crate::schema::{ParamSpec, Schema, Unit};
use crate::types::{ParamValue, Params, WheelError};

/// Sub-pipeline that smears rows into streaks. The blur spreads alpha
/// thin; the two opacity passes restore it.
pub const STRETCH_DESCRIPTOR: &str =
    " gegl:gaussian-blur std-dev-x=1500 opacity value=10 opacity value=10  :\n";

const FULL_SCHEMA: Schema = Schema::new(&[
    ParamSpec::double("zoom", "Zoom", 0.0, -100.0, 100.0)
        .description("Rescale overall image size"),
    ParamSpec::boolean("disablepolar", "Normal Pixel Stretch", false)
        .description("Make a pixel stretch wheel or square"),
    ParamSpec::double("depth", "0 for Square - 100 for Circle", 100.0, 0.0, 100.0)
        .description("Square to circle transition")
        .unit(Unit::Percent)
        .sensitive("! disablepolar"),
    ParamSpec::int("radius", "Smooth to hide one pixel slit", 1, 0, 6)
        .description("Median blur takes care of the occasional one pixel slit")
        .unit(Unit::PixelDistance)
        .sensitive("! disablepolar"),
]);

const SIMPLE_SCHEMA: Schema = Schema::new(&[
    ParamSpec::double("zoom", "Zoom", 0.0, -100.0, 100.0)
        .description("Rescale overall image size"),
    ParamSpec::boolean("polar", "Circular", true).description("Make a pixel stretch wheel"),
]);

/// Which published form of the operation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// `lb:pixel-wheel`: zoom, a circular-mode switch, circle/square
    /// depth, and seam smoothing.
    #[default]
    Full,
    /// `gegl:pixel-wheel`: zoom and a circular-mode switch only. The
    /// median stage is pinned to radius 0.
    Simple,
}

impl Variant {
    /// External parameters of this variant.
    #[must_use]
    pub const fn schema(self) -> Schema {
        match self {
            Self::Full => FULL_SCHEMA,
            Self::Simple => SIMPLE_SCHEMA,
        }
    }

    /// Registration metadata of this variant.
    #[must_use]
    pub const fn keys(self) -> OperationKeys {
        let (name, description) = match self {
            Self::Full => ("lb:pixel-wheel", "Make a circular pixel stretch effect"),
            Self::Simple => ("gegl:pixel-wheel", "Makes a circular pixel stretch effect"),
        };
        OperationKeys {
            name,
            title: "Circular Pixel Stretch",
            categories: "Artistic",
            reference_hash: "2ah15656a238a5112010dc2544142af",
            description,
        }
    }

    /// Name of the boolean that selects the topology.
    #[must_use]
    pub const fn toggle(self) -> &'static str {
        match self {
            Self::Full => "disablepolar",
            Self::Simple => "polar",
        }
    }

    /// Value of [`toggle`](Self::toggle) that selects `topology`.
    #[must_use]
    pub const fn toggle_value(self, topology: Topology) -> bool {
        let circular = matches!(topology, Topology::Circular);
        match self {
            Self::Full => !circular,
            Self::Simple => circular,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "full",
            Self::Simple => "simple",
        })
    }
}

/// Shape of the active path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Polar warp on the path.
    Circular,
    /// Polar warp bypassed.
    Linear,
}

impl Topology {
    /// Both topologies.
    pub const ALL: [Self; 2] = [Self::Circular, Self::Linear];

    /// Topology selected by the current external parameters.
    ///
    /// # Errors
    ///
    /// Propagates a missing or mistyped toggle.
    pub fn from_params(variant: Variant, params: &Params) -> Result<Self, WheelError> {
        let toggle = params.boolean(variant.toggle())?;
        Ok(if toggle == variant.toggle_value(Self::Circular) {
            Self::Circular
        } else {
            Self::Linear
        })
    }

    /// The full chain from input proxy to output proxy.
    #[must_use]
    pub fn chain(self, state: &WheelState) -> Vec<NodeId> {
        let WheelState {
            input,
            zoom,
            stretch,
            polar,
            median,
            output,
        } = *state;
        match self {
            Self::Circular => vec![input, zoom, stretch, polar, median, output],
            Self::Linear => vec![input, zoom, stretch, median, output],
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Circular => "circular",
            Self::Linear => "linear",
        })
    }
}

/// Handles to every node the pixel wheel uses. Fixed at attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelState {
    /// Input proxy.
    pub input: NodeId,
    /// `gegl:lens-distortion`.
    pub zoom: NodeId,
    /// `gegl:gegl` running the stretch descriptor.
    pub stretch: NodeId,
    /// `gegl:polar-coordinates`.
    pub polar: NodeId,
    /// `gegl:median-blur`.
    pub median: NodeId,
    /// Output proxy.
    pub output: NodeId,
}

impl WheelState {
    /// The four stage nodes, in pipeline order.
    #[must_use]
    pub const fn stages(&self) -> [NodeId; 4] {
        [self.zoom, self.stretch, self.polar, self.median]
    }

    /// Which topology is currently linked in `graph`, if either.
    #[must_use]
    pub fn topology(&self, graph: &Graph) -> Option<Topology> {
        let path = graph.active_path().ok()?;
        Topology::ALL.into_iter().find(|t| path == t.chain(self))
    }
}

/// The pixel-wheel meta-operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelWheel {
    variant: Variant,
    descriptor: String,
}

impl Default for PixelWheel {
    fn default() -> Self {
        Self::new(Variant::default())
    }
}

impl PixelWheel {
    /// A pixel wheel using the stock stretch descriptor.
    #[must_use]
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            descriptor: STRETCH_DESCRIPTOR.to_owned(),
        }
    }

    /// Replace the stretch sub-pipeline. The descriptor is validated on
    /// attach.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = descriptor.into();
        self
    }

    /// The published variant.
    #[must_use]
    pub const fn variant(&self) -> Variant {
        self.variant
    }

    /// The stretch descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }
}

impl MetaOperation for PixelWheel {
    type State = WheelState;

    fn keys(&self) -> OperationKeys {
        self.variant.keys()
    }

    fn schema(&self) -> Schema {
        self.variant.schema()
    }

    fn initialize(&self, ctx: &mut AttachContext<'_>) -> Result<WheelState, WheelError> {
        let input = ctx.input_proxy();
        let output = ctx.output_proxy();

        let stretch = ctx.new_child("gegl:gegl")?;
        ctx.set_param(stretch, "string", ParamValue::from(self.descriptor.as_str()))?;
        let zoom = ctx.new_child("gegl:lens-distortion")?;
        let median = ctx.new_child("gegl:median-blur")?;
        let polar = ctx.new_child("gegl:polar-coordinates")?;

        ctx.redirect("zoom", zoom, "zoom")?;
        match self.variant {
            Variant::Full => {
                ctx.redirect("radius", median, "radius")?;
                ctx.redirect("depth", polar, "depth")?;
            }
            Variant::Simple => {
                ctx.redirect("polar", polar, "activate")?;
                ctx.set_param(median, "radius", ParamValue::Int(0))?;
            }
        }

        let state = WheelState {
            input,
            zoom,
            stretch,
            polar,
            median,
            output,
        };
        let topology = Topology::from_params(self.variant, ctx.params())?;
        ctx.link_many(&topology.chain(&state))?;
        debug!(variant = %self.variant, %topology, "pixel wheel attached");
        Ok(state)
    }

    fn on_parameter_changed(
        &self,
        state: Option<&WheelState>,
        graph: &mut Graph,
        params: &Params,
    ) -> Result<(), WheelError> {
        let Some(state) = state else {
            trace!("not attached, nothing to rewire");
            return Ok(());
        };

        let topology = Topology::from_params(self.variant, params)?;
        let chain = topology.chain(state);
        if graph.is_linked_chain(&chain) {
            trace!(%topology, "topology unchanged");
            return Ok(());
        }
        debug!(%topology, "rewiring pixel wheel");
        graph.link_many(&chain)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::meta::MetaNode;
    use crate::operation::OperationKind;

    fn attached(variant: Variant) -> MetaNode<PixelWheel> {
        let mut node = MetaNode::new(PixelWheel::new(variant));
        node.attach().unwrap();
        node
    }

    #[test]
    fn full_schema_declares_the_four_controls() {
        let schema = Variant::Full.schema();
        let names: Vec<&str> = schema.params().iter().map(|p| p.name).collect();
        assert_eq!(names, ["zoom", "disablepolar", "depth", "radius"]);
        assert_eq!(
            schema.get("radius").unwrap().sensitive,
            Some("! disablepolar")
        );
        assert_eq!(schema.get("zoom").unwrap().sensitive, None);
    }

    #[test]
    fn toggle_polarity_differs_between_variants() {
        let mut params = Variant::Full.schema().defaults();
        assert_eq!(
            Topology::from_params(Variant::Full, &params).unwrap(),
            Topology::Circular
        );
        params.insert("disablepolar", ParamValue::Bool(true));
        assert_eq!(
            Topology::from_params(Variant::Full, &params).unwrap(),
            Topology::Linear
        );

        let mut params = Variant::Simple.schema().defaults();
        assert_eq!(
            Topology::from_params(Variant::Simple, &params).unwrap(),
            Topology::Circular
        );
        params.insert("polar", ParamValue::Bool(false));
        assert_eq!(
            Topology::from_params(Variant::Simple, &params).unwrap(),
            Topology::Linear
        );
    }

    #[test]
    fn attach_creates_each_stage_once() {
        let node = attached(Variant::Full);
        let state = node.state().unwrap();
        let graph = node.graph();
        let ops: Vec<_> = state
            .stages()
            .iter()
            .map(|&n| graph.operation(n).unwrap().unwrap())
            .collect();
        assert_eq!(
            ops,
            [
                OperationKind::LensDistortion,
                OperationKind::SubPipeline,
                OperationKind::PolarCoordinates,
                OperationKind::MedianBlur,
            ]
        );
        assert_eq!(graph.node_count(), 6);
        assert_eq!(state.topology(graph), Some(Topology::Circular));
    }

    #[test]
    fn stretch_stage_holds_the_descriptor() {
        let node = attached(Variant::Full);
        let stretch = node.state().unwrap().stretch;
        assert_eq!(
            node.graph().param(stretch, "string").unwrap(),
            &ParamValue::from(STRETCH_DESCRIPTOR)
        );
    }

    #[test]
    fn simple_variant_pins_median_and_binds_activate() {
        let mut node = attached(Variant::Simple);
        let state = *node.state().unwrap();
        assert_eq!(
            node.graph().param(state.median, "radius").unwrap(),
            &ParamValue::Int(0)
        );

        node.set("polar", false).unwrap();
        assert_eq!(
            node.graph().param(state.polar, "activate").unwrap(),
            &ParamValue::Bool(false)
        );
        assert_eq!(state.topology(node.graph()), Some(Topology::Linear));
    }

    #[test]
    fn bad_descriptor_fails_attach_cleanly() {
        let mut node = MetaNode::new(PixelWheel::default().with_descriptor("gegl:Zps"));
        assert!(matches!(
            node.attach(),
            Err(WheelError::UnknownOperation(ref n)) if n == "gegl:Zps"
        ));
        assert!(!node.is_attached());
        assert_eq!(node.graph().node_count(), 2);
        assert!(node.graph().edges().is_empty());
    }

    #[test]
    fn attach_follows_toggle_set_beforehand() {
        let mut node = MetaNode::new(PixelWheel::default());
        node.set("disablepolar", true).unwrap();
        node.attach().unwrap();
        let state = node.state().unwrap();
        assert_eq!(state.topology(node.graph()), Some(Topology::Linear));
    }

    #[test]
    fn unrelated_writes_leave_edges_alone() {
        let mut node = attached(Variant::Full);
        let before = node.graph().edges();
        node.set("depth", 40.0).unwrap();
        node.set("radius", 2).unwrap();
        assert_eq!(node.graph().edges(), before);
    }

    #[test]
    fn display_names() {
        assert_eq!(Variant::Simple.to_string(), "simple");
        assert_eq!(Topology::Linear.to_string(), "linear");
        assert_eq!(Variant::Full.keys().name, "lb:pixel-wheel");
    }
}
