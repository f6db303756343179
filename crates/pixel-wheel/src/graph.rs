//! Host graph: stage nodes, their parameters, and the edges between them.
//!
//! A [`Graph`] is the processing graph a meta-operation is attached to.
//! It is born with two boundary proxies and grows stage nodes on request.
//! Nodes are never removed, so a [`NodeId`] stays valid for the life of
//! the graph; only edges change.
//!
//! Linking keeps every node at one producer and one consumer at most. The
//! input proxy never gains a producer, so the walk that starts there, the
//! *active path*, is always a simple chain. Nodes off that path may still
//! be linked into chains or loops of their own; they are never evaluated.

use std::collections::HashSet;
use std::fmt;

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use tracing::{trace, warn};

use crate::operation::{Operation, OperationKind};
use crate::types::{ParamValue, Params, RgbaImage, WheelError};

/// Opaque handle to a node in a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(NodeIndex);

impl NodeId {
    /// Position of the node in creation order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0.index())
    }
}

#[derive(Debug, Clone)]
enum Node {
    Input,
    Output,
    Stage {
        operation: OperationKind,
        params: Params,
    },
}

/// A processing graph with an input proxy, an output proxy, and any
/// number of stage nodes.
#[derive(Debug, Clone)]
pub struct Graph {
    inner: StableDiGraph<Node, ()>,
    input: NodeIndex,
    output: NodeIndex,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create a graph holding only the two boundary proxies, unlinked.
    #[must_use]
    pub fn new() -> Self {
        let mut inner = StableDiGraph::new();
        let input = inner.add_node(Node::Input);
        let output = inner.add_node(Node::Output);
        Self {
            inner,
            input,
            output,
        }
    }

    /// The node standing for the composite operation's input port.
    #[must_use]
    pub const fn input_proxy(&self) -> NodeId {
        NodeId(self.input)
    }

    /// The node standing for the composite operation's output port.
    #[must_use]
    pub const fn output_proxy(&self) -> NodeId {
        NodeId(self.output)
    }

    /// Number of nodes, proxies included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Returns `true` if `node` belongs to this graph.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.inner.contains_node(node.0)
    }

    /// Instantiate a stage node running the named operation, with every
    /// parameter at its declared default. The node starts unlinked.
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::UnknownOperation`] if `operation` is not
    /// registered.
    pub fn new_child(&mut self, operation: &str) -> Result<NodeId, WheelError> {
        let operation = OperationKind::from_name(operation)?;
        let index = self.inner.add_node(Node::Stage {
            operation,
            params: operation.schema().defaults(),
        });
        trace!(node = index.index(), %operation, "created stage node");
        Ok(NodeId(index))
    }

    fn node(&self, node: NodeId) -> Result<&Node, WheelError> {
        self.inner
            .node_weight(node.0)
            .ok_or(WheelError::NodeNotFound(node))
    }

    /// The operation a stage node runs, or `None` for a proxy.
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::NodeNotFound`] for a foreign id.
    pub fn operation(&self, node: NodeId) -> Result<Option<OperationKind>, WheelError> {
        Ok(match self.node(node)? {
            Node::Stage { operation, .. } => Some(*operation),
            Node::Input | Node::Output => None,
        })
    }

    /// Short display name: the operation name, or `input`/`output` for
    /// the proxies.
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::NodeNotFound`] for a foreign id.
    pub fn node_name(&self, node: NodeId) -> Result<&'static str, WheelError> {
        Ok(match self.node(node)? {
            Node::Input => "input",
            Node::Output => "output",
            Node::Stage { operation, .. } => operation.name(),
        })
    }

    /// All current parameter values of a stage node. Proxies have none.
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::NodeNotFound`] for a foreign id.
    pub fn params(&self, node: NodeId) -> Result<Params, WheelError> {
        Ok(match self.node(node)? {
            Node::Stage { params, .. } => params.clone(),
            Node::Input | Node::Output => Params::new(),
        })
    }

    /// Read one parameter of a stage node.
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::NodeNotFound`] for a foreign id and
    /// [`WheelError::UnknownParameter`] if the node declares no such
    /// parameter.
    pub fn param(&self, node: NodeId, name: &str) -> Result<&ParamValue, WheelError> {
        let unknown = |operation: &str| WheelError::UnknownParameter {
            operation: operation.to_owned(),
            name: name.to_owned(),
        };
        match self.node(node)? {
            Node::Stage { operation, params } => {
                params.get(name).ok_or_else(|| unknown(operation.name()))
            }
            Node::Input => Err(unknown("input")),
            Node::Output => Err(unknown("output")),
        }
    }

    /// Assign a stage parameter.
    ///
    /// The value is checked against the stage's declared type, widened
    /// from int to double where needed, and clamped into range. Returns
    /// `true` if it had to be clamped.
    ///
    /// # Errors
    ///
    /// - [`WheelError::NodeNotFound`] for a foreign id.
    /// - [`WheelError::UnknownParameter`] for an undeclared name, or any
    ///   name on a proxy.
    /// - [`WheelError::TypeMismatch`] / [`WheelError::InvalidValue`] for
    ///   an unusable value.
    /// - Any error from the operation's own validation, such as a bad
    ///   sub-pipeline descriptor.
    pub fn set_param(
        &mut self,
        node: NodeId,
        name: &str,
        value: ParamValue,
    ) -> Result<bool, WheelError> {
        let weight = self
            .inner
            .node_weight_mut(node.0)
            .ok_or(WheelError::NodeNotFound(node))?;
        let Node::Stage { operation, params } = weight else {
            let proxy = if matches!(weight, Node::Input) {
                "input"
            } else {
                "output"
            };
            return Err(WheelError::UnknownParameter {
                operation: proxy.to_owned(),
                name: name.to_owned(),
            });
        };

        let operation = *operation;
        let spec = operation
            .schema()
            .get(name)
            .ok_or_else(|| WheelError::UnknownParameter {
                operation: operation.name().to_owned(),
                name: name.to_owned(),
            })?;
        let (value, clamped) = spec.coerce(value)?;
        operation.validate(name, &value)?;

        if clamped {
            warn!(%node, %operation, param = name, %value, "stage parameter clamped into range");
        }
        trace!(%node, %operation, param = name, %value, "stage parameter set");
        params.insert(name, value);
        Ok(clamped)
    }

    /// Make `to` consume the output of `from`.
    ///
    /// Any other consumer of `from` and any other producer of `to` is
    /// disconnected first.
    ///
    /// # Errors
    ///
    /// Same as [`link_many`](Self::link_many) with two nodes.
    pub fn link(&mut self, from: NodeId, to: NodeId) -> Result<(), WheelError> {
        self.link_many(&[from, to])
    }

    /// Link consecutive pairs of `chain`, as if by repeated
    /// [`link`](Self::link).
    ///
    /// Every id is checked before any edge changes, so on error the edge
    /// set is exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`WheelError::NodeNotFound`] if any id is foreign.
    /// - [`WheelError::InvalidChain`] if the chain has fewer than two
    ///   nodes, repeats a node, feeds the input proxy, or consumes the
    ///   output proxy.
    pub fn link_many(&mut self, chain: &[NodeId]) -> Result<(), WheelError> {
        self.check_chain(chain)?;
        for pair in chain.windows(2) {
            let (from, to) = (pair[0].0, pair[1].0);
            if self.inner.contains_edge(from, to) {
                continue;
            }
            let stale: Vec<_> = self
                .inner
                .edges_directed(from, Direction::Outgoing)
                .chain(self.inner.edges_directed(to, Direction::Incoming))
                .map(|edge| edge.id())
                .collect();
            for edge in stale {
                self.inner.remove_edge(edge);
            }
            self.inner.add_edge(from, to, ());
        }
        Ok(())
    }

    fn check_chain(&self, chain: &[NodeId]) -> Result<(), WheelError> {
        if chain.len() < 2 {
            return Err(WheelError::InvalidChain(format!(
                "need at least two nodes, got {}",
                chain.len()
            )));
        }
        let mut seen = HashSet::with_capacity(chain.len());
        let last = chain.len() - 1;
        for (position, &node) in chain.iter().enumerate() {
            if !self.contains(node) {
                return Err(WheelError::NodeNotFound(node));
            }
            if !seen.insert(node) {
                return Err(WheelError::InvalidChain(format!(
                    "node {node} appears more than once"
                )));
            }
            if node.0 == self.input && position != 0 {
                return Err(WheelError::InvalidChain(
                    "the input proxy cannot consume another node".to_owned(),
                ));
            }
            if node.0 == self.output && position != last {
                return Err(WheelError::InvalidChain(
                    "the output proxy cannot feed another node".to_owned(),
                ));
            }
        }
        Ok(())
    }

    /// Returns `true` if every consecutive pair of `chain` is linked.
    #[must_use]
    pub fn is_linked_chain(&self, chain: &[NodeId]) -> bool {
        chain
            .windows(2)
            .all(|pair| self.inner.contains_edge(pair[0].0, pair[1].0))
    }

    /// Snapshot of every edge as `(producer, consumer)`, ordered by
    /// producer.
    #[must_use]
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges: Vec<_> = self
            .inner
            .edge_references()
            .map(|edge| (NodeId(edge.source()), NodeId(edge.target())))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Nodes with no edges at all.
    #[must_use]
    pub fn detached_nodes(&self) -> Vec<NodeId> {
        self.inner
            .node_indices()
            .filter(|&n| self.inner.neighbors_undirected(n).next().is_none())
            .map(NodeId)
            .collect()
    }

    /// Walk from the input proxy to the output proxy.
    ///
    /// # Errors
    ///
    /// - [`WheelError::BrokenPath`] if the walk reaches a node with no
    ///   consumer before the output proxy.
    /// - [`WheelError::Branching`] if a node on the way has two consumers.
    /// - [`WheelError::Cycle`] if the walk comes back to a node.
    pub fn active_path(&self) -> Result<Vec<NodeId>, WheelError> {
        let mut path = vec![NodeId(self.input)];
        let mut seen = HashSet::from([self.input]);
        let mut current = self.input;

        while current != self.output {
            let mut consumers = self.inner.neighbors_directed(current, Direction::Outgoing);
            let Some(next) = consumers.next() else {
                return Err(WheelError::BrokenPath(NodeId(current)));
            };
            if consumers.next().is_some() {
                return Err(WheelError::Branching(NodeId(current)));
            }
            if !seen.insert(next) {
                return Err(WheelError::Cycle(NodeId(next)));
            }
            path.push(NodeId(next));
            current = next;
        }
        Ok(path)
    }

    /// Run an image through the active path.
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::EmptyInput`] for a zero-sized image, any
    /// error from [`active_path`](Self::active_path), and the first
    /// stage error.
    pub fn process(&self, input: &RgbaImage) -> Result<RgbaImage, WheelError> {
        if input.width() == 0 || input.height() == 0 {
            return Err(WheelError::EmptyInput);
        }

        let mut current = input.clone();
        for node in self.active_path()? {
            if let Node::Stage { operation, params } = self.node(node)? {
                trace!(%node, %operation, "evaluating stage");
                current = operation.process(&current, params)?;
            }
        }
        Ok(current)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn graph_with(names: &[&str]) -> (Graph, Vec<NodeId>) {
        let mut graph = Graph::new();
        let ids = names.iter().map(|n| graph.new_child(n).unwrap()).collect();
        (graph, ids)
    }

    #[test]
    fn fresh_graph_has_only_unlinked_proxies() {
        let graph = Graph::new();
        assert_eq!(graph.node_count(), 2);
        assert!(graph.edges().is_empty());
        assert!(matches!(
            graph.active_path(),
            Err(WheelError::BrokenPath(n)) if n == graph.input_proxy()
        ));
    }

    #[test]
    fn new_child_seeds_defaults() {
        let (graph, ids) = graph_with(&["gegl:median-blur"]);
        assert_eq!(graph.param(ids[0], "radius").unwrap(), &ParamValue::Int(3));
        assert_eq!(
            graph.operation(ids[0]).unwrap(),
            Some(OperationKind::MedianBlur)
        );
        assert_eq!(graph.operation(graph.input_proxy()).unwrap(), None);
    }

    #[test]
    fn new_child_rejects_unknown_operation() {
        let mut graph = Graph::new();
        assert!(matches!(
            graph.new_child("gegl:teleport"),
            Err(WheelError::UnknownOperation(_))
        ));
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn set_param_clamps_and_widens() {
        let (mut graph, ids) = graph_with(&["median-blur", "lens-distortion"]);
        assert!(graph.set_param(ids[0], "radius", ParamValue::Int(500)).unwrap());
        assert_eq!(graph.param(ids[0], "radius").unwrap(), &ParamValue::Int(100));

        assert!(!graph.set_param(ids[1], "zoom", ParamValue::Int(50)).unwrap());
        assert_eq!(
            graph.param(ids[1], "zoom").unwrap(),
            &ParamValue::Double(50.0)
        );
    }

    #[test]
    fn set_param_rejects_unknown_and_mistyped() {
        let (mut graph, ids) = graph_with(&["median-blur"]);
        assert!(matches!(
            graph.set_param(ids[0], "sigma", ParamValue::Int(1)),
            Err(WheelError::UnknownParameter { .. })
        ));
        assert!(matches!(
            graph.set_param(ids[0], "radius", ParamValue::Bool(true)),
            Err(WheelError::TypeMismatch { .. })
        ));
        let input = graph.input_proxy();
        assert!(matches!(
            graph.set_param(input, "radius", ParamValue::Int(1)),
            Err(WheelError::UnknownParameter { ref operation, .. }) if operation == "input"
        ));
    }

    #[test]
    fn set_param_validates_descriptors() {
        let (mut graph, ids) = graph_with(&["gegl:gegl"]);
        let err = graph
            .set_param(ids[0], "string", ParamValue::from("gegl:nope"))
            .unwrap_err();
        assert!(matches!(err, WheelError::UnknownOperation(_)));
        assert_eq!(
            graph.param(ids[0], "string").unwrap(),
            &ParamValue::Str(String::new()),
            "rejected value must not be stored"
        );
    }

    #[test]
    fn link_many_builds_active_path() {
        let (mut graph, ids) = graph_with(&["opacity", "median-blur"]);
        let chain = [graph.input_proxy(), ids[0], ids[1], graph.output_proxy()];
        graph.link_many(&chain).unwrap();
        assert_eq!(graph.active_path().unwrap(), chain);
        assert!(graph.is_linked_chain(&chain));
    }

    #[test]
    fn relinking_replaces_edges_and_detaches_bypassed_node() {
        let (mut graph, ids) = graph_with(&["opacity", "polar-coordinates", "median-blur"]);
        let (a, polar, c) = (ids[0], ids[1], ids[2]);
        let (input, output) = (graph.input_proxy(), graph.output_proxy());

        graph.link_many(&[input, a, polar, c, output]).unwrap();
        graph.link_many(&[a, c, output]).unwrap();

        assert_eq!(graph.active_path().unwrap(), [input, a, c, output]);
        assert_eq!(graph.detached_nodes(), [polar]);
        assert_eq!(graph.edges().len(), 3);

        graph.link_many(&[a, polar, c, output]).unwrap();
        assert_eq!(graph.active_path().unwrap(), [input, a, polar, c, output]);
        assert!(graph.detached_nodes().is_empty());
    }

    #[test]
    fn failed_link_many_leaves_edges_untouched() {
        let (mut graph, ids) = graph_with(&["opacity", "median-blur"]);
        let (input, output) = (graph.input_proxy(), graph.output_proxy());
        graph.link_many(&[input, ids[0], output]).unwrap();
        let before = graph.edges();

        let foreign = NodeId(NodeIndex::new(99));

        for bad in [
            vec![ids[1]],
            vec![ids[0], ids[1], ids[0]],
            vec![ids[1], foreign],
            vec![ids[1], input],
            vec![output, ids[1]],
        ] {
            assert!(graph.link_many(&bad).is_err(), "{bad:?}");
            assert_eq!(graph.edges(), before, "{bad:?}");
        }
    }

    #[test]
    fn active_path_reports_fan_out_and_cycles() {
        let (mut graph, ids) = graph_with(&["opacity", "median-blur"]);
        let input = graph.input_proxy();
        // Edges added directly. Linking caps every node at one producer and
        // one consumer, so neither shape is reachable from the input proxy.
        graph.inner.add_edge(input.0, ids[0].0, ());
        graph.inner.add_edge(input.0, ids[1].0, ());
        assert!(matches!(graph.active_path(), Err(WheelError::Branching(n)) if n == input));

        let (mut graph, ids) = graph_with(&["opacity", "median-blur"]);
        let input = graph.input_proxy();
        graph.inner.add_edge(input.0, ids[0].0, ());
        graph.inner.add_edge(ids[0].0, ids[1].0, ());
        graph.inner.add_edge(ids[1].0, ids[0].0, ());
        assert!(matches!(graph.active_path(), Err(WheelError::Cycle(n)) if n == ids[0]));
    }

    #[test]
    fn detached_loop_leaves_active_path_intact() {
        let (mut graph, ids) = graph_with(&["opacity", "median-blur", "opacity"]);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        let (input, output) = (graph.input_proxy(), graph.output_proxy());
        graph.link_many(&[input, c, output]).unwrap();

        graph.link_many(&[a, b]).unwrap();
        graph.link(b, a).unwrap();

        assert_eq!(graph.edges().len(), 4);
        assert!(graph.edges().contains(&(b, a)));
        assert_eq!(graph.active_path().unwrap(), [input, c, output]);
        assert!(graph.detached_nodes().is_empty());

        // Pulling a loop member onto the path breaks the loop open.
        graph.link_many(&[input, a, c]).unwrap();
        assert_eq!(graph.active_path().unwrap(), [input, a, c, output]);
        assert_eq!(graph.edges().len(), 3);
    }

    #[test]
    fn process_runs_the_active_path() {
        let (mut graph, ids) = graph_with(&["opacity", "opacity"]);
        graph.set_param(ids[0], "value", ParamValue::Double(0.5)).unwrap();
        graph.set_param(ids[1], "value", ParamValue::Double(0.5)).unwrap();
        let (input, output) = (graph.input_proxy(), graph.output_proxy());
        graph.link_many(&[input, ids[0], output]).unwrap();

        let img = RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 200]));
        assert_eq!(graph.process(&img).unwrap().get_pixel(1, 1)[3], 100);

        graph.link_many(&[input, ids[0], ids[1], output]).unwrap();
        assert_eq!(graph.process(&img).unwrap().get_pixel(1, 1)[3], 50);
    }

    #[test]
    fn process_rejects_empty_images() {
        let mut graph = Graph::new();
        let (input, output) = (graph.input_proxy(), graph.output_proxy());
        graph.link(input, output).unwrap();
        assert!(matches!(
            graph.process(&RgbaImage::new(0, 4)),
            Err(WheelError::EmptyInput)
        ));
        let img = RgbaImage::from_pixel(1, 1, Rgba([1, 2, 3, 4]));
        assert_eq!(graph.process(&img).unwrap(), img);
    }
}
