//! Meta-operation host harness.
//!
//! A meta-operation publishes a parameter schema and, when attached to a
//! [`Graph`], builds a small internal sub-graph out of stage nodes. After
//! that the host forwards parameter writes: some go straight to a stage
//! through a [`Redirect`], and every write gives the operation a chance
//! to rewire its sub-graph.
//!
//! [`MetaNode`] plays the host. It owns the graph, the external parameter
//! values, the redirection table, and the operation's typed state, and
//! drives the two lifecycle hooks of [`MetaOperation`].

use serde::Serialize;
use tracing::{debug, warn};

use crate::graph::{Graph, NodeId};
use crate::schema::Schema;
use crate::types::{ParamValue, Params, RgbaImage, WheelError};

/// Registration metadata. Opaque to the host; carried for discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OperationKeys {
    /// Unique operation name, e.g. `lb:pixel-wheel`.
    pub name: &'static str,
    /// Display title.
    pub title: &'static str,
    /// Category tag.
    pub categories: &'static str,
    /// Content reference hash.
    pub reference_hash: &'static str,
    /// One-line description.
    pub description: &'static str,
}

/// Binding from an external parameter to a stage parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Name on the meta-operation.
    pub external: String,
    /// Stage node receiving the value.
    pub node: NodeId,
    /// Name on the stage.
    pub internal: String,
}

/// A composite operation built from stage nodes.
pub trait MetaOperation {
    /// Handles to the nodes the operation created, kept between hooks.
    type State;

    /// Registration metadata.
    fn keys(&self) -> OperationKeys;

    /// External parameters.
    fn schema(&self) -> Schema;

    /// Build the internal sub-graph. Called once per instance.
    ///
    /// # Errors
    ///
    /// Any failure creating, configuring, or linking nodes. The host
    /// rolls the graph back and the instance stays unattached.
    fn initialize(&self, ctx: &mut AttachContext<'_>) -> Result<Self::State, WheelError>;

    /// React to a parameter change. `state` is `None` until
    /// [`initialize`](Self::initialize) has succeeded.
    ///
    /// # Errors
    ///
    /// Any failure relinking nodes.
    fn on_parameter_changed(
        &self,
        state: Option<&Self::State>,
        graph: &mut Graph,
        params: &Params,
    ) -> Result<(), WheelError>;
}

/// What an operation may do to its host while attaching.
#[derive(Debug)]
pub struct AttachContext<'a> {
    operation: &'static str,
    graph: &'a mut Graph,
    params: &'a Params,
    redirects: Vec<Redirect>,
}

impl<'a> AttachContext<'a> {
    fn new(operation: &'static str, graph: &'a mut Graph, params: &'a Params) -> Self {
        Self {
            operation,
            graph,
            params,
            redirects: Vec::new(),
        }
    }

    /// Current external parameter values.
    #[must_use]
    pub const fn params(&self) -> &Params {
        self.params
    }

    /// The host's input proxy.
    #[must_use]
    pub const fn input_proxy(&self) -> NodeId {
        self.graph.input_proxy()
    }

    /// The host's output proxy.
    #[must_use]
    pub const fn output_proxy(&self) -> NodeId {
        self.graph.output_proxy()
    }

    /// See [`Graph::new_child`].
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::UnknownOperation`] for an unregistered name.
    pub fn new_child(&mut self, operation: &str) -> Result<NodeId, WheelError> {
        self.graph.new_child(operation)
    }

    /// See [`Graph::set_param`].
    ///
    /// # Errors
    ///
    /// Any error from [`Graph::set_param`].
    pub fn set_param(
        &mut self,
        node: NodeId,
        name: &str,
        value: ParamValue,
    ) -> Result<(), WheelError> {
        self.graph.set_param(node, name, value).map(drop)
    }

    /// See [`Graph::link_many`].
    ///
    /// # Errors
    ///
    /// Any error from [`Graph::link_many`].
    pub fn link_many(&mut self, chain: &[NodeId]) -> Result<(), WheelError> {
        self.graph.link_many(chain)
    }

    /// Bind `external` to `internal` on `node`. The current external value
    /// is copied into the stage right away.
    ///
    /// # Errors
    ///
    /// [`WheelError::UnknownParameter`] if `external` is not declared,
    /// and any error from [`Graph::set_param`] for the stage side.
    pub fn redirect(
        &mut self,
        external: &str,
        node: NodeId,
        internal: &str,
    ) -> Result<(), WheelError> {
        let value = self
            .params
            .get(external)
            .ok_or_else(|| WheelError::UnknownParameter {
                operation: self.operation.to_owned(),
                name: external.to_owned(),
            })?
            .clone();
        self.graph.set_param(node, internal, value)?;
        debug!(external, %node, internal, "redirect");
        self.redirects.push(Redirect {
            external: external.to_owned(),
            node,
            internal: internal.to_owned(),
        });
        Ok(())
    }
}

/// Host for one instance of a meta-operation.
pub struct MetaNode<M: MetaOperation> {
    operation: M,
    graph: Graph,
    params: Params,
    redirects: Vec<Redirect>,
    state: Option<M::State>,
}

impl<M: MetaOperation> MetaNode<M> {
    /// Wrap `operation` in a fresh graph with every external parameter at
    /// its default. Nothing is built until [`attach`](Self::attach).
    pub fn new(operation: M) -> Self {
        let params = operation.schema().defaults();
        Self {
            operation,
            graph: Graph::new(),
            params,
            redirects: Vec::new(),
            state: None,
        }
    }

    /// The hosted operation.
    pub const fn operation(&self) -> &M {
        &self.operation
    }

    /// The host graph.
    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Current external parameter values.
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Bindings established during attach.
    pub fn redirects(&self) -> &[Redirect] {
        &self.redirects
    }

    /// The operation's state, present once attached.
    pub const fn state(&self) -> Option<&M::State> {
        self.state.as_ref()
    }

    /// Returns `true` after a successful [`attach`](Self::attach).
    pub const fn is_attached(&self) -> bool {
        self.state.is_some()
    }

    /// Read an external parameter.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Run the operation's [`initialize`](MetaOperation::initialize) hook.
    ///
    /// On failure the graph is restored to what it was before the call.
    ///
    /// # Errors
    ///
    /// [`WheelError::AlreadyAttached`] on a second successful attach, and
    /// any error from the hook.
    pub fn attach(&mut self) -> Result<(), WheelError> {
        if self.state.is_some() {
            return Err(WheelError::AlreadyAttached);
        }

        let name = self.operation.keys().name;
        let snapshot = self.graph.clone();
        let mut ctx = AttachContext::new(name, &mut self.graph, &self.params);
        let result = self.operation.initialize(&mut ctx);
        let redirects = ctx.redirects;

        match result {
            Ok(state) => {
                debug!(
                    operation = name,
                    nodes = self.graph.node_count(),
                    redirects = redirects.len(),
                    "attached"
                );
                self.redirects = redirects;
                self.state = Some(state);
                Ok(())
            }
            Err(err) => {
                warn!(operation = name, error = %err, "attach failed, graph rolled back");
                self.graph = snapshot;
                Err(err)
            }
        }
    }

    /// Assign an external parameter.
    ///
    /// The value is checked against the schema and clamped into range,
    /// forwarded through every redirect bound to `name`, stored, and then
    /// [`update`](Self::update) runs.
    ///
    /// # Errors
    ///
    /// [`WheelError::UnknownParameter`] for an undeclared name, type
    /// errors from the schema, and any error from forwarding or updating.
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<(), WheelError> {
        let schema = self.operation.schema();
        let operation = self.operation.keys().name;
        let spec = schema
            .get(name)
            .ok_or_else(|| WheelError::UnknownParameter {
                operation: operation.to_owned(),
                name: name.to_owned(),
            })?;

        let (value, clamped) = spec.coerce(value.into())?;
        if clamped {
            warn!(operation, param = name, %value, "parameter clamped into range");
        }

        for redirect in self.redirects.iter().filter(|r| r.external == name) {
            self.graph
                .set_param(redirect.node, &redirect.internal, value.clone())?;
        }
        self.params.insert(name, value);
        self.update()
    }

    /// Run the operation's
    /// [`on_parameter_changed`](MetaOperation::on_parameter_changed) hook.
    ///
    /// # Errors
    ///
    /// Any error from the hook.
    pub fn update(&mut self) -> Result<(), WheelError> {
        self.operation
            .on_parameter_changed(self.state.as_ref(), &mut self.graph, &self.params)
    }

    /// Whether a parameter should currently be shown, according to its
    /// visibility predicate. Parameters without one are always shown.
    ///
    /// # Errors
    ///
    /// [`WheelError::UnknownParameter`] for an undeclared name.
    pub fn is_sensitive(&self, name: &str) -> Result<bool, WheelError> {
        let spec = self
            .operation
            .schema()
            .get(name)
            .ok_or_else(|| WheelError::UnknownParameter {
                operation: self.operation.keys().name.to_owned(),
                name: name.to_owned(),
            })?;
        Ok(spec
            .sensitivity()
            .is_none_or(|predicate| predicate.evaluate(&self.params)))
    }

    /// Run an image through the attached graph.
    ///
    /// # Errors
    ///
    /// [`WheelError::NotAttached`] before a successful attach, then any
    /// error from [`Graph::process`].
    pub fn process(&self, input: &RgbaImage) -> Result<RgbaImage, WheelError> {
        if self.state.is_none() {
            return Err(WheelError::NotAttached);
        }
        self.graph.process(input)
    }
}
