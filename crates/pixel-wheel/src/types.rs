//! Shared types for the pixel-wheel operation and its host graph.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

/// Re-export `RgbaImage` so downstream crates can hand images to the
/// graph without depending on `image` directly.
pub use image::RgbaImage;

/// A single parameter value, on either the composite operation or one of
/// its internal stages.
///
/// Serialized untagged so configs read naturally as JSON (`4`, `4.5`,
/// `true`, `"text"`). Variant order matters for deserialization: an
/// integer literal becomes [`Int`](Self::Int), anything with a fraction
/// becomes [`Double`](Self::Double).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean toggle.
    Bool(bool),
    /// Integer value.
    Int(i32),
    /// Real value.
    Double(f64),
    /// Free-form text (descriptor strings).
    Str(String),
}

impl ParamValue {
    /// Human-readable name of the value's type, for error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::Str(_) => "string",
        }
    }

    /// The value as a real number. Integers widen losslessly.
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match *self {
            Self::Double(v) => Some(v),
            Self::Int(v) => Some(f64::from(v)),
            Self::Bool(_) | Self::Str(_) => None,
        }
    }

    /// The value as an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<i32> {
        match *self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    /// The value as a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// The value as a string slice.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// A named set of parameter values.
///
/// Used both for the external properties of a meta-operation and for the
/// parameters of each internal stage. Keys are kept sorted so debug output
/// and serialization are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    /// Create an empty parameter set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Look up a value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        self.0.insert(name.into(), value)
    }

    /// Number of values held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no values are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn require(&self, name: &str) -> Result<&ParamValue, WheelError> {
        self.get(name).ok_or_else(|| WheelError::MissingParameter {
            name: name.to_owned(),
        })
    }

    /// Read a real-valued parameter.
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::MissingParameter`] if absent and
    /// [`WheelError::TypeMismatch`] if it is not numeric.
    pub fn double(&self, name: &str) -> Result<f64, WheelError> {
        let value = self.require(name)?;
        value.as_double().ok_or_else(|| mismatch(name, "double", value))
    }

    /// Read an integer parameter.
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::MissingParameter`] if absent and
    /// [`WheelError::TypeMismatch`] if it is not an integer.
    pub fn int(&self, name: &str) -> Result<i32, WheelError> {
        let value = self.require(name)?;
        value.as_int().ok_or_else(|| mismatch(name, "int", value))
    }

    /// Read a boolean parameter.
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::MissingParameter`] if absent and
    /// [`WheelError::TypeMismatch`] if it is not a boolean.
    pub fn boolean(&self, name: &str) -> Result<bool, WheelError> {
        let value = self.require(name)?;
        value.as_bool().ok_or_else(|| mismatch(name, "boolean", value))
    }

    /// Read a string parameter.
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::MissingParameter`] if absent and
    /// [`WheelError::TypeMismatch`] if it is not a string.
    pub fn string(&self, name: &str) -> Result<&str, WheelError> {
        let value = self.require(name)?;
        value.as_str().ok_or_else(|| mismatch(name, "string", value))
    }
}

fn mismatch(name: &str, expected: &'static str, found: &ParamValue) -> WheelError {
    WheelError::TypeMismatch {
        name: name.to_owned(),
        expected,
        found: found.type_name(),
    }
}

/// Errors raised by the host graph, the stage collaborators, and the
/// meta-operation harness.
///
/// The pixel-wheel composer itself introduces no error kinds of its own;
/// it only forwards failures from the graph it builds.
#[derive(Debug, thiserror::Error)]
pub enum WheelError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image was empty (no bytes, or zero width/height).
    #[error("input image data is empty")]
    EmptyInput,

    /// No stage operation is registered under this name.
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    /// The operation does not declare a parameter with this name.
    #[error("`{operation}` has no parameter `{name}`")]
    UnknownParameter {
        /// Operation the lookup was made against.
        operation: String,
        /// Requested parameter name.
        name: String,
    },

    /// A declared parameter has no value.
    #[error("parameter `{name}` has no value")]
    MissingParameter {
        /// Requested parameter name.
        name: String,
    },

    /// A value of the wrong type was supplied for a parameter.
    #[error("parameter `{name}` expects {expected}, got {found}")]
    TypeMismatch {
        /// Parameter name.
        name: String,
        /// Declared type.
        expected: &'static str,
        /// Supplied type.
        found: &'static str,
    },

    /// A value had the right type but cannot be used (e.g. NaN).
    #[error("invalid value for `{name}`: {reason}")]
    InvalidValue {
        /// Parameter name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A sub-pipeline descriptor string could not be parsed.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// The node id does not belong to this graph.
    #[error("node {0} does not exist in this graph")]
    NodeNotFound(NodeId),

    /// A chain passed to `link_many` is malformed.
    #[error("invalid chain: {0}")]
    InvalidChain(String),

    /// The active path stops before reaching the output proxy.
    #[error("active path ends at node {0} before reaching the output proxy")]
    BrokenPath(NodeId),

    /// A node on the active path feeds more than one consumer.
    #[error("node {0} feeds more than one consumer")]
    Branching(NodeId),

    /// The active path revisits a node.
    #[error("active path revisits node {0}")]
    Cycle(NodeId),

    /// `attach` was called on an instance that is already attached.
    #[error("operation is already attached")]
    AlreadyAttached,

    /// Processing was requested before a successful `attach`.
    #[error("operation has not been attached")]
    NotAttached,
}
