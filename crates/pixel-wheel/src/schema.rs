//! Parameter schemas: the declared shape of an operation's controls.
//!
//! Every operation, whether the composite pixel wheel or one of the
//! stages it wires together, publishes a [`Schema`]: a static list of
//! [`ParamSpec`]s giving each parameter a fixed type, a closed range, a
//! default, and optional UI hints. Schemas are pure declarations. Values
//! live in [`Params`] and are checked against a schema with
//! [`ParamSpec::coerce`].

use std::fmt;

use serde::Serialize;

use crate::types::{ParamValue, Params, WheelError};

/// Type, default, and range of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    /// Real value in `[min, max]`.
    Double {
        /// Default value.
        default: f64,
        /// Lower bound (inclusive).
        min: f64,
        /// Upper bound (inclusive).
        max: f64,
    },
    /// Integer value in `[min, max]`.
    Int {
        /// Default value.
        default: i32,
        /// Lower bound (inclusive).
        min: i32,
        /// Upper bound (inclusive).
        max: i32,
    },
    /// Boolean toggle.
    Bool {
        /// Default value.
        default: bool,
    },
    /// Free-form text.
    Str {
        /// Default value.
        default: &'static str,
    },
}

impl ParamKind {
    /// The declared default as a [`ParamValue`].
    #[must_use]
    pub fn default_value(&self) -> ParamValue {
        match *self {
            Self::Double { default, .. } => ParamValue::Double(default),
            Self::Int { default, .. } => ParamValue::Int(default),
            Self::Bool { default } => ParamValue::Bool(default),
            Self::Str { default } => ParamValue::Str(default.to_owned()),
        }
    }

    /// Name of the declared type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Double { .. } => "double",
            Self::Int { .. } => "int",
            Self::Bool { .. } => "boolean",
            Self::Str { .. } => "string",
        }
    }
}

/// Display unit hint for numeric parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Unit {
    /// Value is a percentage.
    Percent,
    /// Value is a distance in pixels.
    PixelDistance,
}

/// Visibility predicate over a boolean sibling parameter.
///
/// Written in the host's UI-meta syntax: `"disablepolar"` means "only
/// while `disablepolar` is set", `"! disablepolar"` means "only while it
/// is not set".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    /// Visible while the named boolean is `true`.
    Set(&'static str),
    /// Visible while the named boolean is `false`.
    Unset(&'static str),
}

impl Sensitivity {
    /// Parse a UI-meta sensitivity expression.
    ///
    /// Returns `None` for an empty expression.
    #[must_use]
    pub fn parse(expr: &'static str) -> Option<Self> {
        let expr = expr.trim();
        let (negated, name) = expr
            .strip_prefix('!')
            .map_or((false, expr), |rest| (true, rest.trim_start()));
        if name.is_empty() {
            return None;
        }
        Some(if negated {
            Self::Unset(name)
        } else {
            Self::Set(name)
        })
    }

    /// Evaluate against current values. A missing or non-boolean
    /// referenced parameter counts as `false`.
    #[must_use]
    pub fn evaluate(self, values: &Params) -> bool {
        let flag = |name: &str| {
            values
                .get(name)
                .and_then(ParamValue::as_bool)
                .unwrap_or(false)
        };
        match self {
            Self::Set(name) => flag(name),
            Self::Unset(name) => !flag(name),
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(name) => f.write_str(name),
            Self::Unset(name) => write!(f, "! {name}"),
        }
    }
}

/// Declaration of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    /// Canonical name used for reads, writes, and redirections.
    pub name: &'static str,
    /// Short human-readable label.
    pub label: &'static str,
    /// Longer description.
    pub description: &'static str,
    /// Type, default, and range.
    #[serde(flatten)]
    pub kind: ParamKind,
    /// Optional unit hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
    /// Optional visibility expression (see [`Sensitivity`]).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive: Option<&'static str>,
}

impl ParamSpec {
    const fn with_kind(name: &'static str, label: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            label,
            description: "",
            kind,
            unit: None,
            sensitive: None,
        }
    }

    /// Declare a real-valued parameter.
    #[must_use]
    pub const fn double(
        name: &'static str,
        label: &'static str,
        default: f64,
        min: f64,
        max: f64,
    ) -> Self {
        Self::with_kind(name, label, ParamKind::Double { default, min, max })
    }

    /// Declare an integer parameter.
    #[must_use]
    pub const fn int(
        name: &'static str,
        label: &'static str,
        default: i32,
        min: i32,
        max: i32,
    ) -> Self {
        Self::with_kind(name, label, ParamKind::Int { default, min, max })
    }

    /// Declare a boolean parameter.
    #[must_use]
    pub const fn boolean(name: &'static str, label: &'static str, default: bool) -> Self {
        Self::with_kind(name, label, ParamKind::Bool { default })
    }

    /// Declare a string parameter.
    #[must_use]
    pub const fn string(name: &'static str, label: &'static str, default: &'static str) -> Self {
        Self::with_kind(name, label, ParamKind::Str { default })
    }

    /// Attach a description.
    #[must_use]
    pub const fn description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Attach a unit hint.
    #[must_use]
    pub const fn unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Attach a visibility expression.
    #[must_use]
    pub const fn sensitive(mut self, expr: &'static str) -> Self {
        self.sensitive = Some(expr);
        self
    }

    /// The parsed visibility predicate, if any.
    #[must_use]
    pub fn sensitivity(&self) -> Option<Sensitivity> {
        self.sensitive.and_then(Sensitivity::parse)
    }

    /// Check a value against this declaration.
    ///
    /// Integers widen to doubles. Numeric values outside the declared
    /// range are clamped; the returned flag is `true` when that happened.
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::TypeMismatch`] for a value of the wrong type
    /// and [`WheelError::InvalidValue`] for a NaN double.
    pub fn coerce(&self, value: ParamValue) -> Result<(ParamValue, bool), WheelError> {
        match (self.kind, value) {
            (ParamKind::Double { min, max, .. }, value @ (ParamValue::Double(_) | ParamValue::Int(_))) => {
                let raw = value.as_double().unwrap_or_default();
                if raw.is_nan() {
                    return Err(WheelError::InvalidValue {
                        name: self.name.to_owned(),
                        reason: "NaN is not a valid value".to_owned(),
                    });
                }
                let clamped = raw.clamp(min, max);
                Ok((ParamValue::Double(clamped), clamped.total_cmp(&raw).is_ne()))
            }
            (ParamKind::Int { min, max, .. }, ParamValue::Int(raw)) => {
                let clamped = raw.clamp(min, max);
                Ok((ParamValue::Int(clamped), clamped != raw))
            }
            (ParamKind::Bool { .. }, value @ ParamValue::Bool(_))
            | (ParamKind::Str { .. }, value @ ParamValue::Str(_)) => Ok((value, false)),
            (kind, value) => Err(WheelError::TypeMismatch {
                name: self.name.to_owned(),
                expected: kind.type_name(),
                found: value.type_name(),
            }),
        }
    }

    /// Parse a textual value (as found in descriptor strings) according
    /// to the declared type. The result is not yet range-checked.
    ///
    /// # Errors
    ///
    /// Returns [`WheelError::InvalidValue`] if `raw` does not parse as the
    /// declared type.
    pub fn parse_value(&self, raw: &str) -> Result<ParamValue, WheelError> {
        let invalid = |reason: String| WheelError::InvalidValue {
            name: self.name.to_owned(),
            reason,
        };
        match self.kind {
            ParamKind::Double { .. } => raw
                .parse::<f64>()
                .map(ParamValue::Double)
                .map_err(|e| invalid(format!("`{raw}`: {e}"))),
            ParamKind::Int { .. } => raw
                .parse::<i32>()
                .map(ParamValue::Int)
                .map_err(|e| invalid(format!("`{raw}`: {e}"))),
            ParamKind::Bool { .. } => raw
                .parse::<bool>()
                .map(ParamValue::Bool)
                .map_err(|e| invalid(format!("`{raw}`: {e}"))),
            ParamKind::Str { .. } => Ok(ParamValue::Str(raw.to_owned())),
        }
    }
}

/// The full set of parameters an operation declares.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    params: &'static [ParamSpec],
}

impl Schema {
    /// Wrap a static list of declarations.
    #[must_use]
    pub const fn new(params: &'static [ParamSpec]) -> Self {
        Self { params }
    }

    /// All declarations, in declaration order.
    #[must_use]
    pub const fn params(&self) -> &'static [ParamSpec] {
        self.params
    }

    /// Look up a declaration by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// A parameter set holding every declared default.
    #[must_use]
    pub fn defaults(&self) -> Params {
        let mut params = Params::new();
        for spec in self.params {
            params.insert(spec.name, spec.kind.default_value());
        }
        params
    }
}
