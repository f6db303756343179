//! Sub-pipeline descriptors: a short text form for a linear chain of
//! stage operations.
//!
//! ```text
//! gegl:gaussian-blur std-dev-x=1500 opacity value=10 opacity value=10 :
//! ```
//!
//! Tokens are separated by whitespace. A token without `=` names an
//! operation (the `gegl:` prefix is optional); a `key=value` token sets a
//! parameter on the most recently named operation. Tokens made only of
//! `:` are separators and carry no meaning. Values are parsed by the
//! target parameter's declared type and clamped into its range.

use tracing::trace;

use crate::operation::{Operation, OperationKind};
use crate::types::{Params, RgbaImage, WheelError};

/// One operation in a parsed chain, with its fully populated parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Which operation to run.
    pub operation: OperationKind,
    /// Declared defaults overlaid with the descriptor's assignments.
    pub params: Params,
}

/// A parsed descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chain {
    steps: Vec<Step>,
}

impl Chain {
    /// The steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` for an empty chain, which passes images through.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order.
    ///
    /// # Errors
    ///
    /// Propagates the first stage error.
    pub fn process(&self, input: &RgbaImage) -> Result<RgbaImage, WheelError> {
        let mut current = input.clone();
        for step in &self.steps {
            trace!(operation = %step.operation, "sub-pipeline step");
            current = step.operation.process(&current, &step.params)?;
        }
        Ok(current)
    }
}

/// Parse a descriptor string.
///
/// # Errors
///
/// - [`WheelError::InvalidDescriptor`] for an assignment before any
///   operation, a value that does not parse, or a nested `gegl:gegl`.
/// - [`WheelError::UnknownOperation`] for an unregistered name.
/// - [`WheelError::UnknownParameter`] for a key the operation does not
///   declare.
pub fn parse(descriptor: &str) -> Result<Chain, WheelError> {
    let mut steps: Vec<Step> = Vec::new();

    for token in descriptor.split_whitespace() {
        if token.chars().all(|c| c == ':') {
            continue;
        }

        if let Some((key, raw)) = token.split_once('=') {
            let Some(step) = steps.last_mut() else {
                return Err(WheelError::InvalidDescriptor(format!(
                    "`{token}` appears before any operation"
                )));
            };
            let spec = step.operation.schema().get(key).ok_or_else(|| {
                WheelError::UnknownParameter {
                    operation: step.operation.name().to_owned(),
                    name: key.to_owned(),
                }
            })?;
            let (value, _) = spec
                .parse_value(raw)
                .and_then(|value| spec.coerce(value))
                .map_err(|e| WheelError::InvalidDescriptor(format!("`{token}`: {e}")))?;
            step.params.insert(key, value);
            continue;
        }

        let operation = OperationKind::from_name(token)?;
        if operation == OperationKind::SubPipeline {
            return Err(WheelError::InvalidDescriptor(
                "nested sub-pipelines are not supported".to_owned(),
            ));
        }
        steps.push(Step {
            operation,
            params: operation.schema().defaults(),
        });
    }

    Ok(Chain { steps })
}
