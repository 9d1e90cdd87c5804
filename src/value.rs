//! Constant-value operator.

use crate::graph::{Graph, GraphError};
use crate::node::{Arg, Frame, Signal};
use crate::registry::Operator;
use crate::GraphConfig;

/// A node whose output is one scalar, broadcast across the whole frame.
///
/// Registered on the graph as `value`. The frame is refilled only when the
/// scalar changes; `process` has nothing to do.
#[derive(Debug)]
pub struct Value {
    value: f64,
    output: Frame,
}

impl Value {
    /// The held scalar.
    pub fn get(&self) -> f64 {
        self.value
    }

    /// Replace the held scalar. Only finite numbers are accepted.
    pub fn set(&mut self, value: impl Into<Arg>) -> Result<(), GraphError> {
        let value = match value.into() {
            Arg::Int(v) => v as f64,
            Arg::Float(v) if v.is_finite() => v,
            other => return Err(GraphError::InvalidValue(format!("{other:?}"))),
        };
        self.value = value;
        self.output.fill(value);
        Ok(())
    }
}

impl Operator for Value {
    fn new(config: GraphConfig) -> Self {
        Self {
            value: 0.0,
            output: Frame::new(config),
        }
    }
}

impl Signal for Value {
    fn init(&mut self, _graph: &Graph, args: &[Arg]) -> Result<(), GraphError> {
        match args {
            [value] => self.set(value.clone()),
            _ => Err(GraphError::InvalidArguments {
                operator: "value",
                reason: format!("expected 1 argument, got {}", args.len()),
            }),
        }
    }

    fn output(&self) -> &[f64] {
        &self.output
    }
}
