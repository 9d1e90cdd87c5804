//! Graph module: the owning container of signal nodes.
//!
//! The step list is the sole execution order. Nodes are appended as operators
//! are invoked and are never removed; a node that reads another node's output
//! must be created after it.

use crate::node::{Arg, NodeId, SignalRef};
use crate::registry::{OperatorRegistry, Owner};
use crate::GraphConfig;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

/// Errors raised while building or rendering a graph.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Sample rate or frame size is zero.
    InvalidConfig {
        /// Requested samples per second.
        sample_rate: u32,
        /// Requested samples per frame.
        frame_size: usize,
    },
    /// `wrap` was given something that is neither a number nor a node.
    UnsupportedCoercion(String),
    /// A constant was given a non-numeric value.
    InvalidValue(String),
    /// An operator's `init` rejected its argument list.
    InvalidArguments {
        /// Registered name of the rejecting operator.
        operator: &'static str,
        /// What was wrong with the arguments.
        reason: String,
    },
    /// No operator with this name is registered on the owner.
    UnknownOperator {
        /// Where the lookup happened.
        owner: Owner,
        /// The name that was not found.
        name: String,
    },
    /// The node belongs to a different graph.
    ForeignSignal,
    /// The node's graph has been dropped.
    DetachedSignal,
    /// Declared node inputs form a cycle.
    CycleDetected,
    /// Render duration is negative, not finite, or too long to buffer.
    InvalidDuration(f64),
    /// A node's output is not one frame long.
    OutputShape {
        /// The graph's frame size.
        expected: usize,
        /// Length of the node's output slice.
        actual: usize,
    },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::InvalidConfig {
                sample_rate,
                frame_size,
            } => write!(
                f,
                "sample rate ({sample_rate}) and frame size ({frame_size}) must be positive"
            ),
            GraphError::UnsupportedCoercion(value) => {
                write!(f, "can't make a signal out of: {value}")
            }
            GraphError::InvalidValue(value) => {
                write!(f, "value {value} is not a real scalar")
            }
            GraphError::InvalidArguments { operator, reason } => {
                write!(f, "invalid arguments to '{operator}': {reason}")
            }
            GraphError::UnknownOperator { owner, name } => {
                write!(f, "{owner}: no operator named '{name}'")
            }
            GraphError::ForeignSignal => write!(f, "signal belongs to another graph"),
            GraphError::DetachedSignal => write!(f, "signal's graph has been dropped"),
            GraphError::CycleDetected => write!(f, "node inputs form a cycle"),
            GraphError::InvalidDuration(d) => write!(f, "invalid render duration: {d}s"),
            GraphError::OutputShape { expected, actual } => write!(
                f,
                "node output has {actual} samples, expected a frame of {expected}"
            ),
        }
    }
}

impl std::error::Error for GraphError {}

pub(crate) struct GraphInner {
    config: GraphConfig,
    registry: Arc<OperatorRegistry>,
    steps: RefCell<Vec<SignalRef>>,
}

impl GraphInner {
    /// Construct, initialise and append a node for operator `name` on `owner`.
    pub(crate) fn spawn(
        this: &Rc<Self>,
        owner: Owner,
        name: &str,
        args: &[Arg],
    ) -> Result<SignalRef, GraphError> {
        let construct =
            this.registry
                .lookup(owner, name)
                .ok_or_else(|| GraphError::UnknownOperator {
                    owner,
                    name: name.to_string(),
                })?;
        let mut node = construct(this.config);
        node.init(
            &Graph {
                inner: Rc::clone(this),
            },
            args,
        )?;

        let mut steps = this.steps.borrow_mut();
        let id = NodeId(steps.len());
        let signal = SignalRef::new(id, this.config, node, Rc::downgrade(this));
        debug!(id = id.0, operator = name, %owner, "registered step");
        steps.push(signal.clone());
        Ok(signal)
    }
}

/// The owning root of a signal graph.
pub struct Graph {
    inner: Rc<GraphInner>,
}

impl Graph {
    /// A graph using the process-wide default operator registry.
    pub fn new(sample_rate: u32, frame_size: usize) -> Result<Self, GraphError> {
        Self::with_config(GraphConfig::new(sample_rate, frame_size)?)
    }

    /// A graph with an already built config and the default registry.
    pub fn with_config(config: GraphConfig) -> Result<Self, GraphError> {
        Self::with_registry(config, OperatorRegistry::shared_default())
    }

    /// A graph resolving operators through `registry`.
    pub fn with_registry(
        config: GraphConfig,
        registry: Arc<OperatorRegistry>,
    ) -> Result<Self, GraphError> {
        let config = GraphConfig::new(config.sample_rate, config.frame_size)?;
        Ok(Self {
            inner: Rc::new(GraphInner {
                config,
                registry,
                steps: RefCell::new(Vec::new()),
            }),
        })
    }

    /// Sample rate and frame size shared by every node.
    pub fn config(&self) -> GraphConfig {
        self.inner.config
    }

    /// Samples per second.
    pub fn sample_rate(&self) -> u32 {
        self.inner.config.sample_rate
    }

    /// Samples per frame.
    pub fn frame_size(&self) -> usize {
        self.inner.config.frame_size
    }

    /// The operator table this graph resolves names through.
    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        &self.inner.registry
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.inner.steps.borrow().len()
    }

    /// Whether no step has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles to every step, in execution order.
    pub fn steps(&self) -> Vec<SignalRef> {
        self.inner.steps.borrow().clone()
    }

    /// Whether `signal` was registered in this graph.
    pub fn owns(&self, signal: &SignalRef) -> bool {
        signal.is_attached() && std::ptr::eq(signal.graph_ptr(), Rc::as_ptr(&self.inner))
    }

    /// Invoke an operator registered for [`Owner::Graph`].
    pub fn call(&self, name: &str, args: &[Arg]) -> Result<SignalRef, GraphError> {
        GraphInner::spawn(&self.inner, Owner::Graph, name, args)
    }

    /// Register a constant node holding `value`.
    pub fn value(&self, value: impl Into<Arg>) -> Result<SignalRef, GraphError> {
        self.call("value", &[value.into()])
    }

    /// Coerce a number or an existing node into a node.
    ///
    /// Numbers become a new constant node; a node of this graph is returned
    /// as is without touching the step list.
    pub fn wrap(&self, value: impl Into<Arg>) -> Result<SignalRef, GraphError> {
        match value.into() {
            Arg::Signal(signal) if self.owns(&signal) => Ok(signal),
            Arg::Signal(_) => Err(GraphError::ForeignSignal),
            number @ (Arg::Int(_) | Arg::Float(_)) => self.call("value", &[number]),
            other => Err(GraphError::UnsupportedCoercion(format!("{other:?}"))),
        }
    }

    /// Run every step's compute once, in step-list order.
    ///
    /// Panics if a node's `process` borrows its own handle; [`Graph::finalize`]
    /// reports such a node as [`GraphError::CycleDetected`].
    pub fn run_frame(&self) {
        for step in self.inner.steps.borrow().iter() {
            step.process();
        }
    }

    /// Reorder the step list so every node runs after the inputs it declares.
    ///
    /// The sort is stable: when registration order already satisfies every
    /// declared input, the step list is left untouched.
    pub fn finalize(&self) -> Result<(), GraphError> {
        let mut steps = self.inner.steps.borrow_mut();
        let position: HashMap<NodeId, usize> = steps
            .iter()
            .enumerate()
            .map(|(idx, step)| (step.id(), idx))
            .collect();

        let mut in_degree = vec![0usize; steps.len()];
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];
        for (idx, step) in steps.iter().enumerate() {
            for input in step.inputs() {
                if !self.owns(&input) {
                    return Err(GraphError::ForeignSignal);
                }
                let from = position[&input.id()];
                adj[from].push(idx);
                in_degree[idx] += 1;
            }
        }

        // Kahn's algorithm, always taking the earliest ready step.
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();
        let mut order = Vec::with_capacity(steps.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for &next in &adj[idx] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() != steps.len() {
            return Err(GraphError::CycleDetected);
        }
        if order.iter().enumerate().all(|(pos, &idx)| pos == idx) {
            return Ok(());
        }

        let reordered: Vec<SignalRef> = order.iter().map(|&idx| steps[idx].clone()).collect();
        debug!(steps = reordered.len(), "reordered steps by declared inputs");
        *steps = reordered;
        Ok(())
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("config", &self.inner.config)
            .field("steps", &*self.inner.steps.borrow())
            .finish()
    }
}
