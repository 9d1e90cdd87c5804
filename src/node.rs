//! Signal nodes: the per-frame unit of computation.
//!
//! Every node owns a [`Frame`] allocated once, at construction, to the graph's
//! frame size. The graph calls [`Signal::process`] once per frame; a node only
//! ever writes its own frame and reads the frames of nodes registered before it.

use crate::graph::{Graph, GraphError, GraphInner};
use crate::registry::{Operator, Owner};
use crate::GraphConfig;
use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::{Rc, Weak};

/// Registration index of a node within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Fixed-length output buffer of a node.
///
/// Backed by a boxed slice, so the length chosen at construction can never
/// change and the render loop never reallocates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    data: Box<[f64]>,
}

impl Frame {
    /// A zero-filled frame sized for `config`.
    pub fn new(config: GraphConfig) -> Self {
        Self::filled(config, 0.0)
    }

    /// A frame sized for `config` with every sample set to `value`.
    pub fn filled(config: GraphConfig, value: f64) -> Self {
        Self {
            data: vec![value; config.frame_size].into_boxed_slice(),
        }
    }
}

impl Deref for Frame {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.data
    }
}

impl DerefMut for Frame {
    fn deref_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

/// Type-erased access used to downcast boxed nodes back to their concrete type.
pub trait AsAny: Any {
    /// `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A node of the signal graph.
pub trait Signal: AsAny {
    /// Configure node-specific parameters. Called exactly once, right after
    /// construction and before the node is appended to the step list.
    ///
    /// When the operator was invoked on an existing node, that node is
    /// `args[0]`. `graph` is the owning graph; use [`Graph::wrap`] to turn
    /// numeric arguments into upstream nodes.
    fn init(&mut self, graph: &Graph, args: &[Arg]) -> Result<(), GraphError> {
        let _ = (graph, args);
        Ok(())
    }

    /// Compute one frame into the node's own output buffer.
    ///
    /// The node is mutably borrowed for the whole call, so it must never read
    /// its own [`SignalRef`]; doing so panics. List only other nodes in
    /// [`Signal::inputs`].
    fn process(&mut self) {}

    /// The most recently computed frame.
    fn output(&self) -> &[f64];

    /// Upstream nodes this node reads from. Only consulted by
    /// [`Graph::finalize`], which rejects a node listing itself as a cycle.
    fn inputs(&self) -> Vec<SignalRef> {
        Vec::new()
    }

    /// Human-readable node kind, used in logs and debug output.
    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The base node: zero output, nothing to configure, nothing to compute.
#[derive(Debug)]
pub struct Silence {
    output: Frame,
}

impl Operator for Silence {
    fn new(config: GraphConfig) -> Self {
        Self {
            output: Frame::new(config),
        }
    }
}

impl Signal for Silence {
    fn output(&self) -> &[f64] {
        &self.output
    }
}

/// Shared handle to a node registered in a [`Graph`](crate::Graph).
///
/// Cloning the handle is cheap and refers to the same node. The handle keeps
/// only a weak reference to its graph, so operators chained off a node whose
/// graph has been dropped fail with [`GraphError::DetachedSignal`].
#[derive(Clone)]
pub struct SignalRef {
    id: NodeId,
    config: GraphConfig,
    node: Rc<RefCell<Box<dyn Signal>>>,
    graph: Weak<GraphInner>,
}

impl SignalRef {
    pub(crate) fn new(
        id: NodeId,
        config: GraphConfig,
        node: Box<dyn Signal>,
        graph: Weak<GraphInner>,
    ) -> Self {
        Self {
            id,
            config,
            node: Rc::new(RefCell::new(node)),
            graph,
        }
    }

    /// Registration index within the owning graph.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Config of the graph the node was built for.
    pub fn config(&self) -> GraphConfig {
        self.config
    }

    /// See [`Signal::kind`].
    pub fn kind(&self) -> &'static str {
        self.node.borrow().kind()
    }

    /// Borrow the node's current frame.
    pub fn output(&self) -> Ref<'_, [f64]> {
        Ref::map(self.node.borrow(), |node| node.output())
    }

    /// Borrow the node as its concrete type, if it is a `T`.
    pub fn downcast_ref<T: Signal>(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.node.borrow(), |node| {
            (**node).as_any().downcast_ref::<T>()
        })
        .ok()
    }

    /// Mutably borrow the node as its concrete type, if it is a `T`.
    pub fn downcast_mut<T: Signal>(&self) -> Option<RefMut<'_, T>> {
        RefMut::filter_map(self.node.borrow_mut(), |node| {
            (**node).as_any_mut().downcast_mut::<T>()
        })
        .ok()
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &SignalRef) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    /// Invoke an operator registered for [`Owner::Signal`], passing this node
    /// as the first argument to the new node's `init`.
    pub fn call(&self, name: &str, args: &[Arg]) -> Result<SignalRef, GraphError> {
        let graph = self.graph.upgrade().ok_or(GraphError::DetachedSignal)?;
        let mut chained = Vec::with_capacity(args.len() + 1);
        chained.push(Arg::Signal(self.clone()));
        chained.extend_from_slice(args);
        GraphInner::spawn(&graph, Owner::Signal, name, &chained)
    }

    /// Whether the owning graph is still alive.
    pub fn is_attached(&self) -> bool {
        self.graph.strong_count() > 0
    }

    pub(crate) fn graph_ptr(&self) -> *const GraphInner {
        self.graph.as_ptr()
    }

    pub(crate) fn process(&self) {
        self.node.borrow_mut().process();
    }

    pub(crate) fn inputs(&self) -> Vec<SignalRef> {
        self.node.borrow().inputs()
    }
}

impl PartialEq for SignalRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for SignalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("SignalRef");
        s.field("id", &self.id);
        match self.node.try_borrow() {
            Ok(node) => s.field("kind", &node.kind()),
            Err(_) => s.field("kind", &"<borrowed>"),
        };
        s.finish()
    }
}

/// An argument passed to an operator's `init`.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// An existing node.
    Signal(SignalRef),
    /// Raw sample data.
    Buffer(Vec<f64>),
    /// Free-form text, e.g. a mode name.
    Text(String),
}

impl Arg {
    /// The scalar value of a numeric argument.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Arg::Int(v) => Some(*v as f64),
            Arg::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The node of a [`Arg::Signal`] argument.
    pub fn as_signal(&self) -> Option<&SignalRef> {
        match self {
            Arg::Signal(signal) => Some(signal),
            _ => None,
        }
    }

    /// Whether this is an [`Arg::Int`] or [`Arg::Float`].
    pub fn is_number(&self) -> bool {
        matches!(self, Arg::Int(_) | Arg::Float(_))
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        Arg::Float(v as f64)
    }
}

impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Arg::Int(v as i64)
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Int(v)
    }
}

impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Arg::Int(v as i64)
    }
}

impl From<SignalRef> for Arg {
    fn from(v: SignalRef) -> Self {
        Arg::Signal(v)
    }
}

impl From<&SignalRef> for Arg {
    fn from(v: &SignalRef) -> Self {
        Arg::Signal(v.clone())
    }
}

impl From<Vec<f64>> for Arg {
    fn from(v: Vec<f64>) -> Self {
        Arg::Buffer(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Text(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Text(v)
    }
}
