//! Operator factory registry.
//!
//! Maps `(owner, name)` to a node constructor. A registry is filled once,
//! then frozen behind an `Arc` and shared read-only by every graph built from
//! it. Only two owners exist: operators invoked on a [`Graph`] and operators
//! chained off an existing [`SignalRef`].

use crate::graph::Graph;
use crate::node::{Signal, SignalRef, Silence};
use crate::value::Value;
use crate::GraphConfig;
use lazy_static::lazy_static;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builds a fresh, uninitialised node for a graph.
pub type Constructor = fn(GraphConfig) -> Box<dyn Signal>;

/// A node kind that can be constructed from a graph config alone.
pub trait Operator: Signal + Sized {
    /// Preallocate the node's output for `config`. Parameters arrive later
    /// through [`Signal::init`].
    fn new(config: GraphConfig) -> Self;
}

/// The type an operator is invoked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// `Graph::call`: `init` receives only the caller's arguments.
    Graph,
    /// `SignalRef::call`: `init` receives the source node first.
    Signal,
}

impl Owner {
    /// The owner kind of `T`, if `T` is one of the two recognised owners.
    pub fn of<T: ?Sized + 'static>() -> Option<Owner> {
        let id = TypeId::of::<T>();
        if id == TypeId::of::<Graph>() {
            Some(Owner::Graph)
        } else if id == TypeId::of::<SignalRef>() {
            Some(Owner::Signal)
        } else {
            None
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Graph => write!(f, "Graph"),
            Owner::Signal => write!(f, "Signal"),
        }
    }
}

/// Errors raised while registering operators.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// The owner type is neither `Graph` nor `SignalRef`.
    UnsupportedOwner {
        /// Type name of the rejected owner.
        owner: &'static str,
    },
    /// The name is already bound on this owner.
    DuplicateOperator {
        /// Owner the name is bound on.
        owner: Owner,
        /// The duplicate name.
        name: String,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UnsupportedOwner { owner } => write!(
                f,
                "invalid owner type {owner}, expecting one of [Graph, SignalRef]"
            ),
            RegistryError::DuplicateOperator { owner, name } => {
                write!(f, "{owner}: operator name '{name}' already in use")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Lookup table from operator names to node constructors.
#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    graph_ops: HashMap<String, Constructor>,
    signal_ops: HashMap<String, Constructor>,
}

lazy_static! {
    static ref DEFAULT_REGISTRY: Arc<OperatorRegistry> =
        Arc::new(OperatorRegistry::with_builtins());
}

fn construct<S: Operator>(config: GraphConfig) -> Box<dyn Signal> {
    Box::new(S::new(config))
}

impl OperatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in graph operators `value` and `silence`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .graph_ops
            .insert("value".to_string(), construct::<Value>);
        registry
            .graph_ops
            .insert("silence".to_string(), construct::<Silence>);
        registry
    }

    /// The process-wide registry used by [`Graph::new`].
    pub fn shared_default() -> Arc<OperatorRegistry> {
        Arc::clone(&DEFAULT_REGISTRY)
    }

    /// Bind operator `S` under `name` on owner type `O` (`Graph` or `SignalRef`).
    pub fn register<O: ?Sized + 'static, S: Operator>(
        &mut self,
        name: &str,
    ) -> Result<(), RegistryError> {
        self.register_fn::<O>(name, construct::<S>)
    }

    /// Bind a raw constructor under `name` on owner type `O`.
    pub fn register_fn<O: ?Sized + 'static>(
        &mut self,
        name: &str,
        constructor: Constructor,
    ) -> Result<(), RegistryError> {
        let owner = Owner::of::<O>().ok_or(RegistryError::UnsupportedOwner {
            owner: type_name::<O>(),
        })?;
        let table = self.table_mut(owner);
        if table.contains_key(name) {
            return Err(RegistryError::DuplicateOperator {
                owner,
                name: name.to_string(),
            });
        }
        table.insert(name.to_string(), constructor);
        debug!(%owner, name, "registered operator");
        Ok(())
    }

    /// Constructor bound to `name` on `owner`.
    pub fn lookup(&self, owner: Owner, name: &str) -> Option<Constructor> {
        self.table(owner).get(name).copied()
    }

    /// Whether `name` is bound on `owner`.
    pub fn contains(&self, owner: Owner, name: &str) -> bool {
        self.table(owner).contains_key(name)
    }

    /// Operator names bound on `owner`, sorted.
    pub fn names(&self, owner: Owner) -> Vec<&str> {
        let mut names: Vec<&str> = self.table(owner).keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn table(&self, owner: Owner) -> &HashMap<String, Constructor> {
        match owner {
            Owner::Graph => &self.graph_ops,
            Owner::Signal => &self.signal_ops,
        }
    }

    fn table_mut(&mut self, owner: Owner) -> &mut HashMap<String, Constructor> {
        match owner {
            Owner::Graph => &mut self.graph_ops,
            Owner::Signal => &mut self.signal_ops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_present() {
        let registry = OperatorRegistry::with_builtins();
        assert_eq!(registry.names(Owner::Graph), vec!["silence", "value"]);
        assert!(registry.names(Owner::Signal).is_empty());
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut registry = OperatorRegistry::with_builtins();
        assert_eq!(
            registry.register::<Graph, Silence>("value"),
            Err(RegistryError::DuplicateOperator {
                owner: Owner::Graph,
                name: "value".to_string()
            })
        );
    }

    #[test]
    fn same_name_on_other_owner_succeeds() {
        let mut registry = OperatorRegistry::with_builtins();
        assert!(registry.register::<SignalRef, Value>("value").is_ok());
        assert!(registry.contains(Owner::Signal, "value"));
        assert!(registry.contains(Owner::Graph, "value"));
    }

    #[test]
    fn unsupported_owner_rejected() {
        let mut registry = OperatorRegistry::new();
        let err = registry.register::<String, Silence>("silence").unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedOwner { .. }));
        assert!(!registry.contains(Owner::Graph, "silence"));
        // Concrete node types are not owners either.
        assert!(registry.register::<Value, Silence>("silence").is_err());
    }

    #[test]
    fn owner_of_recognises_only_two_types() {
        assert_eq!(Owner::of::<Graph>(), Some(Owner::Graph));
        assert_eq!(Owner::of::<SignalRef>(), Some(Owner::Signal));
        assert_eq!(Owner::of::<f64>(), None);
    }

    #[test]
    fn shared_default_is_one_table() {
        let a = OperatorRegistry::shared_default();
        let b = OperatorRegistry::shared_default();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.lookup(Owner::Graph, "value").is_some());
    }
}
