use std::sync::Arc;
use synthgraph::{
    Arg, Frame, Graph, GraphConfig, GraphError, Operator, OperatorRegistry, Owner,
    RegistryError, Signal, SignalRef, Value,
};

/// Multiplies a source by an amount, sample by sample.
struct Gain {
    source: Option<SignalRef>,
    amount: Option<SignalRef>,
    output: Frame,
}

impl Operator for Gain {
    fn new(config: GraphConfig) -> Self {
        Self {
            source: None,
            amount: None,
            output: Frame::new(config),
        }
    }
}

impl Signal for Gain {
    fn init(&mut self, graph: &Graph, args: &[Arg]) -> Result<(), GraphError> {
        match args {
            [source, amount] => {
                self.source = Some(graph.wrap(source.clone())?);
                self.amount = Some(graph.wrap(amount.clone())?);
                Ok(())
            }
            _ => Err(GraphError::InvalidArguments {
                operator: "gain",
                reason: format!("expected source and amount, got {} args", args.len()),
            }),
        }
    }

    fn process(&mut self) {
        if let (Some(source), Some(amount)) = (&self.source, &self.amount) {
            let source = source.output();
            let amount = amount.output();
            for ((out, s), a) in self.output.iter_mut().zip(source.iter()).zip(amount.iter()) {
                *out = s * a;
            }
        }
    }

    fn output(&self) -> &[f64] {
        &self.output
    }

    fn inputs(&self) -> Vec<SignalRef> {
        self.source.iter().chain(self.amount.iter()).cloned().collect()
    }
}

/// Sums any number of inputs.
struct Mix {
    sources: Vec<SignalRef>,
    output: Frame,
}

impl Operator for Mix {
    fn new(config: GraphConfig) -> Self {
        Self {
            sources: Vec::new(),
            output: Frame::new(config),
        }
    }
}

impl Signal for Mix {
    fn init(&mut self, graph: &Graph, args: &[Arg]) -> Result<(), GraphError> {
        self.sources = args
            .iter()
            .map(|arg| graph.wrap(arg.clone()))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn process(&mut self) {
        self.output.fill(0.0);
        for source in &self.sources {
            for (out, s) in self.output.iter_mut().zip(source.output().iter()) {
                *out += s;
            }
        }
    }

    fn output(&self) -> &[f64] {
        &self.output
    }

    fn inputs(&self) -> Vec<SignalRef> {
        self.sources.clone()
    }
}

/// Produces no samples at all.
struct Empty;

impl Operator for Empty {
    fn new(_config: GraphConfig) -> Self {
        Empty
    }
}

impl Signal for Empty {
    fn output(&self) -> &[f64] {
        &[]
    }
}

fn registry() -> Arc<OperatorRegistry> {
    let mut registry = OperatorRegistry::with_builtins();
    registry.register::<SignalRef, Gain>("gain").unwrap();
    registry.register::<Graph, Mix>("mix").unwrap();
    registry.register::<Graph, Empty>("empty").unwrap();
    Arc::new(registry)
}

fn graph() -> Graph {
    Graph::with_registry(GraphConfig::new(8000, 64).unwrap(), registry()).unwrap()
}

#[test]
fn chained_operator_receives_source_first() {
    let graph = graph();
    let source = graph.value(0.5).unwrap();
    let louder = source.call("gain", &[Arg::from(4)]).unwrap();

    // source, the wrapped literal 4, then the gain node
    assert_eq!(graph.len(), 3);
    assert!(graph.steps()[2].ptr_eq(&louder));
    let inputs = louder.downcast_ref::<Gain>().unwrap().inputs();
    assert!(inputs[0].ptr_eq(&source));

    graph.run_frame();
    assert!(louder.output().iter().all(|&s| s == 2.0));
}

#[test]
fn graph_operator_gets_only_caller_args() {
    let graph = graph();
    let a = graph.value(1.0).unwrap();
    let mix = graph.call("mix", &[Arg::from(&a), Arg::from(0.25)]).unwrap();
    assert_eq!(mix.downcast_ref::<Mix>().unwrap().sources.len(), 2);
    let audio = graph.render(&mix, 0.02).unwrap();
    assert_eq!(audio.samples.len(), 160);
    assert!(audio.samples.iter().all(|&s| s == 1.25));
}

#[test]
fn operators_are_scoped_to_their_owner() {
    let graph = graph();
    let a = graph.value(1.0).unwrap();
    assert_eq!(
        graph.call("gain", &[Arg::from(&a), Arg::from(2)]),
        Err(GraphError::UnknownOperator {
            owner: Owner::Graph,
            name: "gain".to_string()
        })
    );
    assert!(matches!(
        a.call("mix", &[]),
        Err(GraphError::UnknownOperator {
            owner: Owner::Signal,
            ..
        })
    ));
}

#[test]
fn default_registry_has_no_custom_operators() {
    let graph = Graph::new(8000, 64).unwrap();
    let a = graph.value(1.0).unwrap();
    assert!(a.call("gain", &[Arg::from(2)]).is_err());
}

#[test]
fn bad_argument_aborts_whole_call() {
    let graph = graph();
    let a = graph.value(1.0).unwrap();
    let err = a.call("gain", &[Arg::from("loud")]).unwrap_err();
    assert!(matches!(err, GraphError::UnsupportedCoercion(_)));
    // Nothing past the source was registered.
    assert_eq!(graph.len(), 1);
}

#[test]
fn registration_errors() {
    let mut registry = OperatorRegistry::with_builtins();
    registry.register::<SignalRef, Gain>("gain").unwrap();
    assert_eq!(
        registry.register::<SignalRef, Mix>("gain"),
        Err(RegistryError::DuplicateOperator {
            owner: Owner::Signal,
            name: "gain".to_string()
        })
    );
    // Same name, previously unused owner.
    assert!(registry.register::<Graph, Gain>("gain").is_ok());
    assert!(matches!(
        registry.register::<Vec<f64>, Gain>("gain"),
        Err(RegistryError::UnsupportedOwner { .. })
    ));
}

#[test]
fn chain_of_chains_renders() {
    let graph = graph();
    let base = graph.value(1.0).unwrap();
    let out = base
        .call("gain", &[Arg::from(0.5)])
        .and_then(|g| g.call("gain", &[Arg::from(0.5)]))
        .and_then(|g| g.call("gain", &[Arg::from(2)]))
        .unwrap();
    let audio = graph.render(&out, 0.1).unwrap();
    assert_eq!(audio.samples.len(), 800);
    assert!(audio.samples.iter().all(|&s| s == 0.5));
}

#[test]
fn finalize_keeps_valid_order() {
    let graph = graph();
    let a = graph.value(1.0).unwrap();
    let g = a.call("gain", &[Arg::from(3)]).unwrap();
    let before = graph.steps();
    graph.finalize().unwrap();
    let after = graph.steps();
    assert_eq!(before, after);
    graph.run_frame();
    assert_eq!(g.output()[0], 3.0);
}

#[test]
fn finalize_moves_consumer_after_producer() {
    let graph = graph();
    let level = graph.value(2.0).unwrap();
    let mix = graph.call("mix", &[Arg::from(&level)]).unwrap();
    // Rewire the mix to also read from a node created after it.
    let late = graph.value(7.0).unwrap();
    mix.downcast_mut::<Mix>().unwrap().sources.push(late.clone());

    graph.finalize().unwrap();
    let order = graph.steps();
    let pos = |s: &SignalRef| order.iter().position(|o| o.ptr_eq(s)).unwrap();
    assert!(pos(&late) < pos(&mix));
    assert!(pos(&level) < pos(&mix));
    assert_eq!(graph.len(), 3);
    graph.run_frame();
    assert_eq!(mix.output()[0], 9.0);
}

#[test]
fn finalize_detects_cycles() {
    let graph = graph();
    let a = graph.call("mix", &[]).unwrap();
    let b = graph.call("mix", &[Arg::from(&a)]).unwrap();
    a.downcast_mut::<Mix>().unwrap().sources.push(b.clone());
    assert_eq!(graph.finalize(), Err(GraphError::CycleDetected));
}

#[test]
fn finalize_rejects_self_input() {
    let graph = graph();
    let level = graph.value(1.0).unwrap();
    let mix = graph.call("mix", &[Arg::from(&level)]).unwrap();
    mix.downcast_mut::<Mix>().unwrap().sources.push(mix.clone());
    assert_eq!(graph.finalize(), Err(GraphError::CycleDetected));
}

#[test]
fn finalize_rejects_inputs_from_another_graph() {
    let other = graph();
    let graph = graph();
    let stranger = other.value(1.0).unwrap();
    let mix = graph.call("mix", &[]).unwrap();
    mix.downcast_mut::<Mix>().unwrap().sources.push(stranger);
    let before = graph.steps();
    assert_eq!(graph.finalize(), Err(GraphError::ForeignSignal));
    assert_eq!(graph.steps(), before);
}

#[test]
fn render_rejects_target_without_a_full_frame() {
    let graph = graph();
    let empty = graph.call("empty", &[]).unwrap();
    assert_eq!(
        graph.render(&empty, 0.1),
        Err(GraphError::OutputShape {
            expected: 64,
            actual: 0
        })
    );
    assert!(matches!(
        graph.render_profiled(&empty, 0.1),
        Err(GraphError::OutputShape { .. })
    ));
}

#[test]
fn value_handle_updates_through_chain() {
    let graph = graph();
    let level = graph.value(1.0).unwrap();
    let out = level.call("gain", &[Arg::from(10)]).unwrap();
    level.downcast_mut::<Value>().unwrap().set(0.1).unwrap();
    graph.run_frame();
    assert!((out.output()[0] - 1.0).abs() < 1e-12);
}
