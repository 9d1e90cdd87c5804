//! Registers a sine oscillator and a gain stage, then renders a short tone.

use std::f64::consts::TAU;
use std::sync::Arc;
use synthgraph::{
    Arg, Frame, Graph, GraphConfig, GraphError, Operator, OperatorRegistry, Signal, SignalRef,
};

struct Sine {
    freq: Option<SignalRef>,
    phase: f64,
    sample_rate: f64,
    output: Frame,
}

impl Operator for Sine {
    fn new(config: GraphConfig) -> Self {
        Self {
            freq: None,
            phase: 0.0,
            sample_rate: config.sample_rate as f64,
            output: Frame::new(config),
        }
    }
}

impl Signal for Sine {
    fn init(&mut self, graph: &Graph, args: &[Arg]) -> Result<(), GraphError> {
        let [freq] = args else {
            return Err(GraphError::InvalidArguments {
                operator: "sine",
                reason: "expected a frequency".to_string(),
            });
        };
        self.freq = Some(graph.wrap(freq.clone())?);
        Ok(())
    }

    fn process(&mut self) {
        let Some(freq) = &self.freq else { return };
        let freq = freq.output();
        for (out, f) in self.output.iter_mut().zip(freq.iter()) {
            *out = self.phase.sin();
            self.phase = (self.phase + TAU * f / self.sample_rate) % TAU;
        }
    }

    fn output(&self) -> &[f64] {
        &self.output
    }

    fn inputs(&self) -> Vec<SignalRef> {
        self.freq.iter().cloned().collect()
    }
}

struct Gain {
    source: Option<SignalRef>,
    amount: f64,
    output: Frame,
}

impl Operator for Gain {
    fn new(config: GraphConfig) -> Self {
        Self {
            source: None,
            amount: 1.0,
            output: Frame::new(config),
        }
    }
}

impl Signal for Gain {
    fn init(&mut self, _graph: &Graph, args: &[Arg]) -> Result<(), GraphError> {
        let parsed = match args {
            [source, amount] => source.as_signal().zip(amount.as_number()),
            _ => None,
        };
        let Some((source, amount)) = parsed else {
            return Err(GraphError::InvalidArguments {
                operator: "gain",
                reason: "expected a source and a numeric amount".to_string(),
            });
        };
        self.source = Some(source.clone());
        self.amount = amount;
        Ok(())
    }

    fn process(&mut self) {
        if let Some(source) = &self.source {
            for (out, s) in self.output.iter_mut().zip(source.output().iter()) {
                *out = s * self.amount;
            }
        }
    }

    fn output(&self) -> &[f64] {
        &self.output
    }

    fn inputs(&self) -> Vec<SignalRef> {
        self.source.iter().cloned().collect()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut registry = OperatorRegistry::with_builtins();
    registry.register::<Graph, Sine>("sine")?;
    registry.register::<SignalRef, Gain>("gain")?;

    let graph = Graph::with_registry(GraphConfig::new(44_100, 256)?, Arc::new(registry))?;
    let tone = graph
        .call("sine", &[Arg::from(440.0)])?
        .call("gain", &[Arg::from(0.3)])?;
    graph.finalize()?;

    let audio = graph.render(&tone, 2.0)?;
    let peak = audio.samples.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
    println!("{} steps, {} samples, peak {peak:.3}", graph.len(), audio.samples.len());

    let path = std::env::temp_dir().join("synthgraph_sine.wav");
    audio.save(&path)?;
    println!("wrote {}", path.display());
    Ok(())
}
