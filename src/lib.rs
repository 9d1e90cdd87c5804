//! Frame-based signal graph engine.
//!
//! A [`Graph`] owns an ordered list of [`Signal`] nodes ("steps"). Nodes are
//! created through named operators looked up in an [`OperatorRegistry`],
//! either on the graph itself or chained off an existing node. Rendering runs
//! every step once per frame, in registration order, and copies the target
//! node's frame into a continuous [`Audio`] buffer.
//!
//! ```no_run
//! use synthgraph::Graph;
//!
//! let graph = Graph::new(8000, 256)?;
//! let one = graph.value(1.0)?;
//! let audio = graph.render(&one, 1.0)?;
//! assert_eq!(audio.samples.len(), 8000);
//! # Ok::<(), synthgraph::GraphError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audio;
pub mod graph;
pub mod node;
pub mod registry;
pub mod render;
pub mod value;

pub use audio::{Audio, AudioError};
pub use graph::{Graph, GraphError};
pub use node::{Arg, Frame, NodeId, Signal, SignalRef, Silence};
pub use registry::{Operator, OperatorRegistry, Owner, RegistryError};
pub use render::RenderProfile;
pub use value::Value;

use std::time::Duration;

/// Execution parameters shared by a graph and every node it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphConfig {
    /// Samples per second.
    pub sample_rate: u32,
    /// Samples produced by one `run_frame` call.
    pub frame_size: usize,
}

impl GraphConfig {
    /// Create a config, rejecting a zero sample rate or frame size.
    pub fn new(sample_rate: u32, frame_size: usize) -> Result<Self, GraphError> {
        if sample_rate == 0 || frame_size == 0 {
            return Err(GraphError::InvalidConfig {
                sample_rate,
                frame_size,
            });
        }
        Ok(Self {
            sample_rate,
            frame_size,
        })
    }

    /// Wall-clock length of one frame of audio.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_size as f64 / self.sample_rate as f64)
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            frame_size: 256,
        }
    }
}
