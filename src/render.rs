//! Offline rendering: run the step list frame by frame into one buffer.

use crate::audio::Audio;
use crate::graph::{Graph, GraphError};
use crate::node::SignalRef;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

/// Timing statistics of one profiled render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderProfile {
    /// Number of `run_frame` calls.
    pub frames: usize,
    /// Audio time covered by one frame.
    pub frame_budget: Duration,
    /// Mean time spent per frame.
    pub average: Duration,
    /// Fastest frame.
    pub min: Duration,
    /// Slowest frame.
    pub max: Duration,
}

impl RenderProfile {
    fn from_timings(frame_budget: Duration, timings: &[Duration]) -> Self {
        let frames = timings.len();
        let total: u128 = timings.iter().map(Duration::as_nanos).sum();
        let average = match frames {
            0 => Duration::ZERO,
            n => Duration::from_nanos((total / n as u128) as u64),
        };
        Self {
            frames,
            frame_budget,
            average,
            min: timings.iter().copied().min().unwrap_or_default(),
            max: timings.iter().copied().max().unwrap_or_default(),
        }
    }

    /// `elapsed` as a percentage of the per-frame budget.
    pub fn percent_of_budget(&self, elapsed: Duration) -> f64 {
        elapsed.as_secs_f64() / self.frame_budget.as_secs_f64() * 100.0
    }

    /// [`RenderProfile::average`] against the budget.
    pub fn average_percent(&self) -> f64 {
        self.percent_of_budget(self.average)
    }

    /// [`RenderProfile::min`] against the budget.
    pub fn min_percent(&self) -> f64 {
        self.percent_of_budget(self.min)
    }

    /// [`RenderProfile::max`] against the budget.
    pub fn max_percent(&self) -> f64 {
        self.percent_of_budget(self.max)
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for RenderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} runs of {:.2}ms sample duration each.",
            self.frames,
            ms(self.frame_budget)
        )?;
        writeln!(
            f,
            "Processing duration {:.2}ms avg, {:.2}ms max, {:.2}ms min.",
            ms(self.average),
            ms(self.max),
            ms(self.min)
        )?;
        write!(
            f,
            "Processing duration {:.2}% avg, {:.2}% max, {:.2}% min of sample duration.",
            self.average_percent(),
            self.max_percent(),
            self.min_percent()
        )
    }
}

/// Largest sample count a single `Vec<f64>` can hold.
const MAX_SAMPLES: usize = isize::MAX as usize / std::mem::size_of::<f64>();

fn check_duration(duration_s: f64) -> Result<(), GraphError> {
    if duration_s.is_finite() && duration_s >= 0.0 {
        Ok(())
    } else {
        Err(GraphError::InvalidDuration(duration_s))
    }
}

/// Convert a non-negative float count to `usize`, rejecting values past `MAX_SAMPLES`.
fn to_count(count: f64, duration_s: f64) -> Result<usize, GraphError> {
    if count > MAX_SAMPLES as f64 {
        return Err(GraphError::InvalidDuration(duration_s));
    }
    Ok(count as usize)
}

impl Graph {
    /// Frames needed to cover `duration_s`, plus one so a duration that does
    /// not land on a frame boundary is still fully rendered.
    pub fn frame_count(&self, duration_s: f64) -> Result<usize, GraphError> {
        check_duration(duration_s)?;
        let frames = (duration_s * self.sample_rate() as f64 / self.frame_size() as f64).ceil();
        to_count(frames, duration_s)?
            .checked_add(1)
            .ok_or(GraphError::InvalidDuration(duration_s))
    }

    /// Samples in the rendered output for `duration_s`.
    pub fn output_len(&self, duration_s: f64) -> Result<usize, GraphError> {
        check_duration(duration_s)?;
        to_count((duration_s * self.sample_rate() as f64).round(), duration_s)
    }

    /// Total samples computed while rendering `duration_s`.
    fn buffer_len(&self, duration_s: f64) -> Result<usize, GraphError> {
        self.frame_count(duration_s)?
            .checked_mul(self.frame_size())
            .filter(|&len| len <= MAX_SAMPLES)
            .ok_or(GraphError::InvalidDuration(duration_s))
    }

    /// Render `target` for `duration_s` seconds.
    pub fn render(&self, target: &SignalRef, duration_s: f64) -> Result<Audio, GraphError> {
        self.render_frames(target, duration_s, None)
    }

    /// Render like [`Graph::render`], timing every `run_frame` call.
    ///
    /// The profile is also emitted as an `info` event.
    pub fn render_profiled(
        &self,
        target: &SignalRef,
        duration_s: f64,
    ) -> Result<(Audio, RenderProfile), GraphError> {
        let mut timings = Vec::new();
        let audio = self.render_frames(target, duration_s, Some(&mut timings))?;
        let profile = RenderProfile::from_timings(self.config().frame_duration(), &timings);
        info!(
            frames = profile.frames,
            budget_ms = ms(profile.frame_budget),
            avg_ms = ms(profile.average),
            max_ms = ms(profile.max),
            min_ms = ms(profile.min),
            avg_pct = profile.average_percent(),
            max_pct = profile.max_percent(),
            min_pct = profile.min_percent(),
            "render profile"
        );
        Ok((audio, profile))
    }

    fn render_frames(
        &self,
        target: &SignalRef,
        duration_s: f64,
        mut timings: Option<&mut Vec<Duration>>,
    ) -> Result<Audio, GraphError> {
        let buffer_len = self.buffer_len(duration_s)?;
        let output_len = self.output_len(duration_s)?;
        if !self.owns(target) {
            return Err(GraphError::ForeignSignal);
        }
        let frame_size = self.frame_size();
        let actual = target.output().len();
        if actual != frame_size {
            return Err(GraphError::OutputShape {
                expected: frame_size,
                actual,
            });
        }

        let mut output = vec![0.0; buffer_len];
        for chunk in output.chunks_exact_mut(frame_size) {
            let start = timings.is_some().then(Instant::now);
            self.run_frame();
            if let (Some(timings), Some(start)) = (timings.as_deref_mut(), start) {
                timings.push(start.elapsed());
            }
            chunk.copy_from_slice(&target.output());
        }

        output.truncate(output_len);
        Ok(Audio::mono(self.sample_rate(), output))
    }
}
