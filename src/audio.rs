//! Rendered audio and WAV persistence.

use std::fmt;
use std::path::{Path, PathBuf};

/// Errors from reading or writing audio files.
#[derive(Debug)]
pub enum AudioError {
    /// The file name does not end in `.wav`.
    NotWav(PathBuf),
    /// Encoding or I/O failure in the WAV layer.
    Wav(hound::Error),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::NotWav(path) => write!(f, "not a .wav file: {}", path.display()),
            AudioError::Wav(err) => write!(f, "wav error: {err}"),
        }
    }
}

impl std::error::Error for AudioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AudioError::Wav(err) => Some(err),
            AudioError::NotWav(_) => None,
        }
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        AudioError::Wav(err)
    }
}

/// A finite block of samples plus the rate they play at.
///
/// Multi-channel audio is interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct Audio {
    /// Playback rate in samples per second.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Sample data, nominally in `[-1, 1]`.
    pub samples: Vec<f64>,
}

impl Audio {
    /// Single-channel audio.
    pub fn mono(sample_rate: u32, samples: Vec<f64>) -> Self {
        Self {
            sample_rate,
            channels: 1,
            samples,
        }
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Playback length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Write the samples as 32-bit float WAV. The path must end in `.wav`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AudioError> {
        let path = path.as_ref();
        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if !is_wav {
            return Err(AudioError::NotWav(path.to_path_buf()));
        }

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample as f32)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Read a WAV file.
    ///
    /// Float files are taken as is. Integer files are scaled by the largest
    /// absolute sample so the loudest sample lands on ±1.0.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AudioError> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map(f64::from))
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let raw = reader
                    .samples::<i32>()
                    .collect::<Result<Vec<_>, _>>()?;
                normalize(&raw)
            }
        };
        Ok(Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

fn normalize(raw: &[i32]) -> Vec<f64> {
    let peak = raw
        .iter()
        .map(|&s| (s as f64).abs())
        .fold(0.0_f64, f64::max);
    if peak == 0.0 {
        return vec![0.0; raw.len()];
    }
    raw.iter().map(|&s| s as f64 / peak).collect()
}
