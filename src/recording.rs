use std::path::Path;

use thiserror::Error;

use crate::decode::{self, DecodeError};
use crate::REF_PRESSURE;

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Channel length mismatch: {0}")]
    MismatchedChannels(String),
    #[error("Recording has no channels")]
    NoChannels,
    #[error("Cannot calibrate a silent waveform")]
    SilentWaveform,
    #[error("Invalid sample rate: {0}")]
    InvalidRate(u32),
    #[error("Calibration target count mismatch: {got} targets for {channels} channels")]
    TargetCount { got: usize, channels: usize },
}

/// One channel of a recording.
#[derive(Debug, Clone)]
pub struct Channel {
    pub label: String,
    pub samples: Vec<f64>,
}

/// An in-memory multi-channel waveform. Immutable once constructed;
/// `rescale`/`resample` return a new Recording with the same identity.
#[derive(Debug, Clone)]
pub struct Recording {
    pub id: String,
    pub sample_rate: u32,
    pub channels: Vec<Channel>,
    /// Target playback level (dB) this waveform was rescaled to, if any.
    pub calibration_level: Option<f64>,
}

impl Recording {
    /// Build a recording from labelled channels, enforcing the invariants:
    /// at least one channel, all channels the same length, positive rate.
    pub fn new(
        id: impl Into<String>,
        sample_rate: u32,
        channels: Vec<Channel>,
    ) -> Result<Self, RecordingError> {
        if sample_rate == 0 {
            return Err(RecordingError::InvalidRate(0));
        }
        if channels.is_empty() {
            return Err(RecordingError::NoChannels);
        }
        let len = channels[0].samples.len();
        for ch in &channels[1..] {
            if ch.samples.len() != len {
                return Err(RecordingError::MismatchedChannels(format!(
                    "'{}' has {} samples, expected {}",
                    ch.label,
                    ch.samples.len(),
                    len
                )));
            }
        }
        Ok(Self {
            id: id.into(),
            sample_rate,
            channels,
            calibration_level: None,
        })
    }

    /// Build a recording from raw per-channel sample buffers, labelled ch0, ch1, ...
    pub fn from_samples(
        id: impl Into<String>,
        sample_rate: u32,
        samples: Vec<Vec<f64>>,
    ) -> Result<Self, RecordingError> {
        let channels = samples
            .into_iter()
            .enumerate()
            .map(|(i, s)| Channel {
                label: format!("ch{i}"),
                samples: s,
            })
            .collect();
        Self::new(id, sample_rate, channels)
    }

    /// Load a recording from a file path. The recording id is the file stem.
    pub fn load(path: &Path) -> Result<Self, RecordingError> {
        let decoded = decode::decode_file(path)?;
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("recording")
            .to_string();
        log::debug!(
            "Loaded '{}': {} channels, {} Hz, {:.2}s",
            id,
            decoded.channels.len(),
            decoded.sample_rate,
            decoded.channels.first().map(|c| c.len()).unwrap_or(0) as f64
                / decoded.sample_rate as f64
        );
        Self::from_samples(id, decoded.sample_rate, decoded.channels)
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.channels[0].samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn channel_labels(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.label.clone()).collect()
    }

    /// Rescale every channel to the same target level (dB re 20 µPa).
    pub fn rescale(&self, target_level: f64) -> Result<Self, RecordingError> {
        let targets = vec![target_level; self.channels.len()];
        let mut out = self.rescale_channels(&targets)?;
        out.calibration_level = Some(target_level);
        Ok(out)
    }

    /// Rescale each channel to its own target level, in channel order.
    /// Fails hard if any channel is silent, since the gain is undefined.
    pub fn rescale_channels(&self, targets: &[f64]) -> Result<Self, RecordingError> {
        if targets.len() != self.channels.len() {
            return Err(RecordingError::TargetCount {
                got: targets.len(),
                channels: self.channels.len(),
            });
        }

        let mut channels = Vec::with_capacity(self.channels.len());
        for (ch, &target) in self.channels.iter().zip(targets) {
            let current = leq_db(&ch.samples);
            if !current.is_finite() {
                return Err(RecordingError::SilentWaveform);
            }
            let gain = 10f64.powf((target - current) / 20.0);
            channels.push(Channel {
                label: ch.label.clone(),
                samples: ch.samples.iter().map(|s| s * gain).collect(),
            });
        }

        let mean_target = targets.iter().sum::<f64>() / targets.len() as f64;
        Ok(Self {
            id: self.id.clone(),
            sample_rate: self.sample_rate,
            channels,
            calibration_level: Some(mean_target),
        })
    }

    /// Resample to a new rate by linear interpolation. Good enough for the
    /// frame-energy metrics downstream; not a brick-wall resampler.
    pub fn resample(&self, target_rate: u32) -> Result<Self, RecordingError> {
        if target_rate == 0 {
            return Err(RecordingError::InvalidRate(0));
        }
        if target_rate == self.sample_rate {
            return Ok(self.clone());
        }

        let ratio = self.sample_rate as f64 / target_rate as f64;
        let new_len = (self.len() as f64 / ratio).round() as usize;

        let channels = self
            .channels
            .iter()
            .map(|ch| {
                let mut samples = Vec::with_capacity(new_len);
                for i in 0..new_len {
                    let pos = i as f64 * ratio;
                    let lo = pos.floor() as usize;
                    let frac = pos - lo as f64;
                    let a = *ch.samples.get(lo).unwrap_or(&0.0);
                    let b = *ch.samples.get(lo + 1).unwrap_or(&a);
                    samples.push(a + frac * (b - a));
                }
                Channel {
                    label: ch.label.clone(),
                    samples,
                }
            })
            .collect();

        Ok(Self {
            id: self.id.clone(),
            sample_rate: target_rate,
            channels,
            calibration_level: self.calibration_level,
        })
    }
}

/// Equivalent continuous level of a waveform in dB re 20 µPa.
/// Returns -inf for a silent (all-zero) waveform.
pub fn leq_db(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NEG_INFINITY;
    }
    let mean_square = samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64;
    10.0 * (mean_square / (REF_PRESSURE * REF_PRESSURE)).log10()
}
