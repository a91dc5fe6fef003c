//! Waveform generation
//!
//! Synthesizes mono tone buffers (sine, square, sawtooth, white noise,
//! impulse train) at a given sample rate. Buffers are immutable once
//! generated and share their sample storage, so handing one to a voice
//! never copies audio data.

use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// Bit depth of the PCM encoding of a buffer
pub const PCM_BITS: u16 = 16;

/// Largest buffer `generate` will allocate (about 1 GiB of f32 samples)
pub const MAX_SAMPLES: usize = 1 << 28;

/// Waveform shapes
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    /// Pure tone
    #[default]
    Sine,
    /// +1 for the first half period, -1 for the second
    Square,
    /// Rising ramp from -1 to 1
    Sawtooth,
    /// Uniform random samples, frequency and phase are ignored
    WhiteNoise,
    /// A single full-scale sample at the start of each period
    Impulse,
}

impl Waveform {
    /// Get all waveform types
    pub fn all() -> &'static [Waveform] {
        &[
            Waveform::Sine,
            Waveform::Square,
            Waveform::Sawtooth,
            Waveform::WhiteNoise,
            Waveform::Impulse,
        ]
    }

    /// Get the name of this waveform
    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sine => "Sine",
            Waveform::Square => "Square",
            Waveform::Sawtooth => "Sawtooth",
            Waveform::WhiteNoise => "White Noise",
            Waveform::Impulse => "Impulse",
        }
    }

    /// Sample the waveform at phase (0.0 to 1.0)
    /// Returns value in range -1.0 to 1.0
    pub fn sample(&self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * TAU).sin(),

            Waveform::Square => {
                if phase < 0.5 { 1.0 } else { -1.0 }
            }

            Waveform::Sawtooth => 2.0 * phase - 1.0,

            Waveform::WhiteNoise => rand::thread_rng().gen_range(-1.0..=1.0),

            Waveform::Impulse => {
                if phase == 0.0 { 1.0 } else { 0.0 }
            }
        }
    }
}

/// Immutable block of generated mono samples
///
/// Cloning is cheap: clones share the same sample storage.
#[derive(Clone, Debug)]
pub struct WaveformBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
    shape: Waveform,
    frequency: f32,
    phase: f32,
}

impl WaveformBuffer {
    /// Generate a waveform buffer
    ///
    /// # Arguments
    /// * `shape` - Waveform shape
    /// * `frequency` - Tone frequency in Hz, must be > 0
    /// * `phase` - Starting phase in degrees (0 = start of period)
    /// * `duration` - Length in seconds, must be > 0
    /// * `sample_rate` - Output sample rate in Hz
    ///
    /// The buffer holds `round(duration * sample_rate)` samples.
    pub fn generate(
        shape: Waveform,
        frequency: f32,
        phase: f32,
        duration: f32,
        sample_rate: u32,
    ) -> Result<Self, AudioError> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(AudioError::InvalidValue(format!(
                "frequency must be > 0 Hz, got {}",
                frequency
            )));
        }
        if !duration.is_finite() || duration <= 0.0 {
            return Err(AudioError::InvalidValue(format!(
                "duration must be > 0 s, got {}",
                duration
            )));
        }
        if !phase.is_finite() {
            return Err(AudioError::InvalidValue(format!("phase must be finite, got {}", phase)));
        }
        if sample_rate == 0 {
            return Err(AudioError::InvalidValue("sample rate must be > 0".to_string()));
        }

        let exact = duration as f64 * sample_rate as f64;
        if exact.round() > MAX_SAMPLES as f64 {
            return Err(AudioError::InvalidValue(format!(
                "duration {}s needs more than {} samples at {}Hz",
                duration, MAX_SAMPLES, sample_rate
            )));
        }

        let len = sample_count(duration, sample_rate);
        if len == 0 {
            return Err(AudioError::InvalidValue(format!(
                "duration {}s is shorter than one sample at {}Hz",
                duration, sample_rate
            )));
        }

        // Accumulate in f64 so long buffers don't drift
        let offset = (phase as f64 / 360.0).rem_euclid(1.0);
        let step = frequency as f64 / sample_rate as f64;

        let mut samples = Vec::new();
        samples.try_reserve_exact(len).map_err(|e| {
            AudioError::InvalidValue(format!("cannot allocate {} samples: {}", len, e))
        })?;
        let mut rng = rand::thread_rng();
        let mut last_period = f64::NEG_INFINITY;

        for i in 0..len {
            let position = offset + i as f64 * step;
            let period = position.floor();
            let p = (position - period) as f32;

            let value = match shape {
                Waveform::WhiteNoise => rng.gen_range(-1.0..=1.0),
                // Fires on the first sample of each new period. A starting
                // phase mid-period skips the impulse of that partial period.
                Waveform::Impulse => {
                    let fired = if i == 0 { offset == 0.0 } else { period > last_period };
                    if fired { 1.0 } else { 0.0 }
                }
                _ => shape.sample(p),
            };
            last_period = period;
            samples.push(value);
        }

        log::debug!(
            "Generated {} buffer: {}Hz, {}°, {}s ({} samples at {}Hz)",
            shape.name(),
            frequency,
            phase,
            duration,
            len,
            sample_rate
        );

        Ok(Self {
            samples: samples.into(),
            sample_rate,
            shape,
            frequency,
            phase,
        })
    }

    /// Number of samples (frames, the buffer is mono)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        1
    }

    pub fn bits(&self) -> u16 {
        PCM_BITS
    }

    /// Size of the PCM encoding in bytes
    pub fn size_bytes(&self) -> usize {
        self.len() * (PCM_BITS as usize / 8)
    }

    pub fn shape(&self) -> Waveform {
        self.shape
    }

    /// Tone frequency in Hz
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Starting phase in degrees
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Playback length at the buffer's sample rate
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.len() as f64 / self.sample_rate as f64)
    }

    /// Encode as signed 16-bit PCM
    pub fn to_pcm16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
            .collect()
    }

    /// Are two handles sharing the same sample storage?
    pub fn shares_samples(&self, other: &WaveformBuffer) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }
}

/// Decode signed 16-bit PCM into f32 samples
pub fn decode_pcm16(pcm: &[i16]) -> Vec<f32> {
    pcm.iter().map(|&s| s as f32 / i16::MAX as f32).collect()
}

/// Number of samples covering `duration` seconds at `sample_rate`
pub fn sample_count(duration: f32, sample_rate: u32) -> usize {
    (duration as f64 * sample_rate as f64).round() as usize
}
