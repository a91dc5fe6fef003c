//! Audio module - handles audio output and tone buffers
//!
//! This module provides:
//! - Waveform generation into immutable buffers
//! - Voices and the mixer that renders them
//! - The audio subsystem owning the output device

mod device;
#[cfg(test)]
pub mod mock;
mod subsystem;
mod voice;
mod waveform;

// Re-export public types
pub use device::{CpalDevice, OutputDevice};
pub use subsystem::AudioSubsystem;
pub use voice::{Mixer, Voice, VoiceState};
pub use waveform::{decode_pcm16, sample_count, Waveform, WaveformBuffer, MAX_SAMPLES, PCM_BITS};
