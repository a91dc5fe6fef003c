//! Audio subsystem - device, output stream and voices
//!
//! The subsystem must exist before any voice or buffer can be created,
//! and releases the device exactly once: either through `teardown` or,
//! on any early return or panic unwind, when it is dropped.

use std::time::Duration;

use super::device::{CpalDevice, OutputDevice};
use super::voice::{Mixer, Voice};
use super::waveform::{Waveform, WaveformBuffer};
use crate::error::AudioError;

/// Playback context owning an output device
pub struct AudioSubsystem<D: OutputDevice = CpalDevice> {
    device: D,
    mixer: Mixer,
    torn_down: bool,
}

impl AudioSubsystem<CpalDevice> {
    /// Open the default output device and start its stream
    pub fn init() -> Result<Self, AudioError> {
        log::info!("Initializing audio subsystem...");
        let device = CpalDevice::open_default()?;
        Self::with_device(device)
    }
}

impl<D: OutputDevice> AudioSubsystem<D> {
    /// Build a subsystem around an already opened device
    pub fn with_device(mut device: D) -> Result<Self, AudioError> {
        let mixer = Mixer::new();

        if let Err(e) = device.start(mixer.clone()) {
            log::error!("Failed to start output device {}: {}", device.name(), e);
            device.close();
            return Err(match e {
                AudioError::Initialization(_) => e,
                other => AudioError::Initialization(other.to_string()),
            });
        }

        log::info!(
            "Audio subsystem ready: {} ({}Hz, {} channels)",
            device.name(),
            device.sample_rate(),
            device.channels()
        );

        Ok(Self {
            device,
            mixer,
            torn_down: false,
        })
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    pub fn sample_rate(&self) -> u32 {
        self.device.sample_rate()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn voice_count(&self) -> usize {
        self.mixer.voice_count()
    }

    /// Create a new voice rendered by this subsystem
    pub fn create_voice(&self) -> Result<Voice, AudioError> {
        let voice = self.mixer.create_voice()?;
        log::info!("Created voice {}", voice.id());
        Ok(voice)
    }

    /// Generate a waveform buffer at the device's sample rate
    ///
    /// `phase` is in degrees.
    pub fn generate_waveform(
        &self,
        shape: Waveform,
        frequency: f32,
        phase: f32,
        duration: f32,
    ) -> Result<WaveformBuffer, AudioError> {
        WaveformBuffer::generate(shape, frequency, phase, duration, self.sample_rate())
    }

    /// Block the calling thread for `duration`
    ///
    /// Playback continues on the audio thread meanwhile.
    pub fn sleep(&self, duration: Duration) {
        log::debug!("Sleeping {:?}", duration);
        std::thread::sleep(duration);
    }

    /// Release the device and every voice
    pub fn teardown(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.mixer.release_all();
        self.device.close();
        log::info!("Audio subsystem torn down");
    }
}

impl<D: OutputDevice> Drop for AudioSubsystem<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
