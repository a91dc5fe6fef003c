//! Output devices - handles cpal audio output
//!
//! `OutputDevice` is the seam between the audio subsystem and the host
//! audio API. `CpalDevice` drives the system's default output through cpal.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::voice::Mixer;
use crate::error::AudioError;

/// An audio output that pulls samples from a `Mixer`
///
/// Not `Send`: a cpal stream must stay on the thread that built it on
/// some hosts.
pub trait OutputDevice {
    /// Human readable device name
    fn name(&self) -> &str;

    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Number of interleaved output channels
    fn channels(&self) -> u16;

    /// Start pulling audio from the mixer
    fn start(&mut self, mixer: Mixer) -> Result<(), AudioError>;

    /// Stop output and release the device
    fn close(&mut self);
}

/// The default output device of the default cpal host
pub struct CpalDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    name: String,

    /// The audio output stream (kept alive to continue playback)
    stream: Option<cpal::Stream>,
}

impl CpalDevice {
    /// Open the default output device with its default configuration
    pub fn open_default() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        log::info!("Audio host: {:?}", host.id());

        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::Initialization("No output device found".to_string()))?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using output device: {}", name);

        let config = device.default_output_config().map_err(|e| {
            AudioError::Initialization(format!("Error getting config: {}", e))
        })?;
        log::info!("Audio config: {:?}", config);

        Ok(Self {
            device,
            config,
            name,
            stream: None,
        })
    }

    fn build_stream(&self, mixer: Mixer) -> Result<cpal::Stream, AudioError> {
        let channels = self.config.channels() as usize;
        let stream_config: cpal::StreamConfig = self.config.clone().into();

        let sample_format = self.config.sample_format();
        log::info!("Sample format: {:?}", sample_format);

        let stream_result = match sample_format {
            cpal::SampleFormat::F32 => self.device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    mixer.render(data, channels);
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            ),
            cpal::SampleFormat::I16 => self.device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    mixer.render(data, channels);
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            ),
            cpal::SampleFormat::U16 => self.device.build_output_stream(
                &stream_config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    mixer.render(data, channels);
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            ),
            format => {
                return Err(AudioError::UnsupportedFormat(format!("{:?}", format)));
            }
        };

        stream_result.map_err(|e| AudioError::Stream(format!("Error building stream: {}", e)))
    }
}

impl OutputDevice for CpalDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    fn channels(&self) -> u16 {
        self.config.channels()
    }

    fn start(&mut self, mixer: Mixer) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Ok(()); // Already running
        }

        let stream = self.build_stream(mixer)?;
        stream
            .play()
            .map_err(|e| AudioError::Stream(format!("Error starting stream: {}", e)))?;

        self.stream = Some(stream);
        log::info!("Audio stream started");
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("Failed to pause stream on close: {}", e);
            }
            log::info!("Audio stream closed");
        }
    }
}
