//! Tone playback run
//!
//! Opens the audio subsystem, plays one generated buffer on one voice,
//! waits out its duration and tears everything down again. Teardown
//! happens on every path once the subsystem exists.

use std::time::{Duration, Instant};

use crate::audio::{AudioSubsystem, OutputDevice, Waveform};
use crate::error::{AudioError, ToneError};

/// Lifecycle stages of a run, in order
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stage {
    Uninitialized,
    Initialized,
    PlaybackStarted,
    TornDown,
}

/// What to play
#[derive(Clone, Debug, PartialEq)]
pub struct ToneRequest {
    pub shape: Waveform,
    /// Hz
    pub frequency: f32,
    /// Degrees
    pub phase: f32,
    /// Seconds
    pub duration: f32,
    pub gain: f32,
    pub looping: bool,
}

impl Default for ToneRequest {
    fn default() -> Self {
        Self {
            shape: Waveform::Sine,
            frequency: 440.0, // A4
            phase: 0.0,
            duration: 3.0,
            gain: 1.0,
            looping: false,
        }
    }
}

impl ToneRequest {
    /// How long the run blocks after starting playback
    pub fn wait_duration(&self) -> Result<Duration, AudioError> {
        Duration::try_from_secs_f32(self.duration)
            .map_err(|e| AudioError::InvalidValue(format!("duration {}: {}", self.duration, e)))
    }
}

/// Outcome of a successful run
#[derive(Clone, Debug)]
pub struct ToneReport {
    /// Stages passed through, starting at `Uninitialized`
    pub stages: Vec<Stage>,
    pub device: String,
    /// Length of the generated buffer in samples
    pub samples: usize,
    pub sample_rate: u32,
    /// Measured wall-clock wait
    pub waited: Duration,
}

/// Play one tone from start to finish
///
/// `open` creates the audio subsystem. If it fails nothing else happens and
/// `ToneError::Initialization` is returned. Any later failure is returned
/// as `ToneError::Playback` after the subsystem has been torn down.
pub fn play_tone<D, F>(open: F, request: &ToneRequest) -> Result<ToneReport, ToneError>
where
    D: OutputDevice,
    F: FnOnce() -> Result<AudioSubsystem<D>, AudioError>,
{
    let mut stages = vec![Stage::Uninitialized];

    let audio = open().map_err(ToneError::Initialization)?;
    stages.push(Stage::Initialized);

    let device = audio.device_name().to_string();
    let sample_rate = audio.sample_rate();
    let result = run(&audio, request, &mut stages);

    audio.teardown();
    stages.push(Stage::TornDown);

    let (samples, waited) = result?;
    Ok(ToneReport {
        stages,
        device,
        samples,
        sample_rate,
        waited,
    })
}

fn run<D: OutputDevice>(
    audio: &AudioSubsystem<D>,
    request: &ToneRequest,
    stages: &mut Vec<Stage>,
) -> Result<(usize, Duration), AudioError> {
    let voice = audio.create_voice()?;

    let buffer = audio.generate_waveform(
        request.shape,
        request.frequency,
        request.phase,
        request.duration,
    )?;
    voice.attach(&buffer)?;
    voice.set_gain(request.gain)?;
    voice.set_looping(request.looping);

    let wait = request.wait_duration()?;

    voice.play()?;
    stages.push(Stage::PlaybackStarted);
    log::info!(
        "Playing {} {}Hz for {:.2}s on {}",
        request.shape.name(),
        request.frequency,
        request.duration,
        audio.device_name()
    );

    // Fixed wait for the buffer length, no completion event
    let started = Instant::now();
    audio.sleep(wait);
    let waited = started.elapsed();

    Ok((buffer.len(), waited))
}
