//! Playback voices and the mixer that renders them
//!
//! A `Voice` is the control-thread handle; the audio thread sees the
//! same voice through the `Mixer`. Shared state lives in atomics and an
//! `RwLock` that the audio thread only ever `try_read`s, so a contended
//! lock costs a buffer of silence, never a blocked callback.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use cpal::{FromSample, Sample};

use super::waveform::{WaveformBuffer, PCM_BITS};
use crate::error::AudioError;

/// Playback state of a voice
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VoiceState {
    /// Created or rewound, not yet played
    Initial,
    Playing,
    Paused,
    /// Stopped explicitly or reached the end of a non-looping buffer
    Stopped,
}

impl VoiceState {
    fn to_u8(self) -> u8 {
        match self {
            VoiceState::Initial => 0,
            VoiceState::Playing => 1,
            VoiceState::Paused => 2,
            VoiceState::Stopped => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => VoiceState::Playing,
            2 => VoiceState::Paused,
            3 => VoiceState::Stopped,
            _ => VoiceState::Initial,
        }
    }
}

/// f32 stored as bits so it can be shared lock-free
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Voice data shared between the control handle and the audio thread
struct VoiceShared {
    buffer: RwLock<Option<WaveformBuffer>>,
    /// Next sample to render
    cursor: AtomicUsize,
    state: AtomicU8,
    looping: AtomicBool,
    gain: AtomicF32,
    min_gain: AtomicF32,
    max_gain: AtomicF32,
    /// Set once the owning subsystem has been torn down
    released: AtomicBool,
}

impl VoiceShared {
    fn new() -> Self {
        Self {
            buffer: RwLock::new(None),
            cursor: AtomicUsize::new(0),
            state: AtomicU8::new(VoiceState::Initial.to_u8()),
            looping: AtomicBool::new(false),
            gain: AtomicF32::new(1.0),
            min_gain: AtomicF32::new(0.0),
            max_gain: AtomicF32::new(1.0),
            released: AtomicBool::new(false),
        }
    }

    fn state(&self) -> VoiceState {
        VoiceState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: VoiceState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    fn effective_gain(&self) -> f32 {
        let min = self.min_gain.load();
        let max = self.max_gain.load();
        self.gain.load().max(min).min(max)
    }

    /// Add this voice's next `out.len()` samples into `out`
    fn mix_into(&self, out: &mut [f32]) {
        if self.state() != VoiceState::Playing {
            return;
        }

        // Never block the audio thread
        let guard = match self.buffer.try_read() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let Some(buffer) = guard.as_ref() else {
            return;
        };

        let samples = buffer.samples();
        let len = samples.len();
        let gain = self.effective_gain();
        let looping = self.looping.load(Ordering::Relaxed);

        let mut pos = self.cursor.load(Ordering::Relaxed);
        for slot in out.iter_mut() {
            if pos >= len {
                if looping {
                    pos = 0;
                } else {
                    break;
                }
            }
            *slot += samples[pos] * gain;
            pos += 1;
        }

        if pos >= len && !looping {
            // Don't clobber a pause or restart issued meanwhile
            let _ = self.state.compare_exchange(
                VoiceState::Playing.to_u8(),
                VoiceState::Stopped.to_u8(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
        }
        self.cursor.store(if looping { pos % len } else { pos.min(len) }, Ordering::Relaxed);
    }
}

/// Control handle for one playback channel
///
/// Obtained from `AudioSubsystem::create_voice`. Cloning yields another
/// handle to the same voice.
#[derive(Clone)]
pub struct Voice {
    id: usize,
    shared: Arc<VoiceShared>,
}

impl Voice {
    pub fn id(&self) -> usize {
        self.id
    }

    fn ensure_live(&self) -> Result<(), AudioError> {
        if self.shared.released.load(Ordering::Acquire) {
            Err(AudioError::AlreadyTornDown)
        } else {
            Ok(())
        }
    }

    /// Attach a buffer, replacing any previous one
    ///
    /// The voice is rewound to the start of the new buffer.
    pub fn attach(&self, buffer: &WaveformBuffer) -> Result<(), AudioError> {
        self.ensure_live()?;
        self.shared.set_state(VoiceState::Initial);
        let mut slot = self
            .shared
            .buffer
            .write()
            .map_err(|_| AudioError::Stream("voice buffer lock poisoned".to_string()))?;
        *slot = Some(buffer.clone());
        self.shared.cursor.store(0, Ordering::Relaxed);
        log::debug!("Voice {}: attached {} samples", self.id, buffer.len());
        Ok(())
    }

    /// Drop the attached buffer
    pub fn detach(&self) {
        self.shared.set_state(VoiceState::Initial);
        if let Ok(mut slot) = self.shared.buffer.write() {
            *slot = None;
        }
        self.shared.cursor.store(0, Ordering::Relaxed);
    }

    /// The attached buffer, if any
    pub fn buffer(&self) -> Option<WaveformBuffer> {
        self.shared.buffer.read().ok().and_then(|b| b.clone())
    }

    /// Start playback and return immediately
    ///
    /// A paused voice resumes where it left off; otherwise playback
    /// starts from the beginning of the buffer.
    pub fn play(&self) -> Result<(), AudioError> {
        self.ensure_live()?;

        // Holding the write lock keeps the renderer from storing a stale cursor
        let slot = self
            .shared
            .buffer
            .write()
            .map_err(|_| AudioError::Stream("voice buffer lock poisoned".to_string()))?;
        if slot.is_none() {
            return Err(AudioError::NoBuffer);
        }

        if self.shared.state() != VoiceState::Paused {
            self.shared.cursor.store(0, Ordering::Relaxed);
        }
        self.shared.set_state(VoiceState::Playing);
        drop(slot);

        log::info!("Voice {}: playing", self.id);
        Ok(())
    }

    pub fn pause(&self) {
        if self.shared.state() == VoiceState::Playing {
            self.shared.set_state(VoiceState::Paused);
        }
    }

    pub fn stop(&self) {
        self.shared.set_state(VoiceState::Stopped);
    }

    /// Return to the initial state at the start of the buffer
    pub fn rewind(&self) {
        self.shared.set_state(VoiceState::Initial);
        self.shared.cursor.store(0, Ordering::Relaxed);
    }

    pub fn state(&self) -> VoiceState {
        self.shared.state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == VoiceState::Playing
    }

    pub fn set_looping(&self, looping: bool) {
        self.shared.looping.store(looping, Ordering::Relaxed);
    }

    pub fn is_looping(&self) -> bool {
        self.shared.looping.load(Ordering::Relaxed)
    }

    /// Set the output gain, clamped into `[min_gain, max_gain]`
    pub fn set_gain(&self, gain: f32) -> Result<(), AudioError> {
        if !gain.is_finite() || gain < 0.0 {
            return Err(AudioError::InvalidValue(format!("gain must be >= 0, got {}", gain)));
        }
        self.shared.gain.store(gain);
        Ok(())
    }

    /// Gain actually applied during rendering
    pub fn gain(&self) -> f32 {
        self.shared.effective_gain()
    }

    pub fn set_min_gain(&self, min: f32) -> Result<(), AudioError> {
        if !(0.0..=1.0).contains(&min) {
            return Err(AudioError::InvalidValue(format!("min gain must be in 0..=1, got {}", min)));
        }
        self.shared.min_gain.store(min);
        Ok(())
    }

    pub fn min_gain(&self) -> f32 {
        self.shared.min_gain.load()
    }

    pub fn set_max_gain(&self, max: f32) -> Result<(), AudioError> {
        if !(0.0..=1.0).contains(&max) {
            return Err(AudioError::InvalidValue(format!("max gain must be in 0..=1, got {}", max)));
        }
        self.shared.max_gain.store(max);
        Ok(())
    }

    pub fn max_gain(&self) -> f32 {
        self.shared.max_gain.load()
    }

    /// Playback position in samples
    pub fn sample_offset(&self) -> usize {
        self.shared.cursor.load(Ordering::Relaxed)
    }

    /// Playback position in bytes of the PCM16 encoding
    pub fn byte_offset(&self) -> usize {
        self.sample_offset() * (PCM_BITS as usize / 8)
    }

    /// Playback position in seconds
    pub fn sec_offset(&self) -> f32 {
        match self.buffer() {
            Some(buffer) => self.sample_offset() as f32 / buffer.sample_rate() as f32,
            None => 0.0,
        }
    }
}

/// Renders every registered voice into the output stream
///
/// Cloning shares the same voice list.
#[derive(Clone, Default)]
pub struct Mixer {
    voices: Arc<RwLock<Vec<Arc<VoiceShared>>>>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a voice and register it for rendering
    pub(crate) fn create_voice(&self) -> Result<Voice, AudioError> {
        let shared = Arc::new(VoiceShared::new());
        let mut voices = self
            .voices
            .write()
            .map_err(|_| AudioError::Stream("mixer lock poisoned".to_string()))?;
        let id = voices.len();
        voices.push(Arc::clone(&shared));
        Ok(Voice { id, shared })
    }

    pub fn voice_count(&self) -> usize {
        self.voices.read().map(|v| v.len()).unwrap_or(0)
    }

    /// Stop and drop every voice
    pub(crate) fn release_all(&self) {
        if let Ok(mut voices) = self.voices.write() {
            for voice in voices.drain(..) {
                voice.set_state(VoiceState::Stopped);
                voice.released.store(true, Ordering::Release);
            }
        }
    }

    /// Fill an interleaved output buffer
    ///
    /// Voices are mono; the mix is copied to every channel.
    pub fn render<T: Sample + FromSample<f32>>(&self, data: &mut [T], channels: usize) {
        let channels = channels.max(1);
        let frames = data.len() / channels;

        let voices = match self.voices.try_read() {
            Ok(guard) => guard,
            Err(_) => {
                for sample in data.iter_mut() {
                    *sample = T::EQUILIBRIUM;
                }
                return;
            }
        };

        let mut mix = vec![0.0f32; frames];
        for voice in voices.iter() {
            voice.mix_into(&mut mix);
        }

        for (frame, &value) in data.chunks_mut(channels).zip(mix.iter()) {
            let sample = T::from_sample(value.clamp(-1.0, 1.0));
            for ch in frame.iter_mut() {
                *ch = sample;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::waveform::Waveform;

    fn ramp(len: u32) -> WaveformBuffer {
        // Sawtooth with one period over the whole buffer: -1, -1 + 2/len, ...
        WaveformBuffer::generate(Waveform::Sawtooth, 1.0, 0.0, 1.0, len).unwrap()
    }

    #[test]
    fn test_play_requires_buffer() {
        let mixer = Mixer::new();
        let voice = mixer.create_voice().unwrap();
        assert_eq!(voice.play(), Err(AudioError::NoBuffer));
        assert_eq!(voice.state(), VoiceState::Initial);
    }

    #[test]
    fn test_renders_to_end_then_stops() {
        let mixer = Mixer::new();
        let voice = mixer.create_voice().unwrap();
        voice.attach(&ramp(4)).unwrap();
        voice.play().unwrap();

        let mut out = vec![9.0f32; 6];
        mixer.render(&mut out, 1);
        assert_eq!(out, vec![-1.0, -0.5, 0.0, 0.5, 0.0, 0.0]);
        assert_eq!(voice.state(), VoiceState::Stopped);
        assert_eq!(voice.sample_offset(), 4);
    }

    #[test]
    fn test_looping_wraps() {
        let mixer = Mixer::new();
        let voice = mixer.create_voice().unwrap();
        voice.attach(&ramp(4)).unwrap();
        voice.set_looping(true);
        voice.play().unwrap();

        let mut out = vec![0.0f32; 6];
        mixer.render(&mut out, 1);
        assert_eq!(out, vec![-1.0, -0.5, 0.0, 0.5, -1.0, -0.5]);
        assert!(voice.is_playing());
        assert_eq!(voice.sample_offset(), 2);
    }

    #[test]
    fn test_stereo_duplicates_mono() {
        let mixer = Mixer::new();
        let voice = mixer.create_voice().unwrap();
        voice.attach(&ramp(4)).unwrap();
        voice.play().unwrap();

        let mut out = vec![0.0f32; 4];
        mixer.render(&mut out, 2);
        assert_eq!(out, vec![-1.0, -1.0, -0.5, -0.5]);
    }

    #[test]
    fn test_pause_and_resume() {
        let mixer = Mixer::new();
        let voice = mixer.create_voice().unwrap();
        voice.attach(&ramp(4)).unwrap();
        voice.play().unwrap();

        let mut out = vec![0.0f32; 2];
        mixer.render(&mut out, 1);
        voice.pause();
        assert_eq!(voice.state(), VoiceState::Paused);

        mixer.render(&mut out, 1);
        assert_eq!(out, vec![0.0, 0.0]);

        voice.play().unwrap();
        mixer.render(&mut out, 1);
        assert_eq!(out, vec![0.0, 0.5]);
    }

    #[test]
    fn test_gain_is_clamped() {
        let mixer = Mixer::new();
        let voice = mixer.create_voice().unwrap();
        voice.set_gain(2.0).unwrap();
        assert_eq!(voice.gain(), 1.0);

        voice.set_max_gain(0.5).unwrap();
        assert_eq!(voice.gain(), 0.5);

        voice.set_gain(0.0).unwrap();
        voice.set_min_gain(0.25).unwrap();
        assert_eq!(voice.gain(), 0.25);

        assert!(voice.set_gain(-1.0).is_err());
        assert!(voice.set_max_gain(1.5).is_err());
    }

    #[test]
    fn test_gain_scales_output() {
        let mixer = Mixer::new();
        let voice = mixer.create_voice().unwrap();
        voice.attach(&ramp(4)).unwrap();
        voice.set_gain(0.5).unwrap();
        voice.play().unwrap();

        let mut out = vec![0.0f32; 2];
        mixer.render(&mut out, 1);
        assert_eq!(out, vec![-0.5, -0.25]);
    }

    #[test]
    fn test_attach_rewinds() {
        let mixer = Mixer::new();
        let voice = mixer.create_voice().unwrap();
        voice.attach(&ramp(4)).unwrap();
        voice.play().unwrap();
        let mut out = vec![0.0f32; 3];
        mixer.render(&mut out, 1);

        voice.attach(&ramp(8)).unwrap();
        assert_eq!(voice.state(), VoiceState::Initial);
        assert_eq!(voice.sample_offset(), 0);
        assert_eq!(voice.buffer().map(|b| b.len()), Some(8));
    }

    #[test]
    fn test_offsets() {
        let mixer = Mixer::new();
        let voice = mixer.create_voice().unwrap();
        assert_eq!(voice.sec_offset(), 0.0);

        voice.attach(&ramp(4)).unwrap();
        voice.play().unwrap();
        let mut out = vec![0.0f32; 2];
        mixer.render(&mut out, 1);
        assert_eq!(voice.sample_offset(), 2);
        assert!((voice.sec_offset() - 0.5).abs() < 1e-6);
        assert_eq!(voice.byte_offset(), 4);

        voice.rewind();
        assert_eq!(voice.sample_offset(), 0);
        assert_eq!(voice.state(), VoiceState::Initial);
    }

    #[test]
    fn test_play_after_stop_restarts() {
        let mixer = Mixer::new();
        let voice = mixer.create_voice().unwrap();
        voice.attach(&ramp(4)).unwrap();
        voice.play().unwrap();

        let mut out = vec![0.0f32; 4];
        mixer.render(&mut out, 1);
        assert_eq!(voice.state(), VoiceState::Stopped);

        voice.play().unwrap();
        assert_eq!(voice.sample_offset(), 0);
        assert!(voice.is_playing());

        let mut out = vec![0.0f32; 2];
        mixer.render(&mut out, 1);
        assert_eq!(out, vec![-1.0, -0.5]);
    }

    #[test]
    fn test_play_while_playing_restarts() {
        let mixer = Mixer::new();
        let voice = mixer.create_voice().unwrap();
        voice.attach(&ramp(4)).unwrap();
        voice.play().unwrap();

        let mut out = vec![0.0f32; 3];
        mixer.render(&mut out, 1);
        assert_eq!(voice.sample_offset(), 3);
        assert!(voice.is_playing());

        voice.play().unwrap();
        assert_eq!(voice.sample_offset(), 0);

        let mut out = vec![0.0f32; 2];
        mixer.render(&mut out, 1);
        assert_eq!(out, vec![-1.0, -0.5]);
    }

    #[test]
    fn test_play_waits_for_renderer() {
        let mixer = Mixer::new();
        let voice = mixer.create_voice().unwrap();
        voice.attach(&ramp(4)).unwrap();
        voice.play().unwrap();

        let mut out = vec![0.0f32; 3];
        mixer.render(&mut out, 1);

        // A render in progress holds the buffer read lock; play must not
        // reset the cursor underneath it
        let reader = voice.shared.buffer.read().unwrap();
        let restart = {
            let voice = voice.clone();
            std::thread::spawn(move || voice.play())
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(voice.sample_offset(), 3);
        drop(reader);

        restart.join().unwrap().unwrap();
        assert_eq!(voice.sample_offset(), 0);
        assert!(voice.is_playing());
    }

    #[test]
    fn test_release_all() {
        let mixer = Mixer::new();
        let voice = mixer.create_voice().unwrap();
        voice.attach(&ramp(4)).unwrap();
        assert_eq!(mixer.voice_count(), 1);

        mixer.release_all();
        assert_eq!(mixer.voice_count(), 0);
        assert_eq!(voice.play(), Err(AudioError::AlreadyTornDown));
    }

    #[test]
    fn test_silence_without_voices() {
        let mixer = Mixer::new();
        let mut out = vec![7i16; 8];
        mixer.render(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0));
    }
}
