//! In-memory output device for tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::device::OutputDevice;
use super::voice::Mixer;
use crate::error::AudioError;

/// Counters shared between a `MockDevice` and the test that created it
#[derive(Clone, Default)]
pub struct MockCounters {
    starts: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MockCounters {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Renders synchronously on demand instead of on an audio thread
pub struct MockDevice {
    sample_rate: u32,
    channels: u16,
    fail_start: bool,
    mixer: Option<Mixer>,
    counters: MockCounters,
}

impl MockDevice {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 2,
            fail_start: false,
            mixer: None,
            counters: MockCounters::default(),
        }
    }

    /// A device whose `start` fails
    pub fn failing(sample_rate: u32) -> Self {
        Self {
            fail_start: true,
            ..Self::new(sample_rate)
        }
    }

    pub fn counters(&self) -> MockCounters {
        self.counters.clone()
    }

    /// Pull `frames` frames from the mixer
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * self.channels as usize];
        if let Some(mixer) = &self.mixer {
            mixer.render(&mut out, self.channels as usize);
        }
        out
    }
}

impl OutputDevice for MockDevice {
    fn name(&self) -> &str {
        "mock"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn start(&mut self, mixer: Mixer) -> Result<(), AudioError> {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(AudioError::Stream("mock device refused to start".to_string()));
        }
        self.mixer = Some(mixer);
        Ok(())
    }

    fn close(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.mixer = None;
    }
}
