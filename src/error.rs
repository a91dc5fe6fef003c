//! Error types for tone-rs

use thiserror::Error;

/// Audio subsystem errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    /// The output device could not be opened or started
    #[error("Failed to initialize audio: {0}")]
    Initialization(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// `play` was called on a voice without a buffer
    #[error("No buffer attached to voice")]
    NoBuffer,

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio subsystem already torn down")]
    AlreadyTornDown,
}

/// Errors surfaced by a tone playback run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToneError {
    /// Fatal: nothing was created or played
    #[error("{0}")]
    Initialization(AudioError),

    #[error("Playback failed: {0}")]
    Playback(AudioError),
}

impl ToneError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ToneError::Initialization(_) => 1,
            ToneError::Playback(_) => 2,
        }
    }
}

impl From<AudioError> for ToneError {
    fn from(err: AudioError) -> Self {
        ToneError::Playback(err)
    }
}
