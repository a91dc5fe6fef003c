//! tone-rs - procedurally generated tone playback
//!
//! This crate provides:
//! - `audio`: waveform buffers, voices and the audio subsystem
//! - `tone`: a single scripted playback run
//! - `settings`: optional tone settings file

pub mod audio;
pub mod error;
pub mod settings;
pub mod tone;
