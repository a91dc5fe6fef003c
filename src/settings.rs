use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audio::Waveform;
use crate::tone::ToneRequest;

/// Returns the path to the settings file: `~/.config/tone-rs/settings.json`
pub fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("tone-rs");
    path.push("settings.json");
    path
}

/// Optional tone settings.
///
/// Read from JSON in the platform config directory, never written.
/// Fields use `#[serde(default)]` so a partial file only overrides
/// what it names.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ToneSettings {
    pub waveform: Waveform,
    pub frequency: f32,
    pub phase: f32,
    pub duration: f32,
    pub gain: f32,
    pub looping: bool,
}

impl Default for ToneSettings {
    fn default() -> Self {
        let request = ToneRequest::default();
        Self {
            waveform: request.shape,
            frequency: request.frequency,
            phase: request.phase,
            duration: request.duration,
            gain: request.gain,
            looping: request.looping,
        }
    }
}

impl ToneSettings {
    /// Load settings from the config directory, falling back to defaults on any error.
    pub fn load() -> Self {
        Self::load_from(&settings_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Failed to parse settings ({}), using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                log::info!("No settings file found ({}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn to_request(&self) -> ToneRequest {
        ToneRequest {
            shape: self.waveform,
            frequency: self.frequency,
            phase: self.phase,
            duration: self.duration,
            gain: self.gain,
            looping: self.looping,
        }
    }
}
