//! tone-rs - play a generated tone
//!
//! Initializes the default audio output, plays one waveform buffer
//! (a 3 second 440 Hz sine unless the settings file says otherwise),
//! waits for it to finish and shuts audio down again.
//!
//! Exit status: 0 on success, 1 if audio could not be initialized,
//! 2 for any other playback failure.

use tone_rs::audio::{AudioSubsystem, CpalDevice};
use tone_rs::settings::ToneSettings;
use tone_rs::tone;

fn main() {
    env_logger::init();
    log::info!("Starting tone-rs");

    let request = ToneSettings::load().to_request();

    match tone::play_tone(AudioSubsystem::<CpalDevice>::init, &request) {
        Ok(report) => {
            log::info!(
                "Played {} samples at {}Hz on {} (waited {:.2?})",
                report.samples,
                report.sample_rate,
                report.device,
                report.waited
            );
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}
