//! # voicetag-sim
//!
//! Host backend for voicetag.
//!
//! Provides:
//! - `SimulatedHardware`: paced I2S microphone and speaker implementing `AudioHardware`
//! - `ScriptedCardReader`: RFID reader replaying a presence script
//! - `SimSettings`: TOML settings for the recorder and the simulated microphone
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use voicetag_core::RecorderController;
//! use voicetag_sim::{MicSignal, SimSettings, SimulatedHardware};
//!
//! let settings = SimSettings::load(None)?;
//! let hardware = Arc::new(SimulatedHardware::new(MicSignal::Silence));
//! let controller = RecorderController::new(hardware, settings.recorder)?;
//! ```

pub mod card_script;
pub mod config;
pub mod error;
pub mod sim_hardware;

pub use card_script::{load_script, parse_script, CardStep, ScriptedCardReader};
pub use config::SimSettings;
pub use error::SimError;
pub use sim_hardware::{MicSignal, SimulatedChannel, SimulatedHardware, SpeakerStats};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use voicetag_core::models::config::{CardRemovalPolicy, RecorderConfiguration};
    use voicetag_core::traits::card_reader::CardReader;
    use voicetag_core::{RecorderController, SessionState};

    #[test]
    fn scripted_card_records_tone_until_removed() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfiguration {
            capture_sample_rate: 16000,
            read_timeout_ms: 50,
            output_directory: dir.path().to_path_buf(),
            auto_start: true,
            card_removal: CardRemovalPolicy::StopRecording,
            ..Default::default()
        };
        let signal = MicSignal::Tone {
            frequency_hz: 440.0,
            amplitude: 0.01,
        };
        let hardware = Arc::new(SimulatedHardware::new(signal));
        let controller = Arc::new(RecorderController::new(hardware, config).unwrap());

        let steps = parse_script("0 present 04A1B2C3\n300 absent 04A1B2C3\n").unwrap();
        let mut reader = ScriptedCardReader::new(steps);
        reader.init(controller.presence_callback()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !reader.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        reader.shutdown().unwrap();

        assert_eq!(controller.state(), SessionState::Idle);
        let recordings = controller.list_recordings().unwrap();
        assert_eq!(recordings.len(), 1);

        let name = recordings[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("04A1B2C3_"));
        let format = voicetag_core::storage::wav_reader::read_header(&recordings[0]).unwrap();
        assert_eq!(format.sample_rate, 16000);
        assert!(std::fs::metadata(&recordings[0]).unwrap().len() > 44);
    }

    #[test]
    fn recording_plays_back_through_speaker() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfiguration {
            capture_sample_rate: 16000,
            read_timeout_ms: 50,
            output_directory: dir.path().to_path_buf(),
            ..Default::default()
        };
        let signal = MicSignal::Tone {
            frequency_hz: 1000.0,
            amplitude: 0.01,
        };
        let hardware = Arc::new(SimulatedHardware::new(signal));
        let controller = RecorderController::new(Arc::clone(&hardware), config).unwrap();

        let path = controller.start_recording("tone").unwrap();
        thread::sleep(Duration::from_millis(200));
        let result = controller.stop_recording().unwrap().unwrap();
        assert!(result.data_size > 0);

        let report = controller.play(&path).unwrap();
        assert!(report.reconfigured);
        assert_eq!(report.samples_played, result.data_size as u64 / 2);
        assert!(hardware.speaker_stats().peak > 0);
    }
}
