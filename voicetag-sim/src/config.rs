//! Simulator settings: a TOML file holding the recorder configuration plus
//! the simulated microphone signal.
//!
//! ```toml
//! [recorder]
//! output_directory = "recordings"
//! volume = 0.8
//! card_removal = "stop_recording"
//!
//! [microphone]
//! kind = "tone"
//! frequency_hz = 440.0
//! amplitude = 0.01
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use voicetag_core::models::config::RecorderConfiguration;

use crate::error::SimError;
use crate::sim_hardware::MicSignal;

/// Where recordings go on a host unless configured otherwise.
pub const DEFAULT_OUTPUT_DIR: &str = "recordings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    pub recorder: RecorderConfiguration,
    pub microphone: MicSignal,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            recorder: RecorderConfiguration {
                output_directory: PathBuf::from(DEFAULT_OUTPUT_DIR),
                ..Default::default()
            },
            microphone: MicSignal::default(),
        }
    }
}

impl SimSettings {
    /// Load from `path`, or use defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, SimError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&content).map_err(|source| SimError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        self.recorder.validate().map_err(SimError::Invalid)?;
        if let MicSignal::Tone {
            frequency_hz,
            amplitude,
        } = self.microphone
        {
            let nyquist = self.recorder.capture_sample_rate as f64 / 2.0;
            if !(frequency_hz > 0.0 && frequency_hz < nyquist) {
                return Err(SimError::Invalid(format!(
                    "tone frequency {} Hz outside (0, {}) Hz",
                    frequency_hz, nyquist
                )));
            }
            if !(0.0..=1.0).contains(&amplitude) {
                return Err(SimError::Invalid(format!("tone amplitude {} outside 0..1", amplitude)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicetag_core::models::config::CardRemovalPolicy;

    #[test]
    fn missing_path_gives_host_defaults() {
        let settings = SimSettings::load(None).unwrap();
        assert_eq!(settings.recorder.output_directory, PathBuf::from("recordings"));
        assert_eq!(settings.recorder.capture_sample_rate, 48000);
        assert_eq!(settings.microphone, MicSignal::Silence);
        settings.validate().unwrap();
    }

    #[test]
    fn loads_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voicetag.toml");
        std::fs::write(
            &path,
            r#"
[recorder]
output_directory = "/tmp/tags"
card_removal = "stop_recording"
volume = 0.8

[microphone]
kind = "tone"
frequency_hz = 440.0
amplitude = 0.01
"#,
        )
        .unwrap();

        let settings = SimSettings::load(Some(path.as_path())).unwrap();
        assert_eq!(settings.recorder.output_directory, PathBuf::from("/tmp/tags"));
        assert_eq!(settings.recorder.card_removal, CardRemovalPolicy::StopRecording);
        assert_eq!(settings.recorder.playback_sample_rate, 44100);
        assert_eq!(
            settings.microphone,
            MicSignal::Tone {
                frequency_hz: 440.0,
                amplitude: 0.01
            }
        );
        settings.validate().unwrap();
    }

    #[test]
    fn unreadable_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SimSettings::load(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
        assert!(matches!(err, SimError::Io { .. }));
    }

    #[test]
    fn malformed_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[recorder\nvolume = ").unwrap();
        assert!(matches!(SimSettings::load(Some(path.as_path())), Err(SimError::Toml { .. })));
    }

    #[test]
    fn rejects_tone_above_nyquist() {
        let settings = SimSettings {
            microphone: MicSignal::Tone {
                frequency_hz: 30000.0,
                amplitude: 0.1,
            },
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(SimError::Invalid(_))));
    }
}
