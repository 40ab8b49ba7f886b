use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::processing::pcm_codec::{SourceWidth, DEFAULT_CAPTURE_SHIFT, DEFAULT_VOLUME};

/// I2S pin assignment for one channel. `-1` marks an unused line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct I2sPins {
    pub bclk: i32,
    pub ws: i32,
    pub data: i32,
}

impl I2sPins {
    /// INMP441 wiring of the reference board.
    pub const MIC: Self = Self {
        bclk: 4,
        ws: 5,
        data: 6,
    };

    /// NS4168 wiring of the reference board.
    pub const SPEAKER: Self = Self {
        bclk: 7,
        ws: 8,
        data: 9,
    };
}

/// What happens to an in-progress recording when its card leaves the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardRemovalPolicy {
    /// Keep recording until an explicit stop.
    #[default]
    Ignore,
    /// Stop and finalize the recording.
    StopRecording,
}

/// Configuration for the recorder appliance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfiguration {
    /// Microphone clock in Hz (default: 48000).
    pub capture_sample_rate: u32,

    /// How the microphone places its sample inside each 32-bit slot.
    pub capture_source_width: SourceWidth,

    /// Right shift applied to left-justified 24-bit words (default: 11).
    /// Calibrated for the INMP441 gain on the reference board.
    pub capture_shift: u32,

    /// Raw bytes pulled from the microphone per read (default: 2048).
    pub capture_block_bytes: usize,

    /// Microphone read timeout; bounds stop latency (default: 200 ms).
    pub read_timeout_ms: u64,

    /// Speaker clock before any file reconfigures it (default: 44100).
    pub playback_sample_rate: u32,

    /// File bytes read per playback block (default: 4096).
    pub playback_block_bytes: usize,

    /// Speaker write timeout per attempt (default: 1000 ms).
    pub write_timeout_ms: u64,

    /// Static playback gain (default: 0.6).
    pub volume: f32,

    /// Directory where recordings are written and listed.
    pub output_directory: PathBuf,

    /// Maximum recording duration in seconds (None = unlimited).
    pub max_duration_secs: Option<f64>,

    /// Start recording as soon as a card is detected, skipping confirmation.
    pub auto_start: bool,

    pub card_removal: CardRemovalPolicy,

    /// Write a `.metadata.json` sidecar next to each finished recording.
    pub write_metadata: bool,

    pub capture_pins: I2sPins,

    pub playback_pins: I2sPins,
}

impl RecorderConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.capture_sample_rate == 0 || self.playback_sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.capture_shift >= 32 {
            return Err(format!("capture shift out of range: {}", self.capture_shift));
        }
        if self.capture_block_bytes == 0 || self.capture_block_bytes % 4 != 0 {
            return Err(format!(
                "capture block must be a positive multiple of 4 bytes, got {}",
                self.capture_block_bytes
            ));
        }
        if self.playback_block_bytes == 0 || self.playback_block_bytes % 4 != 0 {
            return Err(format!(
                "playback block must be a positive multiple of 4 bytes, got {}",
                self.playback_block_bytes
            ));
        }
        if self.read_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err("timeouts must be positive".into());
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(format!("invalid volume: {}", self.volume));
        }
        if let Some(max) = self.max_duration_secs {
            if !max.is_finite() || max <= 0.0 {
                return Err(format!("invalid max duration: {}", max));
            }
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for RecorderConfiguration {
    fn default() -> Self {
        Self {
            capture_sample_rate: 48000,
            capture_source_width: SourceWidth::LeftJustified24,
            capture_shift: DEFAULT_CAPTURE_SHIFT,
            capture_block_bytes: 2048,
            read_timeout_ms: 200,
            playback_sample_rate: 44100,
            playback_block_bytes: 4096,
            write_timeout_ms: 1000,
            volume: DEFAULT_VOLUME,
            output_directory: PathBuf::from("/sdcard"),
            max_duration_secs: None,
            auto_start: false,
            card_removal: CardRemovalPolicy::Ignore,
            write_metadata: true,
            capture_pins: I2sPins::MIC,
            playback_pins: I2sPins::SPEAKER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = RecorderConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capture_shift, 11);
        assert_eq!(config.read_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn rejects_partial_frame_blocks() {
        let config = RecorderConfiguration {
            capture_block_bytes: 2046,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_volume_and_duration() {
        let config = RecorderConfiguration {
            volume: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RecorderConfiguration {
            max_duration_secs: Some(0.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_partial_json() {
        let config: RecorderConfiguration =
            serde_json::from_str(r#"{"volume": 0.25, "card_removal": "stop_recording"}"#).unwrap();
        assert_eq!(config.volume, 0.25);
        assert_eq!(config.card_removal, CardRemovalPolicy::StopRecording);
        assert_eq!(config.capture_sample_rate, 48000);
    }
}
