use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_format::AudioFormat;
use super::card::CardUid;
use super::error::RecorderError;

/// Result returned when a recording is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub data_size: u32,
    pub metadata: RecordingMetadata,
    pub checksum: String,
    /// Device failure that ended the capture early; the file is still finalized.
    pub interrupted: Option<RecorderError>,
}

/// Metadata stored alongside a recording as a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub card_uid: Option<String>,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub created_at: String,
    pub format: AudioFormat,
    pub data_size: u32,
}

impl RecordingMetadata {
    pub fn new(
        card_uid: Option<&CardUid>,
        format: AudioFormat,
        data_size: u32,
        file_path: &str,
        checksum: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            card_uid: card_uid.map(CardUid::to_hex),
            duration_secs: format.duration_secs(data_size as u64),
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            format,
            data_size,
        }
    }
}
