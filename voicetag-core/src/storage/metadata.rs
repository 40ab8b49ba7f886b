use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::RecorderError;
use crate::models::recording_result::RecordingMetadata;

/// Sidecar path for a recording: `{recording}.metadata.json`.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Write recording metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), RecorderError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| RecorderError::IoFailure(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(recording_path), json).map_err(|e| RecorderError::io("failed to write metadata", e))?;
    Ok(())
}

/// Read recording metadata from a JSON sidecar file.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, RecorderError> {
    let json = fs::read_to_string(metadata_path(recording_path))
        .map_err(|e| RecorderError::io("failed to read metadata", e))?;
    let metadata: RecordingMetadata = serde_json::from_str(&json)
        .map_err(|e| RecorderError::IoFailure(format!("failed to parse metadata: {}", e)))?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_format::AudioFormat;
    use crate::models::card::CardUid;

    #[test]
    fn sidecar_sits_next_to_recording() {
        assert_eq!(
            metadata_path(Path::new("/sdcard/04A1_20250101.wav")),
            PathBuf::from("/sdcard/04A1_20250101.metadata.json")
        );
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let recording = dir.path().join("take.wav");
        let uid = CardUid::new(&[1, 2, 3, 4, 5, 6, 7]).unwrap();
        let metadata = RecordingMetadata::new(
            Some(&uid),
            AudioFormat::pcm16_mono(48000),
            4800,
            &recording.to_string_lossy(),
            "feed",
        );

        write_metadata(&metadata, &recording).unwrap();
        assert_eq!(read_metadata(&recording).unwrap(), metadata);
    }

    #[test]
    fn missing_sidecar_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_metadata(&dir.path().join("none.wav")),
            Err(RecorderError::IoFailure(_))
        ));
    }
}
