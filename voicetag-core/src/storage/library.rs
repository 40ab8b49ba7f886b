//! Recording files on the card: naming, listing for the file picker, deletion.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::models::card::CardUid;
use crate::models::error::RecorderError;
use crate::storage::metadata;

const MAX_NAME_SUFFIX: u32 = 999;

/// File name for a card-triggered recording: `<UID>_<UTC timestamp>.wav`.
pub fn card_recording_name(uid: &CardUid) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}.wav", uid.to_hex(), timestamp)
}

/// Resolve a caller-supplied file name against the recordings directory.
///
/// The name must be a single plain file name: no separators, no `.` or `..`,
/// nothing absolute. A missing extension becomes `.wav`; any other extension
/// than `wav` is rejected so every recording shows up in [`list_recordings`].
pub fn resolve_recording_path(directory: &Path, file_name: &str) -> Result<PathBuf, RecorderError> {
    let trimmed = file_name.trim();
    if trimmed.is_empty() {
        return Err(RecorderError::IoFailure("empty recording file name".into()));
    }

    let mut components = Path::new(trimmed).components();
    let single = match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if !trimmed.contains(['/', '\\']) => name,
        _ => {
            return Err(RecorderError::IoFailure(format!(
                "recording name {:?} must be a plain file name",
                trimmed
            )))
        }
    };

    let mut path = directory.join(single);
    match path.extension() {
        None => {
            path.set_extension("wav");
        }
        Some(ext) if ext.to_string_lossy().eq_ignore_ascii_case("wav") => {}
        Some(ext) => {
            return Err(RecorderError::IoFailure(format!(
                "recordings must be .wav files, got .{}",
                ext.to_string_lossy()
            )))
        }
    }
    Ok(path)
}

/// Resolve `file_name` like [`resolve_recording_path`], then pick the first
/// free name among `name.wav`, `name_1.wav`, `name_2.wav`, ...
pub fn unique_recording_path(directory: &Path, file_name: &str) -> Result<PathBuf, RecorderError> {
    let base = resolve_recording_path(directory, file_name)?;
    if !base.exists() {
        return Ok(base);
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    for n in 1..=MAX_NAME_SUFFIX {
        let candidate = base.with_file_name(format!("{}_{}.wav", stem, n));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(RecorderError::IoFailure(format!(
        "no free file name left for {}",
        base.display()
    )))
}

/// List `.wav` recordings in `directory`, newest first.
pub fn list_recordings(directory: &Path) -> Result<Vec<PathBuf>, RecorderError> {
    let entries = fs::read_dir(directory).map_err(|e| RecorderError::io("failed to read recordings directory", e))?;

    let mut recordings: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("wav"))
                    .unwrap_or(false)
        })
        .collect();

    recordings.sort_by(|a, b| {
        let a_time = a.metadata().and_then(|m| m.modified()).ok();
        let b_time = b.metadata().and_then(|m| m.modified()).ok();
        b_time.cmp(&a_time).then_with(|| b.cmp(a))
    });

    Ok(recordings)
}

/// Delete a recording and its metadata sidecar, if any.
pub fn delete_recording(path: &Path) -> Result<(), RecorderError> {
    fs::remove_file(path).map_err(|e| RecorderError::io("failed to delete recording", e))?;
    let sidecar = metadata::metadata_path(path);
    if sidecar.exists() {
        if let Err(e) = fs::remove_file(&sidecar) {
            log::warn!("Failed to delete {}: {}", sidecar.display(), e);
        }
    }
    Ok(())
}
