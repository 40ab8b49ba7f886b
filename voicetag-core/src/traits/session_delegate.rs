use std::path::PathBuf;

use crate::models::error::RecorderError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::SessionState;
use crate::session::player::PlaybackReport;

/// Event delegate for UI notifications.
///
/// Methods are called from whichever thread drove the change (UI command,
/// RFID polling thread). Implementations should hand off to the UI task.
pub trait SessionDelegate: Send + Sync {
    /// Called when the session state changes (card detected, recording, idle).
    fn on_state_changed(&self, state: &SessionState);

    /// Called when an operation fails; the session is idle and retriable.
    fn on_error(&self, error: &RecorderError);

    /// Called when a recording is finalized.
    fn on_recording_finished(&self, result: &RecordingResult);

    /// Called when a file finished playing.
    fn on_playback_finished(&self, report: &PlaybackReport);

    /// Called when the set of recordings on the card changed.
    fn on_recordings_changed(&self, recordings: &[PathBuf]);
}
