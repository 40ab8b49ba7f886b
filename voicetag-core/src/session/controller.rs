use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::models::card::{CardPresenceEvent, CardUid};
use crate::models::config::{CardRemovalPolicy, RecorderConfiguration};
use crate::models::error::RecorderError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::SessionState;
use crate::session::capture::CapturePipeline;
use crate::session::player::{PlaybackReport, Player};
use crate::storage::library;
use crate::traits::audio_device::AudioHardware;
use crate::traits::card_reader::PresenceCallback;
use crate::traits::session_delegate::SessionDelegate;

/// Delegate call queued while the state lock is held.
enum Notice {
    State(SessionState),
    Error(RecorderError),
    RecordingFinished(RecordingResult),
    PlaybackFinished(PlaybackReport),
    RecordingsChanged(Vec<PathBuf>),
}

/// Top-level recording session: RFID presence events and UI commands in,
/// capture/playback pipelines and delegate notifications out.
///
/// Lock order is session state, then the capture pipeline's active slot.
/// Playback takes only the player lock, so it runs alongside a recording
/// (capture and render are separate channels).
pub struct RecorderController<H: AudioHardware> {
    config: RecorderConfiguration,
    capture: CapturePipeline<H>,
    player: Mutex<Player<H::Device>>,
    state: Mutex<SessionState>,
    delegate: Option<Arc<dyn SessionDelegate>>,
}

impl<H: AudioHardware + 'static> RecorderController<H> {
    /// Validate the configuration and take ownership of the render channel.
    pub fn new(hardware: Arc<H>, config: RecorderConfiguration) -> Result<Self, RecorderError> {
        config.validate().map_err(RecorderError::ConfigurationFailed)?;
        let player = Player::open(hardware.as_ref(), &config)?;
        let capture = CapturePipeline::new(hardware, config.clone());
        log::info!(
            "Recorder ready: capture {} Hz, playback {} Hz, recordings in {}",
            config.capture_sample_rate,
            config.playback_sample_rate,
            config.output_directory.display()
        );
        Ok(Self {
            config,
            capture,
            player: Mutex::new(player),
            state: Mutex::new(SessionState::Idle),
            delegate: None,
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn SessionDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn config(&self) -> &RecorderConfiguration {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    /// Whether the capture stream is running.
    pub fn is_recording(&self) -> bool {
        self.capture.is_recording()
    }

    /// Callback to hand to a [`crate::traits::card_reader::CardReader`].
    ///
    /// Holds a weak reference so the reader does not keep the controller alive.
    pub fn presence_callback(self: &Arc<Self>) -> PresenceCallback {
        let controller: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |event| {
            if let Some(controller) = controller.upgrade() {
                controller.on_presence_changed(event);
            }
        })
    }

    /// Feed one RFID presence change into the state machine.
    pub fn on_presence_changed(&self, event: CardPresenceEvent) {
        let mut notices = Vec::new();
        {
            let mut state = self.state.lock();
            self.reconcile(&mut state, &mut notices);
            let current = state.clone();

            if event.present {
                match current {
                    SessionState::Idle => {
                        log::info!("Card {} detected", event.uid);
                        *state = SessionState::CardDetected {
                            uid: event.uid.clone(),
                        };
                        notices.push(Notice::State(state.clone()));
                        if self.config.auto_start {
                            if let Err(e) = self.begin_recording(&mut state, Some(event.uid), None, &mut notices) {
                                self.abort_to_idle(&mut state, e, &mut notices);
                            }
                        }
                    }
                    SessionState::CardDetected { uid } if uid == event.uid => {
                        log::debug!("Card {} still present", uid);
                    }
                    SessionState::CardDetected { uid } => {
                        log::info!("Card {} replaced by {}", uid, event.uid);
                        *state = SessionState::CardDetected { uid: event.uid };
                        notices.push(Notice::State(state.clone()));
                    }
                    SessionState::Recording { .. } => {
                        log::debug!("Ignoring card {} while recording", event.uid);
                    }
                }
            } else {
                match current {
                    SessionState::CardDetected { uid } if uid == event.uid => {
                        log::info!("Card {} removed", uid);
                        *state = SessionState::Idle;
                        notices.push(Notice::State(SessionState::Idle));
                    }
                    SessionState::Recording { uid: Some(uid), .. } if uid == event.uid => {
                        match self.config.card_removal {
                            CardRemovalPolicy::Ignore => {
                                log::info!("Card {} removed, recording continues", uid);
                            }
                            CardRemovalPolicy::StopRecording => {
                                log::info!("Card {} removed, stopping recording", uid);
                                if let Err(e) = self.finish_recording(&mut state, &mut notices) {
                                    log::error!("Failed to stop recording on card removal: {}", e);
                                }
                            }
                        }
                    }
                    _ => log::debug!("Ignoring removal of card {}", event.uid),
                }
            }
        }
        self.dispatch(notices);
    }

    /// UI confirmation: start recording for the detected card.
    pub fn confirm(&self) -> Result<PathBuf, RecorderError> {
        let mut notices = Vec::new();
        let result = {
            let mut state = self.state.lock();
            self.reconcile(&mut state, &mut notices);
            match state.clone() {
                SessionState::CardDetected { uid } => {
                    match self.begin_recording(&mut state, Some(uid), None, &mut notices) {
                        Ok(path) => Ok(path),
                        Err(e) => {
                            self.abort_to_idle(&mut state, e.clone(), &mut notices);
                            Err(e)
                        }
                    }
                }
                SessionState::Recording { .. } => Err(RecorderError::AlreadyRecording),
                SessionState::Idle => Err(RecorderError::InvalidState("no card detected".into())),
            }
        };
        self.dispatch(notices);
        result
    }

    /// UI declined the detected card.
    pub fn deny(&self) -> Result<(), RecorderError> {
        let mut notices = Vec::new();
        let result = {
            let mut state = self.state.lock();
            match &*state {
                SessionState::CardDetected { uid } => {
                    log::info!("Recording for card {} declined", uid);
                    *state = SessionState::Idle;
                    notices.push(Notice::State(SessionState::Idle));
                    Ok(())
                }
                SessionState::Idle => Ok(()),
                SessionState::Recording { .. } => Err(RecorderError::InvalidState(
                    "cannot decline while recording".into(),
                )),
            }
        };
        self.dispatch(notices);
        result
    }

    /// Start recording to `file_name` inside the output directory.
    ///
    /// Carries the detected card, if any, into the recording's metadata.
    pub fn start_recording(&self, file_name: &str) -> Result<PathBuf, RecorderError> {
        let mut notices = Vec::new();
        let result = {
            let mut state = self.state.lock();
            self.reconcile(&mut state, &mut notices);
            match state.clone() {
                SessionState::Recording { .. } => Err(RecorderError::AlreadyRecording),
                current => {
                    let card = current.card().cloned();
                    self.begin_recording(&mut state, card, Some(file_name), &mut notices)
                        .inspect_err(|e| notices.push(Notice::Error(e.clone())))
                }
            }
        };
        self.dispatch(notices);
        result
    }

    /// Stop the active recording. Returns `Ok(None)` when nothing was recording.
    pub fn stop_recording(&self) -> Result<Option<RecordingResult>, RecorderError> {
        let mut notices = Vec::new();
        let result = {
            let mut state = self.state.lock();
            if state.is_recording() {
                self.finish_recording(&mut state, &mut notices).map(Some)
            } else {
                log::debug!("Stop requested while {}", state.label());
                Ok(None)
            }
        };
        self.dispatch(notices);
        result
    }

    /// Collect a recording that ended by itself (maximum duration, device
    /// failure) and return the session to idle.
    pub fn poll(&self) {
        let mut notices = Vec::new();
        self.reconcile(&mut self.state.lock(), &mut notices);
        self.dispatch(notices);
    }

    /// Play a recording, blocking until it finishes.
    ///
    /// Fails with `AlreadyPlaying` instead of queueing behind another file.
    pub fn play(&self, path: &Path) -> Result<PlaybackReport, RecorderError> {
        let Some(mut player) = self.player.try_lock() else {
            return Err(RecorderError::AlreadyPlaying);
        };
        let result = player.play(path);
        drop(player);

        match &result {
            Ok(report) => self.dispatch(vec![Notice::PlaybackFinished(report.clone())]),
            Err(e) => {
                log::warn!("Playback of {} failed: {}", path.display(), e);
                self.dispatch(vec![Notice::Error(e.clone())]);
            }
        }
        result
    }

    /// Change the playback gain. Waits for a running playback to finish.
    pub fn set_volume(&self, volume: f32) {
        self.player.lock().set_volume(volume);
    }

    /// Recordings in the output directory, newest first.
    pub fn list_recordings(&self) -> Result<Vec<PathBuf>, RecorderError> {
        library::list_recordings(&self.config.output_directory)
    }

    /// Delete a finished recording and its metadata sidecar.
    pub fn delete_recording(&self, path: &Path) -> Result<(), RecorderError> {
        if self.capture.active_file().is_some_and(|active| same_file(&active, path)) {
            return Err(RecorderError::InvalidState(
                "cannot delete the file being recorded".into(),
            ));
        }
        library::delete_recording(path)?;
        log::info!("Deleted {}", path.display());

        let mut notices = Vec::new();
        self.push_recordings(&mut notices);
        self.dispatch(notices);
        Ok(())
    }

    fn begin_recording(
        &self,
        state: &mut SessionState,
        card: Option<CardUid>,
        file_name: Option<&str>,
        notices: &mut Vec<Notice>,
    ) -> Result<PathBuf, RecorderError> {
        let directory = &self.config.output_directory;
        let file_path = match (file_name, &card) {
            (Some(name), _) => library::resolve_recording_path(directory, name)?,
            (None, Some(uid)) => {
                library::unique_recording_path(directory, &library::card_recording_name(uid))?
            }
            (None, None) => return Err(RecorderError::InvalidState("no file name for recording".into())),
        };

        if let Some(previous) = self.capture.start(file_path.clone(), card.clone())? {
            notices.push(Notice::RecordingFinished(previous));
            self.push_recordings(notices);
        }
        *state = SessionState::Recording {
            uid: card,
            file_path: file_path.clone(),
        };
        notices.push(Notice::State(state.clone()));
        Ok(file_path)
    }

    fn finish_recording(
        &self,
        state: &mut SessionState,
        notices: &mut Vec<Notice>,
    ) -> Result<RecordingResult, RecorderError> {
        let stopped = self.capture.stop();
        *state = SessionState::Idle;
        notices.push(Notice::State(SessionState::Idle));

        let result = match stopped {
            Ok(Some(result)) => result,
            Ok(None) => {
                let e = RecorderError::InvalidState("capture was not running".into());
                notices.push(Notice::Error(e.clone()));
                return Err(e);
            }
            Err(e) => {
                log::error!("Failed to finalize recording: {}", e);
                notices.push(Notice::Error(e.clone()));
                return Err(e);
            }
        };

        if let Some(e) = &result.interrupted {
            notices.push(Notice::Error(e.clone()));
        }
        notices.push(Notice::RecordingFinished(result.clone()));
        self.push_recordings(notices);
        Ok(result)
    }

    /// Bring the session state in line with a capture that ended on its own.
    fn reconcile(&self, state: &mut SessionState, notices: &mut Vec<Notice>) {
        if state.is_recording() && self.capture.has_finished_capture() {
            log::info!("Recording ended by itself");
            if let Err(e) = self.finish_recording(state, notices) {
                log::warn!("Self-terminated recording could not be collected: {}", e);
            }
        }
    }

    fn abort_to_idle(&self, state: &mut SessionState, error: RecorderError, notices: &mut Vec<Notice>) {
        log::error!("Could not start recording: {}", error);
        *state = SessionState::Idle;
        notices.push(Notice::State(SessionState::Idle));
        notices.push(Notice::Error(error));
    }

    fn push_recordings(&self, notices: &mut Vec<Notice>) {
        match self.list_recordings() {
            Ok(recordings) => notices.push(Notice::RecordingsChanged(recordings)),
            Err(e) => log::warn!("Failed to refresh recordings list: {}", e),
        }
    }

    fn dispatch(&self, notices: Vec<Notice>) {
        let Some(delegate) = &self.delegate else {
            return;
        };
        for notice in notices {
            match notice {
                Notice::State(state) => delegate.on_state_changed(&state),
                Notice::Error(e) => delegate.on_error(&e),
                Notice::RecordingFinished(result) => delegate.on_recording_finished(&result),
                Notice::PlaybackFinished(report) => delegate.on_playback_finished(&report),
                Notice::RecordingsChanged(recordings) => delegate.on_recordings_changed(&recordings),
            }
        }
    }
}

/// Compare two paths after resolving `.`/`..` and links, falling back to a
/// plain comparison when either one cannot be resolved.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
