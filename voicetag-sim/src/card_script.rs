//! Scripted RFID reader.
//!
//! Replays card arrivals and removals from a small text script, standing in
//! for the RC522 polling task. Script lines look like:
//!
//! ```text
//! # delay_ms  event    uid
//! 500         present  A1B2C3D4
//! 3000        absent   A1B2C3D4
//! ```
//!
//! Delays are relative to the previous line.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use voicetag_core::models::card::{CardPresenceEvent, CardUid};
use voicetag_core::models::error::RecorderError;
use voicetag_core::traits::card_reader::{CardReader, PresenceCallback};

use crate::error::SimError;

/// Granularity at which a waiting reader notices `shutdown`.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One scripted presence change.
#[derive(Debug, Clone, PartialEq)]
pub struct CardStep {
    pub delay: Duration,
    pub uid: CardUid,
    pub present: bool,
}

/// Parse a card script. Blank lines and `#` comments are skipped.
pub fn parse_script(text: &str) -> Result<Vec<CardStep>, SimError> {
    let mut steps = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        let fields: Vec<&str> = content.split_whitespace().collect();
        let [delay, event, uid] = fields.as_slice() else {
            return Err(SimError::Script {
                line,
                message: format!("expected 'delay_ms event uid', got '{}'", content),
            });
        };

        let delay = delay.parse::<u64>().map_err(|e| SimError::Script {
            line,
            message: format!("bad delay '{}': {}", delay, e),
        })?;
        let present = match event.to_ascii_lowercase().as_str() {
            "present" | "arrive" | "+" => true,
            "absent" | "remove" | "-" => false,
            other => {
                return Err(SimError::Script {
                    line,
                    message: format!("unknown event '{}'", other),
                })
            }
        };
        let uid = CardUid::from_hex(uid).map_err(|message| SimError::Script { line, message })?;

        steps.push(CardStep {
            delay: Duration::from_millis(delay),
            uid,
            present,
        });
    }
    Ok(steps)
}

/// Load and parse a card script file.
pub fn load_script(path: &Path) -> Result<Vec<CardStep>, SimError> {
    let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&text)
}

/// `CardReader` that replays a script on its own polling thread.
///
/// Like the hardware reader it only reports changes: a `present` line for the
/// card already on the antenna produces no event.
pub struct ScriptedCardReader {
    steps: Vec<CardStep>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ScriptedCardReader {
    pub fn new(steps: Vec<CardStep>) -> Self {
        Self {
            steps,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Whether the script has been fully replayed (or the reader stopped).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl CardReader for ScriptedCardReader {
    fn init(&mut self, callback: PresenceCallback) -> Result<(), RecorderError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RecorderError::InvalidState("card reader already running".into()));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let steps = self.steps.clone();

        let handle = thread::Builder::new()
            .name("rfid-poll".into())
            .spawn(move || {
                replay(&steps, &running, callback);
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| RecorderError::HardwareInitFailure(format!("failed to spawn reader thread: {}", e)))?;

        log::info!("Scripted card reader started ({} steps)", self.steps.len());
        self.handle = Some(handle);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), RecorderError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| RecorderError::DeviceFailure("card reader thread panicked".into()))?;
        }
        Ok(())
    }
}

impl Drop for ScriptedCardReader {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn replay(steps: &[CardStep], running: &AtomicBool, callback: PresenceCallback) {
    let mut on_antenna: Option<CardUid> = None;
    for step in steps {
        if !sleep_while_running(step.delay, running) {
            log::debug!("Card reader stopped mid-script");
            return;
        }

        let changed = match (&on_antenna, step.present) {
            (Some(current), true) => *current != step.uid,
            (None, true) => true,
            (Some(current), false) => *current == step.uid,
            (None, false) => false,
        };
        if !changed {
            log::debug!("Card {} unchanged, no event", step.uid);
            continue;
        }

        let event = if step.present {
            on_antenna = Some(step.uid.clone());
            CardPresenceEvent::arrived(step.uid.clone())
        } else {
            on_antenna = None;
            CardPresenceEvent::removed(step.uid.clone())
        };
        log::debug!("Card {} present={}", event.uid, event.present);
        callback(event);
    }
}

/// Sleep for `duration` in short slices. Returns false if stopped early.
fn sleep_while_running(duration: Duration, running: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(POLL_INTERVAL));
    }
}
