use std::sync::Arc;

use crate::models::card::CardPresenceEvent;
use crate::models::error::RecorderError;

/// Callback invoked whenever a card arrives at or leaves the reader.
///
/// Fires on the reader's own polling thread.
pub type PresenceCallback = Arc<dyn Fn(CardPresenceEvent) + Send + Sync + 'static>;

/// RFID reader collaborator. Anti-collision and PICC handling stay inside the
/// driver; this core only sees presence changes.
pub trait CardReader: Send {
    /// Bring up the reader and start delivering presence events to `callback`.
    fn init(&mut self, callback: PresenceCallback) -> Result<(), RecorderError>;

    /// Stop polling and release the bus.
    fn shutdown(&mut self) -> Result<(), RecorderError>;
}
