//! # voicetag-core
//!
//! Platform-agnostic core of an RFID-triggered voice recorder.
//!
//! Provides the PCM codec, WAV I/O with deferred size patching, the capture
//! and playback pipelines, and the recording session state machine. Hardware
//! backends (ESP-IDF I2S on target, the host simulator in `voicetag-sim`)
//! implement `AudioHardware` and plug into the generic `RecorderController`.
//!
//! ## Architecture
//!
//! ```text
//! voicetag-core (this crate)
//! ├── traits/       ← AudioHardware, AudioDevice, CardReader, SessionDelegate
//! ├── models/       ← RecorderError, SessionState, RecorderConfiguration, AudioFormat, CardUid
//! ├── processing/   ← PcmCodec, WAV header generation and parsing
//! ├── session/      ← CapturePipeline, Player, RecorderController
//! └── storage/      ← WavWriter, WavReader, recording library, metadata
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use models::audio_format::AudioFormat;
pub use models::card::{CardPresenceEvent, CardUid};
pub use models::config::{CardRemovalPolicy, I2sPins, RecorderConfiguration};
pub use models::error::RecorderError;
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::SessionState;
pub use processing::pcm_codec::{PcmCodec, SourceWidth};
pub use session::capture::CapturePipeline;
pub use session::controller::RecorderController;
pub use session::player::{PlaybackReport, Player};
pub use storage::wav_reader::WavReader;
pub use storage::wav_writer::{FinalizedWav, WavWriter};
pub use traits::audio_device::{AudioDevice, AudioHardware, DeviceRole};
pub use traits::card_reader::{CardReader, PresenceCallback};
pub use traits::session_delegate::SessionDelegate;
