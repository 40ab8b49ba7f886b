use std::time::Duration;

use crate::models::audio_format::AudioFormat;
use crate::models::config::I2sPins;
use crate::models::error::RecorderError;

/// Direction of an audio channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    Capture,
    Render,
}

/// Factory for hardware audio channels.
///
/// Implemented by:
/// - `SimulatedHardware` (host simulator)
/// - an ESP-IDF I2S backend on target
pub trait AudioHardware: Send + Sync {
    type Device: AudioDevice + 'static;

    /// Open a channel for `role`. The returned device is created disabled.
    ///
    /// Fails with `HardwareInitFailure` when the channel cannot be set up or is
    /// already owned by another handle.
    fn open(&self, role: DeviceRole, format: AudioFormat, pins: &I2sPins) -> Result<Self::Device, RecorderError>;
}

/// Exclusive handle to one capture or render channel.
///
/// Dropping the handle releases the channel.
pub trait AudioDevice: Send {
    fn role(&self) -> DeviceRole;

    /// Format the channel is currently clocked for.
    fn format(&self) -> AudioFormat;

    fn is_enabled(&self) -> bool;

    fn enable(&mut self) -> Result<(), RecorderError>;

    fn disable(&mut self) -> Result<(), RecorderError>;

    /// Block until data is available or `timeout` elapses.
    ///
    /// Returns `Ok(0)` on timeout: that means "try again", not end of stream.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, RecorderError>;

    /// Block until `buf` (or a prefix of it) is queued for output.
    ///
    /// Success means enqueued, not audible. Returns `Ok(0)` on timeout.
    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, RecorderError>;

    /// Change the channel clock. Only called while the channel is disabled.
    fn set_sample_rate(&mut self, sample_rate: u32) -> Result<(), RecorderError>;

    /// Disable, re-clock, and re-enable the channel.
    ///
    /// Heavier than a buffer change; only worth doing when the rate differs.
    fn reconfigure_clock(&mut self, sample_rate: u32) -> Result<(), RecorderError> {
        let was_enabled = self.is_enabled();
        if was_enabled {
            self.disable()?;
        }
        self.set_sample_rate(sample_rate)?;
        if was_enabled {
            self.enable()?;
        }
        Ok(())
    }

    /// Flush queued output by cycling the channel.
    fn drain(&mut self) -> Result<(), RecorderError> {
        self.disable()?;
        self.enable()
    }
}
