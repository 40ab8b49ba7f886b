//! Simulated I2S channels for running the recorder on a host.
//!
//! The microphone produces INMP441-style words (24-bit sample, left-justified
//! in a 32-bit slot) and the speaker swallows 16-bit mono PCM, both paced
//! against the wall clock like DMA-driven channels.

use std::collections::HashSet;
use std::f64::consts::TAU;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use voicetag_core::models::audio_format::AudioFormat;
use voicetag_core::models::config::I2sPins;
use voicetag_core::models::error::RecorderError;
use voicetag_core::traits::audio_device::{AudioDevice, AudioHardware, DeviceRole};

/// Output may run ahead of the wall clock by this much, like a DMA queue.
const RENDER_QUEUE_LEAD: Duration = Duration::from_millis(40);

const FULL_SCALE_24: f64 = 8_388_607.0;

/// What the simulated microphone hears.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MicSignal {
    Silence,
    /// Sine tone; `amplitude` is a fraction of 24-bit full scale. With the
    /// default capture shift anything above about 0.03 clips in the file.
    Tone { frequency_hz: f64, amplitude: f64 },
}

impl Default for MicSignal {
    fn default() -> Self {
        Self::Silence
    }
}

/// Totals of what reached the simulated speaker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeakerStats {
    pub samples: u64,
    pub peak: u16,
}

/// Host stand-in for the board's two I2S channels.
///
/// Each role can be held by one handle at a time.
pub struct SimulatedHardware {
    held: Arc<Mutex<HashSet<DeviceRole>>>,
    signal: MicSignal,
    paced: bool,
    speaker: Arc<Mutex<SpeakerStats>>,
}

impl SimulatedHardware {
    pub fn new(signal: MicSignal) -> Self {
        Self {
            held: Arc::new(Mutex::new(HashSet::new())),
            signal,
            paced: true,
            speaker: Arc::new(Mutex::new(SpeakerStats::default())),
        }
    }

    /// Deliver and accept data as fast as the caller asks, ignoring the clock.
    pub fn without_pacing(mut self) -> Self {
        self.paced = false;
        self
    }

    pub fn speaker_stats(&self) -> SpeakerStats {
        *self.speaker.lock()
    }
}

impl AudioHardware for SimulatedHardware {
    type Device = SimulatedChannel;

    fn open(&self, role: DeviceRole, format: AudioFormat, pins: &I2sPins) -> Result<SimulatedChannel, RecorderError> {
        format.validate().map_err(RecorderError::HardwareInitFailure)?;
        if !self.held.lock().insert(role) {
            return Err(RecorderError::HardwareInitFailure(format!(
                "{:?} channel already in use",
                role
            )));
        }
        log::debug!(
            "Opened simulated {:?} channel at {} (bclk {}, ws {}, data {})",
            role,
            format,
            pins.bclk,
            pins.ws,
            pins.data
        );
        Ok(SimulatedChannel {
            role,
            format,
            enabled_at: None,
            frames: 0,
            phase: 0.0,
            signal: self.signal,
            paced: self.paced,
            held: Arc::clone(&self.held),
            speaker: Arc::clone(&self.speaker),
        })
    }
}

/// One simulated capture or render channel.
pub struct SimulatedChannel {
    role: DeviceRole,
    format: AudioFormat,
    /// Clock origin for pacing; `None` while disabled.
    enabled_at: Option<Instant>,
    frames: u64,
    phase: f64,
    signal: MicSignal,
    paced: bool,
    held: Arc<Mutex<HashSet<DeviceRole>>>,
    speaker: Arc<Mutex<SpeakerStats>>,
}

impl SimulatedChannel {
    fn require(&self, role: DeviceRole) -> Result<Instant, RecorderError> {
        if self.role != role {
            return Err(RecorderError::DeviceFailure(format!(
                "{:?} channel used for {:?}",
                self.role, role
            )));
        }
        self.enabled_at
            .ok_or_else(|| RecorderError::DeviceFailure(format!("{:?} channel not enabled", self.role)))
    }

    /// How long until `frames` more frames are due on the channel clock.
    fn wait_for(&self, origin: Instant, frames: u64) -> Duration {
        let due = origin + Duration::from_secs_f64((self.frames + frames) as f64 / self.format.sample_rate as f64);
        due.saturating_duration_since(Instant::now())
    }

    fn next_word(&mut self) -> i32 {
        match self.signal {
            MicSignal::Silence => 0,
            MicSignal::Tone {
                frequency_hz,
                amplitude,
            } => {
                let sample = (self.phase.sin() * amplitude.clamp(0.0, 1.0) * FULL_SCALE_24) as i32;
                self.phase = (self.phase + TAU * frequency_hz / self.format.sample_rate as f64) % TAU;
                sample << 8
            }
        }
    }
}

impl AudioDevice for SimulatedChannel {
    fn role(&self) -> DeviceRole {
        self.role
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn is_enabled(&self) -> bool {
        self.enabled_at.is_some()
    }

    fn enable(&mut self) -> Result<(), RecorderError> {
        if self.enabled_at.is_none() {
            self.enabled_at = Some(Instant::now());
            self.frames = 0;
        }
        Ok(())
    }

    fn disable(&mut self) -> Result<(), RecorderError> {
        self.enabled_at = None;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, RecorderError> {
        let origin = self.require(DeviceRole::Capture)?;
        let frames = buf.len() / self.format.block_align() as usize;
        if frames == 0 {
            return Ok(0);
        }

        if self.paced {
            let wait = self.wait_for(origin, frames as u64);
            if wait > timeout {
                thread::sleep(timeout);
                return Ok(0);
            }
            thread::sleep(wait);
        }

        for slot in buf.chunks_exact_mut(4).take(frames) {
            slot.copy_from_slice(&self.next_word().to_le_bytes());
        }
        self.frames += frames as u64;
        Ok(frames * 4)
    }

    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, RecorderError> {
        let origin = self.require(DeviceRole::Render)?;
        let frames = buf.len() / 2;
        if frames == 0 {
            return Ok(0);
        }

        if self.paced {
            let wait = self.wait_for(origin, 0).saturating_sub(RENDER_QUEUE_LEAD);
            if wait > timeout {
                thread::sleep(timeout);
                return Ok(0);
            }
            thread::sleep(wait);
        }

        let peak = buf
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]).unsigned_abs())
            .max()
            .unwrap_or(0);
        let mut stats = self.speaker.lock();
        stats.samples += frames as u64;
        stats.peak = stats.peak.max(peak);
        drop(stats);

        self.frames += frames as u64;
        Ok(frames * 2)
    }

    fn set_sample_rate(&mut self, sample_rate: u32) -> Result<(), RecorderError> {
        if self.is_enabled() {
            return Err(RecorderError::InvalidState(
                "clock can only change while the channel is disabled".into(),
            ));
        }
        if sample_rate == 0 {
            return Err(RecorderError::HardwareInitFailure("sample rate must be positive".into()));
        }
        log::debug!("Simulated {:?} clock -> {} Hz", self.role, sample_rate);
        self.format.sample_rate = sample_rate;
        Ok(())
    }
}

impl Drop for SimulatedChannel {
    fn drop(&mut self) {
        self.held.lock().remove(&self.role);
    }
}
