use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::audio_format::AudioFormat;
use crate::models::config::RecorderConfiguration;
use crate::models::error::RecorderError;
use crate::processing::pcm_codec::PcmCodec;
use crate::storage::wav_reader::WavReader;
use crate::traits::audio_device::{AudioDevice, AudioHardware, DeviceRole};

/// Consecutive zero-length writes tolerated before the speaker counts as stuck.
const MAX_STALLED_WRITES: u32 = 3;

/// Summary of one finished playback.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackReport {
    pub file_path: PathBuf,
    /// Format declared by the file.
    pub source_format: AudioFormat,
    /// Mono samples handed to the speaker.
    pub samples_played: u64,
    /// Whether the speaker clock had to change for this file.
    pub reconfigured: bool,
}

impl PlaybackReport {
    pub fn duration_secs(&self) -> f64 {
        if self.source_format.sample_rate == 0 {
            return 0.0;
        }
        self.samples_played as f64 / self.source_format.sample_rate as f64
    }
}

/// WAV → codec → speaker playback.
///
/// ```text
/// [WavReader::read_block] → [PcmCodec::render_block (mixdown, volume)] → [Render channel]
/// ```
///
/// Owns the render channel for its whole lifetime; the channel stays enabled
/// between files and is only re-clocked when a file's rate differs.
pub struct Player<D: AudioDevice> {
    device: D,
    codec: PcmCodec,
    block_bytes: usize,
    write_timeout: Duration,
}

impl<D: AudioDevice> Player<D> {
    /// Open the render channel at the configured default rate. The channel
    /// is left disabled until the first file plays.
    pub fn open<H>(hardware: &H, config: &RecorderConfiguration) -> Result<Self, RecorderError>
    where
        H: AudioHardware<Device = D>,
    {
        let format = AudioFormat::pcm16_mono(config.playback_sample_rate);
        let device = hardware.open(DeviceRole::Render, format, &config.playback_pins)?;
        log::debug!("Render channel opened at {}", format);
        Ok(Self::with_device(device, config))
    }

    pub fn with_device(device: D, config: &RecorderConfiguration) -> Self {
        Self {
            device,
            codec: PcmCodec::new(config.capture_source_width, config.capture_shift, config.volume),
            block_bytes: config.playback_block_bytes,
            write_timeout: config.write_timeout(),
        }
    }

    pub fn volume(&self) -> f32 {
        self.codec.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.codec.volume = volume.max(0.0);
    }

    /// Rate the speaker is currently clocked for.
    pub fn output_rate(&self) -> u32 {
        self.device.format().sample_rate
    }

    /// Play a WAV file to completion, blocking the caller.
    ///
    /// The header is validated before the speaker is touched. A mid-stream
    /// device failure aborts without draining.
    pub fn play(&mut self, path: &Path) -> Result<PlaybackReport, RecorderError> {
        let mut reader = WavReader::open(path)?;
        let source_format = reader.header().ensure_playable()?;

        let reconfigured = source_format.sample_rate != self.device.format().sample_rate;
        if reconfigured {
            log::info!(
                "Reconfiguring speaker clock {} -> {} Hz",
                self.device.format().sample_rate,
                source_format.sample_rate
            );
            self.device
                .reconfigure_clock(source_format.sample_rate)
                .map_err(into_device_failure)?;
        }
        if !self.device.is_enabled() {
            self.device.enable().map_err(into_device_failure)?;
        }

        log::info!("Playing {} ({})", path.display(), source_format);

        let mut block = vec![0u8; self.block_bytes];
        let mut out = Vec::with_capacity(self.block_bytes);
        let mut samples_played = 0u64;
        loop {
            let n = reader.read_block(&mut block)?;
            if n == 0 {
                break;
            }
            out.clear();
            let samples = self.codec.render_block(&block[..n], source_format.channels, &mut out);
            self.write_all(&out)?;
            samples_played += samples as u64;
        }

        self.device.drain().map_err(into_device_failure)?;
        log::debug!("Playback finished: {} samples", samples_played);

        Ok(PlaybackReport {
            file_path: path.to_path_buf(),
            source_format,
            samples_played,
            reconfigured,
        })
    }

    fn write_all(&mut self, mut buf: &[u8]) -> Result<(), RecorderError> {
        let mut stalled = 0;
        while !buf.is_empty() {
            match self.device.write(buf, self.write_timeout) {
                Ok(0) => {
                    stalled += 1;
                    log::debug!("Speaker write timed out ({}/{})", stalled, MAX_STALLED_WRITES);
                }
                Ok(n) => {
                    stalled = 0;
                    buf = &buf[n.min(buf.len())..];
                }
                Err(e) if e.is_retryable() => stalled += 1,
                Err(e) => {
                    log::error!("Speaker write failed: {}", e);
                    return Err(into_device_failure(e));
                }
            }
            if stalled >= MAX_STALLED_WRITES {
                return Err(RecorderError::DeviceFailure("speaker stopped accepting data".into()));
            }
        }
        Ok(())
    }
}

fn into_device_failure(err: RecorderError) -> RecorderError {
    match err {
        RecorderError::DeviceFailure(_) => err,
        other => RecorderError::DeviceFailure(other.to_string()),
    }
}
