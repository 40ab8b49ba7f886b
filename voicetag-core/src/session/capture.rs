use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::audio_format::AudioFormat;
use crate::models::card::CardUid;
use crate::models::config::RecorderConfiguration;
use crate::models::error::RecorderError;
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::processing::pcm_codec::{PcmCodec, RAW_WORD_BYTES};
use crate::storage::metadata;
use crate::storage::wav_writer::{FinalizedWav, WavWriter};
use crate::traits::audio_device::{AudioDevice, AudioHardware, DeviceRole};

/// A recording whose streaming thread has been spawned.
struct ActiveCapture {
    file_path: PathBuf,
    card: Option<CardUid>,
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<StreamOutcome>,
}

/// What the streaming thread hands back when it exits.
struct StreamOutcome {
    finalized: Result<FinalizedWav, RecorderError>,
    failure: Option<RecorderError>,
    blocks_written: u64,
    blocks_dropped: u64,
}

/// Microphone → codec → WAV capture pipeline.
///
/// ```text
/// [Capture channel] → read(block, timeout) → [PcmCodec::encode_block] → [WavWriter::append]
/// ```
///
/// The streaming loop runs on its own thread and polls a stop flag between
/// blocks, so a stop is observed within one read timeout plus one block. The
/// `active` mutex guards the check-and-set of "is recording" and is held
/// across the stop/join so the disable + finalize sequence runs exactly once.
pub struct CapturePipeline<H: AudioHardware> {
    hardware: Arc<H>,
    config: RecorderConfiguration,
    codec: PcmCodec,
    active: Mutex<Option<ActiveCapture>>,
}

impl<H: AudioHardware> CapturePipeline<H> {
    pub fn new(hardware: Arc<H>, config: RecorderConfiguration) -> Self {
        let codec = PcmCodec::new(config.capture_source_width, config.capture_shift, config.volume);
        Self {
            hardware,
            config,
            codec,
            active: Mutex::new(None),
        }
    }

    /// Raw layout delivered by the microphone slot.
    pub fn device_format(&self) -> AudioFormat {
        AudioFormat::new(self.config.capture_sample_rate, 32, 1)
    }

    /// Layout written to disk.
    pub fn file_format(&self) -> AudioFormat {
        AudioFormat::pcm16_mono(self.config.capture_sample_rate)
    }

    /// Whether a streaming thread is currently running.
    pub fn is_recording(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .map_or(false, |capture| !capture.handle.is_finished())
    }

    /// Whether a recording ended by itself (max duration, device failure) and
    /// is waiting for [`CapturePipeline::stop`] to collect its result.
    pub fn has_finished_capture(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .map_or(false, |capture| capture.handle.is_finished())
    }

    /// Path of the file being recorded, if any.
    pub fn active_file(&self) -> Option<PathBuf> {
        self.active.lock().as_ref().map(|capture| capture.file_path.clone())
    }

    /// Open the microphone and the destination file, then spawn the streaming loop.
    ///
    /// Transitions idle → recording. Nothing is left behind on failure.
    ///
    /// A previous recording that ended by itself and was never collected
    /// through [`CapturePipeline::stop`] is finalized here and returned, so
    /// the caller can still report it. `Ok(None)` means there was none.
    pub fn start(
        &self,
        file_path: PathBuf,
        card: Option<CardUid>,
    ) -> Result<Option<RecordingResult>, RecorderError> {
        let mut active = self.active.lock();
        if let Some(current) = active.as_ref() {
            if !current.handle.is_finished() {
                return Err(RecorderError::AlreadyRecording);
            }
        }
        let previous = match active.take().map(|finished| self.collect(finished)) {
            Some(Ok(result)) => {
                log::info!("Collected self-terminated recording {}", result.file_path.display());
                Some(result)
            }
            Some(Err(e)) => {
                log::warn!("Previous recording ended with error: {}", e);
                None
            }
            None => None,
        };

        let mut device = self
            .hardware
            .open(DeviceRole::Capture, self.device_format(), &self.config.capture_pins)?;

        let writer = WavWriter::open_for_write(&file_path, self.file_format())?;

        if let Err(e) = device.enable() {
            abandon(writer);
            return Err(match e {
                RecorderError::HardwareInitFailure(_) => e,
                other => RecorderError::HardwareInitFailure(other.to_string()),
            });
        }

        let stop = Arc::new(AtomicBool::new(false));
        let loop_stop = Arc::clone(&stop);
        let codec = self.codec.clone();
        let block_bytes = self.config.capture_block_bytes;
        let read_timeout = self.config.read_timeout();
        let max_data_bytes = self
            .config
            .max_duration_secs
            .map(|secs| max_payload_bytes(self.file_format(), secs));
        let spawn_path = file_path.clone();

        let handle = thread::Builder::new()
            .name("capture-stream".into())
            .spawn(move || stream(device, writer, codec, loop_stop, block_bytes, read_timeout, max_data_bytes))
            .map_err(|e| {
                let _ = fs::remove_file(&spawn_path);
                RecorderError::IoFailure(format!("failed to spawn capture thread: {}", e))
            })?;

        log::info!("Recording started -> {}", file_path.display());
        *active = Some(ActiveCapture {
            file_path,
            card,
            stop,
            handle,
        });
        Ok(previous)
    }

    /// Signal the streaming loop, wait for it to disable the channel and
    /// finalize the file, and return the result.
    ///
    /// Returns `Ok(None)` when nothing is recording. Concurrent callers
    /// serialize on the session lock; only the first one sees the result.
    pub fn stop(&self) -> Result<Option<RecordingResult>, RecorderError> {
        let mut active = self.active.lock();
        let Some(capture) = active.take() else {
            log::debug!("Stop requested while not recording");
            return Ok(None);
        };
        capture.stop.store(true, Ordering::Release);
        self.collect(capture).map(Some)
    }

    /// Join the streaming thread and turn its outcome into a `RecordingResult`.
    fn collect(&self, capture: ActiveCapture) -> Result<RecordingResult, RecorderError> {
        let outcome = capture
            .handle
            .join()
            .map_err(|_| RecorderError::DeviceFailure("capture thread panicked".into()))?;

        let finalized = outcome.finalized?;
        log::info!(
            "Recording stopped: {} ({} data bytes, {} blocks, {} dropped)",
            finalized.file_path.display(),
            finalized.data_size,
            outcome.blocks_written,
            outcome.blocks_dropped
        );

        let metadata = RecordingMetadata::new(
            capture.card.as_ref(),
            finalized.format,
            finalized.data_size,
            &finalized.file_path.to_string_lossy(),
            &finalized.checksum,
        );
        if self.config.write_metadata {
            if let Err(e) = metadata::write_metadata(&metadata, &finalized.file_path) {
                log::warn!("Failed to write metadata sidecar: {}", e);
            }
        }

        Ok(RecordingResult {
            file_path: finalized.file_path,
            duration_secs: metadata.duration_secs,
            data_size: finalized.data_size,
            checksum: finalized.checksum,
            metadata,
            interrupted: outcome.failure,
        })
    }
}

impl<H: AudioHardware> Drop for CapturePipeline<H> {
    fn drop(&mut self) {
        if let Some(capture) = self.active.get_mut().take() {
            capture.stop.store(true, Ordering::Release);
            if capture.handle.join().is_err() {
                log::error!("Capture thread panicked during teardown");
            }
        }
    }
}

/// Streaming loop body; owns the device, the writer and the byte counter.
fn stream<D: AudioDevice>(
    mut device: D,
    mut writer: WavWriter,
    codec: PcmCodec,
    stop: Arc<AtomicBool>,
    block_bytes: usize,
    read_timeout: Duration,
    max_data_bytes: Option<u64>,
) -> StreamOutcome {
    let mut raw = vec![0u8; block_bytes];
    let mut pcm = Vec::with_capacity(block_bytes / 2);
    let mut pending = 0usize;
    let mut failure = None;
    let mut blocks_written = 0u64;
    let mut blocks_dropped = 0u64;

    while !stop.load(Ordering::Acquire) {
        if let Some(max) = max_data_bytes {
            if writer.data_bytes() >= max {
                log::info!("Maximum recording duration reached");
                break;
            }
        }

        let n = match device.read(&mut raw[pending..], read_timeout) {
            Ok(0) => {
                log::debug!("Capture read timed out, retrying");
                continue;
            }
            Ok(n) => n,
            Err(e) if e.is_retryable() => continue,
            Err(e) => {
                log::error!("Capture device failed: {}", e);
                failure = Some(e);
                break;
            }
        };

        // Keep a split word for the next read so slots stay aligned.
        let filled = pending + n;
        let whole = filled - filled % RAW_WORD_BYTES;
        pcm.clear();
        codec.encode_block(&raw[..whole], &mut pcm);
        raw.copy_within(whole..filled, 0);
        pending = filled - whole;

        if let Some(max) = max_data_bytes {
            let allowed = max.saturating_sub(writer.data_bytes()) as usize;
            pcm.truncate(allowed.min(pcm.len()) & !1);
        }

        match writer.append(&pcm) {
            Ok(()) => blocks_written += 1,
            Err(e) => {
                blocks_dropped += 1;
                log::warn!("Dropped {} byte capture block: {}", pcm.len(), e);
            }
        }
    }

    if let Err(e) = device.disable() {
        log::warn!("Failed to disable capture channel: {}", e);
    }
    drop(device);

    StreamOutcome {
        finalized: writer.finalize(),
        failure,
        blocks_written,
        blocks_dropped,
    }
}

/// Payload bytes that fit in `secs` seconds, rounded down to whole frames.
fn max_payload_bytes(format: AudioFormat, secs: f64) -> u64 {
    let align = format.block_align().max(1) as u64;
    let bytes = (format.byte_rate() as f64 * secs) as u64;
    bytes - bytes % align
}

/// Drop a writer for a recording that never started and remove its file.
fn abandon(writer: WavWriter) {
    let path: PathBuf = writer.file_path().to_path_buf();
    drop(writer);
    remove_quietly(&path);
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::warn!("Failed to remove {}: {}", path.display(), e);
    }
}
