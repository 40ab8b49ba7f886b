use serde::{Deserialize, Serialize};

/// PCM stream layout shared by a capture or playback session.
///
/// Immutable for the lifetime of the session that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
}

impl AudioFormat {
    pub const fn new(sample_rate: u32, bits_per_sample: u16, channels: u16) -> Self {
        Self {
            sample_rate,
            bits_per_sample,
            channels,
        }
    }

    /// 16-bit mono at `sample_rate`, the layout written to disk and sent to the speaker.
    pub const fn pcm16_mono(sample_rate: u32) -> Self {
        Self::new(sample_rate, 16, 1)
    }

    /// Bytes per frame (one sample across all channels).
    ///
    /// Saturates at `u16::MAX` for layouts a parsed header can describe but
    /// [`AudioFormat::validate`] would reject.
    pub fn block_align(&self) -> u16 {
        let bytes = u32::from(self.channels) * u32::from(self.bits_per_sample) / 8;
        u16::try_from(bytes).unwrap_or(u16::MAX)
    }

    /// Bytes per second of audio, saturating at `u32::MAX`.
    pub fn byte_rate(&self) -> u32 {
        let bytes = u64::from(self.sample_rate) * u64::from(self.block_align());
        u32::try_from(bytes).unwrap_or(u32::MAX)
    }

    /// Duration in seconds of `data_bytes` bytes of payload.
    pub fn duration_secs(&self, data_bytes: u64) -> f64 {
        let byte_rate = self.byte_rate();
        if byte_rate == 0 {
            return 0.0;
        }
        data_bytes as f64 / byte_rate as f64
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![16, 32].contains(&self.bits_per_sample) {
            return Err(format!("unsupported bit depth: {}", self.bits_per_sample));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        Ok(())
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz, {} bit, {} ch",
            self.sample_rate, self.bits_per_sample, self.channels
        )
    }
}
