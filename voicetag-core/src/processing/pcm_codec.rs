//! Sample conversion between the I2S bus and 16-bit PCM.
//!
//! Capture: each microphone slot is a 32-bit word. The INMP441 puts a 24-bit
//! sample left-justified in that word; the codec rescales it into `i16` with a
//! fixed right shift.
//!
//! Playback: 16-bit PCM from a file is scaled by a static volume and, for
//! stereo files, averaged down to the mono speaker channel.

use serde::{Deserialize, Serialize};

/// Right shift that maps the INMP441's left-justified 24-bit output into the
/// 16-bit range at the reference board's gain. Measured, not derived: a
/// different microphone or gain needs a different value.
pub const DEFAULT_CAPTURE_SHIFT: u32 = 11;

/// Playback gain used when none is configured.
pub const DEFAULT_VOLUME: f32 = 0.6;

/// Bytes per raw capture word.
pub const RAW_WORD_BYTES: usize = 4;

/// Layout of the sample inside a 32-bit capture slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceWidth {
    /// 24 significant bits, left-justified; rescaled by the calibration shift.
    #[default]
    LeftJustified24,
    /// Full 32-bit MSB-first sample; the top 16 bits are kept.
    Msb32,
}

/// Pure-math sample converter. Cheap to clone into worker threads.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmCodec {
    pub source_width: SourceWidth,
    pub capture_shift: u32,
    pub volume: f32,
}

impl PcmCodec {
    pub fn new(source_width: SourceWidth, capture_shift: u32, volume: f32) -> Self {
        Self {
            source_width,
            capture_shift,
            volume,
        }
    }

    /// Convert one raw capture word to a 16-bit sample.
    pub fn encode(&self, raw: i32) -> i16 {
        let shift = match self.source_width {
            SourceWidth::LeftJustified24 => self.capture_shift,
            SourceWidth::Msb32 => 16,
        };
        clamp_i16((raw >> shift.min(31)) as i64)
    }

    /// Convert a block of little-endian raw capture words, appending
    /// little-endian 16-bit PCM to `out`.
    ///
    /// A trailing partial word is ignored. Returns the number of samples appended.
    pub fn encode_block(&self, raw: &[u8], out: &mut Vec<u8>) -> usize {
        let words = raw.len() / RAW_WORD_BYTES;
        out.reserve(words * 2);
        for word in raw.chunks_exact(RAW_WORD_BYTES) {
            let sample = i32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            out.extend_from_slice(&self.encode(sample).to_le_bytes());
        }
        words
    }

    /// Average a stereo frame into one sample and apply the volume.
    ///
    /// Takes `i32` so out-of-range inputs still land inside `i16`.
    pub fn mix(&self, left: i32, right: i32) -> i16 {
        let mixed = (left as f64 + right as f64) * 0.5 * self.volume as f64;
        clamp_i16(mixed.round() as i64)
    }

    /// Apply the volume to a mono sample.
    pub fn scale(&self, sample: i32) -> i16 {
        let scaled = sample as f64 * self.volume as f64;
        clamp_i16(scaled.round() as i64)
    }

    /// Convert a block of 16-bit PCM with `channels` interleaved channels into
    /// mono 16-bit PCM for the speaker, appending to `out`.
    ///
    /// A trailing partial frame is ignored. Returns the number of samples appended.
    pub fn render_block(&self, pcm: &[u8], channels: u16, out: &mut Vec<u8>) -> usize {
        match channels {
            2 => {
                let frames = pcm.len() / 4;
                out.reserve(frames * 2);
                for frame in pcm.chunks_exact(4) {
                    let left = i16::from_le_bytes([frame[0], frame[1]]);
                    let right = i16::from_le_bytes([frame[2], frame[3]]);
                    out.extend_from_slice(&self.mix(left as i32, right as i32).to_le_bytes());
                }
                frames
            }
            1 => {
                let samples = pcm.len() / 2;
                out.reserve(samples * 2);
                for bytes in pcm.chunks_exact(2) {
                    let sample = i16::from_le_bytes([bytes[0], bytes[1]]);
                    out.extend_from_slice(&self.scale(sample as i32).to_le_bytes());
                }
                samples
            }
            _ => 0,
        }
    }
}

impl Default for PcmCodec {
    fn default() -> Self {
        Self::new(SourceWidth::LeftJustified24, DEFAULT_CAPTURE_SHIFT, DEFAULT_VOLUME)
    }
}

fn clamp_i16(value: i64) -> i16 {
    value.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(pcm: &[u8]) -> Vec<i16> {
        pcm.chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn encode_applies_calibration_shift() {
        let codec = PcmCodec::default();
        // 24-bit sample 0x001000 left-justified → 0x00100000
        assert_eq!(codec.encode(0x0010_0000), 0x0200);
        assert_eq!(codec.encode(-0x0010_0000), -0x0200);
        assert_eq!(codec.encode(0), 0);
    }

    #[test]
    fn encode_clamps_extremes() {
        let codec = PcmCodec::default();
        assert_eq!(codec.encode(i32::MAX), i16::MAX);
        assert_eq!(codec.encode(i32::MIN), i16::MIN);
    }

    #[test]
    fn encode_msb32_keeps_top_half() {
        let codec = PcmCodec::new(SourceWidth::Msb32, DEFAULT_CAPTURE_SHIFT, 1.0);
        assert_eq!(codec.encode(0x1234_5678), 0x1234);
        assert_eq!(codec.encode(i32::MIN), i16::MIN);
    }

    #[test]
    fn encode_block_ignores_partial_word() {
        let codec = PcmCodec::default();
        let mut raw = Vec::new();
        raw.extend_from_slice(&(0x0010_0000i32).to_le_bytes());
        raw.extend_from_slice(&(-0x0020_0000i32).to_le_bytes());
        raw.extend_from_slice(&[0xFF, 0xFF]);

        let mut out = Vec::new();
        assert_eq!(codec.encode_block(&raw, &mut out), 2);
        assert_eq!(samples(&out), vec![0x0200, -0x0400]);
    }

    #[test]
    fn empty_blocks_are_noops() {
        let codec = PcmCodec::default();
        let mut out = Vec::new();
        assert_eq!(codec.encode_block(&[], &mut out), 0);
        assert_eq!(codec.encode_block(&[1, 2, 3], &mut out), 0);
        assert_eq!(codec.render_block(&[], 2, &mut out), 0);
        assert_eq!(codec.render_block(&[7], 1, &mut out), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn mix_of_equal_channels_is_lossless_at_unity() {
        let codec = PcmCodec::new(SourceWidth::LeftJustified24, DEFAULT_CAPTURE_SHIFT, 1.0);
        for sample in [i16::MIN, -12345, -1, 0, 1, 777, i16::MAX] {
            assert_eq!(codec.mix(sample as i32, sample as i32), sample);
        }
    }

    #[test]
    fn mix_and_scale_stay_in_range_for_i32_extremes() {
        for volume in [0.6, 1.0, 4.0] {
            let codec = PcmCodec::new(SourceWidth::LeftJustified24, DEFAULT_CAPTURE_SHIFT, volume);
            for a in [i32::MIN, i32::MAX, 0] {
                for b in [i32::MIN, i32::MAX, 0] {
                    let mixed = codec.mix(a, b) as i32;
                    assert!((-32768..=32767).contains(&mixed));
                }
                let scaled = codec.scale(a) as i32;
                assert!((-32768..=32767).contains(&scaled));
            }
            assert_eq!(codec.scale(i32::MAX), i16::MAX);
            assert_eq!(codec.scale(i32::MIN), i16::MIN);
        }
    }

    #[test]
    fn scale_rounds_to_nearest() {
        let codec = PcmCodec::default();
        assert_eq!(codec.scale(1000), 600);
        assert_eq!(codec.scale(5), 3); // 3.0
        assert_eq!(codec.scale(3), 2); // 1.8
        assert_eq!(codec.scale(-3), -2);
    }

    #[test]
    fn render_block_downmixes_stereo() {
        let codec = PcmCodec::new(SourceWidth::LeftJustified24, DEFAULT_CAPTURE_SHIFT, 1.0);
        let mut pcm = Vec::new();
        for s in [100i16, 300, -200, -400] {
            pcm.extend_from_slice(&s.to_le_bytes());
        }
        let mut out = Vec::new();
        assert_eq!(codec.render_block(&pcm, 2, &mut out), 2);
        assert_eq!(samples(&out), vec![200, -300]);
    }

    #[test]
    fn render_block_scales_mono() {
        let codec = PcmCodec::default();
        let mut pcm = Vec::new();
        for s in [1000i16, -1000, 32767] {
            pcm.extend_from_slice(&s.to_le_bytes());
        }
        let mut out = Vec::new();
        assert_eq!(codec.render_block(&pcm, 1, &mut out), 3);
        assert_eq!(samples(&out), vec![600, -600, 19660]);
    }
}
