/// WAV file format utilities.
///
/// Generates standard 44-byte RIFF WAV headers, patches their size fields once
/// the payload length is known, and parses headers back for playback.
use std::io::{Read, Seek, SeekFrom};

use crate::models::audio_format::AudioFormat;
use crate::models::error::RecorderError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Offset of the RIFF chunk size field.
pub const RIFF_SIZE_OFFSET: u64 = 4;

/// Offset of the data chunk size field in a canonical header.
pub const DATA_SIZE_OFFSET: u64 = 40;

/// Largest payload a 32-bit RIFF size field can describe.
pub const MAX_DATA_SIZE: u64 = u32::MAX as u64 - 36;

/// Format code for linear PCM.
pub const WAVE_FORMAT_PCM: u16 = 1;

/// Data size written by streaming encoders that never come back to patch it.
pub const UNKNOWN_LENGTH: u32 = 0xFFFF_FFFF;

/// Generate a 44-byte WAV RIFF header.
///
/// Format: PCM (format code 1), little-endian.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    chunk size = 36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bits / 8
/// [32-33]  block_align = channels * bits / 8
/// [34-35]  bits_per_sample
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(format: &AudioFormat, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let chunk_size = data_size.wrapping_add(36);

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&format.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Parsed header of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// Format code from the `fmt ` chunk (1 = PCM).
    pub audio_format: u16,
    pub format: AudioFormat,
    pub riff_size: u32,
    /// Data size as declared by the header; may be a placeholder.
    pub declared_data_size: u32,
    /// Byte offset of the first payload byte.
    pub data_offset: u64,
}

impl WavHeader {
    /// Whether the declared size cannot be trusted (unpatched or streaming header).
    pub fn has_indeterminate_length(&self) -> bool {
        self.declared_data_size == 0 || self.declared_data_size == UNKNOWN_LENGTH
    }

    /// Accept only 16-bit linear PCM with one or two channels.
    pub fn ensure_playable(&self) -> Result<AudioFormat, RecorderError> {
        if self.audio_format != WAVE_FORMAT_PCM {
            return Err(RecorderError::FormatUnsupported(format!(
                "format code {} is not linear PCM",
                self.audio_format
            )));
        }
        if self.format.bits_per_sample != 16 {
            return Err(RecorderError::FormatUnsupported(format!(
                "{} bit samples, only 16 bit is supported",
                self.format.bits_per_sample
            )));
        }
        if ![1, 2].contains(&self.format.channels) {
            return Err(RecorderError::FormatUnsupported(format!(
                "{} channels, only mono or stereo is supported",
                self.format.channels
            )));
        }
        if self.format.sample_rate == 0 {
            return Err(RecorderError::FormatUnsupported("sample rate is zero".into()));
        }
        Ok(self.format)
    }
}

/// Read a RIFF/WAVE header, walking chunks until `data` is found.
///
/// Unknown chunks (`LIST`, `fact`, ...) are skipped. On success the reader is
/// positioned at the first payload byte.
pub fn read_wav_header<R: Read + Seek>(reader: &mut R) -> Result<WavHeader, RecorderError> {
    let mut riff = [0u8; 12];
    reader
        .read_exact(&mut riff)
        .map_err(|_| RecorderError::FormatUnsupported("file too short for a RIFF header".into()))?;
    if &riff[0..4] != b"RIFF" || &riff[8..12] != b"WAVE" {
        return Err(RecorderError::FormatUnsupported("not a RIFF/WAVE file".into()));
    }
    let riff_size = u32::from_le_bytes([riff[4], riff[5], riff[6], riff[7]]);

    let mut fmt: Option<(u16, AudioFormat)> = None;
    let mut position = 12u64;

    loop {
        let mut chunk = [0u8; 8];
        reader
            .read_exact(&mut chunk)
            .map_err(|_| RecorderError::FormatUnsupported("missing data chunk".into()))?;
        position += 8;
        let id = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);

        match &id {
            b"fmt " => {
                if size < 16 {
                    return Err(RecorderError::FormatUnsupported(format!(
                        "fmt chunk too small: {} bytes",
                        size
                    )));
                }
                let mut body = [0u8; 16];
                reader
                    .read_exact(&mut body)
                    .map_err(|_| RecorderError::FormatUnsupported("truncated fmt chunk".into()))?;
                let audio_format = u16::from_le_bytes([body[0], body[1]]);
                let channels = u16::from_le_bytes([body[2], body[3]]);
                let sample_rate = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
                let bits_per_sample = u16::from_le_bytes([body[14], body[15]]);
                fmt = Some((
                    audio_format,
                    AudioFormat::new(sample_rate, bits_per_sample, channels),
                ));
                position += 16;
                position = skip_chunk_rest(reader, position, size as u64 - 16)?;
            }
            b"data" => {
                let (audio_format, format) = fmt.ok_or_else(|| {
                    RecorderError::FormatUnsupported("data chunk before fmt chunk".into())
                })?;
                return Ok(WavHeader {
                    audio_format,
                    format,
                    riff_size,
                    declared_data_size: size,
                    data_offset: position,
                });
            }
            _ => {
                position = skip_chunk_rest(reader, position, size as u64)?;
            }
        }
    }
}

/// Skip `remaining` bytes plus the RIFF pad byte for odd-sized chunks.
fn skip_chunk_rest<R: Seek>(reader: &mut R, position: u64, remaining: u64) -> Result<u64, RecorderError> {
    let padded = remaining + (remaining & 1);
    let target = position + padded;
    reader
        .seek(SeekFrom::Start(target))
        .map_err(|e| RecorderError::io("failed to skip chunk", e))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn le_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
    }

    #[test]
    fn header_riff_magic() {
        let header = generate_wav_header(&AudioFormat::pcm16_mono(48000), 0);
        assert_eq!(header.len(), 44);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
    }

    #[test]
    fn header_48khz_stereo_16bit() {
        let header = generate_wav_header(&AudioFormat::new(48000, 16, 2), 9600);

        assert_eq!(u16::from_le_bytes([header[20], header[21]]), 1);
        assert_eq!(u16::from_le_bytes([header[22], header[23]]), 2);
        assert_eq!(le_u32(&header, 24), 48000);
        assert_eq!(le_u32(&header, 28), 192000);
        assert_eq!(u16::from_le_bytes([header[32], header[33]]), 4);
        assert_eq!(u16::from_le_bytes([header[34], header[35]]), 16);
        assert_eq!(le_u32(&header, 40), 9600);
        assert_eq!(le_u32(&header, 4), 36 + 9600);
    }

    #[test]
    fn parse_canonical_header() {
        let format = AudioFormat::new(44100, 16, 2);
        let mut bytes = generate_wav_header(&format, 8).to_vec();
        bytes.extend_from_slice(&[0u8; 8]);

        let mut cursor = Cursor::new(bytes);
        let header = read_wav_header(&mut cursor).unwrap();
        assert_eq!(header.format, format);
        assert_eq!(header.audio_format, 1);
        assert_eq!(header.declared_data_size, 8);
        assert_eq!(header.data_offset, 44);
        assert_eq!(cursor.position(), 44);
        assert_eq!(header.ensure_playable().unwrap(), format);
    }

    #[test]
    fn parse_skips_list_chunk_and_extended_fmt() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&18u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&22050u32.to_le_bytes());
        bytes.extend_from_slice(&44100u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes()); // cbSize
        bytes.extend_from_slice(b"LIST");
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 0]); // odd chunk + pad byte
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&4u32.to_le_bytes());
        let payload_at = bytes.len() as u64;
        bytes.extend_from_slice(&[9, 9, 9, 9]);

        let header = read_wav_header(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(header.format, AudioFormat::pcm16_mono(22050));
        assert_eq!(header.data_offset, payload_at);
    }

    #[test]
    fn rejects_non_pcm_and_wrong_depth() {
        let mut header = generate_wav_header(&AudioFormat::pcm16_mono(48000), 0);
        header[20..22].copy_from_slice(&2u16.to_le_bytes());
        let parsed = read_wav_header(&mut Cursor::new(header.to_vec())).unwrap();
        assert!(matches!(
            parsed.ensure_playable(),
            Err(RecorderError::FormatUnsupported(_))
        ));

        let header = generate_wav_header(&AudioFormat::new(48000, 32, 1), 0);
        let parsed = read_wav_header(&mut Cursor::new(header.to_vec())).unwrap();
        assert!(matches!(
            parsed.ensure_playable(),
            Err(RecorderError::FormatUnsupported(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        let err = read_wav_header(&mut Cursor::new(b"not a wav file at all".to_vec())).unwrap_err();
        assert!(matches!(err, RecorderError::FormatUnsupported(_)));

        let err = read_wav_header(&mut Cursor::new(vec![0u8; 44])).unwrap_err();
        assert!(matches!(err, RecorderError::FormatUnsupported(_)));
    }

    #[test]
    fn placeholder_sizes_are_indeterminate() {
        let format = AudioFormat::pcm16_mono(48000);
        for declared in [0, UNKNOWN_LENGTH] {
            let header = generate_wav_header(&format, declared);
            let parsed = read_wav_header(&mut Cursor::new(header.to_vec())).unwrap();
            assert!(parsed.has_indeterminate_length());
        }
        let header = generate_wav_header(&format, 100);
        let parsed = read_wav_header(&mut Cursor::new(header.to_vec())).unwrap();
        assert!(!parsed.has_indeterminate_length());
    }
}
