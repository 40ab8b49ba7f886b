use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::models::audio_format::AudioFormat;
use crate::models::error::RecorderError;
use crate::processing::wav_format::{self, WavHeader};

/// Streaming WAV reader: parses the header, then hands out the payload in
/// caller-sized blocks so memory stays bounded.
pub struct WavReader<R> {
    reader: R,
    header: WavHeader,
    /// Payload bytes left, or `None` when the header length is not trusted
    /// and the payload runs to end of file.
    remaining: Option<u64>,
}

impl WavReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, RecorderError> {
        let file = File::open(path).map_err(|e| RecorderError::io("failed to open file", e))?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> WavReader<R> {
    pub fn new(mut reader: R) -> Result<Self, RecorderError> {
        let header = wav_format::read_wav_header(&mut reader)?;

        let end = reader
            .seek(SeekFrom::End(0))
            .map_err(|e| RecorderError::io("failed to size file", e))?;
        reader
            .seek(SeekFrom::Start(header.data_offset))
            .map_err(|e| RecorderError::io("failed to seek to payload", e))?;

        let available = end.saturating_sub(header.data_offset);
        let remaining = if header.has_indeterminate_length() {
            log::warn!("WAV header has no usable data size, reading to end of file");
            None
        } else if header.declared_data_size as u64 > available {
            log::warn!(
                "WAV header declares {} data bytes but only {} are present",
                header.declared_data_size,
                available
            );
            None
        } else {
            Some(header.declared_data_size as u64)
        };

        Ok(Self {
            reader,
            header,
            remaining,
        })
    }

    pub fn header(&self) -> &WavHeader {
        &self.header
    }

    pub fn format(&self) -> AudioFormat {
        self.header.format
    }

    /// Fill `buf` with the next payload bytes. Returns 0 at end of payload.
    pub fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, RecorderError> {
        let limit = match self.remaining {
            Some(remaining) => (remaining.min(buf.len() as u64)) as usize,
            None => buf.len(),
        };

        let mut filled = 0;
        while filled < limit {
            match self.reader.read(&mut buf[filled..limit]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(RecorderError::io("failed to read payload", e)),
            }
        }

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= filled as u64;
        }
        Ok(filled)
    }
}

/// Read and validate a WAV header: only 16-bit linear PCM is playable.
pub fn read_header(path: &Path) -> Result<AudioFormat, RecorderError> {
    let reader = WavReader::open(path)?;
    reader.header().ensure_playable()
}
