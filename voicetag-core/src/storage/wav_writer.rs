use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::audio_format::AudioFormat;
use crate::models::error::RecorderError;
use crate::processing::wav_format::{self, DATA_SIZE_OFFSET, MAX_DATA_SIZE, RIFF_SIZE_OFFSET, WAV_HEADER_SIZE};

/// Streaming WAV file writer.
///
/// The data length is unknown while recording, so the header goes out with
/// zero size fields at open and is patched in place by [`WavWriter::finalize`].
///
/// ```text
/// [44-byte WAV header, sizes = 0 until finalize]
/// [raw 16-bit PCM data...]
/// ```
///
/// A writer dropped without `finalize` still patches the sizes on a best-effort
/// basis. A file whose writer never ran either (power loss) keeps zero sizes;
/// [`crate::storage::wav_reader::WavReader`] plays such files to end of file.
pub struct WavWriter {
    file_path: PathBuf,
    format: AudioFormat,
    file: Option<File>,
    data_bytes: u64,
}

/// Outcome of a successful [`WavWriter::finalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedWav {
    pub file_path: PathBuf,
    pub format: AudioFormat,
    pub data_size: u32,
    pub checksum: String,
}

impl WavWriter {
    /// Create the file and write the placeholder header.
    ///
    /// Never replaces an existing file: a path that is already taken fails
    /// with `IoFailure` and the file on disk is left as it was.
    pub fn open_for_write(file_path: impl Into<PathBuf>, format: AudioFormat) -> Result<Self, RecorderError> {
        let file_path = file_path.into();
        format.validate().map_err(RecorderError::ConfigurationFailed)?;

        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| RecorderError::io("failed to create directory", e))?;
            }
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file_path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    RecorderError::IoFailure(format!("{} already exists", file_path.display()))
                }
                _ => RecorderError::io("failed to create file", e),
            })?;

        let header = wav_format::generate_wav_header(&format, 0);
        file.write_all(&header)
            .map_err(|e| RecorderError::io("failed to write wav header", e))?;

        log::debug!("Opened {} for writing ({})", file_path.display(), format);

        Ok(Self {
            file_path,
            format,
            file: Some(file),
            data_bytes: 0,
        })
    }

    /// Append PCM bytes to the payload.
    ///
    /// On failure the file is rewound to the end of the last good append, so
    /// the byte counter always matches what is on disk.
    pub fn append(&mut self, pcm: &[u8]) -> Result<(), RecorderError> {
        if pcm.is_empty() {
            return Ok(());
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| RecorderError::IoFailure("file is not open for writing".into()))?;

        if self.data_bytes + pcm.len() as u64 > MAX_DATA_SIZE {
            return Err(RecorderError::IoFailure("wav data size limit reached".into()));
        }

        if let Err(e) = file.write_all(pcm) {
            let good_end = WAV_HEADER_SIZE as u64 + self.data_bytes;
            let _ = file.set_len(good_end);
            let _ = file.seek(SeekFrom::Start(good_end));
            return Err(RecorderError::io("write failed", e));
        }

        self.data_bytes += pcm.len() as u64;
        Ok(())
    }

    /// Patch the RIFF and data sizes, close the file, and checksum it.
    ///
    /// Fails if the writer was already finalized.
    pub fn finalize(&mut self) -> Result<FinalizedWav, RecorderError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| RecorderError::IoFailure("file is not open".into()))?;

        let data_size = self.data_bytes as u32;
        patch_sizes(&mut file, data_size).map_err(|e| RecorderError::io("failed to patch wav header", e))?;
        file.sync_all()
            .map_err(|e| RecorderError::io("failed to sync wav file", e))?;
        drop(file);

        let checksum = sha256_file(&self.file_path)?;
        log::debug!(
            "Finalized {} with {} data bytes",
            self.file_path.display(),
            data_size
        );

        Ok(FinalizedWav {
            file_path: self.file_path.clone(),
            format: self.format,
            data_size,
            checksum,
        })
    }

    /// Payload bytes appended so far.
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the output file.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

impl Drop for WavWriter {
    fn drop(&mut self) {
        if let Some(mut file) = self.file.take() {
            log::warn!(
                "Wav writer for {} dropped before finalize, patching header",
                self.file_path.display()
            );
            let _ = patch_sizes(&mut file, self.data_bytes as u32);
        }
    }
}

fn patch_sizes(file: &mut File, data_size: u32) -> io::Result<()> {
    file.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
    file.write_all(&data_size.wrapping_add(36).to_le_bytes())?;
    file.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
    file.write_all(&data_size.to_le_bytes())?;
    file.flush()
}

/// Compute the SHA-256 hex digest of a file without loading it whole.
fn sha256_file(path: &Path) -> Result<String, RecorderError> {
    let mut file = File::open(path).map_err(|e| RecorderError::io("failed to open file for checksum", e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| RecorderError::io("failed to read file for checksum", e))?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
    }

    #[test]
    fn placeholder_header_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("open.wav");
        let writer = WavWriter::open_for_write(&path, AudioFormat::pcm16_mono(48000)).unwrap();
        assert!(writer.is_open());

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 44);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(le_u32(&bytes, 40), 0);
        assert_eq!(le_u32(&bytes, 24), 48000);
        drop(writer);
    }

    #[test]
    fn sizes_match_total_appended_regardless_of_chunking() {
        let dir = tempfile::tempdir().unwrap();
        for (i, chunks) in [vec![10usize], vec![1, 2, 3, 4], vec![0, 4096, 7, 0, 1]].iter().enumerate() {
            let path = dir.path().join(format!("chunks_{}.wav", i));
            let mut writer = WavWriter::open_for_write(&path, AudioFormat::pcm16_mono(16000)).unwrap();
            for &len in chunks {
                writer.append(&vec![0x5Au8; len]).unwrap();
            }
            let total: usize = chunks.iter().sum();
            let done = writer.finalize().unwrap();
            assert_eq!(done.data_size as usize, total);

            let bytes = fs::read(&path).unwrap();
            assert_eq!(bytes.len(), 44 + total);
            assert_eq!(le_u32(&bytes, 40) as usize, total);
            assert_eq!(le_u32(&bytes, 4) as usize, total + 36);
        }
    }

    #[test]
    fn double_finalize_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twice.wav");
        let mut writer = WavWriter::open_for_write(&path, AudioFormat::pcm16_mono(8000)).unwrap();
        writer.append(&[1, 2, 3, 4]).unwrap();
        let first = writer.finalize().unwrap();
        assert_eq!(first.checksum.len(), 64);

        assert!(matches!(writer.finalize(), Err(RecorderError::IoFailure(_))));
        assert!(matches!(writer.append(&[0, 0]), Err(RecorderError::IoFailure(_))));
        assert_eq!(fs::read(&path).unwrap().len(), 48);
    }

    #[test]
    fn checksum_matches_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sum.wav");
        let mut writer = WavWriter::open_for_write(&path, AudioFormat::pcm16_mono(8000)).unwrap();
        writer.append(&[0u8; 32]).unwrap();
        let done = writer.finalize().unwrap();

        let expected = hex_encode(&Sha256::digest(fs::read(&path).unwrap()));
        assert_eq!(done.checksum, expected);
    }

    #[test]
    fn drop_without_finalize_patches_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.wav");
        {
            let mut writer = WavWriter::open_for_write(&path, AudioFormat::pcm16_mono(8000)).unwrap();
            writer.append(&[0u8; 20]).unwrap();
        }
        let bytes = fs::read(&path).unwrap();
        assert_eq!(le_u32(&bytes, 40), 20);
        assert_eq!(le_u32(&bytes, 4), 56);
    }

    #[test]
    fn existing_recording_is_never_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken.wav");
        let mut first = WavWriter::open_for_write(&path, AudioFormat::pcm16_mono(8000)).unwrap();
        first.append(&[7u8; 100]).unwrap();
        first.finalize().unwrap();

        let second = WavWriter::open_for_write(&path, AudioFormat::pcm16_mono(8000));
        assert!(matches!(second, Err(RecorderError::IoFailure(_))));

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 144);
        assert_eq!(le_u32(&bytes, 40), 100);
    }

    #[test]
    fn open_fails_for_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();
        let result = WavWriter::open_for_write(blocker.join("a.wav"), AudioFormat::pcm16_mono(8000));
        assert!(matches!(result, Err(RecorderError::IoFailure(_))));
    }
}
