//! 16-bit PCM WAV audio sink.

use crate::collector::types::AudioBuffer;
use crate::recording::{AudioSink, RecordingError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct WavSink {
    path: PathBuf,
}

impl WavSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Byte length of the sample data, provided the RIFF size field
/// (`36 + data_len`) still fits in 32 bits.
fn riff_data_len(sample_count: usize) -> Result<u32, RecordingError> {
    sample_count
        .checked_mul(2)
        .and_then(|bytes| u32::try_from(bytes).ok())
        .filter(|len| len.checked_add(36).is_some())
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "audio exceeds the 4 GiB WAV limit",
            )
            .into()
        })
}

/// Canonical 44-byte RIFF/WAVE header for 16-bit PCM.
fn wav_header(channels: u16, sample_rate: u32, data_len: u32) -> [u8; 44] {
    let block_align = channels * 2;
    let byte_rate = sample_rate * block_align as u32;
    let mut h = [0u8; 44];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes());
    h[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    h[22..24].copy_from_slice(&channels.to_le_bytes());
    h[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    h[32..34].copy_from_slice(&block_align.to_le_bytes());
    h[34..36].copy_from_slice(&16u16.to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_len.to_le_bytes());
    h
}

impl AudioSink for WavSink {
    fn write(&mut self, audio: &AudioBuffer, sample_rate: u32) -> Result<(), RecordingError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data_len = riff_data_len(audio.samples.len())?;

        let mut out = BufWriter::new(File::create(&self.path)?);
        out.write_all(&wav_header(audio.channels, sample_rate, data_len))?;
        for sample in &audio.samples {
            out.write_all(&sample.to_le_bytes())?;
        }
        out.flush()?;
        Ok(())
    }
}
