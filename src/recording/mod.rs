//! Synchronized audio/video session recording.
//!
//! Video is appended frame by frame; the sink's geometry is fixed by the
//! first frame. Audio is accumulated in memory and written once when the
//! recording finishes. A geometry change mid-session invalidates the
//! recording rather than resizing it; the observation loop keeps running.

pub mod raw_video;
pub mod wav;

pub use raw_video::{RawVideoSink, VideoManifest};
pub use wav::WavSink;

use crate::collector::types::{AudioBuffer, Frame, Geometry, PixelFormat};
use crate::core::observation::Observation;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Frame geometry changed from {expected} to {actual}")]
    GeometryMismatch { expected: Geometry, actual: Geometry },
    #[error("Audio chunks disagree on channel count (expected {expected})")]
    ChannelMismatch { expected: u16 },
    #[error("Video sink is not open")]
    NotOpen,
}

/// Destination for recorded frames.
pub trait VideoSink {
    fn open(
        &mut self,
        geometry: Geometry,
        format: PixelFormat,
        frame_interval: Duration,
    ) -> Result<(), RecordingError>;

    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordingError>;

    fn close(&mut self) -> Result<(), RecordingError>;
}

/// Destination for the session's concatenated audio.
pub trait AudioSink {
    fn write(&mut self, audio: &AudioBuffer, sample_rate: u32) -> Result<(), RecordingError>;
}

#[derive(Debug, Clone, PartialEq)]
enum RecorderState {
    Recording,
    Invalid(String),
    Finished,
}

/// Outcome of a finished recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSummary {
    pub frames_written: usize,
    pub audio_frames: usize,
    pub geometry: Option<Geometry>,
    /// Set when the recording was abandoned mid-session
    pub invalid_reason: Option<String>,
}

impl RecordingSummary {
    pub fn is_valid(&self) -> bool {
        self.invalid_reason.is_none()
    }
}

/// Couples a video sink and an audio sink for one session.
pub struct Recorder {
    video: Box<dyn VideoSink + Send>,
    audio: Box<dyn AudioSink + Send>,
    frame_interval: Duration,
    sample_rate: u32,
    channels: u16,
    geometry: Option<Geometry>,
    audio_chunks: Vec<AudioBuffer>,
    frames_written: usize,
    state: RecorderState,
}

impl Recorder {
    pub fn new(
        video: Box<dyn VideoSink + Send>,
        audio: Box<dyn AudioSink + Send>,
        frame_interval: Duration,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        Self {
            video,
            audio,
            frame_interval,
            sample_rate,
            channels,
            geometry: None,
            audio_chunks: Vec::new(),
            frames_written: 0,
            state: RecorderState::Recording,
        }
    }

    /// Append one observation's frame and audio.
    pub fn capture(&mut self, obs: &Observation) {
        if self.state != RecorderState::Recording {
            return;
        }
        if let Some(ref frame) = obs.frame {
            if let Err(e) = self.append_frame(frame) {
                self.invalidate(e);
                return;
            }
        }
        self.audio_chunks.push(obs.audio.clone());
    }

    fn append_frame(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        let actual = frame.geometry();
        match self.geometry {
            None => {
                self.video.open(actual, frame.format, self.frame_interval)?;
                self.geometry = Some(actual);
                tracing::info!("Recording video at {}", actual);
            }
            Some(expected) if expected != actual => {
                return Err(RecordingError::GeometryMismatch { expected, actual });
            }
            Some(_) => {}
        }
        self.video.write_frame(frame)?;
        self.frames_written += 1;
        Ok(())
    }

    fn invalidate(&mut self, error: RecordingError) {
        tracing::warn!("Recording abandoned: {}", error);
        if self.geometry.is_some() {
            if let Err(e) = self.video.close() {
                tracing::warn!("Failed to close video sink early: {}", e);
            }
        }
        self.audio_chunks.clear();
        self.state = RecorderState::Invalid(error.to_string());
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self.state, RecorderState::Invalid(_))
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Flush accumulated audio and close the video sink.
    ///
    /// Returns `Ok(None)` if the recording was already finished. An invalid
    /// recording skips the flush and reports why.
    pub fn finish(&mut self) -> Result<Option<RecordingSummary>, RecordingError> {
        let state = std::mem::replace(&mut self.state, RecorderState::Finished);
        match state {
            RecorderState::Finished => Ok(None),
            RecorderState::Invalid(reason) => Ok(Some(RecordingSummary {
                frames_written: self.frames_written,
                audio_frames: 0,
                geometry: self.geometry,
                invalid_reason: Some(reason),
            })),
            RecorderState::Recording => {
                let chunks = std::mem::take(&mut self.audio_chunks);
                let audio = AudioBuffer::concat(&chunks, self.channels).ok_or(
                    RecordingError::ChannelMismatch {
                        expected: self.channels,
                    },
                );
                // Close video even if the audio is unusable
                let closed = if self.geometry.is_some() {
                    self.video.close()
                } else {
                    Ok(())
                };
                let audio = audio?;
                self.audio.write(&audio, self.sample_rate)?;
                closed?;
                tracing::info!(
                    "Recording finished: {} frames, {} audio frames",
                    self.frames_written,
                    audio.frames()
                );
                Ok(Some(RecordingSummary {
                    frames_written: self.frames_written,
                    audio_frames: audio.frames(),
                    geometry: self.geometry,
                    invalid_reason: None,
                }))
            }
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.state != RecorderState::Finished {
            if let Err(e) = self.finish() {
                tracing::warn!("Failed to finish recording on drop: {}", e);
            }
        }
    }
}
