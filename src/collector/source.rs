//! Capture source capabilities and the frame/audio sources built on them.
//!
//! Every source implements [`CaptureSource`], so pause and resume can be
//! cascaded without knowing which modality a source carries.

use crate::collector::types::{AudioBuffer, Frame, KeyboardState, MouseState, TimedEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by capture backends.
///
/// These never escape a source's pull method: an active source that fails
/// to capture reports the same placeholder a paused source would.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Frame grab failed: {0}")]
    Grab(String),
    #[error("Audio record failed: {0}")]
    Record(String),
}

/// The capability every capture source shares.
pub trait CaptureSource {
    /// Stop live capture. Calling it while already paused is a no-op.
    fn pause(&mut self);

    /// Restart live capture. Calling it while already live is a no-op.
    fn resume(&mut self);

    fn is_paused(&self) -> bool;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// A source of screen frames.
pub trait FrameSource: CaptureSource {
    /// The current frame, or `None` while paused or unavailable.
    fn pull_frame(&mut self) -> Option<Frame>;
}

/// A source of fixed-shape audio chunks.
pub trait AudioSource: CaptureSource {
    /// Exactly `sample_count` frames of audio, zero-filled while paused.
    fn pull_audio(&mut self, sample_count: usize) -> AudioBuffer;

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;
}

/// A source of held input state and discrete input events.
pub trait InputSource: CaptureSource {
    /// Keys and buttons held as of `now`, plus the cursor position.
    fn held_state(&mut self, now: DateTime<Utc>) -> (KeyboardState, MouseState);

    /// Events with timestamps in `[start, end)`, in time order.
    fn events_in_window(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<TimedEvent>;
}

/// Screen region to capture, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub top: i32,
    pub left: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            top: 0,
            left: 0,
            width: 1280,
            height: 720,
        }
    }
}

/// Backend that performs the actual pixel capture.
pub trait FrameGrabber {
    fn grab(&mut self, region: &Region) -> Result<Frame, CaptureError>;
}

/// Backend that performs the actual (blocking) audio recording.
pub trait AudioRecorder {
    fn record(
        &mut self,
        sample_count: usize,
        sample_rate: u32,
        channels: u16,
    ) -> Result<AudioBuffer, CaptureError>;
}

/// Frame source over a pluggable grabber.
pub struct ScreenSource<G> {
    grabber: G,
    region: Region,
    paused: bool,
}

impl<G: FrameGrabber> ScreenSource<G> {
    pub fn new(grabber: G, region: Region) -> Self {
        Self {
            grabber,
            region,
            paused: false,
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }
}

impl<G: FrameGrabber> CaptureSource for ScreenSource<G> {
    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn name(&self) -> &'static str {
        "screen"
    }
}

impl<G: FrameGrabber> FrameSource for ScreenSource<G> {
    fn pull_frame(&mut self) -> Option<Frame> {
        if self.paused {
            return None;
        }
        match self.grabber.grab(&self.region) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!("Screen capture failed, frame omitted: {}", e);
                None
            }
        }
    }
}

/// Audio source over a pluggable recorder.
pub struct MicSource<R> {
    recorder: R,
    sample_rate: u32,
    channels: u16,
    paused: bool,
}

impl<R: AudioRecorder> MicSource<R> {
    pub fn new(recorder: R, sample_rate: u32, channels: u16) -> Self {
        Self {
            recorder,
            sample_rate,
            channels,
            paused: false,
        }
    }
}

impl<R: AudioRecorder> CaptureSource for MicSource<R> {
    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn name(&self) -> &'static str {
        "audio"
    }
}

impl<R: AudioRecorder> AudioSource for MicSource<R> {
    fn pull_audio(&mut self, sample_count: usize) -> AudioBuffer {
        if self.paused {
            return AudioBuffer::zeros(sample_count, self.channels);
        }
        match self
            .recorder
            .record(sample_count, self.sample_rate, self.channels)
        {
            // A backend that returns the wrong shape is treated as a failure.
            Ok(buf) if buf.shape() == (sample_count, self.channels) => buf,
            Ok(buf) => {
                tracing::warn!(
                    "Audio backend returned shape {:?}, expected {:?}; substituting silence",
                    buf.shape(),
                    (sample_count, self.channels)
                );
                AudioBuffer::zeros(sample_count, self.channels)
            }
            Err(e) => {
                tracing::warn!("Audio capture failed, substituting silence: {}", e);
                AudioBuffer::zeros(sample_count, self.channels)
            }
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::PixelFormat;

    struct CountingRecorder {
        calls: usize,
    }

    impl AudioRecorder for CountingRecorder {
        fn record(
            &mut self,
            sample_count: usize,
            _sample_rate: u32,
            channels: u16,
        ) -> Result<AudioBuffer, CaptureError> {
            self.calls += 1;
            Ok(AudioBuffer::from_interleaved(
                channels,
                vec![7; sample_count * channels as usize],
            ))
        }
    }

    struct FailingGrabber;

    impl FrameGrabber for FailingGrabber {
        fn grab(&mut self, _region: &Region) -> Result<Frame, CaptureError> {
            Err(CaptureError::Grab("display gone".to_string()))
        }
    }

    struct SolidGrabber;

    impl FrameGrabber for SolidGrabber {
        fn grab(&mut self, region: &Region) -> Result<Frame, CaptureError> {
            let len = region.width as usize * region.height as usize;
            Frame::new(region.width, region.height, PixelFormat::Gray8, vec![9; len])
                .ok_or_else(|| CaptureError::Grab("bad geometry".to_string()))
        }
    }

    #[test]
    fn test_paused_audio_is_zero_filled_and_skips_backend() {
        let mut source = MicSource::new(CountingRecorder { calls: 0 }, 8000, 2);
        source.pause();

        let buf = source.pull_audio(160);
        assert_eq!(buf.shape(), (160, 2));
        assert!(buf.is_silent());
        assert_eq!(source.recorder.calls, 0);

        source.resume();
        let buf = source.pull_audio(160);
        assert_eq!(buf.shape(), (160, 2));
        assert!(!buf.is_silent());
        assert_eq!(source.recorder.calls, 1);
    }

    #[test]
    fn test_pause_is_idempotent() {
        let mut source = MicSource::new(CountingRecorder { calls: 0 }, 8000, 1);
        source.pause();
        source.pause();
        assert!(source.is_paused());
        source.resume();
        source.resume();
        assert!(!source.is_paused());
    }

    #[test]
    fn test_paused_screen_yields_no_frame() {
        let region = Region {
            top: 0,
            left: 0,
            width: 4,
            height: 2,
        };
        let mut source = ScreenSource::new(SolidGrabber, region);
        assert!(source.pull_frame().is_some());
        source.pause();
        assert!(source.pull_frame().is_none());
    }

    #[test]
    fn test_grab_failure_is_absent_frame() {
        let mut source = ScreenSource::new(FailingGrabber, Region::default());
        assert!(source.pull_frame().is_none());
        assert!(!source.is_paused());
    }
}
