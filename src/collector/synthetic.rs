//! Synthetic capture backends.
//!
//! Real pixel capture and audio device I/O are provided by the embedding
//! application. These backends produce deterministic live-looking data so
//! the pipeline can be exercised end to end without a display or a sound
//! card.

use crate::collector::source::{AudioRecorder, CaptureError, FrameGrabber, Region};
use crate::collector::types::{AudioBuffer, Frame, PixelFormat};
use std::f64::consts::TAU;

/// Diagonal RGB gradient that scrolls by `speed` pixels per grab.
pub struct TestPatternGrabber {
    offset: u32,
    speed: u32,
}

impl TestPatternGrabber {
    pub fn new(speed: u32) -> Self {
        Self { offset: 0, speed }
    }
}

impl Default for TestPatternGrabber {
    fn default() -> Self {
        Self::new(8)
    }
}

impl FrameGrabber for TestPatternGrabber {
    fn grab(&mut self, region: &Region) -> Result<Frame, CaptureError> {
        if region.width == 0 || region.height == 0 {
            return Err(CaptureError::Grab(format!(
                "empty region {}x{}",
                region.width, region.height
            )));
        }
        let mut data = Vec::with_capacity(region.width as usize * region.height as usize * 3);
        for y in 0..region.height {
            for x in 0..region.width {
                let v = x.wrapping_add(y).wrapping_add(self.offset);
                data.extend_from_slice(&[(v % 256) as u8, (y % 256) as u8, (x % 256) as u8]);
            }
        }
        self.offset = self.offset.wrapping_add(self.speed);
        Frame::new(region.width, region.height, PixelFormat::Rgb8, data)
            .ok_or_else(|| CaptureError::Grab("pattern size mismatch".to_string()))
    }
}

/// Continuous sine tone, phase-continuous across chunks.
pub struct ToneRecorder {
    frequency: f64,
    amplitude: f64,
    phase: f64,
}

impl ToneRecorder {
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitude: amplitude.clamp(0.0, 1.0),
            phase: 0.0,
        }
    }
}

impl Default for ToneRecorder {
    fn default() -> Self {
        Self::new(440.0, 0.25)
    }
}

impl AudioRecorder for ToneRecorder {
    fn record(
        &mut self,
        sample_count: usize,
        sample_rate: u32,
        channels: u16,
    ) -> Result<AudioBuffer, CaptureError> {
        if sample_rate == 0 {
            return Err(CaptureError::Record("sample rate is zero".to_string()));
        }
        let step = TAU * self.frequency / sample_rate as f64;
        let mut samples = Vec::with_capacity(sample_count * channels as usize);
        for _ in 0..sample_count {
            let value = (self.phase.sin() * self.amplitude * i16::MAX as f64) as i16;
            samples.extend(std::iter::repeat(value).take(channels as usize));
            self.phase = (self.phase + step) % TAU;
        }
        Ok(AudioBuffer::from_interleaved(channels, samples))
    }
}

/// Recorder used when audio capture is disabled.
#[derive(Debug, Default)]
pub struct Silence;

impl AudioRecorder for Silence {
    fn record(
        &mut self,
        sample_count: usize,
        _sample_rate: u32,
        channels: u16,
    ) -> Result<AudioBuffer, CaptureError> {
        Ok(AudioBuffer::zeros(sample_count, channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_moves_between_grabs() {
        let region = Region {
            top: 0,
            left: 0,
            width: 8,
            height: 4,
        };
        let mut grabber = TestPatternGrabber::default();
        let a = grabber.grab(&region).unwrap();
        let b = grabber.grab(&region).unwrap();
        assert_eq!(a.geometry(), b.geometry());
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn test_tone_has_requested_shape_and_signal() {
        let mut recorder = ToneRecorder::default();
        let buf = recorder.record(441, 44_100, 2).unwrap();
        assert_eq!(buf.shape(), (441, 2));
        assert!(!buf.is_silent());
    }

    #[test]
    fn test_empty_region_is_an_error() {
        let region = Region {
            top: 0,
            left: 0,
            width: 0,
            height: 10,
        };
        assert!(TestPatternGrabber::default().grab(&region).is_err());
    }
}
