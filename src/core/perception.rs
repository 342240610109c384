//! Feature extraction from observations.
//!
//! Features are computed from pixel intensities, audio levels, and input
//! timing only. Key identities are counted, never retained.

use crate::core::observation::Observation;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Turns an observation into whatever features an agent consumes.
pub trait Perception {
    type Features: Clone;

    fn extract(&mut self, obs: &Observation) -> anyhow::Result<Self::Features>;
}

/// Per-tick features produced by [`BasicPerception`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    /// Mean grayscale intensity (0-255), `None` without a frame
    pub brightness: Option<f64>,
    /// Pixels whose intensity moved more than the change threshold
    pub changed_pixels: usize,
    pub change_detected: bool,
    /// Root-mean-square audio level normalized to 0-1
    pub audio_rms: f64,
    /// Peak absolute audio level normalized to 0-1
    pub audio_peak: f64,
    pub keys_held: usize,
    pub buttons_held: usize,
    pub event_count: usize,
    pub cursor: (f64, f64),
}

/// Intensity delta above which a pixel counts as changed.
const PIXEL_DELTA_THRESHOLD: u8 = 50;

/// Changed pixels above which the frame counts as changed.
const CHANGED_PIXELS_THRESHOLD: usize = 2000;

/// Brightness, frame-difference, audio-level and input-count features.
#[derive(Debug)]
pub struct BasicPerception {
    previous: Option<(u32, u32, Vec<u8>)>,
    pixel_threshold: u8,
    changed_threshold: usize,
}

impl BasicPerception {
    pub fn new() -> Self {
        Self::with_thresholds(PIXEL_DELTA_THRESHOLD, CHANGED_PIXELS_THRESHOLD)
    }

    pub fn with_thresholds(pixel_threshold: u8, changed_threshold: usize) -> Self {
        Self {
            previous: None,
            pixel_threshold,
            changed_threshold,
        }
    }

    /// Compare against the previous gray frame and keep this one.
    fn frame_change(&mut self, width: u32, height: u32, gray: Vec<u8>) -> usize {
        let changed = match self.previous {
            Some((w, h, ref prev)) if w == width && h == height => prev
                .iter()
                .zip(&gray)
                .filter(|(a, b)| a.abs_diff(**b) > self.pixel_threshold)
                .count(),
            // Geometry changed or first frame: no baseline
            _ => 0,
        };
        self.previous = Some((width, height, gray));
        changed
    }
}

impl Default for BasicPerception {
    fn default() -> Self {
        Self::new()
    }
}

fn audio_levels(samples: &[i16]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let scale = i16::MAX as f64;
    let rms = samples.iter().map(|s| *s as f64 / scale).quadratic_mean();
    let peak = samples
        .iter()
        .map(|s| (*s as i32).unsigned_abs() as f64 / scale)
        .fold(0.0, f64::max);
    (rms, peak.min(1.0))
}

impl Perception for BasicPerception {
    type Features = Features;

    fn extract(&mut self, obs: &Observation) -> anyhow::Result<Features> {
        let (brightness, changed_pixels) = match obs.frame {
            Some(ref frame) => {
                let gray = frame.to_gray();
                let brightness = if gray.is_empty() {
                    0.0
                } else {
                    gray.iter().map(|v| *v as u64).sum::<u64>() as f64 / gray.len() as f64
                };
                let changed = self.frame_change(frame.width, frame.height, gray);
                (Some(brightness), changed)
            }
            None => (None, 0),
        };
        let (audio_rms, audio_peak) = audio_levels(&obs.audio.samples);

        Ok(Features {
            brightness,
            changed_pixels,
            change_detected: changed_pixels > self.changed_threshold,
            audio_rms,
            audio_peak,
            keys_held: obs.keyboard_state.len(),
            buttons_held: obs.mouse_state.buttons.len(),
            event_count: obs.events.len(),
            cursor: obs.mouse_state.position,
        })
    }
}
