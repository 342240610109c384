//! Payload and event types produced by the capture sources.
//!
//! Every modality has an explicit "unavailable" shape: an absent frame or a
//! zero-filled audio buffer. Pulling from a paused source never blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Pixel layout of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    Bgra8,
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel for this layout.
    pub fn channels(self) -> u8 {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// A raw image captured from the target region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Row-major pixel bytes, `width * height * channels` long
    pub data: Vec<u8>,
}

/// Frame dimensions used to validate recordings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

impl Frame {
    /// Build a frame, returning `None` if the buffer does not match the geometry.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * format.channels() as usize;
        if data.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            width: self.width,
            height: self.height,
            channels: self.channels(),
        }
    }

    /// Luma value of every pixel, using integer BT.601 weights.
    pub fn to_gray(&self) -> Vec<u8> {
        let step = self.channels() as usize;
        self.data
            .chunks_exact(step)
            .map(|px| {
                let (r, g, b) = match self.format {
                    PixelFormat::Rgb8 | PixelFormat::Rgba8 => (px[0], px[1], px[2]),
                    PixelFormat::Bgra8 => (px[2], px[1], px[0]),
                    PixelFormat::Gray8 => return px[0],
                };
                ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
            })
            .collect()
    }
}

/// Interleaved 16-bit PCM samples with shape `(frames, channels)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBuffer {
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioBuffer {
    /// A silent buffer of the given shape.
    pub fn zeros(frames: usize, channels: u16) -> Self {
        Self {
            channels,
            samples: vec![0; frames * channels as usize],
        }
    }

    pub fn from_interleaved(channels: u16, samples: Vec<i16>) -> Self {
        Self { channels, samples }
    }

    /// Number of sample frames (rows).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// `(frames, channels)`
    pub fn shape(&self) -> (usize, u16) {
        (self.frames(), self.channels)
    }

    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }

    /// Concatenate buffers along the sample axis.
    ///
    /// Returns `None` if the buffers disagree on channel count.
    pub fn concat(chunks: &[AudioBuffer], channels: u16) -> Option<AudioBuffer> {
        let total = chunks.iter().map(|c| c.samples.len()).sum();
        let mut samples = Vec::with_capacity(total);
        for chunk in chunks {
            if chunk.channels != channels {
                return None;
            }
            samples.extend_from_slice(&chunk.samples);
        }
        Some(AudioBuffer { channels, samples })
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MouseButton::Left => write!(f, "left"),
            MouseButton::Right => write!(f, "right"),
            MouseButton::Middle => write!(f, "middle"),
        }
    }
}

/// A discrete input event as delivered in an observation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent {
    KeyPress {
        key: String,
    },
    KeyRelease {
        key: String,
    },
    /// Emitted on release, carrying how long the key was down
    KeyHold {
        key: String,
        duration_secs: f64,
    },
    MouseMove {
        x: f64,
        y: f64,
    },
    MousePress {
        x: f64,
        y: f64,
        button: MouseButton,
    },
    MouseRelease {
        x: f64,
        y: f64,
        button: MouseButton,
    },
    ButtonHold {
        x: f64,
        y: f64,
        button: MouseButton,
        duration_secs: f64,
    },
    Scroll {
        x: f64,
        y: f64,
        dx: f64,
        dy: f64,
    },
}

/// An input event stamped with the time the hook observed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub timestamp: DateTime<Utc>,
    pub event: InputEvent,
}

/// Key identifier to seconds held, for keys down right now.
pub type KeyboardState = BTreeMap<String, f64>;

/// Held mouse buttons and the current cursor position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MouseState {
    /// Button identifier to seconds held
    pub buttons: BTreeMap<String, f64>,
    pub position: (f64, f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_wrong_buffer_length() {
        assert!(Frame::new(2, 2, PixelFormat::Rgb8, vec![0; 12]).is_some());
        assert!(Frame::new(2, 2, PixelFormat::Rgb8, vec![0; 11]).is_none());
        assert!(Frame::new(2, 2, PixelFormat::Bgra8, vec![0; 16]).is_some());
    }

    #[test]
    fn test_gray_conversion_respects_channel_order() {
        let rgb = Frame::new(1, 1, PixelFormat::Rgb8, vec![255, 0, 0]).unwrap();
        let bgra = Frame::new(1, 1, PixelFormat::Bgra8, vec![0, 0, 255, 255]).unwrap();
        assert_eq!(rgb.to_gray(), bgra.to_gray());
        assert_eq!(rgb.to_gray(), vec![76]);
    }

    #[test]
    fn test_audio_zeros_shape() {
        let buf = AudioBuffer::zeros(441, 2);
        assert_eq!(buf.shape(), (441, 2));
        assert!(buf.is_silent());
    }

    #[test]
    fn test_audio_concat_along_sample_axis() {
        let a = AudioBuffer::from_interleaved(2, vec![1, 2, 3, 4]);
        let b = AudioBuffer::from_interleaved(2, vec![5, 6]);
        let joined = AudioBuffer::concat(&[a, b], 2).unwrap();
        assert_eq!(joined.shape(), (3, 2));
        assert_eq!(joined.samples, vec![1, 2, 3, 4, 5, 6]);

        let mono = AudioBuffer::from_interleaved(1, vec![1]);
        assert!(AudioBuffer::concat(&[mono], 2).is_none());
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let event = InputEvent::KeyHold {
            key: "w".to_string(),
            duration_secs: 0.5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "key_hold");
        assert_eq!(json["key"], "w");
    }
}
