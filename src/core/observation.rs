//! The per-tick observation record.

use crate::collector::types::{AudioBuffer, Frame, KeyboardState, MouseState, TimedEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of every modality for one tick.
///
/// All fields share `timestamp`. `events` covers exactly
/// `[window_start, timestamp)`, and the next observation's window starts
/// where this one ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    /// Start of the event window (the previous tick's timestamp)
    pub window_start: DateTime<Utc>,
    /// `None` while the frame source is paused or unavailable
    pub frame: Option<Frame>,
    /// Zero-filled while the audio source is paused
    pub audio: AudioBuffer,
    pub keyboard_state: KeyboardState,
    pub mouse_state: MouseState,
    pub events: Vec<TimedEvent>,
}

impl Observation {
    pub fn has_frame(&self) -> bool {
        self.frame.is_some()
    }
}
