//! Capture sources for the embodied capture agent.
//!
//! Each modality is an independent source with its own pause flag. Actual
//! pixel capture, audio device I/O and the OS input hook are pluggable
//! backends; this module provides the pause semantics around them.

pub mod hook;
pub mod input;
pub mod source;
pub mod synthetic;
pub mod types;

// Re-export commonly used types
pub use hook::{HookError, HookSender, InputHook, RawInput, RawInputKind};
pub use input::InputCapture;
pub use source::{
    AudioRecorder, AudioSource, CaptureError, CaptureSource, FrameGrabber, FrameSource,
    InputSource, MicSource, Region, ScreenSource,
};
pub use synthetic::{Silence, TestPatternGrabber, ToneRecorder};
pub use types::{
    AudioBuffer, Frame, Geometry, InputEvent, KeyboardState, MouseButton, MouseState,
    PixelFormat, TimedEvent,
};
