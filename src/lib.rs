//! Embodied Capture Agent - synchronized multi-modal observation capture.
//!
//! This library assembles one observation per timestep from independently
//! clocked capture sources (screen frames, audio, keyboard and mouse),
//! gates capture and simulated input on whether the target application has
//! focus, and streams observations through perception into an agent.
//!
//! # Guarantees
//!
//! - **One timestamp**: every modality in an observation shares its tick time
//! - **Tiling windows**: event windows are half-open and contiguous, so no
//!   event is delivered twice or dropped
//! - **Fail closed**: if focus cannot be determined, capture pauses and
//!   actions are suppressed
//! - **Bounded memory**: recent history is a fixed-capacity FIFO
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Embodied Capture Agent                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌──────────────┐   ┌───────────────┐       │
//! │  │  Sources   │──▶│ Synchronizer │──▶│  Focus Gate   │       │
//! │  │ (a/v/input)│   │  (one tick)  │   │ (pause/supp.) │       │
//! │  └────────────┘   └──────────────┘   └───────────────┘       │
//! │                                              │               │
//! │                                              ▼               │
//! │  ┌────────────┐   ┌──────────────┐   ┌───────────────┐       │
//! │  │  Recorder  │◀──│    Runner    │──▶│  Perception   │       │
//! │  │ (raw, wav) │   │  (history)   │   │   + Agent     │       │
//! │  └────────────┘   └──────────────┘   └───────────────┘       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use embodied_capture_agent::{
//!     action::LogDispatcher,
//!     agent::RandomAgent,
//!     collector::{InputCapture, InputHook, MicSource, Region, ScreenSource},
//!     collector::{TestPatternGrabber, ToneRecorder},
//!     core::{BasicPerception, CancelToken, FocusGate, RunnerConfig, SessionRunner},
//!     core::{Sources, SyncConfig, Synchronizer},
//!     focus::AlwaysFocused,
//! };
//! use std::time::Duration;
//!
//! let hook = InputHook::default();
//! let sources = Sources::new(
//!     Some(Box::new(ScreenSource::new(TestPatternGrabber::default(), Region::default()))),
//!     Box::new(MicSource::new(ToneRecorder::default(), 44_100, 2)),
//!     Box::new(InputCapture::new(hook.receiver())),
//! );
//! let sync = Synchronizer::new(sources, SyncConfig::default());
//! let gate = FocusGate::new(sync, AlwaysFocused, LogDispatcher::new());
//! let mut runner = SessionRunner::new(
//!     gate,
//!     BasicPerception::new(),
//!     RandomAgent::new(Some(7)),
//!     RunnerConfig::default(),
//! );
//! let summary = runner.run(Duration::from_secs(1), &CancelToken::new()).unwrap();
//! println!("{} ticks", summary.ticks);
//! ```

pub mod action;
pub mod agent;
pub mod collector;
pub mod config;
pub mod core;
pub mod focus;
pub mod recording;
pub mod stats;

// Re-export key types at crate root for convenience
pub use action::{Action, ActionDispatcher, ActionError};
pub use collector::{AudioBuffer, Frame, InputEvent, TimedEvent};
pub use config::{Config, ConfigError, SourceConfig};
pub use core::{
    CancelToken, FocusGate, Observation, SessionError, SessionRunner, SessionState,
    Synchronizer,
};
pub use recording::{Recorder, RecordingError, RecordingSummary};
pub use stats::{CaptureStats, SharedCaptureStats, StatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
