//! Core functionality for the embodied capture agent.
//!
//! This module contains:
//! - The event tracker answering half-open window queries
//! - The observation synchronizer and its clock
//! - The focus gate that pauses capture and suppresses actions
//! - The streaming session runner with history and episodic memory
//! - The audio-only streaming path

pub mod gate;
pub mod history;
pub mod observation;
pub mod perception;
pub mod session;
pub mod stream;
pub mod sync;
pub mod tracker;

// Re-export commonly used types
pub use gate::{DispatchOutcome, Environment, FocusGate, SessionState};
pub use history::{Episode, EpisodicStore, HistoryBuffer};
pub use observation::Observation;
pub use perception::{BasicPerception, Features, Perception};
pub use session::{
    Agent, CancelToken, RunnerConfig, SessionError, SessionRunner, SessionSummary,
};
pub use stream::{AudioStreamer, StreamConfig, StreamError, StreamSummary};
pub use sync::{Clock, ManualClock, Sources, SyncConfig, Synchronizer, SystemClock};
pub use tracker::EventTracker;
