//! Capture statistics for auditing what a session collected and replayed.

pub mod counters;

pub use counters::{
    create_shared_stats, create_shared_stats_with_persistence, CaptureStats, PersistedStats,
    SharedCaptureStats, StatsSnapshot,
};
