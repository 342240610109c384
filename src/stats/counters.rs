//! Auditable capture counters.
//!
//! Tracks how much was captured, replayed and suppressed during a session,
//! with optional persistence so totals accumulate across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current session.
#[derive(Debug)]
pub struct CaptureStats {
    ticks: AtomicU64,
    frames_captured: AtomicU64,
    frames_missing: AtomicU64,
    audio_samples: AtomicU64,
    input_events: AtomicU64,
    actions_dispatched: AtomicU64,
    actions_suppressed: AtomicU64,
    pauses: AtomicU64,
    resumes: AtomicU64,
    salient_ticks: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            frames_captured: AtomicU64::new(0),
            frames_missing: AtomicU64::new(0),
            audio_samples: AtomicU64::new(0),
            input_events: AtomicU64::new(0),
            actions_dispatched: AtomicU64::new(0),
            actions_suppressed: AtomicU64::new(0),
            pauses: AtomicU64::new(0),
            resumes: AtomicU64::new(0),
            salient_ticks: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats that load from and save to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("Could not load previous capture stats: {}", e);
        }

        stats
    }

    /// Record one observation's worth of capture.
    pub fn record_tick(&self, had_frame: bool, audio_samples: usize, input_events: usize) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        if had_frame {
            self.frames_captured.fetch_add(1, Ordering::Relaxed);
        } else {
            self.frames_missing.fetch_add(1, Ordering::Relaxed);
        }
        self.audio_samples
            .fetch_add(audio_samples as u64, Ordering::Relaxed);
        self.input_events
            .fetch_add(input_events as u64, Ordering::Relaxed);
    }

    pub fn record_action_dispatched(&self) {
        self.actions_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_action_suppressed(&self) {
        self.actions_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pause(&self) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resume(&self) {
        self.resumes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_salient(&self) {
        self.salient_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_missing: self.frames_missing.load(Ordering::Relaxed),
            audio_samples: self.audio_samples.load(Ordering::Relaxed),
            input_events: self.input_events.load(Ordering::Relaxed),
            actions_dispatched: self.actions_dispatched.load(Ordering::Relaxed),
            actions_suppressed: self.actions_suppressed.load(Ordering::Relaxed),
            pauses: self.pauses.load(Ordering::Relaxed),
            resumes: self.resumes.load(Ordering::Relaxed),
            salient_ticks: self.salient_ticks.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Ticks: {}\n\
             - Frames captured: {} ({} missing)\n\
             - Audio samples: {}\n\
             - Input events: {}\n\
             - Actions dispatched: {} ({} suppressed while unfocused)\n\
             - Focus transitions: {} paused, {} resumed\n\
             - Salient ticks: {}\n\
             - Session duration: {} seconds",
            s.ticks,
            s.frames_captured,
            s.frames_missing,
            s.audio_samples,
            s.input_events,
            s.actions_dispatched,
            s.actions_suppressed,
            s.pauses,
            s.resumes,
            s.salient_ticks,
            s.session_duration_secs
        )
    }

    /// Save counters to disk, if persistence is configured.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let persisted = PersistedStats {
                totals: self.snapshot(),
                last_updated: Utc::now(),
            };
            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;
                let t = persisted.totals;

                self.ticks.store(t.ticks, Ordering::Relaxed);
                self.frames_captured
                    .store(t.frames_captured, Ordering::Relaxed);
                self.frames_missing
                    .store(t.frames_missing, Ordering::Relaxed);
                self.audio_samples.store(t.audio_samples, Ordering::Relaxed);
                self.input_events.store(t.input_events, Ordering::Relaxed);
                self.actions_dispatched
                    .store(t.actions_dispatched, Ordering::Relaxed);
                self.actions_suppressed
                    .store(t.actions_suppressed, Ordering::Relaxed);
                self.pauses.store(t.pauses, Ordering::Relaxed);
                self.resumes.store(t.resumes, Ordering::Relaxed);
                self.salient_ticks.store(t.salient_ticks, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for CaptureStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub frames_captured: u64,
    pub frames_missing: u64,
    pub audio_samples: u64,
    pub input_events: u64,
    pub actions_dispatched: u64,
    pub actions_suppressed: u64,
    pub pauses: u64,
    pub resumes: u64,
    pub salient_ticks: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// On-disk format.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedStats {
    pub totals: StatsSnapshot,
    pub last_updated: DateTime<Utc>,
}

/// Thread-safe shared stats.
pub type SharedCaptureStats = Arc<CaptureStats>;

pub fn create_shared_stats() -> SharedCaptureStats {
    Arc::new(CaptureStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedCaptureStats {
    Arc::new(CaptureStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counting() {
        let stats = CaptureStats::new();
        stats.record_tick(true, 800, 3);
        stats.record_tick(false, 800, 0);

        let s = stats.snapshot();
        assert_eq!(s.ticks, 2);
        assert_eq!(s.frames_captured, 1);
        assert_eq!(s.frames_missing, 1);
        assert_eq!(s.audio_samples, 1600);
        assert_eq!(s.input_events, 3);
    }

    #[test]
    fn test_persistence_accumulates_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let first = CaptureStats::with_persistence(path.clone());
        first.record_pause();
        first.record_action_suppressed();
        first.save().unwrap();

        let second = CaptureStats::with_persistence(path);
        second.record_pause();
        let s = second.snapshot();
        assert_eq!(s.pauses, 2);
        assert_eq!(s.actions_suppressed, 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = CaptureStats::new().summary();
        assert!(summary.contains("Ticks"));
        assert!(summary.contains("suppressed while unfocused"));
    }
}
