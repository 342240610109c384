//! Observation synchronizer.
//!
//! Pulls one unit from every capture source per tick and stamps them all
//! with a single timestamp. The event window advances to exactly `now`
//! after every tick, so consecutive windows tile time with no gaps and no
//! overlaps.

use crate::collector::source::{AudioSource, CaptureSource, FrameSource, InputSource};
use crate::core::observation::Observation;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source of tick timestamps.
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock advanced by hand, for deterministic tests and replays.
///
/// Clones share the same underlying instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Timing parameters for the synchronizer.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Intended spacing between ticks; sizes each audio chunk
    pub timestep: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timestep: Duration::from_secs_f64(1.0 / 60.0),
        }
    }
}

/// The capture sources owned by one synchronizer.
pub struct Sources {
    pub frame: Option<Box<dyn FrameSource + Send>>,
    pub audio: Box<dyn AudioSource + Send>,
    pub input: Box<dyn InputSource + Send>,
}

impl Sources {
    pub fn new(
        frame: Option<Box<dyn FrameSource + Send>>,
        audio: Box<dyn AudioSource + Send>,
        input: Box<dyn InputSource + Send>,
    ) -> Self {
        Self {
            frame,
            audio,
            input,
        }
    }

    fn set_paused(&mut self, pause: bool) {
        if let Some(frame) = self.frame.as_mut() {
            toggle(frame.as_mut(), pause);
        }
        toggle(self.audio.as_mut(), pause);
        toggle(self.input.as_mut(), pause);
    }
}

fn toggle<S: CaptureSource + ?Sized>(source: &mut S, pause: bool) {
    if pause {
        source.pause();
    } else {
        source.resume();
    }
    tracing::debug!(
        "{} source {}",
        source.name(),
        if pause { "paused" } else { "resumed" }
    );
}

/// Assembles one atomic [`Observation`] per tick.
pub struct Synchronizer {
    sources: Sources,
    clock: Box<dyn Clock>,
    timestep: Duration,
    samples_per_tick: usize,
    last_tick: DateTime<Utc>,
}

impl Synchronizer {
    /// Create a synchronizer on the wall clock.
    pub fn new(sources: Sources, config: SyncConfig) -> Self {
        Self::with_clock(sources, config, SystemClock)
    }

    /// Create a synchronizer on a custom clock. The first event window
    /// starts at the clock's current time.
    pub fn with_clock(sources: Sources, config: SyncConfig, clock: impl Clock + 'static) -> Self {
        let sample_rate = sources.audio.sample_rate();
        let samples_per_tick = (config.timestep.as_secs_f64() * sample_rate as f64).floor() as usize;
        let last_tick = clock.now();
        Self {
            sources,
            clock: Box::new(clock),
            timestep: config.timestep,
            samples_per_tick,
            last_tick,
        }
    }

    /// Capture one observation. Never fails: unavailable modalities are
    /// encoded in the payload.
    pub fn tick(&mut self) -> Observation {
        // Clamp so a wall clock stepping backwards yields an empty window
        // instead of an inverted one.
        let now = self.clock.now().max(self.last_tick);
        let window_start = self.last_tick;

        let audio = self.sources.audio.pull_audio(self.samples_per_tick);
        let frame = self.sources.frame.as_mut().and_then(|f| f.pull_frame());
        let (keyboard_state, mouse_state) = self.sources.input.held_state(now);
        let events = self.sources.input.events_in_window(window_start, now);

        self.last_tick = now;

        Observation {
            timestamp: now,
            window_start,
            frame,
            audio,
            keyboard_state,
            mouse_state,
            events,
        }
    }

    /// Pause or resume every owned source. Only the focus gate drives this.
    pub(crate) fn cascade(&mut self, pause: bool) {
        self.sources.set_paused(pause);
    }

    pub fn last_tick_time(&self) -> DateTime<Utc> {
        self.last_tick
    }

    pub fn samples_per_tick(&self) -> usize {
        self.samples_per_tick
    }

    pub fn timestep(&self) -> Duration {
        self.timestep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::hook::{InputHook, RawInput, RawInputKind};
    use crate::collector::input::InputCapture;
    use crate::collector::source::{MicSource, Region, ScreenSource};
    use crate::collector::synthetic::{TestPatternGrabber, ToneRecorder};

    fn build(clock: &ManualClock) -> (InputHook, Synchronizer) {
        let mut hook = InputHook::new(256);
        hook.start().unwrap();
        let region = Region {
            top: 0,
            left: 0,
            width: 8,
            height: 8,
        };
        let sources = Sources::new(
            Some(Box::new(ScreenSource::new(TestPatternGrabber::default(), region))),
            Box::new(MicSource::new(ToneRecorder::default(), 8000, 1)),
            Box::new(InputCapture::new(hook.receiver())),
        );
        let config = SyncConfig {
            timestep: Duration::from_millis(100),
        };
        (hook, Synchronizer::with_clock(sources, config, clock.clone()))
    }

    #[test]
    fn test_windows_tile_without_gaps_or_duplicates() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        let (hook, mut sync) = build(&clock);
        let tx = hook.sender();

        // One event every 7 ms; the third tick lands exactly on the event at 350 ms.
        let mut published = 0;
        for ms in (0..500).step_by(7) {
            tx.publish(RawInput::at(
                start + chrono::Duration::milliseconds(ms),
                RawInputKind::Move {
                    x: ms as f64,
                    y: 0.0,
                },
            ));
            published += 1;
        }

        let mut delivered = Vec::new();
        let mut previous_end = start;
        for step in [100, 100, 150, 50, 100, 5] {
            clock.advance(Duration::from_millis(step));
            let obs = sync.tick();
            assert_eq!(obs.window_start, previous_end);
            assert!(obs.events.iter().all(|e| e.timestamp >= obs.window_start
                && e.timestamp < obs.timestamp));
            previous_end = obs.timestamp;
            delivered.extend(obs.events);
        }

        assert_eq!(delivered.len(), published);
        assert!(delivered.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_same_instant_tick_has_empty_window() {
        let clock = ManualClock::new(Utc::now());
        let (_hook, mut sync) = build(&clock);
        clock.advance(Duration::from_millis(10));
        sync.tick();
        let obs = sync.tick();
        assert_eq!(obs.window_start, obs.timestamp);
        assert!(obs.events.is_empty());
    }

    #[test]
    fn test_clock_stepping_back_is_clamped() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        let (_hook, mut sync) = build(&clock);
        clock.advance(Duration::from_millis(50));
        let first = sync.tick();
        clock.set(start);
        let second = sync.tick();
        assert_eq!(second.timestamp, first.timestamp);
        assert_eq!(sync.last_tick_time(), first.timestamp);
        assert_eq!(second.window_start, second.timestamp);
    }

    #[test]
    fn test_audio_chunk_sized_from_timestep() {
        let clock = ManualClock::new(Utc::now());
        let (_hook, mut sync) = build(&clock);
        assert_eq!(sync.timestep(), Duration::from_millis(100));
        assert_eq!(sync.samples_per_tick(), 800);
        let obs = sync.tick();
        assert_eq!(obs.audio.shape(), (800, 1));
        assert!(obs.has_frame());
    }

    #[test]
    fn test_paused_sources_still_yield_structured_observation() {
        let clock = ManualClock::new(Utc::now());
        let (_hook, mut sync) = build(&clock);
        sync.cascade(true);
        let obs = sync.tick();
        assert!(obs.frame.is_none());
        assert_eq!(obs.audio.shape(), (800, 1));
        assert!(obs.audio.is_silent());

        sync.cascade(false);
        let obs = sync.tick();
        assert!(obs.frame.is_some());
        assert!(!obs.audio.is_silent());
    }
}
