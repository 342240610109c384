//! Focus gate.
//!
//! Consults the focus probe on every tick and every action. Losing focus
//! pauses all capture sources and suppresses action dispatch; regaining it
//! resumes them. Each transition cascades exactly once, no matter how many
//! consecutive probes agree. A failing probe counts as "not focused".

use crate::action::{Action, ActionDispatcher, ActionError};
use crate::core::observation::Observation;
use crate::core::sync::Synchronizer;
use crate::focus::FocusProbe;
use crate::stats::SharedCaptureStats;
use serde::{Deserialize, Serialize};

/// Whether the session is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Active,
    Paused,
}

/// What happened to a dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Forwarded to the injector
    Dispatched,
    /// Dropped because the target is not focused
    Suppressed,
}

/// The observation/action surface a session runner drives.
pub trait Environment {
    fn tick(&mut self) -> Observation;

    fn dispatch_action(&mut self, action: Action) -> Result<DispatchOutcome, ActionError>;
}

/// Gates a synchronizer and an action injector on application focus.
pub struct FocusGate<P, D> {
    sync: Synchronizer,
    probe: P,
    dispatcher: D,
    state: SessionState,
    pauses: u64,
    resumes: u64,
    stats: Option<SharedCaptureStats>,
}

impl<P: FocusProbe, D: ActionDispatcher> FocusGate<P, D> {
    /// Wrap a synchronizer. The gate starts ACTIVE.
    pub fn new(sync: Synchronizer, probe: P, dispatcher: D) -> Self {
        Self {
            sync,
            probe,
            dispatcher,
            state: SessionState::Active,
            pauses: 0,
            resumes: 0,
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: SharedCaptureStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Probe focus and apply any state transition.
    pub fn refresh(&mut self) -> SessionState {
        let focused = match self.probe.is_focused() {
            Ok(focused) => focused,
            Err(e) => {
                tracing::warn!("Focus probe failed, treating target as unfocused: {}", e);
                false
            }
        };

        match (self.state, focused) {
            (SessionState::Active, false) => {
                self.sync.cascade(true);
                self.state = SessionState::Paused;
                self.pauses += 1;
                if let Some(ref stats) = self.stats {
                    stats.record_pause();
                }
                tracing::info!("Target not focused. Capture paused.");
            }
            (SessionState::Paused, true) => {
                self.sync.cascade(false);
                self.state = SessionState::Active;
                self.resumes += 1;
                if let Some(ref stats) = self.stats {
                    stats.record_resume();
                }
                tracing::info!("Target focused. Capture resumed.");
            }
            _ => {}
        }

        self.state
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of ACTIVE to PAUSED cascades so far.
    pub fn pause_count(&self) -> u64 {
        self.pauses
    }

    /// Number of PAUSED to ACTIVE cascades so far.
    pub fn resume_count(&self) -> u64 {
        self.resumes
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn into_parts(self) -> (Synchronizer, P, D) {
        (self.sync, self.probe, self.dispatcher)
    }
}

impl<P: FocusProbe, D: ActionDispatcher> Environment for FocusGate<P, D> {
    /// Always returns a structurally valid observation; while paused its
    /// payloads are the sources' placeholders.
    fn tick(&mut self) -> Observation {
        self.refresh();
        self.sync.tick()
    }

    fn dispatch_action(&mut self, action: Action) -> Result<DispatchOutcome, ActionError> {
        if self.refresh() == SessionState::Paused {
            tracing::debug!("Action not sent, target not focused: {}", action);
            if let Some(ref stats) = self.stats {
                stats.record_action_suppressed();
            }
            return Ok(DispatchOutcome::Suppressed);
        }
        self.dispatcher.dispatch(&action)?;
        if let Some(ref stats) = self.stats {
            stats.record_action_dispatched();
        }
        Ok(DispatchOutcome::Dispatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::source::{AudioSource, CaptureSource, InputSource};
    use crate::collector::types::{AudioBuffer, KeyboardState, MouseState, TimedEvent};
    use crate::core::sync::{ManualClock, Sources, SyncConfig};
    use crate::focus::FocusError;
    use chrono::{DateTime, Utc};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct Calls {
        pauses: AtomicUsize,
        resumes: AtomicUsize,
    }

    struct CountingAudio {
        calls: Arc<Calls>,
        paused: bool,
    }

    impl CaptureSource for CountingAudio {
        fn pause(&mut self) {
            self.calls.pauses.fetch_add(1, Ordering::SeqCst);
            self.paused = true;
        }
        fn resume(&mut self) {
            self.calls.resumes.fetch_add(1, Ordering::SeqCst);
            self.paused = false;
        }
        fn is_paused(&self) -> bool {
            self.paused
        }
        fn name(&self) -> &'static str {
            "counting-audio"
        }
    }

    impl AudioSource for CountingAudio {
        fn pull_audio(&mut self, sample_count: usize) -> AudioBuffer {
            let fill = if self.paused { 0 } else { 1 };
            AudioBuffer::from_interleaved(1, vec![fill; sample_count])
        }
        fn sample_rate(&self) -> u32 {
            1000
        }
        fn channels(&self) -> u16 {
            1
        }
    }

    struct QuietInput {
        paused: bool,
    }

    impl CaptureSource for QuietInput {
        fn pause(&mut self) {
            self.paused = true;
        }
        fn resume(&mut self) {
            self.paused = false;
        }
        fn is_paused(&self) -> bool {
            self.paused
        }
        fn name(&self) -> &'static str {
            "quiet-input"
        }
    }

    impl InputSource for QuietInput {
        fn held_state(&mut self, _now: DateTime<Utc>) -> (KeyboardState, MouseState) {
            (KeyboardState::new(), MouseState::default())
        }
        fn events_in_window(&mut self, _: DateTime<Utc>, _: DateTime<Utc>) -> Vec<TimedEvent> {
            Vec::new()
        }
    }

    struct ScriptedProbe(VecDeque<Result<bool, FocusError>>);

    impl FocusProbe for ScriptedProbe {
        fn is_focused(&mut self) -> Result<bool, FocusError> {
            self.0.pop_front().unwrap_or(Ok(true))
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        seen: Vec<Action>,
    }

    impl ActionDispatcher for RecordingDispatcher {
        fn dispatch(&mut self, action: &Action) -> Result<(), ActionError> {
            self.seen.push(action.clone());
            Ok(())
        }
    }

    fn gate(
        script: Vec<Result<bool, FocusError>>,
    ) -> (Arc<Calls>, FocusGate<ScriptedProbe, RecordingDispatcher>) {
        let calls = Arc::new(Calls::default());
        let sources = Sources::new(
            None,
            Box::new(CountingAudio {
                calls: calls.clone(),
                paused: false,
            }),
            Box::new(QuietInput { paused: false }),
        );
        let sync = Synchronizer::with_clock(
            sources,
            SyncConfig {
                timestep: Duration::from_millis(10),
            },
            ManualClock::new(Utc::now()),
        );
        let gate = FocusGate::new(
            sync,
            ScriptedProbe(script.into()),
            RecordingDispatcher::default(),
        );
        (calls, gate)
    }

    #[test]
    fn test_flapping_cascades_once_per_transition() {
        let (calls, mut gate) = gate(vec![Ok(false), Ok(false), Ok(false), Ok(true)]);
        for _ in 0..4 {
            gate.tick();
        }
        assert_eq!(calls.pauses.load(Ordering::SeqCst), 1);
        assert_eq!(calls.resumes.load(Ordering::SeqCst), 1);
        assert_eq!(gate.pause_count(), 1);
        assert_eq!(gate.resume_count(), 1);
        assert_eq!(gate.state(), SessionState::Active);
    }

    #[test]
    fn test_paused_gate_suppresses_actions() {
        let (_calls, mut gate) = gate(vec![Ok(false), Ok(false)]);
        let outcome = gate
            .dispatch_action(Action::Key {
                key: "w".to_string(),
                press: true,
            })
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Suppressed);
        assert_eq!(
            gate.dispatch_action(Action::Noop).unwrap(),
            DispatchOutcome::Suppressed
        );
        assert!(gate.dispatcher().seen.is_empty());

        // Script exhausted: focused again
        assert_eq!(
            gate.dispatch_action(Action::Noop).unwrap(),
            DispatchOutcome::Dispatched
        );
        assert_eq!(gate.dispatcher().seen, vec![Action::Noop]);
    }

    #[test]
    fn test_probe_failure_fails_closed() {
        let err = FocusError::Command {
            command: "xprop".to_string(),
            reason: "not found".to_string(),
        };
        let (calls, mut gate) = gate(vec![Err(err)]);
        let obs = gate.tick();
        assert_eq!(gate.state(), SessionState::Paused);
        assert_eq!(calls.pauses.load(Ordering::SeqCst), 1);
        assert!(obs.audio.is_silent());
        assert_eq!(obs.audio.shape(), (10, 1));
    }

    #[test]
    fn test_stats_record_transitions() {
        let stats = crate::stats::create_shared_stats();
        let (_calls, gate) = gate(vec![Ok(false), Ok(true)]);
        let mut gate = gate.with_stats(stats.clone());
        gate.tick();
        gate.dispatch_action(Action::Noop).unwrap();
        let s = stats.snapshot();
        assert_eq!(s.pauses, 1);
        assert_eq!(s.resumes, 1);
        assert_eq!(s.actions_dispatched, 1);
    }
}
