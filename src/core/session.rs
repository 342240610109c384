//! Streaming session runner.
//!
//! Drives an [`Environment`] at a fixed timestep, feeding each observation
//! through perception into a bounded history buffer and an agent. Salient
//! ticks are kept in the episodic store. An optional [`Recorder`] captures
//! the session and is finalized on every exit path.

use crate::action::{Action, ActionError};
use crate::core::gate::Environment;
use crate::core::history::{EpisodicStore, HistoryBuffer};
use crate::core::perception::Perception;
use crate::recording::{Recorder, RecordingError, RecordingSummary};
use crate::stats::SharedCaptureStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Consumer of extracted features.
pub trait Agent<F> {
    /// Called once per tick with the new features and the history buffer,
    /// which already contains them as its latest entry.
    fn observe(&mut self, features: &F, history: &HistoryBuffer<F>) -> anyhow::Result<()>;

    fn is_salient(&self, _features: &F) -> bool {
        false
    }

    /// Actions to dispatch through the focus gate this tick.
    fn act(&mut self, _features: &F) -> anyhow::Result<Vec<Action>> {
        Ok(Vec::new())
    }
}

/// Cooperative cancellation flag, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Perception failed: {0}")]
    Perception(anyhow::Error),
    #[error("Agent failed: {0}")]
    Agent(anyhow::Error),
    #[error("Action dispatch failed: {0}")]
    Action(#[from] ActionError),
    #[error("Recording failed: {0}")]
    Recording(#[from] RecordingError),
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub timestep: Duration,
    pub history_capacity: usize,
    pub keep_episodic: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timestep: Duration::from_secs_f64(1.0 / 60.0),
            history_capacity: 32,
            keep_episodic: true,
        }
    }
}

/// What a finished session produced.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub ticks: u64,
    pub elapsed: Duration,
    pub history_len: usize,
    pub episodic_len: usize,
    pub recording: Option<RecordingSummary>,
}

pub struct SessionRunner<E, P: Perception, G> {
    env: E,
    perception: P,
    agent: G,
    config: RunnerConfig,
    history: HistoryBuffer<P::Features>,
    episodic: EpisodicStore<P::Features>,
    recorder: Option<Recorder>,
    stats: Option<SharedCaptureStats>,
    ticks: u64,
}

impl<E, P, G> SessionRunner<E, P, G>
where
    E: Environment,
    P: Perception,
    G: Agent<P::Features>,
{
    pub fn new(env: E, perception: P, agent: G, config: RunnerConfig) -> Self {
        let history = HistoryBuffer::new(config.history_capacity);
        Self {
            env,
            perception,
            agent,
            config,
            history,
            episodic: EpisodicStore::new(),
            recorder: None,
            stats: None,
            ticks: 0,
        }
    }

    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_stats(mut self, stats: SharedCaptureStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Run until `duration` has elapsed or `cancel` is set.
    pub fn run(
        &mut self,
        duration: Duration,
        cancel: &CancelToken,
    ) -> Result<SessionSummary, SessionError> {
        self.run_until(Some(duration), cancel)
    }

    /// Run until `cancel` is set.
    pub fn run_forever(&mut self, cancel: &CancelToken) -> Result<SessionSummary, SessionError> {
        self.run_until(None, cancel)
    }

    fn run_until(
        &mut self,
        duration: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<SessionSummary, SessionError> {
        let start = Instant::now();
        tracing::info!(
            "Session started (timestep {:?}, history {})",
            self.config.timestep,
            self.history.capacity()
        );

        let outcome = self.drive(start, duration, cancel);
        let finalized = self.finalize();
        let elapsed = start.elapsed();

        let recording = match (outcome, finalized) {
            (Err(e), Err(rec_err)) => {
                tracing::warn!("Recording finalization failed after session error: {}", rec_err);
                return Err(e);
            }
            (Err(e), Ok(_)) => return Err(e),
            (Ok(()), Err(rec_err)) => return Err(rec_err.into()),
            (Ok(()), Ok(recording)) => recording,
        };

        tracing::info!(
            "Session ended after {} ticks in {:.2}s",
            self.ticks,
            elapsed.as_secs_f64()
        );
        Ok(SessionSummary {
            ticks: self.ticks,
            elapsed,
            history_len: self.history.len(),
            episodic_len: self.episodic.len(),
            recording,
        })
    }

    fn drive(
        &mut self,
        start: Instant,
        duration: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<(), SessionError> {
        let deadline = duration.map(|d| start + d);
        let mut iterations: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                tracing::info!("Session cancelled");
                return Ok(());
            }
            if deadline.map_or(false, |d| Instant::now() >= d) {
                return Ok(());
            }

            self.step()?;
            iterations = iterations.saturating_add(1);

            // Pace against the session start so per-tick overhead does not drift
            let mut next = start + self.config.timestep * iterations;
            if let Some(d) = deadline {
                next = next.min(d);
            }
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            }
        }
    }

    /// Run one tick of the pipeline.
    pub fn step(&mut self) -> Result<(), SessionError> {
        let obs = self.env.tick();
        self.ticks += 1;

        if let Some(ref mut recorder) = self.recorder {
            recorder.capture(&obs);
        }
        if let Some(ref stats) = self.stats {
            stats.record_tick(obs.has_frame(), obs.audio.samples.len(), obs.events.len());
        }

        let features = self
            .perception
            .extract(&obs)
            .map_err(SessionError::Perception)?;
        self.history.push(obs.timestamp, features.clone());
        self.agent
            .observe(&features, &self.history)
            .map_err(SessionError::Agent)?;

        if self.config.keep_episodic && self.agent.is_salient(&features) {
            self.episodic.record(obs.timestamp, features.clone());
            if let Some(ref stats) = self.stats {
                stats.record_salient();
            }
        }

        for action in self.agent.act(&features).map_err(SessionError::Agent)? {
            self.env.dispatch_action(action)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<Option<RecordingSummary>, RecordingError> {
        match self.recorder {
            Some(ref mut recorder) => recorder.finish(),
            None => Ok(None),
        }
    }

    pub fn history(&self) -> &HistoryBuffer<P::Features> {
        &self.history
    }

    pub fn episodic(&self) -> &EpisodicStore<P::Features> {
        &self.episodic
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn agent(&self) -> &G {
        &self.agent
    }

    pub fn into_parts(self) -> (E, P, G) {
        (self.env, self.perception, self.agent)
    }
}
