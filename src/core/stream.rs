//! Audio-only streaming path.
//!
//! Captures fixed-length audio chunks in a loop and hands each one to a
//! processing callback. In parallel mode the callback runs on a pool of
//! worker threads fed by a bounded queue, so the next capture starts
//! without waiting for the previous chunk to be processed. Capture order is
//! preserved; completion order is not.

use crate::collector::source::AudioSource;
use crate::collector::types::AudioBuffer;
use crate::core::session::CancelToken;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How long to wait before re-checking a paused source.
const PAUSED_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Failed to spawn audio worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub chunk_duration: Duration,
    pub parallel: bool,
    pub workers: usize,
    pub queue_depth: usize,
    /// Stop after this many chunks
    pub max_chunks: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_duration: Duration::from_millis(500),
            parallel: false,
            workers: 4,
            queue_depth: 16,
            max_chunks: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub chunks_captured: u64,
    /// Chunks whose callback completed before shutdown returned
    pub chunks_processed: u64,
    /// Polls that found the source paused
    pub paused_polls: u64,
}

type Job = (AudioBuffer, DateTime<Utc>);

pub struct AudioStreamer<A> {
    source: A,
    config: StreamConfig,
}

impl<A: AudioSource> AudioStreamer<A> {
    pub fn new(source: A, config: StreamConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &A {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut A {
        &mut self.source
    }

    fn chunk_samples(&self) -> usize {
        (self.config.chunk_duration.as_secs_f64() * self.source.sample_rate() as f64).floor()
            as usize
    }

    /// Stream until cancelled or the chunk limit is reached.
    ///
    /// In parallel mode this returns only after every queued chunk has been
    /// processed and every worker has exited.
    pub fn run<F>(&mut self, cancel: &CancelToken, process: F) -> Result<StreamSummary, StreamError>
    where
        F: Fn(AudioBuffer, DateTime<Utc>) + Send + Sync + 'static,
    {
        let process = Arc::new(process);
        let processed = Arc::new(AtomicU64::new(0));
        let mut summary = StreamSummary::default();

        let pool = if self.config.parallel {
            Some(WorkerPool::spawn(
                self.config.workers.max(1),
                self.config.queue_depth.max(1),
                Arc::clone(&process),
                Arc::clone(&processed),
            )?)
        } else {
            None
        };

        tracing::info!(
            "Audio streaming started ({} samples per chunk, {})",
            self.chunk_samples(),
            if pool.is_some() { "parallel" } else { "sequential" }
        );

        while !cancel.is_cancelled() {
            if self
                .config
                .max_chunks
                .map_or(false, |max| summary.chunks_captured >= max)
            {
                break;
            }
            if self.source.is_paused() {
                summary.paused_polls += 1;
                thread::sleep(PAUSED_POLL_INTERVAL);
                continue;
            }

            let chunk = self.source.pull_audio(self.chunk_samples());
            let timestamp = Utc::now();
            summary.chunks_captured += 1;

            match pool {
                Some(ref pool) => {
                    if pool.submit((chunk, timestamp)).is_err() {
                        tracing::warn!("Audio worker pool closed, stopping stream");
                        break;
                    }
                }
                None => {
                    run_job(&*process, chunk, timestamp);
                    processed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        if let Some(pool) = pool {
            pool.shutdown();
        }
        summary.chunks_processed = processed.load(Ordering::Relaxed);
        tracing::info!(
            "Audio streaming stopped: {} chunks captured, {} processed",
            summary.chunks_captured,
            summary.chunks_processed
        );
        Ok(summary)
    }
}

fn run_job<F: Fn(AudioBuffer, DateTime<Utc>)>(process: &F, chunk: AudioBuffer, ts: DateTime<Utc>) {
    let lag = Utc::now() - ts;
    let started = Instant::now();
    process(chunk, ts);
    tracing::debug!(
        "Chunk at {} processed in {:?} (capture lag {}ms)",
        ts.format("%H:%M:%S%.3f"),
        started.elapsed(),
        lag.num_milliseconds()
    );
}

struct WorkerPool {
    sender: crossbeam_channel::Sender<Job>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn spawn<F>(
        workers: usize,
        queue_depth: usize,
        process: Arc<F>,
        processed: Arc<AtomicU64>,
    ) -> Result<Self, StreamError>
    where
        F: Fn(AudioBuffer, DateTime<Utc>) + Send + Sync + 'static,
    {
        let (sender, receiver) = bounded::<Job>(queue_depth);
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let receiver: Receiver<Job> = receiver.clone();
            let process = Arc::clone(&process);
            let processed = Arc::clone(&processed);
            let handle = thread::Builder::new()
                .name(format!("audio-worker-{index}"))
                .spawn(move || {
                    for (chunk, ts) in receiver.iter() {
                        run_job(&*process, chunk, ts);
                        processed.fetch_add(1, Ordering::Relaxed);
                    }
                })
                .map_err(|source| StreamError::Spawn { index, source })?;
            handles.push(handle);
        }
        Ok(Self { sender, handles })
    }

    /// Blocks while the queue is full.
    fn submit(&self, job: Job) -> Result<(), crossbeam_channel::SendError<Job>> {
        self.sender.send(job)
    }

    /// Close the queue and wait for the workers to drain it.
    fn shutdown(self) {
        drop(self.sender);
        for handle in self.handles {
            if handle.join().is_err() {
                tracing::warn!("Audio worker panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::source::{CaptureSource, MicSource};
    use crate::collector::synthetic::ToneRecorder;
    use std::sync::Mutex;

    fn streamer(parallel: bool, max_chunks: u64) -> AudioStreamer<MicSource<ToneRecorder>> {
        AudioStreamer::new(
            MicSource::new(ToneRecorder::default(), 8000, 1),
            StreamConfig {
                chunk_duration: Duration::from_millis(10),
                parallel,
                workers: 3,
                queue_depth: 2,
                max_chunks: Some(max_chunks),
            },
        )
    }

    #[test]
    fn test_sequential_processes_in_capture_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let summary = streamer(false, 3)
            .run(&CancelToken::new(), move |chunk, ts| {
                sink.lock().unwrap().push((chunk.shape(), ts));
            })
            .unwrap();

        assert_eq!(summary.chunks_captured, 3);
        assert_eq!(summary.chunks_processed, 3);
        let seen = seen.lock().unwrap();
        assert!(seen.iter().all(|(shape, _)| *shape == (80, 1)));
        assert!(seen.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_parallel_waits_for_all_workers() {
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let summary = streamer(true, 10)
            .run(&CancelToken::new(), move |_, _| {
                thread::sleep(Duration::from_millis(5));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(summary.chunks_captured, 10);
        assert_eq!(summary.chunks_processed, 10);
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_paused_source_is_polled_not_pulled() {
        let mut s = streamer(false, 1);
        s.source_mut().pause();
        let cancel = CancelToken::new();
        let stopper = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(250));
            stopper.cancel();
        });

        let summary = s.run(&cancel, |_, _| {}).unwrap();
        handle.join().unwrap();
        assert_eq!(summary.chunks_captured, 0);
        assert!(summary.paused_polls >= 1);
    }
}
