//! Recent-history buffer and episodic store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Fixed-capacity FIFO of the most recent `(timestamp, features)` pairs.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    capacity: usize,
    entries: VecDeque<(DateTime<Utc>, T)>,
}

impl<T> HistoryBuffer<T> {
    /// Create a buffer holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an entry, returning the evicted oldest entry once full.
    pub fn push(&mut self, timestamp: DateTime<Utc>, value: T) -> Option<(DateTime<Utc>, T)> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back((timestamp, value));
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &(DateTime<Utc>, T)> {
        self.entries.iter()
    }

    pub fn oldest(&self) -> Option<&(DateTime<Utc>, T)> {
        self.entries.front()
    }

    pub fn latest(&self) -> Option<&(DateTime<Utc>, T)> {
        self.entries.back()
    }
}

/// Append-only record of salient `(timestamp, features)` pairs.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodicStore<T> {
    episodes: Vec<Episode<T>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Episode<T> {
    pub timestamp: DateTime<Utc>,
    pub features: T,
}

impl<T> EpisodicStore<T> {
    pub fn new() -> Self {
        Self {
            episodes: Vec::new(),
        }
    }

    pub fn record(&mut self, timestamp: DateTime<Utc>, features: T) {
        self.episodes.push(Episode {
            timestamp,
            features,
        });
    }

    pub fn episodes(&self) -> &[Episode<T>] {
        &self.episodes
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}

impl<T> Default for EpisodicStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_history_never_exceeds_capacity() {
        let t0 = Utc::now();
        let mut buf = HistoryBuffer::new(3);
        for i in 0..10 {
            buf.push(t0 + Duration::milliseconds(i), i);
            assert!(buf.len() <= 3);
        }
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_fifo_eviction_order() {
        let t0 = Utc::now();
        let mut buf = HistoryBuffer::new(3);
        for i in 0..3 {
            assert!(buf.push(t0 + Duration::milliseconds(i), i).is_none());
        }

        for i in 3..7 {
            let (ts, evicted) = buf.push(t0 + Duration::milliseconds(i), i).unwrap();
            assert_eq!(evicted, i - 3);
            assert_eq!(ts, t0 + Duration::milliseconds(i - 3));
            let values: Vec<i64> = buf.iter().map(|(_, v)| *v).collect();
            assert_eq!(values, vec![i - 2, i - 1, i]);
        }
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buf = HistoryBuffer::new(0);
        buf.push(Utc::now(), "a");
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.latest().map(|(_, v)| *v), Some("a"));
    }

    #[test]
    fn test_episodic_store_appends() {
        let mut store = EpisodicStore::new();
        store.record(Utc::now(), 1);
        store.record(Utc::now(), 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.episodes()[1].features, 2);
    }
}
