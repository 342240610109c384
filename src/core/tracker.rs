//! Time-ordered log of discrete input events.
//!
//! Events are indexed by `(timestamp, sequence)` so that a window query is a
//! range scan rather than a linear filter, and events that share a timestamp
//! keep their arrival order.

use crate::collector::types::{InputEvent, TimedEvent};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Records input events and answers half-open window queries.
#[derive(Debug, Default)]
pub struct EventTracker {
    events: BTreeMap<(DateTime<Utc>, u64), InputEvent>,
    next_seq: u64,
}

impl EventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event observed at `timestamp`.
    pub fn record(&mut self, timestamp: DateTime<Utc>, event: InputEvent) {
        self.events.insert((timestamp, self.next_seq), event);
        self.next_seq += 1;
    }

    /// Events with `start <= timestamp < end`, in time order.
    pub fn events_in_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<TimedEvent> {
        if start >= end {
            return Vec::new();
        }
        self.events
            .range((start, 0)..(end, 0))
            .map(|(&(timestamp, _), event)| TimedEvent {
                timestamp,
                event: event.clone(),
            })
            .collect()
    }

    /// Drop every event strictly older than `cutoff`.
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) {
        self.events = self.events.split_off(&(cutoff, 0));
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
