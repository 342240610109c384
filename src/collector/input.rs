//! Keyboard and mouse capture built on the hook channel.

use crate::collector::hook::{RawInput, RawInputKind};
use crate::collector::source::{CaptureSource, InputSource};
use crate::collector::types::{InputEvent, KeyboardState, MouseButton, MouseState, TimedEvent};
use crate::core::tracker::EventTracker;
use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use std::collections::HashMap;

/// Input source that turns raw hook notifications into tracked events and
/// held-state.
pub struct InputCapture {
    receiver: Receiver<RawInput>,
    tracker: EventTracker,
    key_down_at: HashMap<String, DateTime<Utc>>,
    button_down_at: HashMap<MouseButton, DateTime<Utc>>,
    position: (f64, f64),
    paused: bool,
}

impl InputCapture {
    pub fn new(receiver: Receiver<RawInput>) -> Self {
        Self {
            receiver,
            tracker: EventTracker::new(),
            key_down_at: HashMap::new(),
            button_down_at: HashMap::new(),
            position: (0.0, 0.0),
            paused: false,
        }
    }

    /// Move everything queued on the hook into the tracker.
    fn drain(&mut self) {
        while let Ok(raw) = self.receiver.try_recv() {
            if !self.paused {
                self.apply(raw);
            }
        }
    }

    fn apply(&mut self, raw: RawInput) {
        let at = raw.timestamp;
        match raw.kind {
            RawInputKind::KeyDown(key) => {
                // Auto-repeat keeps the original press time
                self.key_down_at.entry(key.clone()).or_insert(at);
                self.tracker.record(at, InputEvent::KeyPress { key });
            }
            RawInputKind::KeyUp(key) => {
                if let Some(down) = self.key_down_at.remove(&key) {
                    self.tracker.record(
                        at,
                        InputEvent::KeyHold {
                            key: key.clone(),
                            duration_secs: seconds_between(down, at),
                        },
                    );
                }
                self.tracker.record(at, InputEvent::KeyRelease { key });
            }
            RawInputKind::Move { x, y } => {
                self.position = (x, y);
                self.tracker.record(at, InputEvent::MouseMove { x, y });
            }
            RawInputKind::ButtonDown { x, y, button } => {
                self.position = (x, y);
                self.button_down_at.entry(button).or_insert(at);
                self.tracker
                    .record(at, InputEvent::MousePress { x, y, button });
            }
            RawInputKind::ButtonUp { x, y, button } => {
                self.position = (x, y);
                if let Some(down) = self.button_down_at.remove(&button) {
                    self.tracker.record(
                        at,
                        InputEvent::ButtonHold {
                            x,
                            y,
                            button,
                            duration_secs: seconds_between(down, at),
                        },
                    );
                }
                self.tracker
                    .record(at, InputEvent::MouseRelease { x, y, button });
            }
            RawInputKind::Scroll { x, y, dx, dy } => {
                self.tracker.record(at, InputEvent::Scroll { x, y, dx, dy });
            }
        }
    }

    /// Number of events still retained for future windows.
    pub fn pending_events(&self) -> usize {
        self.tracker.len()
    }
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    ((end - start).num_microseconds().unwrap_or(0) as f64 / 1_000_000.0).max(0.0)
}

impl CaptureSource for InputCapture {
    fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.drain();
        self.paused = true;
        // Releases that happen while paused are never seen, so held state
        // would go stale.
        self.key_down_at.clear();
        self.button_down_at.clear();
    }

    fn resume(&mut self) {
        if !self.paused {
            return;
        }
        // Discard whatever queued up while paused before going live
        self.drain();
        self.paused = false;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn name(&self) -> &'static str {
        "input"
    }
}

impl InputSource for InputCapture {
    fn held_state(&mut self, now: DateTime<Utc>) -> (KeyboardState, MouseState) {
        self.drain();
        if self.paused {
            return (
                KeyboardState::new(),
                MouseState {
                    buttons: Default::default(),
                    position: self.position,
                },
            );
        }
        let keyboard = self
            .key_down_at
            .iter()
            .map(|(key, &down)| (key.clone(), seconds_between(down, now)))
            .collect();
        let mouse = MouseState {
            buttons: self
                .button_down_at
                .iter()
                .map(|(button, &down)| (button.to_string(), seconds_between(down, now)))
                .collect(),
            position: self.position,
        };
        (keyboard, mouse)
    }

    fn events_in_window(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<TimedEvent> {
        // Input that arrives while paused never reaches the tracker, but
        // events recorded before the pause still belong to their window.
        self.drain();
        // Windows only move forward, so anything before `start` is spent.
        self.tracker.prune_before(start);
        self.tracker.events_in_window(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::hook::InputHook;
    use chrono::Duration;

    fn setup() -> (InputHook, InputCapture) {
        let mut hook = InputHook::new(64);
        hook.start().unwrap();
        let capture = InputCapture::new(hook.receiver());
        (hook, capture)
    }

    #[test]
    fn test_key_release_emits_hold_then_release() {
        let (hook, mut capture) = setup();
        let t0 = Utc::now();
        let tx = hook.sender();
        tx.publish(RawInput::at(t0, RawInputKind::KeyDown("w".into())));
        tx.publish(RawInput::at(
            t0 + Duration::milliseconds(250),
            RawInputKind::KeyUp("w".into()),
        ));

        let events = capture.events_in_window(t0, t0 + Duration::seconds(1));
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event, InputEvent::KeyPress { key: "w".into() });
        match &events[1].event {
            InputEvent::KeyHold { key, duration_secs } => {
                assert_eq!(key, "w");
                assert!((duration_secs - 0.25).abs() < 1e-6);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(events[2].event, InputEvent::KeyRelease { key: "w".into() });
    }

    #[test]
    fn test_held_state_reports_durations_and_position() {
        let (hook, mut capture) = setup();
        let t0 = Utc::now();
        let tx = hook.sender();
        tx.publish(RawInput::at(t0, RawInputKind::KeyDown("space".into())));
        tx.publish(RawInput::at(
            t0,
            RawInputKind::ButtonDown {
                x: 10.0,
                y: 20.0,
                button: MouseButton::Left,
            },
        ));

        let (keys, mouse) = capture.held_state(t0 + Duration::milliseconds(500));
        assert!((keys["space"] - 0.5).abs() < 1e-6);
        assert!((mouse.buttons["left"] - 0.5).abs() < 1e-6);
        assert_eq!(mouse.position, (10.0, 20.0));
    }

    #[test]
    fn test_paused_capture_discards_input() {
        let (hook, mut capture) = setup();
        let t0 = Utc::now();
        let tx = hook.sender();
        tx.publish(RawInput::at(t0, RawInputKind::KeyDown("a".into())));
        capture.pause();
        capture.pause();

        tx.publish(RawInput::at(
            t0 + Duration::milliseconds(1),
            RawInputKind::KeyDown("b".into()),
        ));
        let (keys, _) = capture.held_state(t0 + Duration::milliseconds(2));
        assert!(keys.is_empty());
        // Only the press recorded before the pause is delivered
        let events = capture.events_in_window(t0, t0 + Duration::milliseconds(2));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, InputEvent::KeyPress { key: "a".into() });

        capture.resume();
        tx.publish(RawInput::at(
            t0 + Duration::milliseconds(3),
            RawInputKind::KeyDown("c".into()),
        ));
        let events =
            capture.events_in_window(t0 + Duration::milliseconds(2), t0 + Duration::seconds(1));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, InputEvent::KeyPress { key: "c".into() });
    }

    #[test]
    fn test_spent_events_are_pruned() {
        let (hook, mut capture) = setup();
        let t0 = Utc::now();
        let tx = hook.sender();
        for i in 0..5 {
            tx.publish(RawInput::at(
                t0 + Duration::milliseconds(i),
                RawInputKind::Move {
                    x: i as f64,
                    y: 0.0,
                },
            ));
        }
        let first = capture.events_in_window(t0, t0 + Duration::milliseconds(3));
        assert_eq!(first.len(), 3);
        capture.events_in_window(t0 + Duration::milliseconds(3), t0 + Duration::milliseconds(10));
        capture.events_in_window(t0 + Duration::milliseconds(10), t0 + Duration::milliseconds(20));
        assert_eq!(capture.pending_events(), 0);
    }
}
