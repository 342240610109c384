//! Endpoint for the OS-level keyboard/mouse listener.
//!
//! The platform hook itself lives outside this crate. Whatever installs it
//! feeds [`RawInput`] through the sender handed out by [`InputHook::sender`];
//! the capture side drains the receiver without blocking.

use crate::collector::types::MouseButton;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// A low-level input notification as reported by the platform listener.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInputKind {
    KeyDown(String),
    KeyUp(String),
    Move { x: f64, y: f64 },
    ButtonDown { x: f64, y: f64, button: MouseButton },
    ButtonUp { x: f64, y: f64, button: MouseButton },
    Scroll { x: f64, y: f64, dx: f64, dy: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawInput {
    pub timestamp: DateTime<Utc>,
    pub kind: RawInputKind,
}

impl RawInput {
    /// Stamp a notification with the current time.
    pub fn now(kind: RawInputKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn at(timestamp: DateTime<Utc>, kind: RawInputKind) -> Self {
        Self { timestamp, kind }
    }
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("Input hook is already running")]
    AlreadyRunning,
}

/// Channel endpoint between the platform listener and input capture.
pub struct InputHook {
    sender: Sender<RawInput>,
    receiver: Receiver<RawInput>,
    running: Arc<AtomicBool>,
    attached: AtomicBool,
}

impl InputHook {
    /// Create a hook endpoint with room for `capacity` undrained events.
    pub fn new(capacity: usize) -> Self {
        // Bounded so a stalled consumer cannot grow memory without limit
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            attached: AtomicBool::new(false),
        }
    }

    pub fn start(&mut self) -> Result<(), HookError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(HookError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Handle for the platform listener to publish into.
    pub fn sender(&self) -> HookSender {
        self.attached.store(true, Ordering::SeqCst);
        HookSender {
            sender: self.sender.clone(),
            running: self.running.clone(),
        }
    }

    /// Whether a sender was ever handed out. Without one, input capture
    /// only ever sees an empty channel.
    pub fn has_publisher(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn receiver(&self) -> Receiver<RawInput> {
        self.receiver.clone()
    }
}

impl Default for InputHook {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Publishing side of an [`InputHook`].
#[derive(Clone)]
pub struct HookSender {
    sender: Sender<RawInput>,
    running: Arc<AtomicBool>,
}

impl HookSender {
    /// Publish an event. Returns `false` if the hook is stopped or full.
    pub fn publish(&self, input: RawInput) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        // Never block the OS callback; drop the event if the channel is full
        self.sender.try_send(input).is_ok()
    }
}
