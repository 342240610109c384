//! Simulated input actions and the injection seam.

use crate::collector::types::MouseButton;
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// An input action to replay into the target application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Press (`press = true`) or release a key
    Key { key: String, press: bool },
    /// Relative cursor movement
    MouseMove { dx: i32, dy: i32 },
    MouseClick { button: MouseButton },
    Noop,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Key { key, press: true } => write!(f, "press {key}"),
            Action::Key { key, press: false } => write!(f, "release {key}"),
            Action::MouseMove { dx, dy } => write!(f, "move ({dx}, {dy})"),
            Action::MouseClick { button } => write!(f, "click {button}"),
            Action::Noop => write!(f, "noop"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Injector disconnected")]
    Disconnected,
    #[error("Injection failed: {0}")]
    Injection(String),
}

/// Performs the actual keyboard/mouse injection.
pub trait ActionDispatcher {
    fn dispatch(&mut self, action: &Action) -> Result<(), ActionError>;
}

/// Dry-run dispatcher that only logs what would be injected.
#[derive(Debug, Default)]
pub struct LogDispatcher {
    dispatched: u64,
}

impl LogDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }
}

impl ActionDispatcher for LogDispatcher {
    fn dispatch(&mut self, action: &Action) -> Result<(), ActionError> {
        self.dispatched += 1;
        tracing::info!("Action: {}", action);
        Ok(())
    }
}

/// Forwards actions to an injector running on another thread.
pub struct ChannelDispatcher {
    sender: Sender<Action>,
}

impl ChannelDispatcher {
    /// Create a dispatcher and the receiving end for the injector thread.
    pub fn new(capacity: usize) -> (Self, Receiver<Action>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self { sender }, receiver)
    }
}

impl ActionDispatcher for ChannelDispatcher {
    fn dispatch(&mut self, action: &Action) -> Result<(), ActionError> {
        self.sender
            .send(action.clone())
            .map_err(|_| ActionError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_json_shape() {
        let action: Action =
            serde_json::from_str(r#"{"type":"key","key":"w","press":true}"#).unwrap();
        assert_eq!(
            action,
            Action::Key {
                key: "w".to_string(),
                press: true
            }
        );
        let click = serde_json::to_value(Action::MouseClick {
            button: MouseButton::Right,
        })
        .unwrap();
        assert_eq!(click["type"], "mouse_click");
        assert_eq!(click["button"], "right");
    }

    #[test]
    fn test_channel_dispatcher_forwards_and_detects_disconnect() {
        let (mut dispatcher, receiver) = ChannelDispatcher::new(4);
        dispatcher.dispatch(&Action::Noop).unwrap();
        assert_eq!(receiver.try_recv().unwrap(), Action::Noop);

        drop(receiver);
        assert!(matches!(
            dispatcher.dispatch(&Action::Noop),
            Err(ActionError::Disconnected)
        ));
    }
}
