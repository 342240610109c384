//! Focus probes: is the target application the active window right now?
//!
//! Probes report failures as errors; the focus gate treats any error as
//! "not focused".

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FocusError {
    #[error("Failed to run {command}: {reason}")]
    Command { command: String, reason: String },
    #[error("Unrecognized output from {command}: {output}")]
    Parse { command: String, output: String },
    #[error("Invalid window pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Reports whether the target application has input focus.
pub trait FocusProbe {
    fn is_focused(&mut self) -> Result<bool, FocusError>;
}

/// Probe for sessions without a focus target.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysFocused;

impl FocusProbe for AlwaysFocused {
    fn is_focused(&mut self) -> Result<bool, FocusError> {
        Ok(true)
    }
}

/// Window to watch, by X11 id or by title substring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowTarget {
    Id(String),
    Title(String),
}

/// An entry from `wmctrl -l`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowInfo {
    pub id: String,
    pub title: String,
}

/// Lowercase, strip `0x`, left-pad to 8 hex digits.
pub fn normalize_window_id(id: &str) -> String {
    let lower = id.trim().to_lowercase();
    let hex = lower.strip_prefix("0x").unwrap_or(&lower);
    format!("{hex:0>8}")
}

/// Focus probe for X11 desktops using `xprop` and `wmctrl`.
pub struct X11Probe {
    target: WindowTarget,
    active_re: Regex,
}

impl X11Probe {
    pub fn new(target: WindowTarget) -> Result<Self, FocusError> {
        Ok(Self {
            target,
            active_re: active_window_regex()?,
        })
    }

    pub fn target(&self) -> &WindowTarget {
        &self.target
    }

    /// Id of the currently active window.
    pub fn active_window(&self) -> Result<String, FocusError> {
        let output = run("xprop", &["-root", "_NET_ACTIVE_WINDOW"])?;
        parse_active_window(&self.active_re, &output).ok_or_else(|| FocusError::Parse {
            command: "xprop".to_string(),
            output: output.trim().to_string(),
        })
    }
}

impl FocusProbe for X11Probe {
    fn is_focused(&mut self) -> Result<bool, FocusError> {
        let active = normalize_window_id(&self.active_window()?);
        match &self.target {
            WindowTarget::Id(id) => Ok(normalize_window_id(id) == active),
            WindowTarget::Title(needle) => Ok(list_windows()?
                .iter()
                .any(|w| normalize_window_id(&w.id) == active && w.title.contains(needle.as_str()))),
        }
    }
}

/// List top-level windows via `wmctrl -l`.
pub fn list_windows() -> Result<Vec<WindowInfo>, FocusError> {
    let output = run("wmctrl", &["-l"])?;
    Ok(parse_window_list(&output))
}

fn active_window_regex() -> Result<Regex, regex::Error> {
    Regex::new(r"window id # (0x[0-9a-fA-F]+)")
}

fn parse_active_window(re: &Regex, output: &str) -> Option<String> {
    re.captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
}

fn parse_window_list(output: &str) -> Vec<WindowInfo> {
    output
        .lines()
        .filter_map(|line| {
            // id, desktop, host, title
            let mut parts = line.split_whitespace();
            let id = parts.next()?;
            let _desktop = parts.next()?;
            let _host = parts.next()?;
            let title = parts.collect::<Vec<_>>().join(" ");
            if title.is_empty() {
                return None;
            }
            Some(WindowInfo {
                id: id.to_string(),
                title,
            })
        })
        .collect()
}

fn run(command: &str, args: &[&str]) -> Result<String, FocusError> {
    let mut cmd = Command::new(command);
    cmd.args(args);
    if std::env::var_os("DISPLAY").is_none() {
        cmd.env("DISPLAY", ":0");
    }
    let output = cmd.output().map_err(|e| FocusError::Command {
        command: command.to_string(),
        reason: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(FocusError::Command {
            command: command.to_string(),
            reason: format!(
                "exit status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
