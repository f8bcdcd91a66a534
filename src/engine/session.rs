// ABOUTME: Run state machine and per-session records such as the console log
// ABOUTME: Provides the serializable snapshot reported at the end of a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, PoisonError, RwLock};

use super::context::{Checkpoint, RunContext};
use crate::script::SourceRange;
use crate::surface::{OutputPanel, TextDisplay};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl RunState {
    /// Running or paused
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Running | RunState::Paused)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Cancelled)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Paused => write!(f, "paused"),
            RunState::Completed => write!(f, "completed"),
            RunState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// How the interpreter loop ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// Ordered console output of the current session
#[derive(Debug, Default)]
pub struct ConsoleLog {
    lines: RwLock<Vec<String>>,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line and mirror it to the panel, unless the run was cancelled
    pub fn append(&self, ctx: &RunContext, panel: &dyn OutputPanel, line: &str) -> Checkpoint {
        let mut lines = self.lines.write().unwrap_or_else(PoisonError::into_inner);
        if !ctx.should_continue() {
            return Checkpoint::Cancelled;
        }
        lines.push(line.to_string());
        panel.append_output(line);
        Checkpoint::Proceed
    }

    pub fn clear(&self) {
        self.lines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Current source highlight, written through to the text display
#[derive(Debug, Default)]
pub struct HighlightState {
    current: Mutex<Option<SourceRange>>,
}

impl HighlightState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(
        &self,
        ctx: &RunContext,
        display: &dyn TextDisplay,
        range: SourceRange,
    ) -> Checkpoint {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if !ctx.should_continue() {
            return Checkpoint::Cancelled;
        }
        *current = Some(range);
        display.highlight_range(&range);
        Checkpoint::Proceed
    }

    pub fn hide(&self, ctx: &RunContext, display: &dyn TextDisplay) -> Checkpoint {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if !ctx.should_continue() {
            return Checkpoint::Cancelled;
        }
        if current.take().is_some() {
            display.clear_highlight();
        }
        Checkpoint::Proceed
    }

    /// Unconditional clear used by reset and run start
    pub fn reset(&self, display: &dyn TextDisplay) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = None;
        display.clear_highlight();
    }

    pub fn current(&self) -> Option<SourceRange> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time view of a controller's current session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSession {
    pub session_id: Option<String>,
    pub state: RunState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub speed: f64,
    pub paused: bool,
    pub output: Vec<String>,
    pub stages: BTreeMap<String, Vec<String>>,
    pub steps_executed: usize,
    pub last_error: Option<String>,
}

impl RunSession {
    pub fn is_clean(&self) -> bool {
        self.output.is_empty() && self.stages.values().all(|names| names.is_empty())
    }
}
