// ABOUTME: Task token and template types moved between scheduler stages
// ABOUTME: Defines task kinds, source ranges, and fresh-identity token minting

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Function,
    DeferredCallback,
    PromiseReaction,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Function => write!(f, "function"),
            TaskKind::DeferredCallback => write!(f, "deferred-callback"),
            TaskKind::PromiseReaction => write!(f, "promise-reaction"),
        }
    }
}

/// A span of source text, 1-based and inclusive of the start position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceRange {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl SourceRange {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// A range covering a single line from `start_col` to `end_col`
    pub fn line(line: u32, start_col: u32, end_col: u32) -> Self {
        Self::new(line, start_col, line, end_col)
    }

    pub fn is_ordered(&self) -> bool {
        (self.start_line, self.start_col) <= (self.end_line, self.end_col)
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}

/// Static description of a task as it appears in a script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskTemplate {
    pub name: String,
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<SourceRange>,
}

impl TaskTemplate {
    pub fn new(name: impl Into<String>, kind: TaskKind, range: Option<SourceRange>) -> Self {
        Self {
            name: name.into(),
            kind,
            range,
        }
    }

    /// Mint a token for one scheduling occurrence of this template
    pub fn mint(&self) -> TaskToken {
        TaskToken::new(self.name.clone(), self.kind, self.range)
    }
}

/// One scheduling occurrence of a callback. Identity is per occurrence,
/// so re-entering the stack always means a new token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskToken {
    pub id: String,
    pub name: String,
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<SourceRange>,
    #[serde(default)]
    pub fade_out: bool,
}

impl TaskToken {
    pub fn new(name: impl Into<String>, kind: TaskKind, range: Option<SourceRange>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            range,
            fade_out: false,
        }
    }

    pub fn is_fading(&self) -> bool {
        self.fade_out
    }
}
