// ABOUTME: Error types for the timeline engine and its components
// ABOUTME: Cancellation is not represented here; it travels as a Checkpoint

use thiserror::Error;

use super::stages::StageId;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Step {index} ({kind}) failed: {source}")]
    StepFailed {
        index: usize,
        kind: &'static str,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Task '{key}' is not defined by the script")]
    UnknownTask { key: String },

    #[error("Task '{key}' has no live token")]
    TokenNotBound { key: String },

    #[error("Token {token_id} is already in {current}, cannot add it to {requested}")]
    DuplicateMembership {
        token_id: String,
        current: StageId,
        requested: StageId,
    },

    #[error("Run panicked: {0}")]
    Panicked(String),
}

impl EngineError {
    pub fn at_step(self, index: usize, kind: &'static str) -> Self {
        EngineError::StepFailed {
            index,
            kind,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
