// ABOUTME: Error types for script parsing and validation
// ABOUTME: Defines specific error types for script module operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Failed to read script file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to serialize JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Step {step} references unknown task '{task}'")]
    UnknownTask { step: usize, task: String },

    #[error("Empty script: no steps defined")]
    EmptyScript,

    #[error("Source range {range} of '{owner}' is inverted")]
    InvertedRange { owner: String, range: String },

    #[error("Source range {range} of '{owner}' lies outside the {lines}-line source")]
    RangeOutOfSource {
        owner: String,
        range: String,
        lines: usize,
    },

    #[error("Step {step} fades task '{task}' before any step placed it")]
    UnboundFade { step: usize, task: String },

    #[error("Step {step} moves task '{task}' between the same stage '{stage}'")]
    SelfMove {
        step: usize,
        task: String,
        stage: String,
    },
}

pub type Result<T> = std::result::Result<T, ScriptError>;
