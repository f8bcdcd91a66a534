// ABOUTME: Script module describing the scripted program replayed by the timeline
// ABOUTME: Exports tokens, step descriptors, parsing, validation, and the built-in example

pub mod error;
pub mod example;
pub mod program;
pub mod step;
pub mod task;
pub mod validation;

pub use error::{ScriptError, ValidationError};
pub use example::{example, EXAMPLE_OUTPUT, EXAMPLE_SOURCE};
pub use program::Script;
pub use step::Step;
pub use task::{SourceRange, TaskKind, TaskTemplate, TaskToken};
pub use validation::{ScriptValidator, ValidationReport};
