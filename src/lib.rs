// ABOUTME: Main library module for the loopscope event-loop visualizer
// ABOUTME: Exports all core modules and provides the public API

pub mod cli;
pub mod engine;
pub mod script;
pub mod surface;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use engine::{EngineConfig, RunController, RunSession, RunState};
pub use script::{Script, ScriptValidator, Step};
pub use surface::{Recorder, Surfaces, TerminalSurface};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
