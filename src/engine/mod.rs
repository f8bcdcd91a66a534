// ABOUTME: Timeline engine module for the loopscope event-loop visualizer
// ABOUTME: Handles timing, stage membership, task movement, and run control

pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod layout;
pub mod mover;
pub mod session;
pub mod stages;
pub mod timeline;
pub mod timing;

pub use config::EngineConfig;
pub use context::{Checkpoint, PlaybackControls, RunContext, MAX_SPEED, MIN_SPEED};
pub use controller::RunController;
pub use error::{EngineError, Result};
pub use layout::{LayoutRegistry, LayoutTarget, Rect};
pub use mover::{AnimationTimings, TaskMover, Transit, TransitLeg};
pub use session::{ConsoleLog, HighlightState, RunOutcome, RunSession, RunState};
pub use stages::{StageId, StageSnapshot, StageStore};
pub use timeline::TimelineEngine;
pub use timing::TimingController;
