// ABOUTME: Engine configuration for polling cadence, animation durations, and initial speed
// ABOUTME: Built from the CLI configuration file or used with defaults

use std::time::Duration;

use super::context::DEFAULT_SPEED;
use super::mover::AnimationTimings;
use super::timing::TimingController;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub speed: f64,
    pub active_poll: Duration,
    pub paused_poll: Duration,
    pub animation: AnimationTimings,
}

impl EngineConfig {
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn timing_controller(&self) -> TimingController {
        TimingController::new(self.active_poll, self.paused_poll)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            active_poll: Duration::from_millis(50),
            paused_poll: Duration::from_millis(100),
            animation: AnimationTimings::default(),
        }
    }
}
