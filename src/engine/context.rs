// ABOUTME: Run context carrying cancellation, pause, and speed across suspension points
// ABOUTME: Passed explicitly into every step so each run can be cancelled independently

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 2.0;
pub const DEFAULT_SPEED: f64 = 1.0;

/// Result of a suspension point. Cancellation is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Checkpoint {
    Proceed,
    Cancelled,
}

impl Checkpoint {
    pub fn is_cancelled(self) -> bool {
        self == Checkpoint::Cancelled
    }
}

/// Pause and speed controls shared by the controller and every run it starts.
#[derive(Debug)]
pub struct PlaybackControls {
    paused: AtomicBool,
    pause_epoch: AtomicU64,
    speed_bits: AtomicU64,
}

impl PlaybackControls {
    pub fn new(speed: f64) -> Self {
        Self {
            paused: AtomicBool::new(false),
            pause_epoch: AtomicU64::new(0),
            speed_bits: AtomicU64::new(clamp_speed(speed).unwrap_or(DEFAULT_SPEED).to_bits()),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Flip the pause flag and return the new value
    pub fn toggle_pause(&self) -> bool {
        let paused = !self.paused.fetch_xor(true, Ordering::SeqCst);
        self.pause_epoch.fetch_add(1, Ordering::SeqCst);
        paused
    }

    pub fn set_paused(&self, paused: bool) {
        if self.paused.swap(paused, Ordering::SeqCst) != paused {
            self.pause_epoch.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Incremented on every pause transition
    pub fn pause_epoch(&self) -> u64 {
        self.pause_epoch.load(Ordering::SeqCst)
    }

    pub fn speed(&self) -> f64 {
        f64::from_bits(self.speed_bits.load(Ordering::SeqCst))
    }

    /// Store a clamped speed; non-finite values leave the current speed in place
    pub fn set_speed(&self, speed: f64) -> f64 {
        match clamp_speed(speed) {
            Some(clamped) => {
                self.speed_bits.store(clamped.to_bits(), Ordering::SeqCst);
                clamped
            }
            None => self.speed(),
        }
    }
}

impl Default for PlaybackControls {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED)
    }
}

pub fn clamp_speed(speed: f64) -> Option<f64> {
    if speed.is_finite() {
        Some(speed.clamp(MIN_SPEED, MAX_SPEED))
    } else {
        None
    }
}

/// Per-run context. Cloning shares the same cancellation flag.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub session_id: String,
    should_continue: Arc<AtomicBool>,
    controls: Arc<PlaybackControls>,
}

impl RunContext {
    pub fn new(controls: Arc<PlaybackControls>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            should_continue: Arc::new(AtomicBool::new(true)),
            controls,
        }
    }

    /// A context with its own controls, for driving components directly
    pub fn detached() -> Self {
        Self::new(Arc::new(PlaybackControls::default()))
    }

    pub fn should_continue(&self) -> bool {
        self.should_continue.load(Ordering::SeqCst)
    }

    pub fn checkpoint(&self) -> Checkpoint {
        if self.should_continue() {
            Checkpoint::Proceed
        } else {
            Checkpoint::Cancelled
        }
    }

    pub fn cancel(&self) {
        self.should_continue.store(false, Ordering::SeqCst);
    }

    pub fn controls(&self) -> &Arc<PlaybackControls> {
        &self.controls
    }

    pub fn is_paused(&self) -> bool {
        self.controls.is_paused()
    }

    pub fn speed(&self) -> f64 {
        self.controls.speed()
    }
}
