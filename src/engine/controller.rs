// ABOUTME: Run controller owning the play, pause, reset, and speed controls
// ABOUTME: Starts timeline runs in the background and reports their state over a watch channel

use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::config::EngineConfig;
use super::context::{PlaybackControls, RunContext};
use super::error::EngineError;
use super::layout::LayoutRegistry;
use super::mover::TaskMover;
use super::session::{ConsoleLog, HighlightState, RunOutcome, RunSession, RunState};
use super::stages::StageStore;
use super::timeline::TimelineEngine;
use crate::script::Script;
use crate::surface::Surfaces;

/// Bookkeeping for the run the controller currently owns
#[derive(Default)]
struct SessionRecord {
    ctx: Option<RunContext>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl SessionRecord {
    fn owns(&self, session_id: &str) -> bool {
        self.ctx
            .as_ref()
            .is_some_and(|ctx| ctx.session_id == session_id)
    }
}

pub struct RunController {
    engine: Arc<TimelineEngine>,
    stages: Arc<StageStore>,
    mover: Arc<TaskMover>,
    layout: Arc<LayoutRegistry>,
    console: Arc<ConsoleLog>,
    highlight: Arc<HighlightState>,
    surfaces: Surfaces,
    controls: Arc<PlaybackControls>,
    state: Arc<watch::Sender<RunState>>,
    record: Arc<Mutex<SessionRecord>>,
}

impl RunController {
    pub fn new(script: Script, config: EngineConfig, surfaces: Surfaces) -> Self {
        Self::with_layout(
            script,
            config,
            surfaces,
            Arc::new(LayoutRegistry::with_default_grid()),
        )
    }

    /// Build a controller whose stage rectangles are reported by the caller
    pub fn with_layout(
        script: Script,
        config: EngineConfig,
        surfaces: Surfaces,
        layout: Arc<LayoutRegistry>,
    ) -> Self {
        let stages = Arc::new(StageStore::new(surfaces.stages.clone()));
        let mover = Arc::new(TaskMover::new(
            Arc::clone(&stages),
            Arc::clone(&layout),
            config.timing_controller(),
            config.animation.clone(),
            surfaces.transits.clone(),
        ));
        let console = Arc::new(ConsoleLog::new());
        let highlight = Arc::new(HighlightState::new());
        let engine = Arc::new(TimelineEngine::new(
            Arc::new(script),
            Arc::clone(&stages),
            Arc::clone(&mover),
            config.timing_controller(),
            config.animation.clone(),
            surfaces.clone(),
            Arc::clone(&console),
            Arc::clone(&highlight),
        ));
        let (state, _) = watch::channel(RunState::Idle);

        Self {
            engine,
            stages,
            mover,
            layout,
            console,
            highlight,
            surfaces,
            controls: Arc::new(PlaybackControls::new(config.speed)),
            state: Arc::new(state),
            record: Arc::new(Mutex::new(SessionRecord::default())),
        }
    }

    fn record(&self) -> MutexGuard<'_, SessionRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a fresh run. Returns false without side effects if one is already active.
    pub fn run(&self) -> bool {
        let mut record = self.record();
        if self.state.borrow().is_active() {
            warn!("Run requested while a run is active; ignoring");
            return false;
        }

        if let Some(previous) = record.ctx.take() {
            previous.cancel();
        }
        self.clear_everything();
        self.controls.set_paused(false);

        let ctx = RunContext::new(Arc::clone(&self.controls));
        info!(
            "Starting run {} of '{}' at speed {}",
            ctx.session_id,
            self.engine.script().name,
            self.controls.speed()
        );

        record.ctx = Some(ctx.clone());
        record.started_at = Some(Utc::now());
        record.finished_at = None;
        record.last_error = None;
        self.state.send_replace(RunState::Running);

        let engine = Arc::clone(&self.engine);
        let state = Arc::clone(&self.state);
        let shared = Arc::clone(&self.record);
        tokio::spawn(async move {
            let result = AssertUnwindSafe(engine.run(&ctx)).catch_unwind().await;
            let result = result.unwrap_or_else(|payload| {
                Err(EngineError::Panicked(panic_message(payload.as_ref())))
            });
            finish(&ctx, result, &state, &shared);
        });

        true
    }

    /// Flip pause while a run is active and return whether playback is now paused
    pub fn toggle_pause(&self) -> bool {
        let _record = self.record();
        if !self.state.borrow().is_active() {
            return self.controls.is_paused();
        }

        let paused = self.controls.toggle_pause();
        let next = if paused {
            RunState::Paused
        } else {
            RunState::Running
        };
        info!("Playback {}", next);
        self.state.send_replace(next);
        paused
    }

    /// Cancel any run and clear every stage, the console, and the highlight
    pub fn reset(&self) {
        let mut record = self.record();
        if let Some(ctx) = record.ctx.take() {
            info!("Resetting run {}", ctx.session_id);
            ctx.cancel();
        }
        record.started_at = None;
        record.finished_at = None;
        record.last_error = None;

        self.clear_everything();
        self.controls.set_paused(false);
        self.state.send_replace(RunState::Idle);
    }

    /// Apply a new speed to the current and future runs, clamped to the supported range
    pub fn set_speed(&self, speed: f64) -> f64 {
        let applied = self.controls.set_speed(speed);
        if applied != speed {
            warn!("Speed {} adjusted to {}", speed, applied);
        }
        applied
    }

    pub fn speed(&self) -> f64 {
        self.controls.speed()
    }

    pub fn is_paused(&self) -> bool {
        self.controls.is_paused()
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Resolve once no run is active
    pub async fn wait_until_finished(&self) -> RunState {
        let mut receiver = self.state.subscribe();
        let settled = receiver.wait_for(|state| !state.is_active()).await;
        match settled {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    pub fn session(&self) -> RunSession {
        let record = self.record();
        let stages: BTreeMap<String, Vec<String>> = self
            .stages
            .snapshot()
            .into_iter()
            .map(|(id, tokens)| {
                let names = tokens.into_iter().map(|t| t.name).collect();
                (id.to_string(), names)
            })
            .collect();

        RunSession {
            session_id: record.ctx.as_ref().map(|ctx| ctx.session_id.clone()),
            state: self.state(),
            started_at: record.started_at,
            finished_at: record.finished_at,
            speed: self.controls.speed(),
            paused: self.controls.is_paused(),
            output: self.console.lines(),
            stages,
            steps_executed: self.engine.steps_executed(),
            last_error: record.last_error.clone(),
        }
    }

    pub fn script(&self) -> &Arc<Script> {
        self.engine.script()
    }

    pub fn stages(&self) -> &Arc<StageStore> {
        &self.stages
    }

    pub fn layout(&self) -> &Arc<LayoutRegistry> {
        &self.layout
    }

    fn clear_everything(&self) {
        self.stages.clear_all();
        self.mover.clear_transit();
        self.console.clear();
        self.surfaces.output.clear();
        self.highlight.reset(&*self.surfaces.display);
        self.engine.reset_progress();
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        let record = self.record.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ctx) = record.ctx.as_ref() {
            ctx.cancel();
        }
    }
}

/// Settle the state of a finished run, unless a reset or a newer run superseded it
fn finish(
    ctx: &RunContext,
    result: Result<RunOutcome, EngineError>,
    state: &watch::Sender<RunState>,
    record: &Mutex<SessionRecord>,
) {
    let mut record = record.lock().unwrap_or_else(PoisonError::into_inner);
    if !record.owns(&ctx.session_id) {
        info!("Run {} finished after being superseded", ctx.session_id);
        return;
    }

    let next = match result {
        Ok(RunOutcome::Completed) => {
            info!("Run {} completed", ctx.session_id);
            RunState::Completed
        }
        Ok(RunOutcome::Cancelled) => {
            info!("Run {} cancelled", ctx.session_id);
            RunState::Cancelled
        }
        Err(e) => {
            error!("Run {} failed: {}", ctx.session_id, e);
            record.last_error = Some(e.to_string());
            RunState::Completed
        }
    };

    record.finished_at = Some(Utc::now());
    ctx.controls().set_paused(false);
    state.send_replace(next);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
