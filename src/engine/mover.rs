// ABOUTME: Task mover animating a single token between stages
// ABOUTME: Removes from source, runs one or two transit legs, then inserts into the destination

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, instrument};

use super::context::{Checkpoint, RunContext};
use super::error::Result;
use super::layout::{LayoutRegistry, LayoutTarget, Rect};
use super::stages::{StageId, StageStore};
use super::timing::TimingController;
use crate::script::TaskToken;
use crate::surface::TransitObserver;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TransitLeg {
    Direct,
    ToDispatcher,
    FromDispatcher,
}

/// A token in flight between two on-screen rectangles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transit {
    pub token: TaskToken,
    pub from: LayoutTarget,
    pub to: LayoutTarget,
    pub start: Rect,
    pub end: Rect,
    pub leg: TransitLeg,
    pub duration_ms: u64,
}

/// Fixed animation durations. These do not scale with speed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnimationTimings {
    pub transit: Duration,
    pub dispatcher_dwell: Duration,
    pub settle: Duration,
    pub fade: Duration,
}

impl Default for AnimationTimings {
    fn default() -> Self {
        Self {
            transit: Duration::from_millis(500),
            dispatcher_dwell: Duration::from_millis(300),
            settle: Duration::from_millis(50),
            fade: Duration::from_millis(300),
        }
    }
}

pub struct TaskMover {
    stages: Arc<StageStore>,
    layout: Arc<LayoutRegistry>,
    timing: TimingController,
    timings: AnimationTimings,
    observer: Arc<dyn TransitObserver>,
    current: Mutex<Option<Transit>>,
}

impl TaskMover {
    pub fn new(
        stages: Arc<StageStore>,
        layout: Arc<LayoutRegistry>,
        timing: TimingController,
        timings: AnimationTimings,
        observer: Arc<dyn TransitObserver>,
    ) -> Self {
        Self {
            stages,
            layout,
            timing,
            timings,
            observer,
            current: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Transit>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_transit(&self) -> Option<Transit> {
        self.slot().clone()
    }

    /// Drop any in-flight transit regardless of which run owns it
    pub fn clear_transit(&self) {
        let mut slot = self.slot();
        if slot.take().is_some() {
            self.observer.transit_cleared();
        }
    }

    /// Move `token` from `from` to `to`. On cancellation the token is left
    /// off-stage; a reset is expected to clean up.
    #[instrument(skip(self, ctx, token), fields(token = %token.name))]
    pub async fn move_task(
        &self,
        ctx: &RunContext,
        token: TaskToken,
        from: StageId,
        to: StageId,
        via_dispatcher: bool,
    ) -> Result<Checkpoint> {
        if self
            .stages
            .guarded(ctx)
            .remove(from, &token.id)
            .is_cancelled()
        {
            return Ok(Checkpoint::Cancelled);
        }

        if self.timing.hold(ctx, self.timings.settle).await.is_cancelled() {
            return Ok(Checkpoint::Cancelled);
        }

        let source = LayoutTarget::Stage(from);
        let destination = LayoutTarget::Stage(to);

        let Some(start) = self.layout.await_rect(ctx, source).await else {
            return Ok(Checkpoint::Cancelled);
        };

        if via_dispatcher {
            let Some(waypoint) = self.layout.await_rect(ctx, LayoutTarget::Dispatcher).await
            else {
                return Ok(Checkpoint::Cancelled);
            };
            let leg = self.leg(&token, source, LayoutTarget::Dispatcher, start, waypoint);
            if self.animate(ctx, leg, TransitLeg::ToDispatcher).await.is_cancelled() {
                return Ok(Checkpoint::Cancelled);
            }

            if self
                .timing
                .hold(ctx, self.timings.dispatcher_dwell)
                .await
                .is_cancelled()
            {
                return Ok(Checkpoint::Cancelled);
            }

            // Destination may have moved during the first leg
            let Some(end) = self.layout.await_rect(ctx, destination).await else {
                return Ok(Checkpoint::Cancelled);
            };
            let leg = self.leg(&token, LayoutTarget::Dispatcher, destination, waypoint, end);
            if self.animate(ctx, leg, TransitLeg::FromDispatcher).await.is_cancelled() {
                return Ok(Checkpoint::Cancelled);
            }
        } else {
            let Some(end) = self.layout.await_rect(ctx, destination).await else {
                return Ok(Checkpoint::Cancelled);
            };
            let leg = self.leg(&token, source, destination, start, end);
            if self.animate(ctx, leg, TransitLeg::Direct).await.is_cancelled() {
                return Ok(Checkpoint::Cancelled);
            }
        }

        if self.finish_transit(ctx).is_cancelled() {
            return Ok(Checkpoint::Cancelled);
        }

        if self.timing.hold(ctx, self.timings.settle).await.is_cancelled() {
            return Ok(Checkpoint::Cancelled);
        }

        debug!("{} settled in {}", token.name, to);
        self.stages.guarded(ctx).add(to, token)
    }

    fn leg(
        &self,
        token: &TaskToken,
        from: LayoutTarget,
        to: LayoutTarget,
        start: Rect,
        end: Rect,
    ) -> Transit {
        Transit {
            token: token.clone(),
            from,
            to,
            start,
            end,
            leg: TransitLeg::Direct,
            duration_ms: self.timings.transit.as_millis() as u64,
        }
    }

    async fn animate(&self, ctx: &RunContext, mut transit: Transit, leg: TransitLeg) -> Checkpoint {
        transit.leg = leg;
        {
            let mut slot = self.slot();
            if !ctx.should_continue() {
                return Checkpoint::Cancelled;
            }
            debug!("transit {:?}: {} -> {}", leg, transit.from, transit.to);
            self.observer.transit_started(&transit);
            *slot = Some(transit);
        }

        self.timing.hold(ctx, self.timings.transit).await
    }

    fn finish_transit(&self, ctx: &RunContext) -> Checkpoint {
        let mut slot = self.slot();
        if !ctx.should_continue() {
            return Checkpoint::Cancelled;
        }
        if slot.take().is_some() {
            self.observer.transit_cleared();
        }
        Checkpoint::Proceed
    }
}
