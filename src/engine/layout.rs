// ABOUTME: Layout registry receiving pushed rectangle measurements for stage containers
// ABOUTME: Readers always see the latest measurement; unmeasured targets stall callers

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace};

use super::context::RunContext;
use super::stages::StageId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Something on screen a transit can start or end at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case", tag = "target", content = "stage")]
pub enum LayoutTarget {
    Stage(StageId),
    Dispatcher,
}

impl fmt::Display for LayoutTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutTarget::Stage(stage) => write!(f, "{}", stage),
            LayoutTarget::Dispatcher => write!(f, "dispatcher"),
        }
    }
}

impl From<StageId> for LayoutTarget {
    fn from(stage: StageId) -> Self {
        LayoutTarget::Stage(stage)
    }
}

pub struct LayoutRegistry {
    rects: RwLock<HashMap<LayoutTarget, Rect>>,
    poll_interval: Duration,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self {
            rects: RwLock::new(HashMap::new()),
            poll_interval: Duration::from_millis(50),
        }
    }

    /// A fixed side-by-side arrangement for headless runs
    pub fn with_default_grid() -> Self {
        let registry = Self::new();
        registry.on_rect_changed(
            LayoutTarget::Stage(StageId::Stack),
            Rect::new(0.0, 0.0, 200.0, 600.0),
        );
        registry.on_rect_changed(
            LayoutTarget::Stage(StageId::PendingIo),
            Rect::new(220.0, 0.0, 400.0, 190.0),
        );
        registry.on_rect_changed(
            LayoutTarget::Stage(StageId::MacrotaskQueue),
            Rect::new(220.0, 205.0, 400.0, 190.0),
        );
        registry.on_rect_changed(
            LayoutTarget::Stage(StageId::MicrotaskQueue),
            Rect::new(220.0, 410.0, 400.0, 190.0),
        );
        registry.on_rect_changed(LayoutTarget::Dispatcher, Rect::new(150.0, 280.0, 40.0, 40.0));
        registry
    }

    /// Push a new measurement for a target, replacing the previous one
    pub fn on_rect_changed(&self, target: LayoutTarget, rect: Rect) {
        trace!("layout {} -> {:?}", target, rect);
        self.rects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(target, rect);
    }

    pub fn latest(&self, target: LayoutTarget) -> Option<Rect> {
        self.rects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&target)
            .copied()
    }

    /// Poll until a measurement exists. Returns None only on cancellation;
    /// a target that is never measured stalls the caller.
    pub async fn await_rect(&self, ctx: &RunContext, target: LayoutTarget) -> Option<Rect> {
        let mut logged = false;
        loop {
            if !ctx.should_continue() {
                return None;
            }
            if let Some(rect) = self.latest(target) {
                return Some(rect);
            }
            if !logged {
                debug!("waiting for {} to be measured", target);
                logged = true;
            }
            sleep(self.poll_interval).await;
        }
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_latest_measurement_wins() {
        let registry = LayoutRegistry::new();
        let target = LayoutTarget::Stage(StageId::Stack);

        assert_eq!(registry.latest(target), None);
        registry.on_rect_changed(target, Rect::new(0.0, 0.0, 10.0, 10.0));
        registry.on_rect_changed(target, Rect::new(5.0, 5.0, 20.0, 20.0));

        assert_eq!(registry.latest(target), Some(Rect::new(5.0, 5.0, 20.0, 20.0)));
    }

    #[test]
    fn test_default_grid_covers_all_targets() {
        let registry = LayoutRegistry::with_default_grid();
        for stage in StageId::ALL {
            assert!(registry.latest(stage.into()).is_some());
        }
        assert!(registry.latest(LayoutTarget::Dispatcher).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_rect_stalls_until_measured() {
        let registry = Arc::new(LayoutRegistry::new());
        let ctx = RunContext::detached();
        let target = LayoutTarget::Stage(StageId::PendingIo);

        let pending =
            tokio::time::timeout(Duration::from_secs(5), registry.await_rect(&ctx, target)).await;
        assert!(pending.is_err());

        let feeder = Arc::clone(&registry);
        tokio::spawn(async move {
            sleep(Duration::from_millis(120)).await;
            feeder.on_rect_changed(target, Rect::new(1.0, 2.0, 3.0, 4.0));
        });

        let rect = registry.await_rect(&ctx, target).await;
        assert_eq!(rect, Some(Rect::new(1.0, 2.0, 3.0, 4.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_rect_cancelled() {
        let registry = LayoutRegistry::new();
        let ctx = RunContext::detached();
        ctx.cancel();

        let rect = registry.await_rect(&ctx, LayoutTarget::Dispatcher).await;
        assert_eq!(rect, None);
    }
}
