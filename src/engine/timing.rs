// ABOUTME: Timing controller converting logical delays into pause-aware wall-clock waits
// ABOUTME: Polls at short intervals, accumulating only unpaused time and reading speed live

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::trace;

use super::context::{Checkpoint, RunContext};

const SLACK: Duration = Duration::from_micros(10);

#[derive(Debug, Clone)]
pub struct TimingController {
    active_poll: Duration,
    paused_poll: Duration,
}

impl TimingController {
    pub fn new(active_poll: Duration, paused_poll: Duration) -> Self {
        Self {
            active_poll: active_poll.max(Duration::from_millis(1)),
            paused_poll: paused_poll.max(Duration::from_millis(1)),
        }
    }

    /// Wait `logical` scaled by the live speed multiplier
    pub async fn wait(&self, ctx: &RunContext, logical: Duration) -> Checkpoint {
        self.accumulate(ctx, logical, true).await
    }

    /// Wait a fixed animation duration; pauses still stop the clock
    pub async fn hold(&self, ctx: &RunContext, duration: Duration) -> Checkpoint {
        self.accumulate(ctx, duration, false).await
    }

    async fn accumulate(&self, ctx: &RunContext, logical: Duration, scaled: bool) -> Checkpoint {
        let controls = ctx.controls();
        let mut progress = Duration::ZERO;
        let mut last_poll = Instant::now();
        let mut epoch = controls.pause_epoch();

        loop {
            if !ctx.should_continue() {
                trace!("wait abandoned after {:?}", progress);
                return Checkpoint::Cancelled;
            }

            // Float rounding when scaling can leave a sliver behind
            if progress + SLACK >= logical {
                return Checkpoint::Proceed;
            }

            let rate = if scaled { ctx.speed() } else { 1.0 };
            if controls.is_paused() {
                sleep(self.paused_poll).await;
            } else {
                let remaining = (logical - progress).div_f64(rate);
                sleep(self.active_poll.min(remaining)).await;
            }

            let now = Instant::now();
            let current_epoch = controls.pause_epoch();
            // An interval that saw a pause transition is discarded entirely
            if current_epoch == epoch && !controls.is_paused() {
                progress += (now - last_poll).mul_f64(rate);
            }
            epoch = current_epoch;
            last_poll = now;
        }
    }
}

impl Default for TimingController {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_wait_scales_with_speed() {
        let timing = TimingController::default();
        let ctx = RunContext::detached();
        ctx.controls().set_speed(2.0);

        let start = Instant::now();
        let outcome = timing.wait(&ctx, Duration::from_millis(1000)).await;

        assert_eq!(outcome, Checkpoint::Proceed);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_ignores_speed() {
        let timing = TimingController::default();
        let ctx = RunContext::detached();
        ctx.controls().set_speed(0.1);

        let start = Instant::now();
        timing.hold(&ctx, Duration::from_millis(500)).await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_the_clock() {
        let timing = TimingController::default();
        let ctx = RunContext::detached();
        let controls = Arc::clone(ctx.controls());

        let toggler = tokio::spawn(async move {
            sleep(Duration::from_millis(120)).await;
            controls.toggle_pause();
            sleep(Duration::from_millis(1000)).await;
            controls.toggle_pause();
        });

        let start = Instant::now();
        timing.wait(&ctx, Duration::from_millis(300)).await;
        toggler.await.unwrap();

        // 300ms of unpaused time plus the 1000ms pause
        assert!(start.elapsed() >= Duration::from_millis(1300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_pause_toggles_never_count() {
        let timing = TimingController::default();
        let ctx = RunContext::detached();
        ctx.controls().set_speed(2.0);
        let controls = Arc::clone(ctx.controls());

        // (pause at, resume at) in ms; the first pair lands inside one 50ms poll
        let pauses = [(30, 40), (150, 400), (420, 430), (480, 485)];
        let paused_total: u64 = pauses.iter().map(|(from, to)| to - from).sum();

        let toggler = tokio::spawn(async move {
            let start = Instant::now();
            for (from, to) in pauses {
                tokio::time::sleep_until(start + Duration::from_millis(from)).await;
                controls.toggle_pause();
                tokio::time::sleep_until(start + Duration::from_millis(to)).await;
                controls.toggle_pause();
            }
        });

        let start = Instant::now();
        let outcome = timing.wait(&ctx, Duration::from_millis(1000)).await;
        toggler.await.unwrap();

        assert_eq!(outcome, Checkpoint::Proceed);
        assert!(!ctx.controls().is_paused());
        // 1000 logical ms at 2x is 500ms of unpaused time
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500 + paused_total));
        assert!(elapsed < Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_speed_change() {
        let timing = TimingController::default();
        let ctx = RunContext::detached();
        let controls = Arc::clone(ctx.controls());

        tokio::spawn(async move {
            sleep(Duration::from_millis(200)).await;
            controls.set_speed(0.5);
        });

        let start = Instant::now();
        timing.wait(&ctx, Duration::from_millis(400)).await;

        // 200ms of progress at 1x, the remaining 200ms at half speed
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(600));
        assert!(elapsed < Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_returns_early() {
        let timing = TimingController::default();
        let ctx = RunContext::detached();
        let canceller = ctx.clone();

        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let outcome = timing.wait(&ctx, Duration::from_secs(10)).await;

        assert_eq!(outcome, Checkpoint::Cancelled);
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_paused() {
        let timing = TimingController::default();
        let ctx = RunContext::detached();
        ctx.controls().toggle_pause();
        let canceller = ctx.clone();

        tokio::spawn(async move {
            sleep(Duration::from_millis(250)).await;
            canceller.cancel();
        });

        let outcome = timing.wait(&ctx, Duration::from_millis(50)).await;
        assert_eq!(outcome, Checkpoint::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_wait_is_immediate() {
        let timing = TimingController::default();
        let ctx = RunContext::detached();

        let start = Instant::now();
        assert_eq!(timing.wait(&ctx, Duration::ZERO).await, Checkpoint::Proceed);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
