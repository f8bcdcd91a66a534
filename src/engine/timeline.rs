// ABOUTME: Timeline execution engine interpreting script steps strictly in order
// ABOUTME: Every step is a cancellation checkpoint; stale runs never write state

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use super::context::{Checkpoint, RunContext};
use super::error::{EngineError, Result};
use super::mover::{AnimationTimings, TaskMover};
use super::session::{ConsoleLog, HighlightState, RunOutcome};
use super::stages::{StageId, StageStore};
use super::timing::TimingController;
use crate::script::{Script, Step, TaskToken};
use crate::surface::Surfaces;

/// Live tokens bound to script task keys for the duration of one run
type TokenTable = HashMap<String, TaskToken>;

pub struct TimelineEngine {
    script: Arc<Script>,
    stages: Arc<StageStore>,
    mover: Arc<TaskMover>,
    timing: TimingController,
    animation: AnimationTimings,
    surfaces: Surfaces,
    console: Arc<ConsoleLog>,
    highlight: Arc<HighlightState>,
    progress: AtomicUsize,
}

impl TimelineEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        script: Arc<Script>,
        stages: Arc<StageStore>,
        mover: Arc<TaskMover>,
        timing: TimingController,
        animation: AnimationTimings,
        surfaces: Surfaces,
        console: Arc<ConsoleLog>,
        highlight: Arc<HighlightState>,
    ) -> Self {
        Self {
            script,
            stages,
            mover,
            timing,
            animation,
            surfaces,
            console,
            highlight,
            progress: AtomicUsize::new(0),
        }
    }

    pub fn script(&self) -> &Arc<Script> {
        &self.script
    }

    /// Steps fully executed by the most recent run
    pub fn steps_executed(&self) -> usize {
        self.progress.load(Ordering::SeqCst)
    }

    pub(crate) fn reset_progress(&self) {
        self.progress.store(0, Ordering::SeqCst);
    }

    /// Interpret every step in order until the script ends or the run is cancelled
    #[instrument(skip(self, ctx), fields(session = %ctx.session_id, script = %self.script.name))]
    pub async fn run(&self, ctx: &RunContext) -> Result<RunOutcome> {
        let total = self.script.steps.len();
        let started = Instant::now();
        let mut tokens = TokenTable::new();
        self.progress.store(0, Ordering::SeqCst);

        info!("Starting timeline with {} steps", total);

        for (index, step) in self.script.steps.iter().enumerate() {
            if !ctx.should_continue() {
                info!("Timeline cancelled before step {}/{}", index + 1, total);
                return Ok(RunOutcome::Cancelled);
            }

            debug!("step {}/{}: {}", index + 1, total, step);
            let checkpoint = self
                .execute_step(ctx, step, &mut tokens)
                .await
                .map_err(|e| e.at_step(index, step.kind()))?;

            if checkpoint.is_cancelled() {
                info!("Timeline cancelled during step {}/{}", index + 1, total);
                return Ok(RunOutcome::Cancelled);
            }
            self.progress.store(index + 1, Ordering::SeqCst);
        }

        info!("Timeline completed in {:?}", started.elapsed());
        Ok(RunOutcome::Completed)
    }

    async fn execute_step(
        &self,
        ctx: &RunContext,
        step: &Step,
        tokens: &mut TokenTable,
    ) -> Result<Checkpoint> {
        match step {
            Step::SetStack { task, range } => {
                let token = self.mint(task)?;
                let highlight = range.or(token.range);
                tokens.insert(task.clone(), token.clone());

                if self
                    .stages
                    .guarded(ctx)
                    .replace(StageId::Stack, vec![token])?
                    .is_cancelled()
                {
                    return Ok(Checkpoint::Cancelled);
                }
                match highlight {
                    Some(range) => Ok(self.highlight.show(ctx, &*self.surfaces.display, range)),
                    None => Ok(Checkpoint::Proceed),
                }
            }

            Step::MoveTo {
                task,
                from,
                to,
                via_dispatcher,
            } => {
                let token = match tokens.get(task) {
                    Some(token) => token.clone(),
                    None => {
                        let token = self.mint(task)?;
                        tokens.insert(task.clone(), token.clone());
                        token
                    }
                };
                self.mover
                    .move_task(ctx, token, *from, *to, *via_dispatcher)
                    .await
            }

            Step::Wait { ms } => Ok(self.timing.wait(ctx, Duration::from_millis(*ms)).await),

            Step::EmitOutput { text } => {
                Ok(self.console.append(ctx, &*self.surfaces.output, text))
            }

            Step::FadeRemove { task } => {
                let token = tokens
                    .remove(task)
                    .ok_or_else(|| EngineError::TokenNotBound { key: task.clone() })?;
                self.fade_and_remove(ctx, &token).await
            }

            Step::Highlight { range } => {
                Ok(self.highlight.show(ctx, &*self.surfaces.display, *range))
            }

            Step::ClearHighlight => Ok(self.highlight.hide(ctx, &*self.surfaces.display)),
        }
    }

    fn mint(&self, key: &str) -> Result<TaskToken> {
        self.script
            .task(key)
            .map(|template| template.mint())
            .ok_or_else(|| EngineError::UnknownTask {
                key: key.to_string(),
            })
    }

    /// Flag the exit animation, let it play, then drop the token from the stack
    async fn fade_and_remove(&self, ctx: &RunContext, token: &TaskToken) -> Result<Checkpoint> {
        let stages = self.stages.guarded(ctx);
        if stages.set_fade_out(StageId::Stack, &token.id).is_cancelled() {
            return Ok(Checkpoint::Cancelled);
        }
        if self.timing.hold(ctx, self.animation.fade).await.is_cancelled() {
            return Ok(Checkpoint::Cancelled);
        }
        if stages.remove(StageId::Stack, &token.id).is_cancelled() {
            return Ok(Checkpoint::Cancelled);
        }
        Ok(self.timing.hold(ctx, self.animation.settle).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LayoutRegistry;
    use crate::script::{example, SourceRange, TaskKind, TaskTemplate, EXAMPLE_OUTPUT};
    use crate::surface::Recorder;
    use indexmap::IndexMap;

    fn engine_for(script: Script, recorder: Arc<Recorder>) -> (TimelineEngine, Arc<StageStore>) {
        let surfaces = Surfaces::uniform(recorder);
        let stages = Arc::new(StageStore::new(surfaces.stages.clone()));
        let mover = Arc::new(TaskMover::new(
            Arc::clone(&stages),
            Arc::new(LayoutRegistry::with_default_grid()),
            TimingController::default(),
            AnimationTimings::default(),
            surfaces.transits.clone(),
        ));
        let engine = TimelineEngine::new(
            Arc::new(script),
            Arc::clone(&stages),
            mover,
            TimingController::default(),
            AnimationTimings::default(),
            surfaces,
            Arc::new(ConsoleLog::new()),
            Arc::new(HighlightState::new()),
        );
        (engine, stages)
    }

    #[tokio::test(start_paused = true)]
    async fn test_example_runs_to_completion() {
        let recorder = Arc::new(Recorder::new());
        let (engine, stages) = engine_for(example(), recorder.clone());
        let ctx = RunContext::detached();

        let outcome = engine.run(&ctx).await.unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(recorder.output_lines(), EXAMPLE_OUTPUT.to_vec());
        assert_eq!(engine.console.lines(), EXAMPLE_OUTPUT.to_vec());
        assert_eq!(engine.steps_executed(), engine.script().steps.len());
        assert!(stages.is_empty());
        assert_eq!(recorder.highlight(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_stack_mints_fresh_tokens() {
        let mut tasks = IndexMap::new();
        tasks.insert(
            "log".to_string(),
            TaskTemplate::new("log", TaskKind::Function, Some(SourceRange::line(1, 1, 4))),
        );
        let script = Script {
            name: "reentry".to_string(),
            description: None,
            source: String::new(),
            tasks,
            steps: vec![
                Step::set_stack("log"),
                Step::fade_remove("log"),
                Step::set_stack("log"),
            ],
        };

        let recorder = Arc::new(Recorder::new());
        let (engine, stages) = engine_for(script, recorder.clone());
        engine.run(&RunContext::detached()).await.unwrap();

        let stacked: Vec<String> = recorder
            .events()
            .into_iter()
            .filter_map(|e| match e.event {
                crate::surface::SurfaceEvent::StageChanged { stage, tokens }
                    if stage == StageId::Stack && tokens.len() == 1 && !tokens[0].fade_out =>
                {
                    Some(tokens[0].id.clone())
                }
                _ => None,
            })
            .collect();

        assert_eq!(stacked.len(), 2);
        assert_ne!(stacked[0], stacked[1]);
        assert_eq!(stages.contents(StageId::Stack).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_of_unbound_task_fails_step() {
        let mut tasks = IndexMap::new();
        tasks.insert(
            "cb".to_string(),
            TaskTemplate::new("cb", TaskKind::DeferredCallback, None),
        );
        let script = Script {
            name: "broken".to_string(),
            description: None,
            source: String::new(),
            tasks,
            steps: vec![Step::emit("x"), Step::fade_remove("cb")],
        };

        let (engine, _) = engine_for(script, Arc::new(Recorder::new()));
        let err = engine.run(&RunContext::detached()).await.unwrap_err();

        match err {
            EngineError::StepFailed { index, kind, source } => {
                assert_eq!(index, 1);
                assert_eq!(kind, "fade_remove");
                assert!(matches!(*source, EngineError::TokenNotBound { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.steps_executed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_stops_output() {
        let recorder = Arc::new(Recorder::new());
        let (engine, _) = engine_for(example(), recorder.clone());
        let engine = Arc::new(engine);
        let ctx = RunContext::detached();

        let runner = Arc::clone(&engine);
        let run_ctx = ctx.clone();
        let handle = tokio::spawn(async move { runner.run(&run_ctx).await });

        // Let the synchronous turn print "3" but not "5"
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !recorder.output_lines().is_empty() {
                break;
            }
        }
        ctx.cancel();

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(recorder.output_lines(), vec!["3"]);
        assert!(engine.steps_executed() < engine.script().steps.len());
    }
}
