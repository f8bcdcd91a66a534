// ABOUTME: Built-in example program and its compiled scheduling timeline
// ABOUTME: Two zero-delay timers, one promise reaction, and two synchronous logs

use indexmap::IndexMap;

use super::program::Script;
use super::step::Step;
use super::task::{SourceRange, TaskKind, TaskTemplate};
use crate::engine::StageId;

pub const EXAMPLE_SOURCE: &str = "\
setTimeout(() => {
  console.log('1')
}, 0)

Promise.resolve().then(() => {
  console.log('2')
})

console.log('3')

setTimeout(() => {
  console.log('4')
}, 0)

console.log('5')
";

/// Lines printed by the example when run to completion
pub const EXAMPLE_OUTPUT: [&str; 5] = ["3", "5", "2", "1", "4"];

const STACK_DWELL_MS: u64 = 600;
const TIMER_EXPIRY_MS: u64 = 800;

/// The fixed example program as a declarative script.
pub fn example() -> Script {
    let mut tasks = IndexMap::new();
    let mut task = |key: &str, name: &str, kind: TaskKind, range: SourceRange| {
        tasks.insert(key.to_string(), TaskTemplate::new(name, kind, Some(range)));
    };

    task(
        "set_timeout_1",
        "setTimeout()",
        TaskKind::Function,
        SourceRange::new(1, 1, 3, 6),
    );
    task(
        "timer_cb_1",
        "() => console.log('1')",
        TaskKind::DeferredCallback,
        SourceRange::new(1, 12, 3, 2),
    );
    task(
        "promise_then",
        "Promise.then()",
        TaskKind::Function,
        SourceRange::new(5, 1, 7, 3),
    );
    task(
        "promise_cb",
        "() => console.log('2')",
        TaskKind::PromiseReaction,
        SourceRange::new(5, 24, 7, 2),
    );
    task(
        "log_3",
        "console.log('3')",
        TaskKind::Function,
        SourceRange::line(9, 1, 17),
    );
    task(
        "set_timeout_2",
        "setTimeout()",
        TaskKind::Function,
        SourceRange::new(11, 1, 13, 6),
    );
    task(
        "timer_cb_2",
        "() => console.log('4')",
        TaskKind::DeferredCallback,
        SourceRange::new(11, 12, 13, 2),
    );
    task(
        "log_5",
        "console.log('5')",
        TaskKind::Function,
        SourceRange::line(15, 1, 17),
    );

    let mut steps = Vec::new();

    // Synchronous turn: each top-level statement visits the stack once.
    schedule(&mut steps, "set_timeout_1", "timer_cb_1", StageId::PendingIo);
    schedule(
        &mut steps,
        "promise_then",
        "promise_cb",
        StageId::MicrotaskQueue,
    );
    log_line(&mut steps, "log_3", "3");
    schedule(&mut steps, "set_timeout_2", "timer_cb_2", StageId::PendingIo);
    log_line(&mut steps, "log_5", "5");
    steps.push(Step::ClearHighlight);

    // Both zero-delay timers expire and queue their callbacks in order.
    steps.push(Step::wait(TIMER_EXPIRY_MS));
    steps.push(Step::move_to(
        "timer_cb_1",
        StageId::PendingIo,
        StageId::MacrotaskQueue,
    ));
    steps.push(Step::move_to(
        "timer_cb_2",
        StageId::PendingIo,
        StageId::MacrotaskQueue,
    ));

    // Microtasks drain completely before the first macrotask.
    run_callback(
        &mut steps,
        "promise_cb",
        StageId::MicrotaskQueue,
        SourceRange::line(6, 3, 19),
        "2",
    );
    run_callback(
        &mut steps,
        "timer_cb_1",
        StageId::MacrotaskQueue,
        SourceRange::line(2, 3, 19),
        "1",
    );
    run_callback(
        &mut steps,
        "timer_cb_2",
        StageId::MacrotaskQueue,
        SourceRange::line(12, 3, 19),
        "4",
    );

    Script {
        name: "event-loop-basics".to_string(),
        description: Some(
            "Synchronous logs, one promise reaction and two zero-delay timers".to_string(),
        ),
        source: EXAMPLE_SOURCE.to_string(),
        tasks,
        steps,
    }
}

/// A scheduling call sits on the stack and hands its callback to `stage`
fn schedule(steps: &mut Vec<Step>, call: &str, callback: &str, stage: StageId) {
    steps.push(Step::set_stack(call));
    steps.push(Step::wait(STACK_DWELL_MS));
    steps.push(Step::move_to(callback, StageId::Stack, stage));
    steps.push(Step::fade_remove(call));
}

fn log_line(steps: &mut Vec<Step>, call: &str, text: &str) {
    steps.push(Step::set_stack(call));
    steps.push(Step::wait(STACK_DWELL_MS));
    steps.push(Step::emit(text));
    steps.push(Step::fade_remove(call));
}

/// The loop dispatches a queued callback onto the stack, which logs and exits
fn run_callback(
    steps: &mut Vec<Step>,
    callback: &str,
    queue: StageId,
    body: SourceRange,
    text: &str,
) {
    steps.push(Step::dispatch(callback, queue, StageId::Stack));
    steps.push(Step::Highlight { range: body });
    steps.push(Step::wait(STACK_DWELL_MS));
    steps.push(Step::emit(text));
    steps.push(Step::fade_remove(callback));
    steps.push(Step::ClearHighlight);
}
