// ABOUTME: Declarative step descriptors consumed by the timeline interpreter
// ABOUTME: Each step is one scheduling action: stack, move, wait, output, fade, highlight

use serde::{Deserialize, Serialize};
use std::fmt;

use super::task::SourceRange;
use crate::engine::StageId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Put exactly one freshly minted token on the stack and highlight it
    SetStack {
        task: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        range: Option<SourceRange>,
    },
    MoveTo {
        task: String,
        from: StageId,
        to: StageId,
        #[serde(default)]
        via_dispatcher: bool,
    },
    /// Scripted delay in logical milliseconds, scaled by speed
    Wait { ms: u64 },
    EmitOutput { text: String },
    FadeRemove { task: String },
    Highlight { range: SourceRange },
    ClearHighlight,
}

impl Step {
    pub fn set_stack(task: &str) -> Self {
        Step::SetStack {
            task: task.to_string(),
            range: None,
        }
    }

    pub fn move_to(task: &str, from: StageId, to: StageId) -> Self {
        Step::MoveTo {
            task: task.to_string(),
            from,
            to,
            via_dispatcher: false,
        }
    }

    pub fn dispatch(task: &str, from: StageId, to: StageId) -> Self {
        Step::MoveTo {
            task: task.to_string(),
            from,
            to,
            via_dispatcher: true,
        }
    }

    pub fn wait(ms: u64) -> Self {
        Step::Wait { ms }
    }

    pub fn emit(text: &str) -> Self {
        Step::EmitOutput {
            text: text.to_string(),
        }
    }

    pub fn fade_remove(task: &str) -> Self {
        Step::FadeRemove {
            task: task.to_string(),
        }
    }

    /// The task key this step refers to, if any
    pub fn task_key(&self) -> Option<&str> {
        match self {
            Step::SetStack { task, .. } | Step::MoveTo { task, .. } | Step::FadeRemove { task } => {
                Some(task)
            }
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Step::SetStack { .. } => "set_stack",
            Step::MoveTo { .. } => "move_to",
            Step::Wait { .. } => "wait",
            Step::EmitOutput { .. } => "emit_output",
            Step::FadeRemove { .. } => "fade_remove",
            Step::Highlight { .. } => "highlight",
            Step::ClearHighlight => "clear_highlight",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::SetStack { task, .. } => write!(f, "set_stack({})", task),
            Step::MoveTo {
                task,
                from,
                to,
                via_dispatcher,
            } => {
                if *via_dispatcher {
                    write!(f, "move_to({}, {} -> dispatcher -> {})", task, from, to)
                } else {
                    write!(f, "move_to({}, {} -> {})", task, from, to)
                }
            }
            Step::Wait { ms } => write!(f, "wait({}ms)", ms),
            Step::EmitOutput { text } => write!(f, "emit_output({:?})", text),
            Step::FadeRemove { task } => write!(f, "fade_remove({})", task),
            Step::Highlight { range } => write!(f, "highlight({})", range),
            Step::ClearHighlight => write!(f, "clear_highlight"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_yaml_shape() {
        let yaml = r#"
- step: set_stack
  task: log_3
- step: move_to
  task: timer_cb
  from: macrotask-queue
  to: stack
  via_dispatcher: true
- step: wait
  ms: 600
- step: clear_highlight
"#;
        let steps: Vec<Step> = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0], Step::set_stack("log_3"));
        assert_eq!(
            steps[1],
            Step::dispatch("timer_cb", StageId::MacrotaskQueue, StageId::Stack)
        );
        assert_eq!(steps[2], Step::wait(600));
        assert_eq!(steps[3], Step::ClearHighlight);
    }

    #[test]
    fn test_task_key() {
        assert_eq!(Step::fade_remove("a").task_key(), Some("a"));
        assert_eq!(Step::emit("3").task_key(), None);
        assert_eq!(Step::wait(10).task_key(), None);
    }

    #[test]
    fn test_display() {
        let step = Step::dispatch("cb", StageId::MicrotaskQueue, StageId::Stack);
        assert_eq!(
            step.to_string(),
            "move_to(cb, microtask-queue -> dispatcher -> stack)"
        );
    }
}
