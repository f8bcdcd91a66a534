// ABOUTME: Script validation covering task references, source ranges, and stage membership
// ABOUTME: Walks the step list statically to flag moves that cannot find their token

use std::collections::{HashMap, HashSet};

use super::error::ValidationError;
use super::program::Script;
use super::step::Step;
use super::task::SourceRange;
use crate::engine::StageId;

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
    pub is_valid: bool,
}

pub struct ScriptValidator {
    strict_mode: bool,
}

impl ScriptValidator {
    pub fn new() -> Self {
        Self { strict_mode: false }
    }

    /// In strict mode membership warnings count as errors
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Validate a complete script
    pub fn validate(&self, script: &Script) -> ValidationReport {
        let mut report = ValidationReport::new();

        if script.steps.is_empty() {
            report.errors.push(ValidationError::EmptyScript);
        }

        self.validate_task_references(script, &mut report);
        self.validate_ranges(script, &mut report);
        self.walk_membership(script, &mut report);

        report.is_valid =
            report.errors.is_empty() && !(self.strict_mode && report.has_warnings());
        report
    }

    fn validate_task_references(&self, script: &Script, report: &mut ValidationReport) {
        for (index, step) in script.steps.iter().enumerate() {
            if let Some(key) = step.task_key() {
                if !script.tasks.contains_key(key) {
                    report.errors.push(ValidationError::UnknownTask {
                        step: index,
                        task: key.to_string(),
                    });
                }
            }

            if let Step::MoveTo { task, from, to, .. } = step {
                if from == to {
                    report.errors.push(ValidationError::SelfMove {
                        step: index,
                        task: task.clone(),
                        stage: from.to_string(),
                    });
                }
            }
        }
    }

    fn validate_ranges(&self, script: &Script, report: &mut ValidationReport) {
        let lines = script.source_lines();

        for (key, template) in &script.tasks {
            if let Some(range) = &template.range {
                check_range(key, range, &lines, report);
            }
        }

        for (index, step) in script.steps.iter().enumerate() {
            let range = match step {
                Step::SetStack {
                    range: Some(range), ..
                } => range,
                Step::Highlight { range } => range,
                _ => continue,
            };
            check_range(&format!("step {}", index), range, &lines, report);
        }
    }

    /// Track where each task key would sit after every step and warn on moves
    /// or fades that would find nothing to act on. Fading a key with no live
    /// token fails at run time, so that case is an error.
    fn walk_membership(&self, script: &Script, report: &mut ValidationReport) {
        let mut location: HashMap<&str, StageId> = HashMap::new();
        let mut bound: HashSet<&str> = HashSet::new();

        for (index, step) in script.steps.iter().enumerate() {
            match step {
                Step::SetStack { task, .. } => {
                    location.retain(|_, stage| *stage != StageId::Stack);
                    location.insert(task, StageId::Stack);
                    bound.insert(task);
                }
                Step::MoveTo { task, from, to, .. } => {
                    match location.get(task.as_str()) {
                        Some(current) if current != from => report.warnings.push(format!(
                            "Step {}: task '{}' is in {} but moves from {}",
                            index, task, current, from
                        )),
                        None if *from != StageId::Stack => report.warnings.push(format!(
                            "Step {}: task '{}' first appears moving from {} instead of the stack",
                            index, task, from
                        )),
                        _ => {}
                    }
                    location.insert(task, *to);
                    bound.insert(task);
                }
                Step::FadeRemove { task } => {
                    if !bound.remove(task.as_str()) {
                        report.errors.push(ValidationError::UnboundFade {
                            step: index,
                            task: task.clone(),
                        });
                    } else if location.get(task.as_str()) != Some(&StageId::Stack) {
                        report.warnings.push(format!(
                            "Step {}: task '{}' fades out but is not on the stack",
                            index, task
                        ));
                    }
                    location.remove(task.as_str());
                }
                _ => {}
            }
        }
    }
}

fn check_range(owner: &str, range: &SourceRange, lines: &[&str], report: &mut ValidationReport) {
    if !range.is_ordered() {
        report.errors.push(ValidationError::InvertedRange {
            owner: owner.to_string(),
            range: range.to_string(),
        });
        return;
    }

    // Scripts without source text cannot be range-checked
    if lines.is_empty() {
        return;
    }

    let fits = |line: u32, col: u32| {
        line >= 1
            && col >= 1
            && lines
                .get(line as usize - 1)
                .is_some_and(|text| col as usize <= text.chars().count() + 1)
    };

    if !fits(range.start_line, range.start_col) || !fits(range.end_line, range.end_col) {
        report.errors.push(ValidationError::RangeOutOfSource {
            owner: owner.to_string(),
            range: range.to_string(),
            lines: lines.len(),
        });
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ScriptValidator {
    fn default() -> Self {
        Self::new()
    }
}
