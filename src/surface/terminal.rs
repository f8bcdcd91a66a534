// ABOUTME: Terminal surface printing engine events for headless runs
// ABOUTME: Renders highlights as source excerpts and stages as one-line summaries

use std::io::Write;

use super::{OutputPanel, StageObserver, TextDisplay, TransitObserver};
use crate::engine::{StageId, Transit, TransitLeg};
use crate::script::{SourceRange, TaskToken};

pub struct TerminalSurface {
    source: Vec<String>,
}

impl TerminalSurface {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.lines().map(str::to_string).collect(),
        }
    }

    fn emit(&self, line: String) {
        let mut stdout = std::io::stdout().lock();
        // A closed stdout should not take the run down with it
        let _ = writeln!(stdout, "{}", line);
    }

    /// First highlighted line of source, trimmed
    fn excerpt(&self, range: &SourceRange) -> Option<&str> {
        let index = (range.start_line as usize).checked_sub(1)?;
        self.source.get(index).map(|line| line.trim())
    }
}

impl TextDisplay for TerminalSurface {
    fn highlight_range(&self, range: &SourceRange) {
        match self.excerpt(range) {
            Some(text) => self.emit(format!("  > line {:>2} | {}", range.start_line, text)),
            None => self.emit(format!("  > {}", range)),
        }
    }

    fn clear_highlight(&self) {}
}

impl OutputPanel for TerminalSurface {
    fn append_output(&self, line: &str) {
        self.emit(format!("console: {}", line));
    }

    fn clear(&self) {}
}

impl StageObserver for TerminalSurface {
    fn stage_changed(&self, stage: StageId, tokens: &[TaskToken]) {
        let names: Vec<&str> = tokens
            .iter()
            .filter(|t| !t.is_fading())
            .map(|t| t.name.as_str())
            .collect();
        let body = if names.is_empty() {
            "Empty".to_string()
        } else {
            names.join(" | ")
        };
        self.emit(format!("  [{:<15}] {}", stage.title(), body));
    }
}

impl TransitObserver for TerminalSurface {
    fn transit_started(&self, transit: &Transit) {
        let arrow = match transit.leg {
            TransitLeg::Direct => "->",
            TransitLeg::ToDispatcher => "-> (loop)",
            TransitLeg::FromDispatcher => "(loop) ->",
        };
        self.emit(format!(
            "  ~ {} {} {} {}",
            transit.token.name, transit.from, arrow, transit.to
        ));
    }

    fn transit_cleared(&self) {}
}
