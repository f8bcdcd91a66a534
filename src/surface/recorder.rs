// ABOUTME: In-memory surface recording every collaborator event with timestamps
// ABOUTME: Backs tests and the JSON trace written by the CLI

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use super::{OutputPanel, StageObserver, TextDisplay, TransitObserver};
use crate::engine::{StageId, Transit};
use crate::script::{SourceRange, TaskToken};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SurfaceEvent {
    Highlight { range: SourceRange },
    ClearHighlight,
    Output { line: String },
    ClearOutput,
    StageChanged { stage: StageId, tokens: Vec<TaskToken> },
    TransitStarted { transit: Transit },
    TransitCleared,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub recorded_at: DateTime<Utc>,
    /// Offset from recorder creation on the runtime clock
    pub elapsed: Duration,
    pub event: SurfaceEvent,
}

pub struct Recorder {
    origin: Instant,
    events: Mutex<Vec<RecordedEvent>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            events: Mutex::new(Vec::new()),
        }
    }

    fn log(&self) -> MutexGuard<'_, Vec<RecordedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: SurfaceEvent) {
        self.log().push(RecordedEvent {
            recorded_at: Utc::now(),
            elapsed: self.origin.elapsed(),
            event,
        });
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.log().clone()
    }

    pub fn len(&self) -> usize {
        self.log().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log().is_empty()
    }

    /// Output panel contents as a viewer would see them now
    pub fn output_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for recorded in self.log().iter() {
            match &recorded.event {
                SurfaceEvent::Output { line } => lines.push(line.clone()),
                SurfaceEvent::ClearOutput => lines.clear(),
                _ => {}
            }
        }
        lines
    }

    pub fn transits(&self) -> Vec<Transit> {
        self.log()
            .iter()
            .filter_map(|recorded| match &recorded.event {
                SurfaceEvent::TransitStarted { transit } => Some(transit.clone()),
                _ => None,
            })
            .collect()
    }

    /// Last reported token names per stage
    pub fn stage_contents(&self) -> BTreeMap<StageId, Vec<String>> {
        let mut contents = BTreeMap::new();
        for recorded in self.log().iter() {
            if let SurfaceEvent::StageChanged { stage, tokens } = &recorded.event {
                contents.insert(*stage, tokens.iter().map(|t| t.name.clone()).collect());
            }
        }
        contents
    }

    /// Current highlight, if one is showing
    pub fn highlight(&self) -> Option<SourceRange> {
        let mut current = None;
        for recorded in self.log().iter() {
            match &recorded.event {
                SurfaceEvent::Highlight { range } => current = Some(*range),
                SurfaceEvent::ClearHighlight => current = None,
                _ => {}
            }
        }
        current
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TextDisplay for Recorder {
    fn highlight_range(&self, range: &SourceRange) {
        self.record(SurfaceEvent::Highlight { range: *range });
    }

    fn clear_highlight(&self) {
        self.record(SurfaceEvent::ClearHighlight);
    }
}

impl OutputPanel for Recorder {
    fn append_output(&self, line: &str) {
        self.record(SurfaceEvent::Output {
            line: line.to_string(),
        });
    }

    fn clear(&self) {
        self.record(SurfaceEvent::ClearOutput);
    }
}

impl StageObserver for Recorder {
    fn stage_changed(&self, stage: StageId, tokens: &[TaskToken]) {
        self.record(SurfaceEvent::StageChanged {
            stage,
            tokens: tokens.to_vec(),
        });
    }
}

impl TransitObserver for Recorder {
    fn transit_started(&self, transit: &Transit) {
        self.record(SurfaceEvent::TransitStarted {
            transit: transit.clone(),
        });
    }

    fn transit_cleared(&self) {
        self.record(SurfaceEvent::TransitCleared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::TaskKind;

    #[test]
    fn test_output_lines_respect_clear() {
        let recorder = Recorder::new();
        recorder.append_output("stale");
        recorder.clear();
        recorder.append_output("3");
        recorder.append_output("5");

        assert_eq!(recorder.output_lines(), vec!["3", "5"]);
        assert_eq!(recorder.len(), 4);
    }

    #[test]
    fn test_highlight_tracking() {
        let recorder = Recorder::new();
        assert_eq!(recorder.highlight(), None);

        recorder.highlight_range(&SourceRange::line(9, 1, 17));
        assert_eq!(recorder.highlight(), Some(SourceRange::line(9, 1, 17)));

        recorder.clear_highlight();
        assert_eq!(recorder.highlight(), None);
    }

    #[test]
    fn test_stage_contents_keeps_last_report() {
        let recorder = Recorder::new();
        let token = TaskToken::new("cb", TaskKind::PromiseReaction, None);

        recorder.stage_changed(StageId::MicrotaskQueue, &[token.clone()]);
        recorder.stage_changed(StageId::MicrotaskQueue, &[]);
        recorder.stage_changed(StageId::Stack, &[token]);

        let contents = recorder.stage_contents();
        assert_eq!(contents[&StageId::MicrotaskQueue], Vec::<String>::new());
        assert_eq!(contents[&StageId::Stack], vec!["cb"]);
    }

    #[test]
    fn test_events_serialize() {
        let recorder = Recorder::new();
        recorder.append_output("2");

        let json = serde_json::to_string(&recorder.events()).unwrap();
        assert!(json.contains("\"event\":\"output\""));
        assert!(json.contains("\"line\":\"2\""));
    }
}
