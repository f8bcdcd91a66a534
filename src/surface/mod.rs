// ABOUTME: Collaborator surfaces the engine reports to: text display, output panel, stages, transits
// ABOUTME: Exports the traits plus in-memory, terminal, and no-op implementations

pub mod recorder;
pub mod terminal;

use std::sync::Arc;

use crate::engine::{StageId, Transit};
use crate::script::{SourceRange, TaskToken};

pub use recorder::{RecordedEvent, Recorder, SurfaceEvent};
pub use terminal::TerminalSurface;

/// Source editor highlighting. Fire-and-forget.
pub trait TextDisplay: Send + Sync {
    fn highlight_range(&self, range: &SourceRange);
    fn clear_highlight(&self);
}

/// Console panel mirroring program output.
pub trait OutputPanel: Send + Sync {
    fn append_output(&self, line: &str);
    fn clear(&self);
}

/// Notified with the full contents of a stage after every mutation.
/// Called while the stage store is locked; implementations must not call back into it.
pub trait StageObserver: Send + Sync {
    fn stage_changed(&self, stage: StageId, tokens: &[TaskToken]);
}

pub trait TransitObserver: Send + Sync {
    fn transit_started(&self, transit: &Transit);
    fn transit_cleared(&self);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurface;

impl TextDisplay for NullSurface {
    fn highlight_range(&self, _range: &SourceRange) {}
    fn clear_highlight(&self) {}
}

impl OutputPanel for NullSurface {
    fn append_output(&self, _line: &str) {}
    fn clear(&self) {}
}

impl StageObserver for NullSurface {
    fn stage_changed(&self, _stage: StageId, _tokens: &[TaskToken]) {}
}

impl TransitObserver for NullSurface {
    fn transit_started(&self, _transit: &Transit) {}
    fn transit_cleared(&self) {}
}

/// The set of collaborators one controller reports to
#[derive(Clone)]
pub struct Surfaces {
    pub display: Arc<dyn TextDisplay>,
    pub output: Arc<dyn OutputPanel>,
    pub stages: Arc<dyn StageObserver>,
    pub transits: Arc<dyn TransitObserver>,
}

impl Surfaces {
    /// Use one implementation for all four roles
    pub fn uniform<T>(surface: Arc<T>) -> Self
    where
        T: TextDisplay + OutputPanel + StageObserver + TransitObserver + 'static,
    {
        Self {
            display: surface.clone(),
            output: surface.clone(),
            stages: surface.clone(),
            transits: surface,
        }
    }

    pub fn null() -> Self {
        Self::uniform(Arc::new(NullSurface))
    }

    /// Deliver every event to both bundles, `self` first
    pub fn fan_out(self, other: Surfaces) -> Self {
        Self::uniform(Arc::new(FanOut {
            first: self,
            second: other,
        }))
    }
}

impl Default for Surfaces {
    fn default() -> Self {
        Self::null()
    }
}

struct FanOut {
    first: Surfaces,
    second: Surfaces,
}

impl TextDisplay for FanOut {
    fn highlight_range(&self, range: &SourceRange) {
        self.first.display.highlight_range(range);
        self.second.display.highlight_range(range);
    }

    fn clear_highlight(&self) {
        self.first.display.clear_highlight();
        self.second.display.clear_highlight();
    }
}

impl OutputPanel for FanOut {
    fn append_output(&self, line: &str) {
        self.first.output.append_output(line);
        self.second.output.append_output(line);
    }

    fn clear(&self) {
        self.first.output.clear();
        self.second.output.clear();
    }
}

impl StageObserver for FanOut {
    fn stage_changed(&self, stage: StageId, tokens: &[TaskToken]) {
        self.first.stages.stage_changed(stage, tokens);
        self.second.stages.stage_changed(stage, tokens);
    }
}

impl TransitObserver for FanOut {
    fn transit_started(&self, transit: &Transit) {
        self.first.transits.transit_started(transit);
        self.second.transits.transit_started(transit);
    }

    fn transit_cleared(&self) {
        self.first.transits.transit_cleared();
        self.second.transits.transit_cleared();
    }
}
