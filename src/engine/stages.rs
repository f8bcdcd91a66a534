// ABOUTME: Stage store holding task tokens in the four scheduler stages
// ABOUTME: Supports add/remove/replace/clear with change notifications and run-guarded writes

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use tracing::debug;

use super::context::{Checkpoint, RunContext};
use super::error::{EngineError, Result};
use crate::script::TaskToken;
use crate::surface::StageObserver;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum StageId {
    Stack,
    PendingIo,
    MacrotaskQueue,
    MicrotaskQueue,
}

impl StageId {
    pub const ALL: [StageId; 4] = [
        StageId::Stack,
        StageId::PendingIo,
        StageId::MacrotaskQueue,
        StageId::MicrotaskQueue,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            StageId::Stack => "Call Stack",
            StageId::PendingIo => "Web APIs",
            StageId::MacrotaskQueue => "Task Queue",
            StageId::MicrotaskQueue => "Microtask Queue",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageId::Stack => write!(f, "stack"),
            StageId::PendingIo => write!(f, "pending-io"),
            StageId::MacrotaskQueue => write!(f, "macrotask-queue"),
            StageId::MicrotaskQueue => write!(f, "microtask-queue"),
        }
    }
}

pub type StageSnapshot = HashMap<StageId, Vec<TaskToken>>;

pub struct StageStore {
    stages: RwLock<StageSnapshot>,
    observer: Arc<dyn StageObserver>,
}

impl StageStore {
    pub fn new(observer: Arc<dyn StageObserver>) -> Self {
        let stages = StageId::ALL.iter().map(|id| (*id, Vec::new())).collect();
        Self {
            stages: RwLock::new(stages),
            observer,
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StageSnapshot> {
        self.stages.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a token to a stage. A token may belong to one stage only.
    pub fn add(&self, stage: StageId, token: TaskToken) -> Result<()> {
        let mut stages = self.write();
        self.add_locked(&mut stages, stage, token)
    }

    fn add_locked(
        &self,
        stages: &mut StageSnapshot,
        stage: StageId,
        token: TaskToken,
    ) -> Result<()> {
        if let Some(current) = locate_in(stages, &token.id) {
            return Err(EngineError::DuplicateMembership {
                token_id: token.id,
                current,
                requested: stage,
            });
        }

        debug!("add {} ({}) to {}", token.name, token.id, stage);
        let members = stages.entry(stage).or_default();
        members.push(token);
        self.observer.stage_changed(stage, members);
        Ok(())
    }

    /// Remove a token by identity; absent tokens are ignored
    pub fn remove(&self, stage: StageId, token_id: &str) -> Option<TaskToken> {
        let mut stages = self.write();
        self.remove_locked(&mut stages, stage, token_id)
    }

    fn remove_locked(
        &self,
        stages: &mut StageSnapshot,
        stage: StageId,
        token_id: &str,
    ) -> Option<TaskToken> {
        let members = stages.entry(stage).or_default();
        let position = members.iter().position(|t| t.id == token_id)?;
        let removed = members.remove(position);
        debug!("remove {} ({}) from {}", removed.name, removed.id, stage);
        self.observer.stage_changed(stage, members);
        Some(removed)
    }

    /// Atomically reset the contents of one stage
    pub fn replace(&self, stage: StageId, tokens: Vec<TaskToken>) -> Result<()> {
        let mut stages = self.write();
        self.replace_locked(&mut stages, stage, tokens)
    }

    fn replace_locked(
        &self,
        stages: &mut StageSnapshot,
        stage: StageId,
        tokens: Vec<TaskToken>,
    ) -> Result<()> {
        for token in &tokens {
            if let Some(current) = locate_in(stages, &token.id).filter(|s| *s != stage) {
                return Err(EngineError::DuplicateMembership {
                    token_id: token.id.clone(),
                    current,
                    requested: stage,
                });
            }
        }

        let members = stages.entry(stage).or_default();
        *members = tokens;
        self.observer.stage_changed(stage, members);
        Ok(())
    }

    /// Flag a member for its exit animation. Returns false when absent.
    pub fn set_fade_out(&self, stage: StageId, token_id: &str) -> bool {
        let mut stages = self.write();
        self.fade_locked(&mut stages, stage, token_id)
    }

    fn fade_locked(&self, stages: &mut StageSnapshot, stage: StageId, token_id: &str) -> bool {
        let members = stages.entry(stage).or_default();
        match members.iter_mut().find(|t| t.id == token_id) {
            Some(token) => {
                token.fade_out = true;
                self.observer.stage_changed(stage, members);
                true
            }
            None => false,
        }
    }

    pub fn clear_all(&self) {
        let mut stages = self.write();
        for id in StageId::ALL {
            let members = stages.entry(id).or_default();
            if !members.is_empty() {
                members.clear();
                self.observer.stage_changed(id, members);
            }
        }
    }

    pub fn contents(&self, stage: StageId) -> Vec<TaskToken> {
        let stages = self.stages.read().unwrap_or_else(PoisonError::into_inner);
        stages.get(&stage).cloned().unwrap_or_default()
    }

    pub fn snapshot(&self) -> StageSnapshot {
        self.stages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The stage currently holding a token, if any
    pub fn locate(&self, token_id: &str) -> Option<StageId> {
        let stages = self.stages.read().unwrap_or_else(PoisonError::into_inner);
        locate_in(&stages, token_id)
    }

    pub fn is_empty(&self) -> bool {
        let stages = self.stages.read().unwrap_or_else(PoisonError::into_inner);
        stages.values().all(|members| members.is_empty())
    }

    /// Mutations that re-check the run context under the store lock, so a
    /// cancelled run never writes after a reset has cleared the store.
    pub fn guarded<'a>(&'a self, ctx: &'a RunContext) -> GuardedStages<'a> {
        GuardedStages { store: self, ctx }
    }
}

fn locate_in(stages: &StageSnapshot, token_id: &str) -> Option<StageId> {
    StageId::ALL.into_iter().find(|id| {
        stages
            .get(id)
            .is_some_and(|members| members.iter().any(|t| t.id == token_id))
    })
}

pub struct GuardedStages<'a> {
    store: &'a StageStore,
    ctx: &'a RunContext,
}

impl GuardedStages<'_> {
    pub fn add(&self, stage: StageId, token: TaskToken) -> Result<Checkpoint> {
        let mut stages = self.store.write();
        if !self.ctx.should_continue() {
            return Ok(Checkpoint::Cancelled);
        }
        self.store.add_locked(&mut stages, stage, token)?;
        Ok(Checkpoint::Proceed)
    }

    pub fn remove(&self, stage: StageId, token_id: &str) -> Checkpoint {
        let mut stages = self.store.write();
        if !self.ctx.should_continue() {
            return Checkpoint::Cancelled;
        }
        self.store.remove_locked(&mut stages, stage, token_id);
        Checkpoint::Proceed
    }

    pub fn replace(&self, stage: StageId, tokens: Vec<TaskToken>) -> Result<Checkpoint> {
        let mut stages = self.store.write();
        if !self.ctx.should_continue() {
            return Ok(Checkpoint::Cancelled);
        }
        self.store.replace_locked(&mut stages, stage, tokens)?;
        Ok(Checkpoint::Proceed)
    }

    pub fn set_fade_out(&self, stage: StageId, token_id: &str) -> Checkpoint {
        let mut stages = self.store.write();
        if !self.ctx.should_continue() {
            return Checkpoint::Cancelled;
        }
        self.store.fade_locked(&mut stages, stage, token_id);
        Checkpoint::Proceed
    }
}
