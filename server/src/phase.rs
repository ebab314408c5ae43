//! Lobby to gameplay transition
//!
//! A session starts in `Lobby` and moves to `InProgress` once. Going back
//! to a lobby means hosting a new session.

use log::{debug, info};
use shared::SessionPhase;

/// What caused the session to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTrigger {
    /// The session owner asked to start
    Explicit,
    /// The lobby filled up with auto-start enabled
    CapacityReached,
}

/// Instruction to move every participant into the gameplay scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTransition {
    pub trigger: StartTrigger,
    pub scene: String,
}

#[derive(Debug, Clone)]
pub struct SessionPhaseController {
    phase: SessionPhase,
    capacity: usize,
    auto_start_when_full: bool,
    gameplay_scene: String,
}

impl SessionPhaseController {
    pub fn new(capacity: usize, auto_start_when_full: bool, gameplay_scene: String) -> Self {
        Self {
            phase: SessionPhase::Lobby,
            capacity,
            auto_start_when_full,
            gameplay_scene,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn gameplay_scene(&self) -> &str {
        &self.gameplay_scene
    }

    /// Explicit start. Honored in the lobby with any number of participants;
    /// a no-op once the session is running.
    pub fn request_start(&mut self) -> Option<PhaseTransition> {
        self.transition(StartTrigger::Explicit)
    }

    /// Called whenever the established participant count changes.
    pub fn on_participant_count(&mut self, participants: usize) -> Option<PhaseTransition> {
        if self.auto_start_when_full && participants == self.capacity {
            self.transition(StartTrigger::CapacityReached)
        } else {
            None
        }
    }

    fn transition(&mut self, trigger: StartTrigger) -> Option<PhaseTransition> {
        if self.phase == SessionPhase::InProgress {
            debug!("Ignoring {:?} start, session already in progress", trigger);
            return None;
        }

        self.phase = SessionPhase::InProgress;
        info!(
            "Session started ({:?}), loading scene '{}'",
            trigger, self.gameplay_scene
        );

        Some(PhaseTransition {
            trigger,
            scene: self.gameplay_scene.clone(),
        })
    }
}
