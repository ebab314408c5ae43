//! Connection approval
//!
//! Decides whether one more participant may join. The host evaluates join
//! requests one at a time on its event loop, so two requests can never both
//! see the same free slot.

use log::debug;
use shared::{AdmissionRejection, SessionPhase};

/// What the gate would currently answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionState {
    Open,
    Full,
    /// The session has left the lobby
    Locked,
}

#[derive(Debug, Clone)]
pub struct SessionAdmission {
    capacity: usize,
}

impl SessionAdmission {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `participants` counts everyone holding a slot, including approved
    /// connections that have not finished their handshake.
    pub fn state(&self, participants: usize, phase: SessionPhase) -> AdmissionState {
        if phase == SessionPhase::InProgress {
            AdmissionState::Locked
        } else if participants >= self.capacity {
            AdmissionState::Full
        } else {
            AdmissionState::Open
        }
    }

    pub fn evaluate(
        &self,
        participants: usize,
        phase: SessionPhase,
    ) -> Result<(), AdmissionRejection> {
        let state = self.state(participants, phase);
        debug!(
            "Admission check: {}/{} participants, {:?} -> {:?}",
            participants, self.capacity, phase, state
        );

        match state {
            AdmissionState::Open => Ok(()),
            AdmissionState::Full => Err(AdmissionRejection::Full {
                capacity: self.capacity,
            }),
            AdmissionState::Locked => Err(AdmissionRejection::AlreadyStarted),
        }
    }
}
