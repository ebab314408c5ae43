//! Host to participant replication of the aggregated command
//!
//! Every value change bumps the revision and is published once. Identical
//! recomputes are swallowed. Since the transport may drop packets, the
//! current value is also re-sent on a slow cadence; receivers keep the
//! highest revision they have seen.

use shared::{ActionKind, AggregatedCommand, ClientId, Packet};

#[derive(Debug)]
pub struct CommandReplicator {
    current: AggregatedCommand,
    revision: u64,
    resend_every: u32,
    ticks_since_send: u32,
}

impl CommandReplicator {
    pub fn new(resend_every: u32) -> Self {
        Self {
            current: AggregatedCommand::default(),
            revision: 0,
            resend_every,
            ticks_since_send: 0,
        }
    }

    pub fn current(&self) -> AggregatedCommand {
        self.current
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Records a recomputed command. Returns the packet to broadcast when
    /// the value differs from the last published one.
    pub fn update(&mut self, command: AggregatedCommand) -> Option<Packet> {
        if command == self.current {
            return None;
        }

        self.current = command;
        self.revision += 1;
        self.ticks_since_send = 0;
        Some(self.current_packet())
    }

    /// Packet carrying the current value, for late joiners.
    pub fn current_packet(&self) -> Packet {
        Packet::Command {
            revision: self.revision,
            command: self.current,
        }
    }

    /// Advances the resend clock by one physics tick.
    pub fn on_tick(&mut self) -> Option<Packet> {
        if self.resend_every == 0 {
            return None;
        }

        self.ticks_since_send += 1;
        if self.ticks_since_send >= self.resend_every {
            self.ticks_since_send = 0;
            Some(self.current_packet())
        } else {
            None
        }
    }

    /// Cosmetic feedback for a one-shot action. Says nothing about whether
    /// the body actually moved.
    pub fn action_effect(action: ActionKind, client_id: ClientId) -> Packet {
        Packet::ActionEffect { action, client_id }
    }
}
