//! Read-only mirror of the host's session state
//!
//! Participants never simulate the shared body or compute the aggregate.
//! They apply what the host replicates and let observers watch it. The
//! command and phase are last-value-wins cells: a subscriber gets a
//! `watch::Receiver`, and dropping that receiver ends the subscription.

use log::{debug, info};
use shared::{ActionKind, AggregatedCommand, BodyState, ClientId, SessionPhase};
use tokio::sync::{broadcast, watch};

const EFFECT_CHANNEL_CAPACITY: usize = 64;

/// Cosmetic feedback for an action the host accepted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionEffect {
    pub action: ActionKind,
    pub client_id: ClientId,
}

/// Waiting-room roster as last announced by the host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LobbyView {
    pub participants: Vec<ClientId>,
    pub capacity: usize,
    pub owner: Option<ClientId>,
}

pub struct SessionReplica {
    command_tx: watch::Sender<AggregatedCommand>,
    phase_tx: watch::Sender<SessionPhase>,
    effect_tx: broadcast::Sender<ActionEffect>,
    last_revision: Option<u64>,
    body: Option<(u32, BodyState)>,
    lobby: LobbyView,
    scene: Option<String>,
}

impl SessionReplica {
    pub fn new() -> Self {
        let (command_tx, _) = watch::channel(AggregatedCommand::default());
        let (phase_tx, _) = watch::channel(SessionPhase::Lobby);
        let (effect_tx, _) = broadcast::channel(EFFECT_CHANNEL_CAPACITY);

        Self {
            command_tx,
            phase_tx,
            effect_tx,
            last_revision: None,
            body: None,
            lobby: LobbyView::default(),
            scene: None,
        }
    }

    pub fn subscribe_command(&self) -> watch::Receiver<AggregatedCommand> {
        self.command_tx.subscribe()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    pub fn subscribe_effects(&self) -> broadcast::Receiver<ActionEffect> {
        self.effect_tx.subscribe()
    }

    /// Number of live command observers
    pub fn command_observers(&self) -> usize {
        self.command_tx.receiver_count()
    }

    pub fn command(&self) -> AggregatedCommand {
        *self.command_tx.borrow()
    }

    pub fn revision(&self) -> Option<u64> {
        self.last_revision
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase_tx.borrow()
    }

    pub fn body(&self) -> Option<&BodyState> {
        self.body.as_ref().map(|(_, body)| body)
    }

    pub fn lobby(&self) -> &LobbyView {
        &self.lobby
    }

    pub fn scene(&self) -> Option<&str> {
        self.scene.as_deref()
    }

    /// Forgets everything learned from the previous session. Observers stay
    /// subscribed and see the neutral command and the lobby phase.
    pub fn reset(&mut self) {
        self.last_revision = None;
        self.body = None;
        self.lobby = LobbyView::default();
        self.scene = None;
        self.command_tx.send_replace(AggregatedCommand::default());
        self.phase_tx.send_replace(SessionPhase::Lobby);
    }

    /// Applies a replicated command. Packets can arrive out of order, so
    /// anything not newer than the last applied revision is dropped.
    ///
    /// Returns true when the command was applied.
    pub fn apply_command(&mut self, revision: u64, command: AggregatedCommand) -> bool {
        if matches!(self.last_revision, Some(last) if revision <= last) {
            debug!("Dropping command r{} (have r{:?})", revision, self.last_revision);
            return false;
        }

        self.last_revision = Some(revision);
        self.command_tx.send_if_modified(|current| {
            if *current == command {
                false
            } else {
                *current = command;
                true
            }
        });
        true
    }

    /// Keeps the newest body snapshot by tick.
    pub fn apply_body(&mut self, tick: u32, body: BodyState) -> bool {
        if matches!(self.body, Some((last, _)) if tick <= last) {
            return false;
        }
        self.body = Some((tick, body));
        true
    }

    pub fn apply_lobby(
        &mut self,
        participants: Vec<ClientId>,
        capacity: usize,
        owner: Option<ClientId>,
    ) {
        info!(
            "Lobby: {}/{} players, owner {:?}",
            participants.len(),
            capacity,
            owner
        );
        self.lobby = LobbyView {
            participants,
            capacity,
            owner,
        };
    }

    /// Enters gameplay. Repeats of the same scene change nothing.
    pub fn apply_load_scene(&mut self, scene: String) {
        if self.scene.as_deref() == Some(scene.as_str()) {
            return;
        }
        info!("Loading scene {}", scene);
        self.scene = Some(scene);
        self.phase_tx.send_replace(SessionPhase::InProgress);
    }

    pub fn apply_effect(&self, action: ActionKind, client_id: ClientId) {
        // No subscribers is fine, effects are cosmetic
        let _ = self.effect_tx.send(ActionEffect { action, client_id });
    }
}

impl Default for SessionReplica {
    fn default() -> Self {
        Self::new()
    }
}
