//! One hosted session, independent of sockets
//!
//! `HostSession` owns every piece of authoritative state for a single
//! lobby-to-gameplay lifecycle: the connection roster, the input registry,
//! the phase controller, the replicator and the shared body. It consumes
//! decoded packets and returns the packets to send, which keeps it testable
//! without a network. The network layer feeds it from a single event loop,
//! so each call runs to completion before the next packet is looked at.

use crate::aggregator;
use crate::client_manager::ClientManager;
use crate::config::SessionConfig;
use crate::game::{GameState, Level};
use crate::phase::{PhaseTransition, SessionPhaseController};
use crate::registry::{ClientInputRegistry, InputSample};
use crate::replicator::CommandReplicator;
use log::{debug, info, warn};
use shared::{
    timestamp_millis, ActionKind, AdmissionRejection, AggregatedCommand, BodyState, ClientId,
    Packet, SessionCode, SessionPhase, Vector2, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Instant;

/// A packet the session wants delivered
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// To one address, established or not
    Send { packet: Packet, addr: SocketAddr },
    /// To every established participant
    Broadcast { packet: Packet },
}

pub struct HostSession {
    config: SessionConfig,
    code: SessionCode,
    clients: ClientManager,
    registry: ClientInputRegistry,
    phase: SessionPhaseController,
    replicator: CommandReplicator,
    game: GameState,
    owner: Option<ClientId>,
}

impl HostSession {
    pub fn new(config: SessionConfig, code: SessionCode) -> Self {
        Self::with_level(config, code, Level::default())
    }

    pub fn with_level(config: SessionConfig, code: SessionCode, level: Level) -> Self {
        info!(
            "Hosting session {} (capacity {}, freshness {:?}, auto-start {})",
            code, config.capacity, config.freshness_window, config.auto_start_when_full
        );

        Self {
            clients: ClientManager::new(config.capacity),
            registry: ClientInputRegistry::new(),
            phase: SessionPhaseController::new(
                config.capacity,
                config.auto_start_when_full,
                config.gameplay_scene.clone(),
            ),
            replicator: CommandReplicator::new(config.command_resend_ticks),
            game: GameState::new(level),
            owner: None,
            code,
            config,
        }
    }

    /// Hosts a session under a freshly generated code.
    pub fn with_random_code(config: SessionConfig) -> Self {
        let code = SessionCode::generate(&mut rand::thread_rng(), config.code_alphabet);
        Self::new(config, code)
    }

    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase.phase()
    }

    /// The command the physics step currently follows
    pub fn command(&self) -> AggregatedCommand {
        self.replicator.current()
    }

    pub fn body(&self) -> &BodyState {
        &self.game.body
    }

    pub fn tick(&self) -> u32 {
        self.game.tick
    }

    pub fn owner(&self) -> Option<ClientId> {
        self.owner
    }

    pub fn registry(&self) -> &ClientInputRegistry {
        &self.registry
    }

    /// Established participants
    pub fn participant_count(&self) -> usize {
        self.clients.established_count()
    }

    pub fn participants(&self) -> Vec<ClientId> {
        self.clients.established_ids()
    }

    /// Where broadcasts go
    pub fn broadcast_addrs(&self) -> Vec<SocketAddr> {
        self.clients
            .established_addrs()
            .into_iter()
            .map(|(_, addr)| addr)
            .collect()
    }

    pub fn handle_packet(&mut self, packet: Packet, addr: SocketAddr, now: Instant) -> Vec<Outbound> {
        match packet {
            Packet::Connect {
                client_version,
                session_code,
            } => self.handle_connect(addr, client_version, session_code, now),
            Packet::Ready => self.handle_ready(addr, now),
            Packet::Input {
                sequence,
                timestamp,
                movement,
                sprint,
            } => self.handle_input(addr, sequence, timestamp, movement, sprint, now),
            Packet::Action { action } => self.handle_action(addr, action, now),
            Packet::StartSession => self.handle_start(addr, now),
            Packet::Disconnect => match self.clients.find_client_by_addr(addr) {
                Some(client_id) => self.disconnect_client(client_id, now),
                None => Vec::new(),
            },
            _ => {
                warn!("Unexpected packet type from {}", addr);
                Vec::new()
            }
        }
    }

    fn handle_connect(
        &mut self,
        addr: SocketAddr,
        client_version: u32,
        session_code: SessionCode,
        now: Instant,
    ) -> Vec<Outbound> {
        info!(
            "Client connecting from {} (version: {}, code: {})",
            addr, client_version, session_code
        );

        let mut outbound = Vec::new();

        let rejection = if client_version != PROTOCOL_VERSION {
            Some(AdmissionRejection::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: client_version,
            })
        } else if session_code != self.code {
            Some(AdmissionRejection::UnknownSession)
        } else {
            None
        };

        if let Some(reason) = rejection {
            info!("Rejected {}: {}", addr, reason);
            outbound.push(Outbound::Send {
                packet: Packet::Rejected { reason },
                addr,
            });
            return outbound;
        }

        // A reconnect from the same address replaces the old connection
        if let Some(existing_id) = self.clients.find_client_by_addr(addr) {
            info!("Removing existing client {} from {}", existing_id, addr);
            outbound.extend(self.disconnect_client(existing_id, now));
        }

        let packet = match self.clients.admit(addr, self.phase.phase(), now) {
            Ok(client_id) => Packet::Connected {
                client_id,
                session_code: self.code.clone(),
            },
            Err(reason) => {
                info!("Rejected {}: {}", addr, reason);
                Packet::Rejected { reason }
            }
        };
        outbound.push(Outbound::Send { packet, addr });
        outbound
    }

    fn handle_ready(&mut self, addr: SocketAddr, now: Instant) -> Vec<Outbound> {
        let mut outbound = Vec::new();

        let Some(client_id) = self.clients.find_client_by_addr(addr) else {
            debug!("Ready from unknown address {}", addr);
            return outbound;
        };

        if !self.clients.establish(client_id, now) {
            self.clients.touch(client_id, now);
            return outbound;
        }

        if self.owner.is_none() {
            info!("Client {} owns the session", client_id);
            self.owner = Some(client_id);
        }

        // Late joiners converge on the current command straight away
        outbound.push(Outbound::Send {
            packet: self.replicator.current_packet(),
            addr,
        });

        match self.phase.phase() {
            SessionPhase::Lobby => {
                outbound.push(self.lobby_update());
                let participants = self.clients.established_count();
                if let Some(transition) = self.phase.on_participant_count(participants) {
                    outbound.push(Self::load_scene(transition));
                }
            }
            SessionPhase::InProgress => {
                // Approved before the start, finished the handshake after it
                outbound.push(Outbound::Send {
                    packet: Packet::LoadScene {
                        scene: self.phase.gameplay_scene().to_string(),
                    },
                    addr,
                });
            }
        }

        outbound
    }

    fn handle_input(
        &mut self,
        addr: SocketAddr,
        sequence: u32,
        timestamp: u64,
        movement: Vector2,
        sprint: bool,
        now: Instant,
    ) -> Vec<Outbound> {
        let Some(client_id) = self.established_sender(addr) else {
            return Vec::new();
        };

        self.clients.touch(client_id, now);
        let missed = self.clients.record_input_sequence(client_id, sequence);
        if missed > 0 {
            debug!("Client {} lost {} inputs before {}", client_id, missed, sequence);
        }
        debug!(
            "Input {} from client {} (sent at {}): {:?} sprint={}",
            sequence, client_id, timestamp, movement, sprint
        );

        self.registry
            .upsert(InputSample::new(client_id, movement, sprint, now));
        self.recompute(now).into_iter().collect()
    }

    fn handle_action(&mut self, addr: SocketAddr, action: ActionKind, now: Instant) -> Vec<Outbound> {
        let Some(client_id) = self.established_sender(addr) else {
            return Vec::new();
        };
        self.clients.touch(client_id, now);

        if !self.game.apply_action(action) {
            debug!("Client {} {} ignored, precondition not met", client_id, action);
            return Vec::new();
        }

        debug!("Client {} triggered {}", client_id, action);
        let mut outbound: Vec<Outbound> = self.recompute(now).into_iter().collect();
        outbound.push(Outbound::Broadcast {
            packet: CommandReplicator::action_effect(action, client_id),
        });
        outbound
    }

    fn handle_start(&mut self, addr: SocketAddr, now: Instant) -> Vec<Outbound> {
        let Some(client_id) = self.established_sender(addr) else {
            return Vec::new();
        };
        self.clients.touch(client_id, now);

        if self.owner != Some(client_id) {
            warn!(
                "Client {} asked to start but {:?} owns the session",
                client_id, self.owner
            );
            return Vec::new();
        }

        self.start()
    }

    /// Starts the session on the host's own authority.
    pub fn start(&mut self) -> Vec<Outbound> {
        self.phase
            .request_start()
            .map(Self::load_scene)
            .into_iter()
            .collect()
    }

    /// Removes a participant everywhere and recomputes right away, so its
    /// last input cannot outlive the disconnect.
    pub fn disconnect_client(&mut self, client_id: ClientId, now: Instant) -> Vec<Outbound> {
        let mut outbound = Vec::new();

        let Some(client) = self.clients.remove_client(&client_id) else {
            return outbound;
        };
        self.registry.remove(&client_id);

        if let Some(packet) = self.recompute(now) {
            outbound.push(packet);
        }

        if self.owner == Some(client_id) {
            self.owner = self.clients.established_ids().first().copied();
            info!("Session ownership passed to {:?}", self.owner);
        }

        if client.established && self.phase.phase() == SessionPhase::Lobby {
            outbound.push(self.lobby_update());
        }

        outbound
    }

    /// Drops connections that went quiet, exactly like a disconnect.
    pub fn check_timeouts(&mut self, now: Instant) -> Vec<Outbound> {
        let mut outbound = Vec::new();

        for client_id in self
            .clients
            .timed_out_clients(now, self.config.client_timeout)
        {
            if let Some(client) = self.clients.get(&client_id) {
                warn!("Client {} timed out", client_id);
                outbound.push(Outbound::Send {
                    packet: Packet::Disconnected {
                        reason: "Timed out".to_string(),
                    },
                    addr: client.addr,
                });
            }
            outbound.extend(self.disconnect_client(client_id, now));
        }

        outbound
    }

    /// One fixed physics step.
    ///
    /// Also recomputes the aggregate so samples that aged out since the
    /// last packet stop steering the body.
    pub fn step(&mut self, now: Instant, dt: f32) -> Vec<Outbound> {
        let mut outbound = Vec::new();

        let command = self.replicator.current();
        self.game.update_physics(&command, dt);
        self.game.tick = self.game.tick.wrapping_add(1);

        match self.recompute(now) {
            Some(changed) => outbound.push(changed),
            None => {
                if let Some(packet) = self.replicator.on_tick() {
                    outbound.push(Outbound::Broadcast { packet });
                }
            }
        }

        outbound.push(Outbound::Broadcast {
            packet: Packet::BodySnapshot {
                tick: self.game.tick,
                timestamp: timestamp_millis(),
                body: self.game.body,
            },
        });

        outbound
    }

    /// Rebuilds the command from the fresh snapshot and the ground probe.
    fn recompute(&mut self, now: Instant) -> Option<Outbound> {
        let fresh = self
            .registry
            .snapshot_fresh(now, self.config.freshness_window);
        let command = aggregator::aggregate(&fresh, self.game.is_grounded());

        self.replicator.update(command).map(|packet| {
            debug!(
                "Command r{} from {} fresh inputs: {:?}",
                self.replicator.revision(),
                fresh.len(),
                command
            );
            Outbound::Broadcast { packet }
        })
    }

    fn established_sender(&self, addr: SocketAddr) -> Option<ClientId> {
        match self.clients.find_client_by_addr(addr) {
            Some(client_id) if self.clients.is_established(&client_id) => Some(client_id),
            Some(client_id) => {
                debug!("Client {} has not finished its handshake", client_id);
                None
            }
            None => {
                debug!("Packet from unknown address {}", addr);
                None
            }
        }
    }

    fn lobby_update(&self) -> Outbound {
        Outbound::Broadcast {
            packet: Packet::LobbyUpdate {
                participants: self.clients.established_ids(),
                capacity: self.clients.capacity(),
                owner: self.owner,
            },
        }
    }

    fn load_scene(transition: PhaseTransition) -> Outbound {
        Outbound::Broadcast {
            packet: Packet::LoadScene {
                scene: transition.scene,
            },
        }
    }
}
