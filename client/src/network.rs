//! Client network layer: joining a session and streaming input to the host

use crate::input::{InputManager, InputSource};
use crate::replica::SessionReplica;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{
    timestamp_millis, ActionKind, AdmissionRejection, ClientId, Packet, SessionCode,
    SessionCodeError, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, timeout_at, Instant, MissedTickBehavior};

/// How long the host may stay silent before the session counts as over
pub const DEFAULT_HOST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("invalid session code: {0}")]
    InvalidCode(#[from] SessionCodeError),
    #[error("join rejected: {0}")]
    Rejected(AdmissionRejection),
    #[error("no answer from host")]
    Timeout,
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode packet: {0}")]
    Encode(#[from] bincode::Error),
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<ClientId>,
    connected: bool,
    // Set once the host has sent us session state, which it only does
    // after accepting our Ready
    established: bool,

    replica: SessionReplica,
    input_manager: InputManager,

    ping_ms: u64,
    fake_ping_ms: u64,
    last_heard: Instant,
    host_timeout: Duration,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            established: false,
            replica: SessionReplica::new(),
            input_manager: InputManager::new(),
            ping_ms: 0,
            fake_ping_ms,
            last_heard: Instant::now(),
            host_timeout: DEFAULT_HOST_TIMEOUT,
        })
    }

    pub fn set_host_timeout(&mut self, timeout: Duration) {
        self.host_timeout = timeout;
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn replica(&self) -> &SessionReplica {
        &self.replica
    }

    /// Round trip estimate from the last body snapshot
    pub fn ping_ms(&self) -> u64 {
        self.ping_ms
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), JoinError> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Asks to join the session behind `code` and completes the handshake.
    ///
    /// A rejection leaves the client untouched, so it can simply try again
    /// with another code.
    pub async fn join(&mut self, code: &str, wait: Duration) -> Result<ClientId, JoinError> {
        let session_code = SessionCode::parse(code)?;
        info!("Joining session {}...", session_code);

        self.send_packet(&Packet::Connect {
            client_version: PROTOCOL_VERSION,
            session_code,
        })
        .await?;

        let deadline = Instant::now() + wait;
        let mut buffer = [0u8; 2048];

        loop {
            let (len, addr) = match timeout_at(deadline, self.socket.recv_from(&mut buffer)).await
            {
                Ok(result) => result?,
                Err(_) => return Err(JoinError::Timeout),
            };

            if addr != self.server_addr {
                continue;
            }

            let Ok(packet) = deserialize::<Packet>(&buffer[..len]) else {
                warn!("Failed to deserialize packet from {}", addr);
                continue;
            };

            match packet {
                Packet::Connected {
                    client_id,
                    session_code,
                } => {
                    info!("Connected to {} as client {}", session_code, client_id);
                    self.client_id = Some(client_id);
                    self.connected = true;
                    self.established = false;
                    self.last_heard = Instant::now();
                    self.replica.reset();
                    self.send_packet(&Packet::Ready).await?;
                    return Ok(client_id);
                }
                Packet::Rejected { reason } => {
                    warn!("Join rejected: {}", reason);
                    return Err(JoinError::Rejected(reason));
                }
                other => debug!("Ignoring {:?} while joining", other),
            }
        }
    }

    /// Applies one packet from the host to the replica.
    fn handle_packet(&mut self, packet: Packet) {
        self.last_heard = Instant::now();

        match packet {
            Packet::LobbyUpdate {
                participants,
                capacity,
                owner,
            } => {
                self.established = true;
                self.replica.apply_lobby(participants, capacity, owner);
            }

            Packet::Command { revision, command } => {
                self.established = true;
                self.replica.apply_command(revision, command);
            }

            Packet::BodySnapshot {
                tick,
                timestamp,
                body,
            } => {
                if timestamp > 0 {
                    self.ping_ms = timestamp_millis().saturating_sub(timestamp);
                }
                self.replica.apply_body(tick, body);
            }

            Packet::ActionEffect { action, client_id } => {
                self.replica.apply_effect(action, client_id);
            }

            Packet::LoadScene { scene } => {
                self.established = true;
                self.replica.apply_load_scene(scene);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.end_session();
            }

            other => {
                warn!("Unexpected packet type: {:?}", other);
            }
        }
    }

    /// Receives and applies packets for `duration`.
    pub async fn pump(&mut self, duration: Duration) -> std::io::Result<usize> {
        let deadline = Instant::now() + duration;
        let mut buffer = [0u8; 2048];
        let mut handled = 0;

        while let Ok(result) = timeout_at(deadline, self.socket.recv_from(&mut buffer)).await {
            let (len, addr) = result?;
            if addr != self.server_addr {
                continue;
            }
            if let Ok(packet) = deserialize::<Packet>(&buffer[..len]) {
                self.handle_packet(packet);
                handled += 1;
            }
        }

        Ok(handled)
    }

    /// Samples `source` once and sends the result. Actions go out as their
    /// own packets right after the input.
    pub async fn send_input(&mut self, source: &mut dyn InputSource) -> Result<(), JoinError> {
        if !self.connected {
            return Ok(());
        }

        // Our Ready may have been lost
        if !self.established {
            self.send_packet(&Packet::Ready).await?;
        }

        let (input, actions) = self.input_manager.update(source);
        self.send_packet(&Packet::Input {
            sequence: input.sequence,
            timestamp: input.timestamp,
            movement: input.movement,
            sprint: input.sprint,
        })
        .await?;

        for action in actions {
            self.send_action(action).await?;
        }

        Ok(())
    }

    pub async fn send_action(&self, action: ActionKind) -> Result<(), JoinError> {
        if !self.connected {
            return Ok(());
        }
        debug!("Requesting {}", action);
        self.send_packet(&Packet::Action { action }).await
    }

    /// Only honoured by the host when this client owns the session.
    pub async fn request_start(&self) -> Result<(), JoinError> {
        if !self.connected {
            return Ok(());
        }
        info!("Requesting session start");
        self.send_packet(&Packet::StartSession).await
    }

    pub async fn disconnect(&mut self) -> Result<(), JoinError> {
        if self.connected {
            self.send_packet(&Packet::Disconnect).await?;
        }
        self.end_session();
        Ok(())
    }

    fn end_session(&mut self) {
        self.connected = false;
        self.established = false;
        self.client_id = None;
    }

    /// True once nothing has arrived from the host for the host timeout.
    pub fn host_silent(&self) -> bool {
        self.last_heard.elapsed() > self.host_timeout
    }

    /// Streams input every `tick` until the host ends the connection or
    /// goes quiet for longer than the host timeout.
    pub async fn run(
        &mut self,
        source: &mut dyn InputSource,
        tick: Duration,
        start: bool,
    ) -> Result<(), JoinError> {
        if start {
            self.request_start().await?;
        }

        let mut input_interval = interval(tick);
        input_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut command_rx = self.replica.subscribe_command();

        let mut buffer = [0u8; 2048];

        while self.connected {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) => {
                            if addr != self.server_addr {
                                continue;
                            }

                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                self.handle_packet(packet);
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = input_interval.tick() => {
                    if self.host_silent() {
                        warn!("No word from host for {:?}, leaving session", self.host_timeout);
                        self.end_session();
                        continue;
                    }

                    if let Err(e) = self.send_input(source).await {
                        error!("Error sending input: {}", e);
                    }
                },

                Ok(()) = command_rx.changed() => {
                    let command = *command_rx.borrow_and_update();
                    info!(
                        "Command r{:?}: movement ({:.2}, {:.2}) sprint={} grounded={}",
                        self.replica.revision(),
                        command.movement.x,
                        command.movement.y,
                        command.sprint,
                        command.grounded
                    );
                },
            }
        }

        Ok(())
    }
}
