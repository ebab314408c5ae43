//! Server network layer handling UDP communications and the host event loop

use crate::config::SessionConfig;
use crate::session::{HostSession, Outbound};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, SessionCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Messages sent from network tasks to the host loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    Shutdown,
}

/// Messages sent from the host loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        targets: Vec<SocketAddr>,
    },
}

/// UDP front end for one hosted session
pub struct Server {
    socket: Arc<UdpSocket>,
    session: HostSession,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        config: SessionConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;

        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            tick_duration: config.tick_duration(),
            session: HostSession::with_random_code(config),
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn session_code(&self) -> &SessionCode {
        self.session.code()
    }

    pub fn session(&self) -> &HostSession {
        &self.session
    }

    /// Handle that stops `run` when sent `ServerMessage::Shutdown`
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Spawns task that processes the outgoing packet queue. The task ends
    /// once the queue is drained and its sender is gone.
    fn spawn_network_sender(&mut self) -> Option<JoinHandle<()>> {
        let Some(mut game_rx) = self.game_rx.take() else {
            warn!("Network sender already running");
            return None;
        };
        let socket = Arc::clone(&self.socket);

        Some(tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, targets } => {
                        let data = match serialize(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to serialize broadcast: {}", e);
                                continue;
                            }
                        };

                        for addr in targets {
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        }))
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    /// Queues what the session produced. Broadcast targets are resolved now,
    /// after the session has applied the change that produced them.
    fn dispatch(&self, outbound: Vec<Outbound>) {
        for message in outbound {
            let message = match message {
                Outbound::Send { packet, addr } => GameMessage::SendPacket { packet, addr },
                Outbound::Broadcast { packet } => GameMessage::BroadcastPacket {
                    packet,
                    targets: self.session.broadcast_addrs(),
                },
            };

            if let Err(e) = self.game_tx.send(message) {
                error!("Failed to queue packet for sending: {}", e);
            }
        }
    }

    /// Host loop. Packets, physics steps and timeout checks are handled one
    /// at a time, so every registry update and its recompute are atomic.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let receiver = self.spawn_network_receiver();
        let sender = self.spawn_network_sender();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timeout_interval = interval(Duration::from_secs(1));
        let mut last_tick = Instant::now();

        // Cap the step so a stalled loop does not launch the body
        let max_delta_time = 1.0 / 20.0;

        info!("Session code: {}", self.session.code());

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            let outbound = self.session.handle_packet(packet, addr, Instant::now().into_std());
                            self.dispatch(outbound);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let mut dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    if dt > max_delta_time {
                        debug!("Large delta time {:.3}s, capping to {:.3}s", dt, max_delta_time);
                        dt = max_delta_time;
                    }

                    let outbound = self.session.step(now.into_std(), dt);
                    self.dispatch(outbound);

                    if self.session.tick() % 300 == 0 && self.session.participant_count() > 0 {
                        debug!(
                            "Tick {}: {} participants, phase {:?}, command {:?}",
                            self.session.tick(),
                            self.session.participant_count(),
                            self.session.phase(),
                            self.session.command()
                        );
                    }
                },

                _ = timeout_interval.tick() => {
                    let outbound = self.session.check_timeouts(Instant::now().into_std());
                    self.dispatch(outbound);
                },
            }
        }

        // Let participants know the session is gone
        self.dispatch(vec![Outbound::Broadcast {
            packet: Packet::Disconnected {
                reason: "Host shut down".to_string(),
            },
        }]);

        receiver.abort();
        let _ = receiver.await;

        // Swapping the queue closes the old one, so the sender flushes the
        // goodbye and exits
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        self.game_tx = game_tx;
        self.game_rx = Some(game_rx);
        if let Some(sender) = sender {
            if let Err(e) = sender.await {
                error!("Network sender failed: {}", e);
            }
        }

        Ok(())
    }
}
