//! Integration tests for the host and participants together
//!
//! These tests run a real host on a loopback UDP socket and drive it with
//! real clients.

use assert_approx_eq::assert_approx_eq;
use bincode::{deserialize, serialize};
use client::input::{ConstantInput, IdleInput};
use client::network::{Client, JoinError};
use client::replica::SessionReplica;
use server::config::SessionConfig;
use server::network::{Server, ServerMessage};
use shared::{ActionKind, AdmissionRejection, SessionPhase, Vector2};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

const JOIN_TIMEOUT: Duration = Duration::from_secs(2);
const SETTLE: Duration = Duration::from_millis(250);

/// Hosts a session on an ephemeral port. Inputs stay fresh for the whole
/// test so timing noise cannot age them out.
async fn start_host(config: SessionConfig) -> (String, String, UnboundedSender<ServerMessage>) {
    let config = SessionConfig {
        freshness_window: Duration::from_secs(5),
        ..config
    };
    let mut server = Server::new("127.0.0.1:0", config).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let code = server.session_code().to_string();
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, code, shutdown)
}

async fn joined_client(addr: &str, code: &str) -> Client {
    let mut client = Client::new(addr, 0).await.unwrap();
    client.join(code, JOIN_TIMEOUT).await.unwrap();
    client
}

/// HOST + CLIENT OVER UDP
mod session_tests {
    use super::*;

    /// Connect, ready, input and command replication end to end
    #[tokio::test]
    async fn aggregated_command_reaches_every_participant() {
        let (addr, code, shutdown) = start_host(SessionConfig::default()).await;

        let mut a = Client::new(&addr, 0).await.unwrap();
        let wrong = a.join("000000", JOIN_TIMEOUT).await;
        assert!(matches!(
            wrong,
            Err(JoinError::Rejected(AdmissionRejection::UnknownSession))
        ));

        // Same client, right code
        a.join(&code, JOIN_TIMEOUT).await.unwrap();
        let mut b = joined_client(&addr, &code).await;

        let mut right = ConstantInput::new(Vector2::new(1.0, 0.0), false);
        a.send_input(&mut right).await.unwrap();
        b.send_input(&mut right).await.unwrap();
        a.pump(SETTLE).await.unwrap();

        let command = a.replica().command();
        assert_approx_eq!(command.movement.x, 1.0, 1e-5);
        assert!(!command.sprint);

        let mut c = joined_client(&addr, &code).await;
        let mut left_sprint = ConstantInput::new(Vector2::new(-1.0, 0.0), true);
        c.send_input(&mut left_sprint).await.unwrap();

        a.pump(SETTLE).await.unwrap();
        c.pump(Duration::from_millis(50)).await.unwrap();

        for replica in [a.replica(), c.replica()] {
            let command = replica.command();
            assert_approx_eq!(command.movement.x, 1.0 / 3.0, 1e-5);
            assert_approx_eq!(command.movement.y, 0.0, 1e-6);
            assert!(!command.sprint);
        }

        assert!(a.replica().body().is_some());
        assert_eq!(a.replica().lobby().participants.len(), 3);

        shutdown.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn disconnect_removes_contribution() {
        let (addr, code, shutdown) = start_host(SessionConfig::default()).await;
        let mut a = joined_client(&addr, &code).await;
        let mut b = joined_client(&addr, &code).await;

        a.send_input(&mut ConstantInput::new(Vector2::new(1.0, 0.0), true))
            .await
            .unwrap();
        b.send_input(&mut ConstantInput::new(Vector2::new(-1.0, 0.0), true))
            .await
            .unwrap();
        a.pump(SETTLE).await.unwrap();
        assert_approx_eq!(a.replica().command().movement.x, 0.0, 1e-5);
        assert!(a.replica().command().sprint);

        b.disconnect().await.unwrap();
        a.pump(SETTLE).await.unwrap();

        let command = a.replica().command();
        assert_approx_eq!(command.movement.x, 1.0, 1e-5);
        assert!(command.sprint);
        assert_eq!(a.replica().lobby().participants.len(), 1);

        shutdown.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn auto_start_locks_the_lobby() {
        let config = SessionConfig {
            capacity: 2,
            auto_start_when_full: true,
            ..SessionConfig::default()
        };
        let (addr, code, shutdown) = start_host(config).await;

        let mut a = joined_client(&addr, &code).await;
        let mut phase = a.replica().subscribe_phase();
        let mut b = joined_client(&addr, &code).await;

        a.pump(SETTLE).await.unwrap();
        b.pump(Duration::from_millis(50)).await.unwrap();

        assert!(phase.has_changed().unwrap());
        assert_eq!(a.replica().phase(), SessionPhase::InProgress);
        assert_eq!(b.replica().scene(), Some("Gameplay"));

        let mut late = Client::new(&addr, 0).await.unwrap();
        let result = late.join(&code, JOIN_TIMEOUT).await;
        assert!(matches!(
            result,
            Err(JoinError::Rejected(AdmissionRejection::AlreadyStarted))
        ));

        shutdown.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn only_the_owner_starts_the_session() {
        let (addr, code, shutdown) = start_host(SessionConfig::default()).await;
        let mut owner = joined_client(&addr, &code).await;
        let mut guest = joined_client(&addr, &code).await;

        guest.pump(SETTLE).await.unwrap();
        assert_eq!(guest.replica().lobby().owner, owner.client_id());

        guest.request_start().await.unwrap();
        guest.pump(SETTLE).await.unwrap();
        assert_eq!(guest.replica().phase(), SessionPhase::Lobby);

        owner.request_start().await.unwrap();
        guest.pump(SETTLE).await.unwrap();
        owner.pump(Duration::from_millis(50)).await.unwrap();
        assert_eq!(guest.replica().phase(), SessionPhase::InProgress);
        assert_eq!(owner.replica().phase(), SessionPhase::InProgress);

        shutdown.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn accepted_actions_are_announced() {
        let (addr, code, shutdown) = start_host(SessionConfig::default()).await;
        let mut a = joined_client(&addr, &code).await;
        let mut effects = a.replica().subscribe_effects();

        a.send_input(&mut IdleInput).await.unwrap();
        a.pump(Duration::from_millis(100)).await.unwrap();
        a.send_action(ActionKind::Jump).await.unwrap();
        a.pump(SETTLE).await.unwrap();

        let effect = effects.try_recv().unwrap();
        assert_eq!(effect.action, ActionKind::Jump);
        assert_eq!(Some(effect.client_id), a.client_id());

        shutdown.send(ServerMessage::Shutdown).unwrap();
    }

    #[tokio::test]
    async fn host_shutdown_disconnects_participants() {
        let (addr, code, shutdown) = start_host(SessionConfig::default()).await;
        let mut a = joined_client(&addr, &code).await;
        a.pump(Duration::from_millis(100)).await.unwrap();
        assert!(a.is_connected());

        shutdown.send(ServerMessage::Shutdown).unwrap();
        a.pump(SETTLE).await.unwrap();

        assert!(!a.is_connected());
        assert!(a.client_id().is_none());
    }
}

/// REPLICATION WITHOUT A SOCKET
mod replication_tests {
    use super::*;
    use server::game::Level;
    use server::session::{HostSession, Outbound};
    use shared::{Packet, SessionCode, PROTOCOL_VERSION};
    use std::net::SocketAddr;
    use std::time::Instant;

    fn deliver(outbound: Vec<Outbound>, replica: &mut SessionReplica) {
        for message in outbound {
            let packet = match message {
                Outbound::Send { packet, .. } | Outbound::Broadcast { packet } => packet,
            };
            let bytes = serialize(&packet).unwrap();
            match deserialize::<Packet>(&bytes).unwrap() {
                Packet::Command { revision, command } => {
                    replica.apply_command(revision, command);
                }
                Packet::BodySnapshot { tick, body, .. } => {
                    replica.apply_body(tick, body);
                }
                Packet::LoadScene { scene } => replica.apply_load_scene(scene),
                Packet::LobbyUpdate {
                    participants,
                    capacity,
                    owner,
                } => replica.apply_lobby(participants, capacity, owner),
                _ => {}
            }
        }
    }

    /// Replica follows the host through joins, inputs and physics steps
    #[test]
    fn replica_tracks_host_session() {
        let code = SessionCode::parse("TEST42").unwrap();
        let mut host = HostSession::with_level(SessionConfig::default(), code.clone(), Level::flat());
        let mut replica = SessionReplica::new();
        let mut observer = replica.subscribe_command();
        let now = Instant::now();

        for port in 4000..4002u16 {
            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            host.handle_packet(
                Packet::Connect {
                    client_version: PROTOCOL_VERSION,
                    session_code: code.clone(),
                },
                addr,
                now,
            );
            deliver(host.handle_packet(Packet::Ready, addr, now), &mut replica);
        }
        assert_eq!(replica.lobby().participants.len(), 2);

        let out = host.handle_packet(
            Packet::Input {
                sequence: 1,
                timestamp: 0,
                movement: Vector2::new(0.6, 0.0),
                sprint: true,
            },
            SocketAddr::from(([127, 0, 0, 1], 4000)),
            now,
        );
        deliver(out, &mut replica);

        assert!(observer.has_changed().unwrap());
        let command = *observer.borrow_and_update();
        assert_approx_eq!(command.movement.x, 0.6, 1e-5);
        assert!(command.sprint);
        assert_eq!(replica.command(), host.command());

        deliver(host.step(now, 1.0 / 60.0), &mut replica);
        assert_eq!(replica.body(), Some(host.body()));

        deliver(host.start(), &mut replica);
        assert_eq!(replica.phase(), SessionPhase::InProgress);
    }
}
