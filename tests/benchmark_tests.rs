//! Performance benchmarks for the host's per-message and per-tick work

use server::aggregator::aggregate;
use server::config::SessionConfig;
use server::game::{GameState, Level};
use server::registry::{ClientInputRegistry, InputSample};
use server::session::HostSession;
use shared::{AggregatedCommand, Packet, SessionCode, Vector2, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

fn sample(client_id: u32, now: Instant) -> InputSample {
    let x = (client_id as f32 * 0.37).sin();
    InputSample::new(client_id, Vector2::new(x, -x), client_id % 2 == 0, now)
}

/// Benchmarks aggregation over a full snapshot
#[test]
fn benchmark_aggregation() {
    let now = Instant::now();
    let samples: Vec<InputSample> = (0..16).map(|id| sample(id, now)).collect();

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = aggregate(&samples, true);
    }

    let duration = start.elapsed();
    println!(
        "Aggregation: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks the upsert plus fresh snapshot every input packet triggers
#[test]
fn benchmark_registry_update_and_snapshot() {
    let mut registry = ClientInputRegistry::new();
    let window = Duration::from_millis(100);

    let iterations = 50_000;
    let start = Instant::now();

    for i in 0..iterations {
        let now = Instant::now();
        registry.upsert(sample(i % 8, now));
        let fresh = registry.snapshot_fresh(now, window);
        assert!(!fresh.is_empty());
    }

    let duration = start.elapsed();
    println!(
        "Registry update + snapshot: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(registry.len(), 8);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks one second of physics at 60 Hz, many times over
#[test]
fn benchmark_physics_simulation() {
    let mut game = GameState::new(Level::default());
    let command = AggregatedCommand {
        movement: Vector2::new(0.5, 0.0),
        sprint: true,
        grounded: true,
    };

    let iterations = 60_000;
    let start = Instant::now();

    for _ in 0..iterations {
        game.update_physics(&command, 1.0 / 60.0);
    }

    let duration = start.elapsed();
    println!(
        "Physics: {} steps in {:?} ({:.2} ns/step)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks full input handling in a session with every slot taken
#[test]
fn benchmark_session_input_handling() {
    let code = SessionCode::parse("BENCH1").unwrap();
    let mut session = HostSession::new(SessionConfig::default(), code.clone());
    let now = Instant::now();

    let addrs: Vec<SocketAddr> = (0..4u16)
        .map(|i| SocketAddr::from(([127, 0, 0, 1], 5000 + i)))
        .collect();
    for addr in &addrs {
        session.handle_packet(
            Packet::Connect {
                client_version: PROTOCOL_VERSION,
                session_code: code.clone(),
            },
            *addr,
            now,
        );
        session.handle_packet(Packet::Ready, *addr, now);
    }
    assert_eq!(session.participant_count(), 4);

    let iterations = 20_000u32;
    let start = Instant::now();

    for i in 0..iterations {
        let x = if i % 2 == 0 { 1.0 } else { -1.0 };
        session.handle_packet(
            Packet::Input {
                sequence: i,
                timestamp: 0,
                movement: Vector2::new(x, 0.0),
                sprint: i % 3 == 0,
            },
            addrs[(i % 4) as usize],
            now,
        );
    }

    let duration = start.elapsed();
    println!(
        "Session input handling: {} packets in {:?} ({:.2} μs/packet)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}
