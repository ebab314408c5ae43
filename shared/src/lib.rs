use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

mod session_code;

pub use session_code::{CodeAlphabet, SessionCode, SessionCodeError, SESSION_CODE_LEN};

pub const PROTOCOL_VERSION: u32 = 1;

pub const GRAVITY: f32 = 980.0;
pub const MOVE_SPEED: f32 = 300.0;
pub const SPRINT_MULTIPLIER: f32 = 1.6;
pub const JUMP_VELOCITY: f32 = -450.0;
pub const DODGE_IMPULSE: f32 = 600.0;
pub const HORIZONTAL_DECELERATION: f32 = 1800.0;
pub const FLOOR_Y: f32 = 550.0;
pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const BODY_SIZE: f32 = 32.0;
pub const GROUND_PROBE_RADIUS: f32 = 4.0;

/// Wall-clock milliseconds since the Unix epoch, used for packet timestamps
pub fn timestamp_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    millis.min(u64::MAX as u128) as u64
}

/// Handle the host assigns to every admitted participant
pub type ClientId = u32;

/// Two-component vector. Positive y points down, like screen space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Shrinks the vector onto the circle of radius `max` if it is longer.
    pub fn clamp_magnitude(&self, max: f32) -> Vector2 {
        let mag = self.magnitude();
        if mag > max && mag > 0.0 {
            self.scale(max / mag)
        } else {
            *self
        }
    }

    /// Clamps each component into [-1, 1]. NaN components become 0.
    pub fn clamp_axes(&self) -> Vector2 {
        let axis = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) };
        Vector2 {
            x: axis(self.x),
            y: axis(self.y),
        }
    }
}

/// The single control signal the host derives from every fresh input
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregatedCommand {
    pub movement: Vector2,
    pub sprint: bool,
    pub grounded: bool,
}

/// Snapshot of the one physics body every participant shares
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    pub position: Vector2,
    pub velocity: Vector2,
    /// 1.0 when facing right, -1.0 when facing left
    pub facing: f32,
}

impl BodyState {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            position: Vector2::new(x, y),
            velocity: Vector2::ZERO,
            facing: 1.0,
        }
    }

    pub fn get_bounds(&self) -> (f32, f32, f32, f32) {
        (
            self.position.x,
            self.position.y,
            self.position.x + BODY_SIZE,
            self.position.y + BODY_SIZE,
        )
    }

    /// Point just below the middle of the body's feet used for ground checks
    pub fn ground_probe_point(&self) -> Vector2 {
        Vector2::new(self.position.x + BODY_SIZE / 2.0, self.position.y + BODY_SIZE)
    }
}

/// One-shot actions that bypass aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Jump,
    Attack,
    Dodge,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Jump => "jump",
            ActionKind::Attack => "attack",
            ActionKind::Dodge => "dodge",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Lobby,
    InProgress,
}

/// Why the host refused a join request
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AdmissionRejection {
    #[error("session is full ({capacity} players)")]
    Full { capacity: usize },
    #[error("session has already started")]
    AlreadyStarted,
    #[error("no session with that code")]
    UnknownSession,
    #[error("protocol version mismatch (host {expected}, client {actual})")]
    VersionMismatch { expected: u32, actual: u32 },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
        session_code: SessionCode,
    },
    Ready,
    Input {
        sequence: u32,
        timestamp: u64,
        movement: Vector2,
        sprint: bool,
    },
    Action {
        action: ActionKind,
    },
    StartSession,
    Disconnect,

    Connected {
        client_id: ClientId,
        session_code: SessionCode,
    },
    Rejected {
        reason: AdmissionRejection,
    },
    LobbyUpdate {
        participants: Vec<ClientId>,
        capacity: usize,
        owner: Option<ClientId>,
    },
    Command {
        revision: u64,
        command: AggregatedCommand,
    },
    BodySnapshot {
        tick: u32,
        timestamp: u64,
        body: BodyState,
    },
    ActionEffect {
        action: ActionKind,
        client_id: ClientId,
    },
    LoadScene {
        scene: String,
    },
    Disconnected {
        reason: String,
    },
}

/// A locally sampled input, numbered in send order
#[derive(Debug, Clone, PartialEq)]
pub struct InputState {
    pub sequence: u32,
    pub timestamp: u64,
    pub movement: Vector2,
    pub sprint: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_vector_magnitude() {
        assert_approx_eq!(Vector2::new(3.0, 4.0).magnitude(), 5.0, 1e-6);
        assert_eq!(Vector2::ZERO.magnitude(), 0.0);
    }

    #[test]
    fn test_clamp_magnitude_shrinks_long_vectors() {
        let clamped = Vector2::new(3.0, 4.0).clamp_magnitude(1.0);
        assert_approx_eq!(clamped.magnitude(), 1.0, 1e-6);
        assert_approx_eq!(clamped.x, 0.6, 1e-6);
        assert_approx_eq!(clamped.y, 0.8, 1e-6);
    }

    #[test]
    fn test_clamp_magnitude_keeps_short_vectors() {
        let v = Vector2::new(0.3, -0.4);
        assert_eq!(v.clamp_magnitude(1.0), v);
        assert_eq!(Vector2::ZERO.clamp_magnitude(1.0), Vector2::ZERO);
    }

    #[test]
    fn test_clamp_axes() {
        let v = Vector2::new(2.5, -7.0).clamp_axes();
        assert_eq!(v, Vector2::new(1.0, -1.0));

        let nan = Vector2::new(f32::NAN, 0.5).clamp_axes();
        assert_eq!(nan, Vector2::new(0.0, 0.5));
    }

    #[test]
    fn test_body_bounds_and_probe() {
        let body = BodyState::new(100.0, 200.0);
        let (x1, y1, x2, y2) = body.get_bounds();
        assert_eq!((x1, y1), (100.0, 200.0));
        assert_eq!((x2, y2), (100.0 + BODY_SIZE, 200.0 + BODY_SIZE));

        let probe = body.ground_probe_point();
        assert_eq!(probe, Vector2::new(100.0 + BODY_SIZE / 2.0, 200.0 + BODY_SIZE));
    }

    #[test]
    fn test_rejection_reasons_are_distinct() {
        let full = AdmissionRejection::Full { capacity: 4 }.to_string();
        let started = AdmissionRejection::AlreadyStarted.to_string();
        assert!(full.contains("full"));
        assert!(started.contains("already started"));
        assert_ne!(full, started);
    }

    #[test]
    fn test_packet_serialization_input() {
        let packet = Packet::Input {
            sequence: 123,
            timestamp: 456789,
            movement: Vector2::new(-0.5, 1.0),
            sprint: true,
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Input {
                sequence,
                timestamp,
                movement,
                sprint,
            } => {
                assert_eq!(sequence, 123);
                assert_eq!(timestamp, 456789);
                assert_eq!(movement, Vector2::new(-0.5, 1.0));
                assert!(sprint);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_rejected() {
        let packet = Packet::Rejected {
            reason: AdmissionRejection::Full { capacity: 4 },
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Rejected { reason } => {
                assert_eq!(reason, AdmissionRejection::Full { capacity: 4 })
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_connect() {
        let code = SessionCode::parse("K7P2QX").unwrap();
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            session_code: code.clone(),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Connect {
                client_version,
                session_code,
            } => {
                assert_eq!(client_version, PROTOCOL_VERSION);
                assert_eq!(session_code, code);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_action_display() {
        assert_eq!(ActionKind::Jump.to_string(), "jump");
        assert_eq!(ActionKind::Dodge.to_string(), "dodge");
    }

    #[test]
    fn test_default_phase_is_lobby() {
        assert_eq!(SessionPhase::default(), SessionPhase::Lobby);
    }
}
