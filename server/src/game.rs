//! Host-side physics for the shared body
//!
//! Only the host runs this. Participants receive `BodyState` snapshots and
//! never simulate the body themselves.

use log::debug;
use shared::{
    ActionKind, AggregatedCommand, BodyState, Vector2, BODY_SIZE, DODGE_IMPULSE, FLOOR_Y,
    GRAVITY, GROUND_PROBE_RADIUS, HORIZONTAL_DECELERATION, JUMP_VELOCITY, MOVE_SPEED,
    SPRINT_MULTIPLIER, WORLD_HEIGHT, WORLD_WIDTH,
};

/// Axis-aligned slab on the ground layer. `y` is its top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Platform {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Platform {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn overlaps_circle(&self, center: Vector2, radius: f32) -> bool {
        let closest_x = center.x.clamp(self.x, self.x + self.width);
        let closest_y = center.y.clamp(self.y, self.y + self.height);
        let dx = center.x - closest_x;
        let dy = center.y - closest_y;
        dx * dx + dy * dy <= radius * radius
    }

    fn spans(&self, left: f32, right: f32) -> bool {
        right > self.x && left < self.x + self.width
    }
}

/// Static world geometry the body can stand on
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub ground: Vec<Platform>,
}

impl Level {
    /// Just the floor
    pub fn flat() -> Self {
        Self {
            ground: vec![Platform::new(0.0, FLOOR_Y, WORLD_WIDTH, WORLD_HEIGHT - FLOOR_Y)],
        }
    }

    /// Circle overlap test against the ground layer
    pub fn probe_ground(&self, point: Vector2, radius: f32) -> bool {
        self.ground
            .iter()
            .any(|platform| platform.overlaps_circle(point, radius))
    }
}

impl Default for Level {
    fn default() -> Self {
        let mut level = Level::flat();
        level.ground.push(Platform::new(120.0, 430.0, 160.0, 16.0));
        level.ground.push(Platform::new(520.0, 340.0, 160.0, 16.0));
        level
    }
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u32,
    pub body: BodyState,
    pub level: Level,
    grounded: bool,
}

impl GameState {
    pub fn new(level: Level) -> Self {
        let body = BodyState::new(WORLD_WIDTH / 2.0 - BODY_SIZE / 2.0, FLOOR_Y - BODY_SIZE);
        let mut state = Self {
            tick: 0,
            body,
            level,
            grounded: false,
        };
        state.refresh_grounded();
        state
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    /// Re-runs the ground probe at the body's feet.
    pub fn refresh_grounded(&mut self) -> bool {
        self.grounded = self
            .level
            .probe_ground(self.body.ground_probe_point(), GROUND_PROBE_RADIUS);
        self.grounded
    }

    /// Advances the body by one fixed step under `command`.
    ///
    /// The command only drives the horizontal axis. With no movement the body
    /// slows to a halt; vertical velocity is left to gravity and jumps.
    pub fn update_physics(&mut self, command: &AggregatedCommand, dt: f32) {
        let speed = if command.sprint {
            MOVE_SPEED * SPRINT_MULTIPLIER
        } else {
            MOVE_SPEED
        };
        let target = command.movement.x * speed;
        let vel_x = self.body.velocity.x;

        // Speeding up is immediate, slowing down (including after a dodge) is gradual
        self.body.velocity.x = if vel_x.abs() > target.abs() {
            approach(vel_x, target, HORIZONTAL_DECELERATION * dt)
        } else {
            target
        };

        if command.movement.x != 0.0 {
            self.body.facing = command.movement.x.signum();
        }

        if !self.grounded {
            self.body.velocity.y += GRAVITY * dt;
        }

        let previous_bottom = self.body.position.y + BODY_SIZE;
        self.body.position.x += self.body.velocity.x * dt;
        self.body.position.y += self.body.velocity.y * dt;

        self.body.position.x = self.body.position.x.clamp(0.0, WORLD_WIDTH - BODY_SIZE);

        if self.body.velocity.y >= 0.0 {
            self.land_on_ground(previous_bottom);
        }

        if self.body.position.y <= 0.0 {
            self.body.position.y = 0.0;
            self.body.velocity.y = 0.0;
        }

        self.refresh_grounded();
    }

    fn land_on_ground(&mut self, previous_bottom: f32) {
        let left = self.body.position.x;
        let right = left + BODY_SIZE;
        let bottom = self.body.position.y + BODY_SIZE;

        let landing = self.level.ground.iter().find(|platform| {
            previous_bottom <= platform.y && bottom >= platform.y && platform.spans(left, right)
        });

        if let Some(platform) = landing {
            self.body.position.y = platform.y - BODY_SIZE;
            self.body.velocity.y = 0.0;
        }
    }

    /// Applies a one-shot action if its precondition holds.
    ///
    /// Returns false when the action was refused (jumping while airborne).
    pub fn apply_action(&mut self, action: ActionKind) -> bool {
        match action {
            ActionKind::Jump => {
                if !self.grounded {
                    debug!("Jump refused, body is airborne");
                    return false;
                }
                self.body.velocity.y = JUMP_VELOCITY;
                self.grounded = false;
                true
            }
            ActionKind::Dodge => {
                self.body.velocity.x = self.body.facing * DODGE_IMPULSE;
                true
            }
            ActionKind::Attack => true,
        }
    }
}

fn approach(current: f32, target: f32, max_delta: f32) -> f32 {
    if current < target {
        (current + max_delta).min(target)
    } else {
        (current - max_delta).max(target)
    }
}
