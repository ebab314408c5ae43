//! Client input sampling with sequencing
//!
//! The client has no window, so input comes from an `InputSource`: a scripted
//! bot, a fixed stick position, or nothing at all.

use rand::Rng;
use shared::{timestamp_millis, ActionKind, InputState, Vector2};

/// One tick's worth of local input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalInput {
    pub movement: Vector2,
    pub sprint: bool,
    pub actions: Vec<ActionKind>,
}

/// Anything that can be polled for input once per tick
pub trait InputSource: Send {
    fn sample(&mut self) -> LocalInput;
}

/// Contributes a zero vector every tick
#[derive(Debug, Default)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn sample(&mut self) -> LocalInput {
        LocalInput::default()
    }
}

/// Holds the stick in one position
#[derive(Debug, Clone)]
pub struct ConstantInput {
    movement: Vector2,
    sprint: bool,
}

impl ConstantInput {
    pub fn new(movement: Vector2, sprint: bool) -> Self {
        Self { movement, sprint }
    }
}

impl InputSource for ConstantInput {
    fn sample(&mut self) -> LocalInput {
        LocalInput {
            movement: self.movement,
            sprint: self.sprint,
            actions: Vec::new(),
        }
    }
}

/// Picks a new random direction every few ticks and jumps now and then
pub struct WanderInput<R: Rng + Send> {
    rng: R,
    movement: Vector2,
    ticks_left: u32,
    hold_ticks: u32,
    jump_chance: f64,
}

impl WanderInput<rand::rngs::StdRng> {
    pub fn from_entropy() -> Self {
        use rand::SeedableRng;
        Self::new(rand::rngs::StdRng::from_entropy())
    }
}

impl<R: Rng + Send> WanderInput<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            movement: Vector2::ZERO,
            ticks_left: 0,
            hold_ticks: 30,
            jump_chance: 0.02,
        }
    }
}

impl<R: Rng + Send> InputSource for WanderInput<R> {
    fn sample(&mut self) -> LocalInput {
        if self.ticks_left == 0 {
            self.movement = Vector2::new(self.rng.gen_range(-1.0..=1.0), 0.0);
            self.ticks_left = self.hold_ticks;
        }
        self.ticks_left -= 1;

        let mut actions = Vec::new();
        if self.rng.gen_bool(self.jump_chance) {
            actions.push(ActionKind::Jump);
        }

        LocalInput {
            movement: self.movement,
            sprint: false,
            actions,
        }
    }
}

/// Turns local input into numbered `InputState`s
pub struct InputManager {
    next_sequence: u32,
}

impl InputManager {
    pub fn new() -> Self {
        Self { next_sequence: 1 }
    }

    /// Samples `source` once. Inputs go out every tick, which also keeps the
    /// connection alive, so there is no change detection here.
    pub fn update(&mut self, source: &mut dyn InputSource) -> (InputState, Vec<ActionKind>) {
        let local = source.sample();

        let input = InputState {
            sequence: self.next_sequence,
            timestamp: timestamp_millis(),
            movement: local.movement.clamp_axes(),
            sprint: local.sprint,
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);

        (input, local.actions)
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sequence_increments() {
        let mut manager = InputManager::new();
        let mut source = IdleInput;

        let (first, _) = manager.update(&mut source);
        let (second, _) = manager.update(&mut source);

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn test_constant_input_is_clamped() {
        let mut manager = InputManager::new();
        let mut source = ConstantInput::new(Vector2::new(3.0, -2.0), true);

        let (input, actions) = manager.update(&mut source);

        assert_eq!(input.movement, Vector2::new(1.0, -1.0));
        assert!(input.sprint);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_idle_contributes_zero() {
        let mut source = IdleInput;
        let local = source.sample();
        assert_eq!(local.movement, Vector2::ZERO);
        assert!(!local.sprint);
    }

    #[test]
    fn test_wander_holds_direction() {
        let mut source = WanderInput::new(StdRng::seed_from_u64(7));
        let first = source.sample();

        for _ in 1..30 {
            assert_eq!(source.sample().movement, first.movement);
        }
        assert!(first.movement.x >= -1.0 && first.movement.x <= 1.0);
        assert_eq!(first.movement.y, 0.0);
    }
}
