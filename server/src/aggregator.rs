//! Combines every fresh input into one command
//!
//! Pure functions over a fresh snapshot. They are recomputed from the whole
//! snapshot every time, so the result does not depend on which client's
//! packet triggered the recompute.

use crate::registry::InputSample;
use shared::{AggregatedCommand, Vector2};

/// Mean movement with equal weight per fresh contributor, before clamping.
///
/// Divides by the number of contributors actually present, not by session
/// capacity, so a half-full lobby still reaches full speed.
pub fn average_movement(samples: &[InputSample]) -> Vector2 {
    if samples.is_empty() {
        return Vector2::ZERO;
    }

    let total = samples
        .iter()
        .fold(Vector2::ZERO, |acc, sample| acc.add(&sample.movement));
    total.scale(1.0 / samples.len() as f32)
}

/// Strict majority vote. A tie does not sprint, and nobody voting is a tie.
pub fn majority_sprint(samples: &[InputSample]) -> bool {
    let requests = samples.iter().filter(|s| s.sprint_requested).count();
    requests * 2 > samples.len()
}

/// Builds the command the shared body follows.
///
/// `grounded` comes from the host's ground probe and is passed through.
pub fn aggregate(samples: &[InputSample], grounded: bool) -> AggregatedCommand {
    AggregatedCommand {
        movement: average_movement(samples).clamp_magnitude(1.0),
        sprint: majority_sprint(samples),
        grounded,
    }
}
