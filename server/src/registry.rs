//! Latest input per participant
//!
//! The registry keeps exactly one sample per client: every new sample
//! overwrites the previous one. There is no sequence check, so a late,
//! reordered packet can replace a newer sample until the next one arrives.
//! Samples are never expired here; freshness is applied when a snapshot is
//! taken for aggregation.

use shared::{ClientId, Vector2};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One participant's input as seen by the host
#[derive(Debug, Clone, PartialEq)]
pub struct InputSample {
    pub client_id: ClientId,
    /// Components clamped into [-1, 1], magnitude may exceed 1
    pub movement: Vector2,
    pub sprint_requested: bool,
    /// Host clock at receipt
    pub sampled_at: Instant,
}

impl InputSample {
    pub fn new(
        client_id: ClientId,
        movement: Vector2,
        sprint_requested: bool,
        sampled_at: Instant,
    ) -> Self {
        Self {
            client_id,
            movement: movement.clamp_axes(),
            sprint_requested,
            sampled_at,
        }
    }

    /// True while the sample is strictly younger than `window`.
    /// A sample stamped after `now` counts as brand new.
    pub fn is_fresh(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.sampled_at) < window
    }
}

#[derive(Debug, Default)]
pub struct ClientInputRegistry {
    samples: HashMap<ClientId, InputSample>,
}

impl ClientInputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the sample, replacing whatever the client sent before.
    pub fn upsert(&mut self, sample: InputSample) -> Option<InputSample> {
        self.samples.insert(sample.client_id, sample)
    }

    /// Forgets a client. Must run on disconnect so its last input stops
    /// contributing.
    pub fn remove(&mut self, client_id: &ClientId) -> Option<InputSample> {
        self.samples.remove(client_id)
    }

    /// Returns the fresh samples ordered by client id.
    ///
    /// The ordering makes float summation in the aggregator independent of
    /// hash map iteration order.
    pub fn snapshot_fresh(&self, now: Instant, window: Duration) -> Vec<InputSample> {
        let mut fresh: Vec<InputSample> = self
            .samples
            .values()
            .filter(|sample| sample.is_fresh(now, window))
            .cloned()
            .collect();
        fresh.sort_by_key(|sample| sample.client_id);
        fresh
    }

    pub fn get(&self, client_id: &ClientId) -> Option<&InputSample> {
        self.samples.get(client_id)
    }

    pub fn contains(&self, client_id: &ClientId) -> bool {
        self.samples.contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
