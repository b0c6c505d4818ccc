// services/ops-sim/src/simulation.rs
//
// The record shape a publisher mutates on every tick
//

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A self-contained mock data source.
///
/// `advance` mutates the in-memory state for one tick; `snapshot` hands out
/// an owned copy for observers and callers of `Publisher::get_snapshot`.
pub trait Simulation: Send + 'static {
    type Snapshot: Clone + Send + Sync + 'static;

    /// Short label used in logs and metric labels
    fn name(&self) -> &'static str;

    fn advance(&mut self, ctx: &mut TickContext<'_>);

    fn snapshot(&self) -> Self::Snapshot;
}

/// Per-tick inputs handed to a simulation.
pub struct TickContext<'a> {
    pub rng: &'a mut StdRng,
    pub now: DateTime<Utc>,
}

impl TickContext<'_> {
    /// Bernoulli trial; probabilities outside [0, 1] are clamped.
    pub fn chance(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }

    /// `now`, unless that would move `previous` backwards.
    pub fn stamp(&self, previous: DateTime<Utc>) -> DateTime<Utc> {
        previous.max(self.now)
    }
}

/// Closed numeric range a mutated field must stay inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounded {
    pub min: f64,
    pub max: f64,
}

impl Bounded {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Apply a uniform delta in `[-delta, delta]`, then clamp.
    pub fn jitter<R: Rng + ?Sized>(&self, rng: &mut R, value: f64, delta: f64) -> f64 {
        if delta <= 0.0 {
            return self.clamp(value);
        }
        self.clamp(value + rng.gen_range(-delta..=delta))
    }

    /// Integer variant of [`Bounded::jitter`].
    pub fn jitter_count<R: Rng + ?Sized>(&self, rng: &mut R, value: u32, delta: u32) -> u32 {
        let step = rng.gen_range(-(delta as i64)..=delta as i64);
        self.clamp((value as i64 + step) as f64).round() as u32
    }
}
