use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub const DEFAULT_SEED: u64 = 42;

/// Uniform rolls in `[0, 1)` consumed by the resolver and the policies.
pub trait RollSource {
    fn roll(&mut self) -> f32;
}

/// Seeded encounter RNG. Every random decision in a fight goes through one of these
/// so a seed fully determines the outcome.
#[derive(Debug, Clone)]
pub struct SimulationRng {
    seed: u64,
    rng: StdRng,
}

impl SimulationRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn gen_range(&mut self, range: RangeInclusive<u32>) -> u32 {
        self.rng.gen_range(range)
    }

    pub fn pick_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.rng.gen_range(0..len))
    }

    /// Fisher-Yates shuffle in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

impl Default for SimulationRng {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl RollSource for SimulationRng {
    fn roll(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }
}

/// Replays a fixed list of rolls, repeating the last one once exhausted.
#[derive(Debug, Clone)]
pub struct FixedRolls {
    rolls: Vec<f32>,
    cursor: usize,
}

impl FixedRolls {
    pub fn new(rolls: impl Into<Vec<f32>>) -> Self {
        Self {
            rolls: rolls.into(),
            cursor: 0,
        }
    }
}

impl RollSource for FixedRolls {
    fn roll(&mut self) -> f32 {
        let value = self
            .rolls
            .get(self.cursor)
            .or_else(|| self.rolls.last())
            .copied()
            .unwrap_or(0.0);
        self.cursor += 1;
        value
    }
}
