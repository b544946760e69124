//! Injected random sources
//!
//! Every resolver call that rolls dice takes a `&mut dyn RandomSource`. Two
//! runs fed the same source produce the same timeline.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Anything that can produce the next float in [0, 1)
pub trait RandomSource {
    fn next_f32(&mut self) -> f32;
}

/// Seeded ChaCha stream, the default for real battles
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f32(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }
}

/// Replays a fixed list of rolls, cycling when exhausted
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    rolls: Vec<f32>,
    cursor: usize,
}

impl ScriptedRandom {
    pub fn new(rolls: Vec<f32>) -> Self {
        assert!(!rolls.is_empty(), "scripted random source needs at least one roll");
        Self { rolls, cursor: 0 }
    }

    /// Always rolls 0.0: every attack with a positive hit chance lands
    pub fn always_hit() -> Self {
        Self::new(vec![0.0])
    }

    /// Always rolls just under 1.0: every attack below certainty misses
    pub fn always_miss() -> Self {
        Self::new(vec![0.999_999])
    }

    /// Rolls drawn so far
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f32(&mut self) -> f32 {
        let roll = self.rolls[self.cursor % self.rolls.len()];
        self.cursor += 1;
        roll
    }
}
