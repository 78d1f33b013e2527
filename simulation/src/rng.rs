//! Seeded random number generation
//!
//! One master generator drives the whole run. Parallel work receives child
//! seeds drawn from it in a fixed order.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub type SimRng = ChaCha8Rng;

/// Creates the master generator, drawing a fresh seed when none is given.
/// Returns the generator together with the seed actually used.
pub fn master(seed: Option<u64>) -> (SimRng, u64) {
    let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
    (SimRng::seed_from_u64(seed), seed)
}

/// Draws `n` child seeds in order.
pub fn child_seeds(rng: &mut SimRng, n: usize) -> Vec<u64> {
    (0..n).map(|_| rng.gen()).collect()
}

pub fn child(seed: u64) -> SimRng {
    SimRng::seed_from_u64(seed)
}
