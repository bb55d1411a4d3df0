//! Seed management for generation.
//!
//! A world is seeded from a string. The string is hashed into a master seed and
//! every consumer (a region, a stage) derives its own sub-seed from it, so a
//! single stage can be re-run in isolation and still draw the same numbers.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// The random generator used by every shuffle and random choice in the crate.
pub type GridRng = ChaCha8Rng;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

// FNV-1a over bytes, stable across toolchains.
fn fnv1a(state: u64, bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(state, |h, &b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

/// Hash a string seed into a master seed.
pub fn seed_from_str(seed: &str) -> u64 {
    fnv1a(FNV_OFFSET, seed.as_bytes())
}

/// Derive a sub-seed for `system` from `master`.
pub fn derive_seed(master: u64, system: &str) -> u64 {
    let h = fnv1a(FNV_OFFSET, &master.to_le_bytes());
    fnv1a(h, system.as_bytes())
}

/// A generator seeded from a string seed.
pub fn rng_from_str(seed: &str) -> GridRng {
    GridRng::seed_from_u64(seed_from_str(seed))
}

/// A generator for `system`, derived from `master`.
pub fn rng_for(master: u64, system: &str) -> GridRng {
    GridRng::seed_from_u64(derive_seed(master, system))
}
