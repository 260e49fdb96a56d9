//! Benchmark utilities for RadixDB.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed shared by every benchmark so runs are comparable.
pub const SEED: u64 = 0x5eed_1234;

/// A deterministic generator for benchmark data.
pub fn rng() -> StdRng {
    StdRng::seed_from_u64(SEED)
}

/// Random bytes of the given length.
pub fn random_data(rng: &mut impl Rng, size: usize) -> Vec<u8> {
    (0..size).map(|_| rng.gen()).collect()
}

/// `count` distinct keys that share prefixes the way path-like keys do,
/// e.g. `user/0042/profile`.
pub fn path_keys(count: usize) -> Vec<Vec<u8>> {
    const SUFFIXES: [&str; 4] = ["profile", "settings", "sessions", "avatar"];
    (0..count)
        .map(|i| {
            let suffix = SUFFIXES[i % SUFFIXES.len()];
            format!("user/{:04}/{suffix}", i / SUFFIXES.len()).into_bytes()
        })
        .collect()
}

/// `count` uniformly random keys of `len` bytes.
pub fn random_keys(rng: &mut impl Rng, count: usize, len: usize) -> Vec<Vec<u8>> {
    (0..count).map(|_| random_data(rng, len.max(1))).collect()
}

/// Pairs of `keys` with random values of `value_size` bytes.
pub fn entries(
    rng: &mut impl Rng,
    keys: Vec<Vec<u8>>,
    value_size: usize,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    keys.into_iter()
        .map(|key| {
            let value = random_data(rng, value_size);
            (key, value)
        })
        .collect()
}
