use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use xsdforge_config::SelectionStrategy;

/// Run-scoped selection state, keyed by (element path, strategy).
#[derive(Debug, Default)]
pub struct SelectionState {
    cursors: HashMap<String, usize>,
    substreams: HashMap<String, ChaCha8Rng>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick an index into a pool of `len` candidates.
    ///
    /// `random` draws from the shared run RNG; `seeded` from a per-path
    /// substream that does not disturb it.
    pub fn select_index(
        &mut self,
        path: &str,
        strategy: SelectionStrategy,
        len: usize,
        seed: u64,
        rng: &mut ChaCha8Rng,
    ) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let key = state_key(path, strategy);
        let index = match strategy {
            SelectionStrategy::Sequential | SelectionStrategy::Template => {
                let cursor = self.cursors.entry(key).or_insert(0);
                let index = *cursor % len;
                *cursor = cursor.wrapping_add(1);
                index
            }
            SelectionStrategy::Random => rng.random_range(0..len),
            SelectionStrategy::Seeded => self
                .substreams
                .entry(key)
                .or_insert_with(|| substream(seed, path))
                .random_range(0..len),
        };
        Some(index)
    }

    pub fn select<'p, T>(
        &mut self,
        path: &str,
        strategy: SelectionStrategy,
        pool: &'p [T],
        seed: u64,
        rng: &mut ChaCha8Rng,
    ) -> Option<&'p T> {
        self.select_index(path, strategy, pool.len(), seed, rng)
            .and_then(|index| pool.get(index))
    }
}

fn state_key(path: &str, strategy: SelectionStrategy) -> String {
    format!("{path}#{}", strategy.as_str())
}

/// Independent RNG derived from SHA-256 of (seed, path).
pub fn substream(seed: u64, path: &str) -> ChaCha8Rng {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(path.as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    ChaCha8Rng::from_seed(digest)
}
