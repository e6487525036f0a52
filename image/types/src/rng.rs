// Licensed under the Apache-2.0 license

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Deterministic random source for a single generator component.
///
/// Each component passes its own diversifier so that one top-level seed
/// yields uncorrelated streams across components.
pub struct SeededRng {
    rng: ChaCha20Rng,
}

impl SeededRng {
    pub fn new(seed: u64, diversifier: u128) -> Self {
        let mut key = [0u8; 32];
        key[..16].copy_from_slice(&(seed as u128).wrapping_add(diversifier).to_le_bytes());
        Self {
            rng: ChaCha20Rng::from_seed(key),
        }
    }

    /// Draw `num_bits` random bits as `num_bits.div_ceil(8)` little-endian bytes.
    pub fn random_bits(&mut self, num_bits: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; num_bits.div_ceil(8)];
        self.rng.fill_bytes(&mut bytes);
        if num_bits % 8 != 0 {
            if let Some(top) = bytes.last_mut() {
                *top &= (1u8 << (num_bits % 8)) - 1;
            }
        }
        bytes
    }

    /// Draw at most 128 random bits as an integer.
    pub fn random_u128(&mut self, num_bits: usize) -> u128 {
        let value: u128 = self.rng.gen();
        if num_bits >= 128 {
            value
        } else {
            value & ((1u128 << num_bits) - 1)
        }
    }

    /// Uniformly pick an index in `0..len`. `len` must be non-zero.
    pub fn choose_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}
