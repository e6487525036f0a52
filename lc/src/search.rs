// Licensed under the Apache-2.0 license

use log::debug;
use otpgen_crypto::{hamming_distance, LinearCode};
use otpgen_error::{OtpError, OtpResult};
use otpgen_types::SeededRng;
use std::collections::HashSet;

/// Hamming weight and distance bounds on generated codewords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Constraints {
    pub min_hw: u32,
    pub max_hw: u32,
    pub min_hd: u32,
}

/// Scatter the low bits of `bits` into the set positions of `mask`, lowest
/// position first.
pub(crate) fn scatter_bits(bits: u128, mask: u128) -> u128 {
    let mut out = 0u128;
    let mut mask = mask;
    let mut i = 0;
    while mask != 0 {
        let lowest = mask & mask.wrapping_neg();
        if (bits >> i) & 1 == 1 {
            out |= lowest;
        }
        mask &= mask - 1;
        i += 1;
    }
    out
}

/// Sphere-packing upper bound on the number of codewords of the code that
/// can be pairwise `min_hd` apart.
pub(crate) fn max_codewords(code: &LinearCode, min_hd: u32) -> u128 {
    let n = code.codeword_width() as u128;
    let radius = min_hd.saturating_sub(1) / 2;
    let mut volume = 0u128;
    let mut binomial = 1u128;
    for i in 0..=radius as u128 {
        if i > 0 {
            binomial = binomial.saturating_mul(n + 1 - i) / i;
        }
        volume = volume.saturating_add(binomial);
    }
    let space = 1u128.checked_shl(n as u32).unwrap_or(u128::MAX);
    let data_space = 1u128
        .checked_shl(code.data_width() as u32)
        .unwrap_or(u128::MAX);
    (space / volume.max(1)).min(data_space)
}

/// Random search for incrementally writable codeword pairs.
///
/// All accepted words, across every state type, form one pool; each new
/// word must keep `min_hd` to every word already in the pool.
pub(crate) struct WordSearch<'a> {
    code: &'a LinearCode,
    constraints: Constraints,
    existing: Vec<u128>,
}

impl<'a> WordSearch<'a> {
    pub fn new(code: &'a LinearCode, constraints: Constraints) -> Self {
        Self {
            code,
            constraints,
            existing: Vec::new(),
        }
    }

    /// All accepted words in acceptance order
    pub fn into_words(self) -> Vec<u128> {
        self.existing
    }

    fn keeps_distance(&self, word: u128) -> bool {
        self.existing
            .iter()
            .all(|&w| hamming_distance(word, w) >= self.constraints.min_hd)
    }

    fn accepts_base(&self, base: u128) -> bool {
        let weight = base.count_ones();
        weight >= self.constraints.min_hw
            && weight <= self.constraints.max_hw
            && self.keeps_distance(base)
    }

    /// Every codeword reachable from `base` by setting data bits that keeps
    /// all set bits of `base`, including its parity bits.
    pub fn incremental_candidates(&self, base: u128) -> Vec<u128> {
        let base_data = self.code.data(base);
        let free_mask = self.code.data_mask() & !base_data;
        let free_bits = free_mask.count_ones();

        let mut candidates = Vec::new();
        for k in 1..(1u128 << free_bits) {
            let candidate = self.code.encode(base_data | scatter_bits(k, free_mask));
            if candidate & base != base {
                continue;
            }
            if candidate.count_ones() > self.constraints.max_hw {
                continue;
            }
            if hamming_distance(candidate, base) < self.constraints.min_hd
                || !self.keeps_distance(candidate)
            {
                continue;
            }
            candidates.push(candidate);
        }
        candidates
    }

    /// Draw a new base word and one of its incremental words.
    ///
    /// A base draw without any valid incremental word is discarded. Once
    /// every possible data value has been discarded the constraints cannot
    /// be met.
    pub fn next_pair(&mut self, rng: &mut SeededRng) -> OtpResult<(u128, u128)> {
        let data_width = self.code.data_width();
        let data_space = 1u128 << data_width;
        let mut rejected = HashSet::new();

        loop {
            let data = rng.random_u128(data_width);
            if rejected.contains(&data) {
                continue;
            }
            let base = self.code.encode(data);

            if self.accepts_base(base) {
                let candidates = self.incremental_candidates(base);
                if !candidates.is_empty() {
                    let incr = candidates[rng.choose_index(candidates.len())];
                    debug!(
                        "word {:4}: {:0dw$b}|{:0ew$b} -> {:0dw$b}|{:0ew$b}",
                        self.existing.len() / 2,
                        self.code.data(base),
                        base >> data_width,
                        self.code.data(incr),
                        incr >> data_width,
                        dw = data_width,
                        ew = self.code.ecc_width(),
                    );
                    self.existing.push(base);
                    self.existing.push(incr);
                    return Ok((base, incr));
                }
            }

            rejected.insert(data);
            if rejected.len() as u128 == data_space {
                return Err(OtpError::InfeasibleConstraints(format!(
                    "no incrementally writable word pair left after {} accepted words \
                     (min_hw {}, max_hw {}, min_hd {})",
                    self.existing.len(),
                    self.constraints.min_hw,
                    self.constraints.max_hw,
                    self.constraints.min_hd
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hamming_7_4() -> LinearCode {
        LinearCode::new(4, 3, vec![vec![0, 1, 3], vec![0, 2, 3], vec![1, 2, 3]]).unwrap()
    }

    #[test]
    fn test_scatter_bits() {
        assert_eq!(scatter_bits(0b11, 0b1010), 0b1010);
        assert_eq!(scatter_bits(0b01, 0b1010), 0b0010);
        assert_eq!(scatter_bits(0b10, 0b1010), 0b1000);
        assert_eq!(scatter_bits(0b101, 0b1_0110_0000), 0b1_0010_0000);
        assert_eq!(scatter_bits(0, 0xff), 0);
    }

    #[test]
    fn test_incremental_candidates_keep_base_bits() {
        let code = hamming_7_4();
        let search = WordSearch::new(
            &code,
            Constraints {
                min_hw: 0,
                max_hw: 7,
                min_hd: 1,
            },
        );
        for data in 0..16u128 {
            let base = code.encode(data);
            for candidate in search.incremental_candidates(base) {
                assert_eq!(candidate & base, base);
                assert_ne!(candidate, base);
                assert!(code.is_valid(candidate));
            }
        }
        // All data bits set leaves nothing to increment.
        assert!(search.incremental_candidates(code.encode(0xf)).is_empty());
    }

    #[test]
    fn test_next_pair() {
        let code = hamming_7_4();
        let mut search = WordSearch::new(
            &code,
            Constraints {
                min_hw: 0,
                max_hw: 7,
                min_hd: 1,
            },
        );
        let mut rng = SeededRng::new(5, 0);
        let (base, incr) = search.next_pair(&mut rng).unwrap();
        assert_eq!(base & incr, base);
        assert_eq!(search.into_words(), vec![base, incr]);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let code = hamming_7_4();
        // Hamming(7,4) has minimum distance 3, so distance 5 leaves at most
        // a handful of compatible words.
        let mut search = WordSearch::new(
            &code,
            Constraints {
                min_hw: 0,
                max_hw: 7,
                min_hd: 5,
            },
        );
        let mut rng = SeededRng::new(1, 0);
        let result = (0..16).try_for_each(|_| search.next_pair(&mut rng).map(|_| ()));
        assert!(matches!(result, Err(OtpError::InfeasibleConstraints(_))));
    }

    #[test]
    fn test_unwritable_weight_limit_fails() {
        let code = hamming_7_4();
        // No codeword above weight zero is allowed, so no base word has an
        // incremental partner and every draw ends up rejected.
        let mut search = WordSearch::new(
            &code,
            Constraints {
                min_hw: 0,
                max_hw: 0,
                min_hd: 1,
            },
        );
        let mut rng = SeededRng::new(3, 0);
        assert!(matches!(
            search.next_pair(&mut rng),
            Err(OtpError::InfeasibleConstraints(_))
        ));
        assert!(search.into_words().is_empty());
    }

    #[test]
    fn test_max_codewords() {
        let code = hamming_7_4();
        assert_eq!(max_codewords(&code, 1), 16);
        // 2^7 / (1 + 7) = 16
        assert_eq!(max_codewords(&code, 3), 16);
        // 2^7 / (1 + 7 + 21) = 4
        assert_eq!(max_codewords(&code, 5), 4);
    }
}
