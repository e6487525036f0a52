// Licensed under the Apache-2.0 license

use otpgen_error::{OtpError, OtpResult};

/// Bijective bit permutation over a word of at most 128 bits.
///
/// Applying the permutation moves input bit `perm[i]` to output bit `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitPermutation {
    perm: Vec<usize>,
}

impl BitPermutation {
    /// Create a permutation after checking that it is a bijection on
    /// `0..width`.
    pub fn new(perm: Vec<usize>, width: usize) -> OtpResult<Self> {
        Self::validate(&perm, width)?;
        Ok(Self { perm })
    }

    /// Identity mapping over `width` bits
    pub fn identity(width: usize) -> Self {
        Self {
            perm: (0..width).collect(),
        }
    }

    /// Check that `perm` is a permutation of `0..width`.
    pub fn validate(perm: &[usize], width: usize) -> OtpResult<()> {
        if width > 128 {
            return Err(OtpError::InvalidPermutation(format!(
                "word width {width} exceeds 128 bits"
            )));
        }
        if perm.len() != width {
            return Err(OtpError::InvalidPermutation(format!(
                "length {} does not match the word width {width}",
                perm.len()
            )));
        }
        let mut seen = vec![false; width];
        for &k in perm {
            if k >= width {
                return Err(OtpError::InvalidPermutation(format!(
                    "index {k} is out of bounds for width {width}"
                )));
            }
            if seen[k] {
                return Err(OtpError::InvalidPermutation(format!(
                    "index {k} appears more than once"
                )));
            }
            seen[k] = true;
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.perm.len()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.perm
    }

    pub fn is_identity(&self) -> bool {
        self.perm.iter().enumerate().all(|(i, &k)| i == k)
    }

    /// Permute the bits of `value`.
    pub fn apply(&self, value: u128) -> u128 {
        self.perm
            .iter()
            .enumerate()
            .fold(0u128, |acc, (i, &k)| acc | (((value >> k) & 1) << i))
    }

    /// Exact inverse of [`BitPermutation::apply`].
    pub fn invert(&self, value: u128) -> u128 {
        self.perm
            .iter()
            .enumerate()
            .fold(0u128, |acc, (i, &k)| acc | (((value >> i) & 1) << k))
    }
}
