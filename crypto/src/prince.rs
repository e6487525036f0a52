// Licensed under the Apache-2.0 license

use crate::BlockCipher64;
use otpgen_error::{OtpError, OtpResult};

/// Number of half rounds of the full cipher
pub const MAX_HALF_ROUNDS: usize = 5;

const ALPHA: u64 = 0xc0ac29b7c97c50dd;

const RC: [u64; 12] = [
    0x0000000000000000,
    0x13198a2e03707344,
    0xa4093822299f31d0,
    0x082efa98ec4e6c89,
    0x452821e638d01377,
    0xbe5466cf34e90c6c,
    0x7ef84f78fd955cb1,
    0x85840851f1ac43aa,
    0xc882d32f25323c54,
    0x64a51195e0e3610d,
    0xd3b5a399ca0c2399,
    ALPHA,
];

const S_BOX: [u8; 16] = [
    0xb, 0xf, 0x3, 0x2, 0xa, 0xc, 0x9, 0x1, 0x6, 0x7, 0x8, 0x0, 0xe, 0x5, 0xd, 0x4,
];

const S_BOX_INV: [u8; 16] = [
    0xb, 0x7, 0x3, 0x2, 0xf, 0xd, 0x8, 0x9, 0xa, 0x6, 0x4, 0x0, 0x5, 0xe, 0xc, 0x1,
];

/// Output nibble `i` is input nibble `SHIFT_ROWS[i]`.
const SHIFT_ROWS: [u8; 16] = [
    0x4, 0x9, 0xe, 0x3, 0x8, 0xd, 0x2, 0x7, 0xc, 0x1, 0x6, 0xb, 0x0, 0x5, 0xa, 0xf,
];

const SHIFT_ROWS_INV: [u8; 16] = [
    0xc, 0x9, 0x6, 0x3, 0x0, 0xd, 0xa, 0x7, 0x4, 0x1, 0xe, 0xb, 0x8, 0x5, 0x2, 0xf,
];

const M_PRIME_CONSTS: [u16; 4] = [0x7bde, 0xbde7, 0xde7b, 0xe7bd];

/// PRINCE block cipher with a reduced, configurable number of half rounds.
///
/// The 128-bit key is split as `k0 = key[127:64]` (whitening) and
/// `k1 = key[63:0]` (core key).
#[derive(Clone)]
pub struct Prince {
    k0: u64,
    k0_prime: u64,
    k1: u64,
    half_rounds: usize,
}

impl Prince {
    pub fn new(key: u128, half_rounds: usize) -> OtpResult<Self> {
        if half_rounds == 0 || half_rounds > MAX_HALF_ROUNDS {
            return Err(OtpError::invalid("prince", "half_rounds", half_rounds));
        }
        let k0 = (key >> 64) as u64;
        Ok(Self {
            k0,
            k0_prime: k0.rotate_right(1) ^ (k0 >> 63),
            k1: key as u64,
            half_rounds,
        })
    }

    fn core(&self, block: u64, k_in: u64, k_out: u64, k1: u64) -> u64 {
        let h = self.half_rounds;
        let mut state = block ^ k_in ^ k1 ^ RC[0];
        for rc in &RC[1..=h] {
            state = shift_rows(m_prime(s_layer(state, &S_BOX)), &SHIFT_ROWS) ^ rc ^ k1;
        }
        state = s_layer(m_prime(s_layer(state, &S_BOX)), &S_BOX_INV);
        for rc in &RC[11 - h..11] {
            state ^= k1 ^ rc;
            state = s_layer(m_prime(shift_rows(state, &SHIFT_ROWS_INV)), &S_BOX_INV);
        }
        state ^ RC[11] ^ k1 ^ k_out
    }
}

impl BlockCipher64 for Prince {
    fn encrypt_block(&self, block: u64) -> u64 {
        self.core(block, self.k0, self.k0_prime, self.k1)
    }

    /// Uses the alpha reflection property: decryption is the same core with
    /// swapped whitening keys and `k1 ^ alpha`.
    fn decrypt_block(&self, block: u64) -> u64 {
        self.core(block, self.k0_prime, self.k0, self.k1 ^ ALPHA)
    }
}

fn s_layer(state: u64, s_box: &[u8; 16]) -> u64 {
    (0..64).step_by(4).fold(0u64, |acc, shift| {
        acc | ((s_box[((state >> shift) & 0xf) as usize] as u64) << shift)
    })
}

fn shift_rows(state: u64, table: &[u8; 16]) -> u64 {
    table.iter().enumerate().fold(0u64, |acc, (i, &src)| {
        acc | (((state >> (4 * src as u32)) & 0xf) << (4 * i))
    })
}

fn nibble_xor(value: u16) -> u64 {
    ((value ^ (value >> 4) ^ (value >> 8) ^ (value >> 12)) & 0xf) as u64
}

/// The involutive M' layer, applied to each 16-bit column block.
fn m_prime(state: u64) -> u64 {
    let mut out = 0u64;
    for blk in 0..4usize {
        let chunk = (state >> (16 * blk)) as u16;
        let start = if blk == 0 || blk == 3 { 0 } else { 1 };
        for nibble in 0..4 {
            let sr_idx = (start + 3 - nibble) % 4;
            out |= nibble_xor(chunk & M_PRIME_CONSTS[sr_idx]) << (16 * blk + 4 * nibble);
        }
    }
    out
}
