// Licensed under the Apache-2.0 license

use crate::BlockCipher64;

/// Number of round keys (31 rounds plus the final whitening key)
const ROUNDS: usize = 32;

/// Scramble a 64-bit OTP block with PRESENT-128.
pub fn otp_scramble(data: u64, key: u128) -> u64 {
    Present::new(key).encrypt_block(data)
}

/// Undo [`otp_scramble`].
pub fn otp_unscramble(data: u64, key: u128) -> u64 {
    Present::new(key).decrypt_block(data)
}

/// PRESENT block cipher with a 128-bit key.
///
/// The key is taken as an integer: bit 127 of `key` is the most significant
/// key bit of the cipher's key register.
#[derive(Clone)]
pub struct Present {
    round_keys: [u64; ROUNDS],
}

impl Present {
    /// Expand `key` into the round key schedule.
    pub fn new(key: u128) -> Self {
        Self {
            round_keys: generate_round_keys(key),
        }
    }
}

impl BlockCipher64 for Present {
    fn encrypt_block(&self, block: u64) -> u64 {
        let mut state = block ^ self.round_keys[0];
        for round_key in &self.round_keys[1..] {
            state = p_layer(s_layer(state, &S_BOX), &P_BOX);
            state ^= round_key;
        }
        state
    }

    fn decrypt_block(&self, block: u64) -> u64 {
        let mut state = block;
        for round_key in self.round_keys[1..].iter().rev() {
            state ^= round_key;
            state = s_layer(p_layer(state, &P_BOX_INV), &S_BOX_INV);
        }
        state ^ self.round_keys[0]
    }
}

const S_BOX: [u8; 16] = [
    0x0c, 0x05, 0x06, 0x0b, 0x09, 0x00, 0x0a, 0x0d, 0x03, 0x0e, 0x0f, 0x08, 0x04, 0x07, 0x01, 0x02,
];

const S_BOX_INV: [u8; 16] = [
    0x05, 0x0e, 0x0f, 0x08, 0x0c, 0x01, 0x02, 0x0d, 0x0b, 0x04, 0x06, 0x03, 0x00, 0x07, 0x09, 0x0a,
];

/// Bit `i` of the input moves to bit `P_BOX[i]` of the output.
const P_BOX: [u8; 64] = build_p_box();

const P_BOX_INV: [u8; 64] = invert_p_box(&P_BOX);

const fn build_p_box() -> [u8; 64] {
    let mut table = [0u8; 64];
    let mut i = 0;
    while i < 63 {
        table[i] = ((i * 16) % 63) as u8;
        i += 1;
    }
    table[63] = 63;
    table
}

const fn invert_p_box(p_box: &[u8; 64]) -> [u8; 64] {
    let mut table = [0u8; 64];
    let mut i = 0;
    while i < 64 {
        table[p_box[i] as usize] = i as u8;
        i += 1;
    }
    table
}

fn generate_round_keys(key: u128) -> [u64; ROUNDS] {
    let mut round_keys = [0u64; ROUNDS];
    let mut key = key;
    for (i, round_key) in round_keys.iter_mut().enumerate() {
        *round_key = (key >> 64) as u64;

        key = key.rotate_left(61);

        // The two top nibbles go through the S-box.
        key = ((S_BOX[((key >> 124) & 0xf) as usize] as u128) << 124)
            | ((S_BOX[((key >> 120) & 0xf) as usize] as u128) << 120)
            | (key & (!0u128 >> 8));

        // Round counter salt into bits 66..62.
        key ^= ((i + 1) as u128) << 62;
    }
    round_keys
}

fn s_layer(state: u64, s_box: &[u8; 16]) -> u64 {
    let mut output = 0u64;
    for shift in (0..64).step_by(4) {
        output |= (s_box[((state >> shift) & 0xf) as usize] as u64) << shift;
    }
    output
}

fn p_layer(state: u64, p_box: &[u8; 64]) -> u64 {
    p_box
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &dst)| acc | (((state >> i) & 1) << dst))
}
