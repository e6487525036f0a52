// Licensed under the Apache-2.0 license

use crate::{BlockCipher64, Prince};
use otpgen_error::OtpResult;

/// Width of a flash word address in bits
pub const FLASH_ADDR_SIZE: u32 = 16;

/// PRINCE half rounds used by the flash controller
pub const FLASH_PRINCE_HALF_ROUNDS: usize = 5;

/// Reduction term of x^64 + x^4 + x^3 + x + 1
const GF64_REDUCTION: u64 = 0x1b;

/// Multiply two elements of GF(2^64) modulo x^64 + x^4 + x^3 + x + 1.
pub fn gf_mult64(a: u64, b: u64) -> u64 {
    let mut a = a;
    let mut product = 0u64;
    for i in 0..64 {
        if (b >> i) & 1 == 1 {
            product ^= a;
        }
        let carry = a >> 63;
        a <<= 1;
        if carry == 1 {
            a ^= GF64_REDUCTION;
        }
    }
    product
}

/// XEX-mode flash scrambler: a PRINCE encryption wrapped between two XORs
/// with an address dependent tweak.
pub struct FlashScrambler {
    addr_key: u128,
    cipher: Prince,
}

impl FlashScrambler {
    pub fn new(addr_key: u128, data_key: u128) -> OtpResult<Self> {
        Ok(Self {
            addr_key,
            cipher: Prince::new(data_key, FLASH_PRINCE_HALF_ROUNDS)?,
        })
    }

    /// Tweak for the flash word at `word_addr`.
    pub fn tweak(&self, word_addr: u64) -> u64 {
        // The upper 48 bits of the high key half sit above the word address.
        let mask = 0xffff_ffff_ffffu128 << 64;
        let operand_a = ((self.addr_key & mask) >> (64 - FLASH_ADDR_SIZE)) as u64 | word_addr;
        let operand_b = self.addr_key as u64;
        gf_mult64(operand_a, operand_b)
    }

    pub fn scramble(&self, data: u64, word_addr: u64) -> u64 {
        let tweak = self.tweak(word_addr);
        self.cipher.encrypt_block(data ^ tweak) ^ tweak
    }

    pub fn descramble(&self, data: u64, word_addr: u64) -> u64 {
        let tweak = self.tweak(word_addr);
        self.cipher.decrypt_block(data ^ tweak) ^ tweak
    }
}
