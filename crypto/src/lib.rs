/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Bit-level primitives shared by the OTP memory map, life cycle encoder
    and memory image generators.

--*/

mod digest;
mod perm;
mod present;
mod prince;
mod secded;
mod xex;

pub use digest::{derive_key, otp_digest, otp_digest_bytes, otp_digest_iter, DIGEST_SIZE};
pub use perm::BitPermutation;
pub use present::{otp_scramble, otp_unscramble, Present};
pub use prince::Prince;
pub use secded::{hamming_distance, LinearCode, MAX_CODEWORD_WIDTH};
pub use xex::{gf_mult64, FlashScrambler, FLASH_ADDR_SIZE, FLASH_PRINCE_HALF_ROUNDS};

/// 64-bit block cipher
pub trait BlockCipher64 {
    /// Encrypt a 64-bit block
    fn encrypt_block(&self, block: u64) -> u64;

    /// Decrypt a 64-bit block
    fn decrypt_block(&self, block: u64) -> u64;
}
