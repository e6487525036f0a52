// Licensed under the Apache-2.0 license

use crate::{BlockCipher64, Present};
use otpgen_error::{OtpError, OtpResult};

/// Size of a partition digest in bytes
pub const DIGEST_SIZE: usize = 8;

/// Compute an OTP digest over 64-bit data blocks.
///
/// # Arguments
///
/// * `blocks` - Partition data blocks, in address order
/// * `iv` - Digest initialization vector
/// * `cnst` - Digest finalization constant
pub fn otp_digest(blocks: &[u64], iv: u64, cnst: u128) -> u64 {
    otp_digest_iter(blocks.iter().copied(), iv, cnst)
}

/// Compute an OTP digest over little-endian bytes. The length must be a
/// multiple of [`DIGEST_SIZE`].
pub fn otp_digest_bytes(data: &[u8], iv: u64, cnst: u128) -> OtpResult<u64> {
    if data.len() % DIGEST_SIZE != 0 {
        return Err(OtpError::Misaligned {
            what: "digest input".into(),
            value: data.len(),
            alignment: DIGEST_SIZE,
        });
    }
    let blocks = data.chunks_exact(DIGEST_SIZE).map(|chunk| {
        let mut bytes = [0u8; DIGEST_SIZE];
        bytes.copy_from_slice(chunk);
        u64::from_le_bytes(bytes)
    });
    Ok(otp_digest_iter(blocks, iv, cnst))
}

/// Compute an OTP digest over an iterator of 64-bit data blocks.
pub fn otp_digest_iter(blocks: impl Iterator<Item = u64>, iv: u64, cnst: u128) -> u64 {
    let mut state = iv;
    let mut prev: Option<u64> = None;

    // Merkle-Damgard construction with Davies-Meyer compression (PRESENT cipher).
    for block in blocks {
        match prev.take() {
            None => prev = Some(block),
            Some(b0) => {
                let b128 = b0 as u128 | ((block as u128) << 64);
                state ^= Present::new(b128).encrypt_block(state);
            }
        }
    }

    // Odd number of blocks: the last one is paired with itself.
    if let Some(last) = prev {
        let b128 = last as u128 | ((last as u128) << 64);
        state ^= Present::new(b128).encrypt_block(state);
    }

    // Finalization round.
    state ^= Present::new(cnst).encrypt_block(state);

    state
}

/// Derive a 128-bit key from a 256-bit seed.
///
/// Each 128-bit seed half is absorbed with one Davies-Meyer round starting
/// from `iv` and finalized with `cnst`. The half derived from `seed[0]`
/// forms the low 64 bits of the key.
pub fn derive_key(seed: [u128; 2], iv: u64, cnst: u128) -> u128 {
    let finalize = Present::new(cnst);
    seed.iter().enumerate().fold(0u128, |key, (i, half)| {
        let h = Present::new(*half).encrypt_block(iv) ^ iv;
        let h = finalize.encrypt_block(h) ^ h;
        key | ((h as u128) << (64 * i))
    })
}
