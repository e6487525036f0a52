// Licensed under the Apache-2.0 license

use otpgen_error::{OtpError, OtpResult};

/// Multi-bit booleans are 4 to 32 bits wide, in whole nibbles.
pub fn is_mubi_width_valid(width: usize) -> bool {
    width % 4 == 0 && (4..=32).contains(&width)
}

/// Encode a multi-bit boolean of `width` bits.
///
/// True alternates the nibbles 0x6 and 0x9 starting from the least
/// significant nibble. False is the bitwise inverse of true.
pub fn mubi_value(value: bool, width: usize) -> OtpResult<u32> {
    if !is_mubi_width_valid(width) {
        return Err(OtpError::invalid("mubi", "width", width));
    }
    let truth = (0..width / 4).fold(0u32, |acc, nibble| {
        let pattern = if nibble % 2 == 0 { 0x6 } else { 0x9 };
        acc | (pattern << (4 * nibble))
    });
    let mask = if width == 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    };
    Ok(if value { truth } else { !truth & mask })
}

/// [`mubi_value`] as `width / 8` little-endian bytes (rounded up).
pub fn mubi_bytes(value: bool, width: usize) -> OtpResult<Vec<u8>> {
    let encoded = mubi_value(value, width)?;
    Ok(encoded.to_le_bytes()[..width.div_ceil(8)].to_vec())
}
