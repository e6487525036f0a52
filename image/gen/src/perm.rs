// Licensed under the Apache-2.0 license

use otpgen_error::{OtpError, OtpResult};

/// Expand a memfile bit permutation option such as `"[7:0],[15:8]"`.
///
/// Each `[hi:lo]` slice names bit positions of the unpermuted word. Slices
/// are listed from the most significant output bits down, like a Verilog
/// concatenation, so every slice lands below the ones before it. A
/// descending slice (`[0:7]`) reverses the bit order within it. An empty
/// option yields an empty list, which callers treat as the identity.
pub fn parse_data_perm(option: &str) -> OtpResult<Vec<usize>> {
    if option.is_empty() {
        return Ok(Vec::new());
    }

    let invalid = || OtpError::InvalidPermutation(format!("malformed bit slice list '{option}'"));
    let mut perm = Vec::new();
    for slice in option.split(',') {
        let inner = slice
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(invalid)?;
        let (hi, lo) = inner.split_once(':').ok_or_else(invalid)?;
        let hi = parse_index(hi).ok_or_else(invalid)?;
        let lo = parse_index(lo).ok_or_else(invalid)?;

        let bits: Vec<usize> = if hi > lo {
            (lo..=hi).collect()
        } else {
            (hi..=lo).rev().collect()
        };
        perm.splice(0..0, bits);
    }
    Ok(perm)
}

fn parse_index(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
