// Licensed under the Apache-2.0 license

use sha3::{digest::ExtendableOutput, digest::Update, CShake128, CShake128Core};

/// cSHAKE128 customization string of the life cycle controller
pub const TOKEN_HASH_CUSTOMIZATION: &[u8] = b"LC_CTRL";

/// A life cycle token value, little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub name: String,
    pub value: Vec<u8>,
}

/// Hash an unhashed token value for the life cycle controller.
///
/// The output has the same length as the input.
pub fn hash_token(raw_token: &[u8]) -> Vec<u8> {
    let mut hasher: CShake128 = CShake128::from_core(CShake128Core::new(TOKEN_HASH_CUSTOMIZATION));
    hasher.update(raw_token);
    let mut output = vec![0u8; raw_token.len()];
    hasher.finalize_xof_into(&mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token() {
        let raw_token = 0x05edb8c608fcc830de181732cfd65e57u128.to_le_bytes();
        let expected = 0x9c5f6f5060437af930d06d56630a536bu128.to_le_bytes();
        assert_eq!(hash_token(&raw_token), expected.to_vec());
    }

    #[test]
    fn test_hash_length_follows_token_size() {
        assert_eq!(hash_token(&[0u8; 8]).len(), 8);
        assert_ne!(hash_token(&[0u8; 16])[..8], hash_token(&[1u8; 16])[..8]);
    }
}
