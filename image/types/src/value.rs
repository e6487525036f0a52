/*++

Licensed under the Apache-2.0 license.

File Name:

   value.rs

Abstract:

    File contains loosely typed configuration values and the coercions the
    generators apply to them.

--*/

use crate::SeededRng;
use otpgen_error::{OtpError, OtpResult};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Marker for values that are drawn from the seeded random source
pub const RANDOM: &str = "<random>";

/// A configuration value as it appears in a JSON or TOML record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(u64),
    Str(String),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Whether this is the `<random>` marker.
    pub fn is_random(&self) -> bool {
        matches!(self, ConfigValue::Str(s) if s == RANDOM)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Int(i) => write!(f, "{i}"),
            ConfigValue::Str(s) => write!(f, "{s}"),
            ConfigValue::List(list) => {
                write!(f, "[")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            ConfigValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<u64> for ConfigValue {
    fn from(value: u64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.into())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

/// Coerce a boolean or a `"true"`/`"false"` string (any case) to `bool`.
pub fn check_bool(value: &ConfigValue, context: &str, field: &str) -> OtpResult<bool> {
    match value {
        ConfigValue::Bool(b) => Ok(*b),
        ConfigValue::Str(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        ConfigValue::Str(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(OtpError::invalid(context, field, value)),
    }
}

/// Coerce an integer or a decimal string to `u64`.
pub fn check_int(value: &ConfigValue, context: &str, field: &str) -> OtpResult<u64> {
    match value {
        ConfigValue::Int(i) => Ok(*i),
        ConfigValue::Str(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s
            .parse()
            .map_err(|_| OtpError::invalid(context, field, value)),
        _ => Err(OtpError::invalid(context, field, value)),
    }
}

/// Parse a hex literal into `num_bits.div_ceil(8)` little-endian bytes.
///
/// Accepted forms are a hex string (optional `0x` prefix, `_` separators,
/// stray whitespace), a list of 32-bit hex words with the least significant
/// word first, or a plain integer.
pub fn parse_hex(value: &ConfigValue, num_bits: usize, what: &str) -> OtpResult<Vec<u8>> {
    let bytes = match value {
        ConfigValue::Int(i) => i.to_le_bytes().to_vec(),
        ConfigValue::Str(s) => hex_str_to_le(s, what)?,
        ConfigValue::List(words) => {
            let mut bytes = Vec::with_capacity(words.len() * 4);
            for word in words {
                let word = match word {
                    ConfigValue::Str(s) => hex_str_to_le(s, what)?,
                    ConfigValue::Int(i) => i.to_le_bytes().to_vec(),
                    _ => return Err(OtpError::invalid(what, "value", value)),
                };
                bytes.extend(fit_le(word, 32, what)?);
            }
            bytes
        }
        _ => return Err(OtpError::invalid(what, "value", value)),
    };
    fit_le(bytes, num_bits, what)
}

fn hex_str_to_le(s: &str, what: &str) -> OtpResult<Vec<u8>> {
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, ' ' | '\r' | '\n' | '\t'))
        .collect();
    let digits = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
        .unwrap_or(&cleaned);
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') {
        return Err(OtpError::invalid(what, "value", s));
    }
    let mut digits: String = digits.chars().filter(|&c| c != '_').collect();
    if digits.len() % 2 == 1 {
        digits.insert(0, '0');
    }
    let mut bytes = hex::decode(&digits).map_err(|_| OtpError::invalid(what, "value", s))?;
    bytes.reverse();
    Ok(bytes)
}

/// Resize little-endian `bytes` to `num_bits`, failing if set bits are lost.
fn fit_le(mut bytes: Vec<u8>, num_bits: usize, what: &str) -> OtpResult<Vec<u8>> {
    let len = num_bits.div_ceil(8);
    let overflow = || OtpError::ValueOverflow {
        what: what.into(),
        bits: num_bits,
    };
    if bytes.iter().skip(len).any(|&b| b != 0) {
        return Err(overflow());
    }
    bytes.resize(len, 0);
    if num_bits % 8 != 0 {
        if let Some(top) = bytes.last() {
            if top >> (num_bits % 8) != 0 {
                return Err(overflow());
            }
        }
    }
    Ok(bytes)
}

/// Interpret up to 16 little-endian bytes as an integer.
pub fn bytes_to_u128(bytes: &[u8]) -> u128 {
    bytes
        .iter()
        .take(16)
        .enumerate()
        .fold(0u128, |acc, (i, &b)| acc | ((b as u128) << (8 * i)))
}

/// Format little-endian bytes as a big-endian `0x` hex literal.
pub fn format_hex(bytes: &[u8]) -> String {
    let be: Vec<u8> = bytes.iter().rev().copied().collect();
    format!("0x{}", hex::encode(be))
}

/// A value that is either fixed or still to be drawn from the seeded random
/// source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HexValue {
    Random,
    Fixed(Vec<u8>),
}

impl HexValue {
    /// Parse `value`, keeping `<random>` deferred.
    pub fn parse(value: &ConfigValue, num_bits: usize, what: &str) -> OtpResult<Self> {
        if value.is_random() {
            Ok(HexValue::Random)
        } else {
            parse_hex(value, num_bits, what).map(HexValue::Fixed)
        }
    }

    /// Draw a value if this is still `Random`. Returns true if a value was drawn.
    pub fn resolve(&mut self, rng: &mut SeededRng, num_bits: usize) -> bool {
        match self {
            HexValue::Random => {
                *self = HexValue::Fixed(rng.random_bits(num_bits));
                true
            }
            HexValue::Fixed(_) => false,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            HexValue::Random => None,
            HexValue::Fixed(bytes) => Some(bytes),
        }
    }

    /// Low 128 bits of the resolved value
    pub fn as_u128(&self) -> Option<u128> {
        self.bytes().map(bytes_to_u128)
    }
}

impl fmt::Display for HexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HexValue::Random => write!(f, "{RANDOM}"),
            HexValue::Fixed(bytes) => write!(f, "{}", format_hex(bytes)),
        }
    }
}
