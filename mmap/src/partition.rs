/*++

Licensed under the Apache-2.0 license.

File Name:

   partition.rs

Abstract:

    File contains the validated partition and item records of the OTP
    memory map.

--*/

use otpgen_error::{OtpError, OtpResult};
use otpgen_types::HexValue;
use std::fmt;

/// Suffix of the digest item appended to partitions with a digest
pub const DIGEST_SUFFIX: &str = "_DIGEST";

/// Key selection of partitions that are not scrambled
pub const NO_KEY: &str = "NoKey";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Unbuffered,
    Buffered,
    LifeCycle,
}

impl Variant {
    pub fn parse(value: &str, context: &str) -> OtpResult<Self> {
        match value {
            "Unbuffered" => Ok(Variant::Unbuffered),
            "Buffered" => Ok(Variant::Buffered),
            "LifeCycle" => Ok(Variant::LifeCycle),
            _ => Err(OtpError::invalid(context, "variant", value)),
        }
    }

    /// Buffered and life cycle partitions are read into registers.
    pub fn is_buffered(self) -> bool {
        matches!(self, Variant::Buffered | Variant::LifeCycle)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::Unbuffered => "Unbuffered",
            Variant::Buffered => "Buffered",
            Variant::LifeCycle => "LifeCycle",
        };
        f.write_str(name)
    }
}

/// Read or write lock mechanism of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    None,
    Csr,
    Digest,
}

impl LockMode {
    /// Lock modes are matched case-insensitively.
    pub fn parse(value: &str, context: &str, field: &str) -> OtpResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Ok(LockMode::None),
            "csr" => Ok(LockMode::Csr),
            "digest" => Ok(LockMode::Digest),
            _ => Err(OtpError::invalid(context, field, value)),
        }
    }

    pub fn is_lockable(self) -> bool {
        self != LockMode::None
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockMode::None => "none",
            LockMode::Csr => "csr",
            LockMode::Digest => "digest",
        };
        f.write_str(name)
    }
}

/// A named field of a partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,

    /// Size in bytes
    pub size: usize,

    /// Byte offset from the start of the OTP array
    pub offset: usize,

    pub is_mubi: bool,

    pub is_digest: bool,

    pub is_keymgr_creator: bool,

    pub is_keymgr_owner: bool,

    /// Value hardware uses while the partition is invalid
    pub inv_default: HexValue,

    pub desc: Option<String>,
}

/// A laid out OTP partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub name: String,
    pub variant: Variant,
    pub secret: bool,
    pub sw_digest: bool,
    pub hw_digest: bool,
    pub write_lock: LockMode,
    pub read_lock: LockMode,
    pub key_sel: String,
    pub absorb: bool,
    pub bkout_type: bool,
    pub integrity: bool,
    pub is_keymgr_creator: bool,
    pub is_keymgr_owner: bool,

    /// Size in bytes, including the digest
    pub size: usize,

    /// Byte offset from the start of the OTP array
    pub offset: usize,

    pub desc: Option<String>,

    /// Items in layout order. The digest item, if any, is last.
    pub items: Vec<Item>,
}

impl Partition {
    pub fn has_digest(&self) -> bool {
        self.sw_digest || self.hw_digest
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.name == name)
    }

    pub fn digest_item(&self) -> Option<&Item> {
        self.items.iter().find(|i| i.is_digest)
    }

    pub fn digest_name(&self) -> String {
        format!("{}{DIGEST_SUFFIX}", self.name)
    }

    /// Offset of `item` relative to the start of this partition
    pub fn relative_offset(&self, item: &Item) -> usize {
        item.offset - self.offset
    }
}
