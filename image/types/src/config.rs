/*++

Licensed under the Apache-2.0 license.

File Name:

   config.rs

Abstract:

    File contains the input configuration records for the memory map, life
    cycle encoding and memory image generators.

--*/

use crate::ConfigValue;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fields of a record that no generator consumed
pub type ExtraFields = BTreeMap<String, ConfigValue>;

/// Life cycle state table: state name to per-word symbols
pub type StateTable = BTreeMap<String, Vec<String>>;

/// OTP memory map definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMapConfig {
    pub seed: Option<ConfigValue>,

    pub otp: Option<OtpGeometryConfig>,

    pub scrambling: Option<ScramblingConfig>,

    pub partitions: Option<Vec<PartitionConfig>>,
}

/// OTP array geometry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OtpGeometryConfig {
    /// Number of words
    pub depth: Option<ConfigValue>,

    /// Word width in bytes
    pub width: Option<ConfigValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScramblingConfig {
    pub key_size: Option<ConfigValue>,

    pub iv_size: Option<ConfigValue>,

    pub cnst_size: Option<ConfigValue>,

    pub keys: Option<Vec<KeyConfig>>,

    pub digests: Option<Vec<DigestConfig>>,
}

/// Scrambling key netlist constant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyConfig {
    pub name: String,

    pub value: Option<ConfigValue>,
}

/// Digest IV and finalization constant netlist constants
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestConfig {
    pub name: String,

    pub iv_value: Option<ConfigValue>,

    pub cnst_value: Option<ConfigValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub name: String,

    pub variant: Option<String>,

    pub secret: Option<ConfigValue>,

    pub sw_digest: Option<ConfigValue>,

    pub hw_digest: Option<ConfigValue>,

    pub write_lock: Option<String>,

    pub read_lock: Option<String>,

    pub key_sel: Option<String>,

    pub absorb: Option<ConfigValue>,

    pub bkout_type: Option<ConfigValue>,

    pub integrity: Option<ConfigValue>,

    pub size: Option<ConfigValue>,

    pub desc: Option<String>,

    pub items: Option<Vec<ItemConfig>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemConfig {
    pub name: String,

    pub size: Option<ConfigValue>,

    pub isdigest: Option<ConfigValue>,

    pub ismubi: Option<ConfigValue>,

    pub iskeymgr_creator: Option<ConfigValue>,

    pub iskeymgr_owner: Option<ConfigValue>,

    pub inv_default: Option<ConfigValue>,

    pub desc: Option<String>,
}

/// Life cycle state encoding definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifeCycleConfig {
    pub seed: Option<ConfigValue>,

    pub secded: Option<SecdedConfig>,

    pub min_hw: Option<ConfigValue>,

    pub max_hw: Option<ConfigValue>,

    pub min_hd: Option<ConfigValue>,

    pub token_size: Option<ConfigValue>,

    pub tokens: Option<Vec<TokenConfig>>,

    pub lc_state: Option<StateTable>,

    pub lc_cnt: Option<StateTable>,

    pub soc_dbg_state: Option<StateTable>,

    pub ownership_state: Option<StateTable>,

    pub auth_state: Option<StateTable>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecdedConfig {
    pub data_width: Option<ConfigValue>,

    pub ecc_width: Option<ConfigValue>,

    pub ecc_matrix: Option<Vec<Vec<ConfigValue>>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenConfig {
    pub name: String,

    pub value: Option<ConfigValue>,
}

/// Codes protecting a flash word: the integrity code over the 64 data bits
/// and the reliability code over data and integrity bits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlashEccConfig {
    pub integrity: Option<SecdedConfig>,

    pub reliability: Option<SecdedConfig>,
}

/// Memory image values. Used for the base image and for every override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageConfig {
    pub seed: Option<ConfigValue>,

    pub partitions: Option<Vec<ImagePartitionConfig>>,

    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImagePartitionConfig {
    pub name: String,

    pub lock: Option<ConfigValue>,

    /// Life cycle state name, life cycle partition only
    pub state: Option<ConfigValue>,

    /// Life cycle transition count, life cycle partition only
    pub count: Option<ConfigValue>,

    #[serde(default)]
    pub items: Vec<ImageItemConfig>,

    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageItemConfig {
    pub name: String,

    pub value: Option<ConfigValue>,

    #[serde(flatten)]
    pub extra: ExtraFields,
}
