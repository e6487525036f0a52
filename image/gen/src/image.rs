/*++

Licensed under the Apache-2.0 license.

File Name:

   image.rs

Abstract:

    File contains the OTP memory image: merging of image configurations
    onto the memory map, random value resolution, partition scrambling and
    digesting, and memory file generation.

--*/

use crate::memfile::{render_memfile, UNALLOCATED};
use log::{debug, info, warn};
use otpgen_crypto::{otp_digest, otp_scramble, BitPermutation, DIGEST_SIZE};
use otpgen_error::{OtpError, OtpResult};
use otpgen_lc::{LifeCycleEncoder, StateType};
use otpgen_mmap::{MemoryMap, Partition, Variant};
use otpgen_types::{
    check_bool, check_int, format_hex, mubi_bytes, ConfigValue, ExtraFields, HexValue,
    ImageConfig, ImageItemConfig, ImagePartitionConfig, SeededRng, SCRAMBLE_BLOCK_WIDTH,
};

/// Seed diversification constant of the memory image
pub const OTP_IMG_SEED_DIVERSIFIER: u128 = 1941661965323525198146;

/// Digest constants used for the hardware consistency digest
pub const CNSTY_DIGEST: &str = "CnstyDigest";

/// Life cycle state item of the life cycle partition
pub const LC_STATE_ITEM: &str = "LC_STATE";

/// Life cycle transition count item of the life cycle partition
pub const LC_TRANSITION_CNT_ITEM: &str = "LC_TRANSITION_CNT";

const RAW_STATE: &str = "RAW";

/// OTP memory image composed from a memory map, a life cycle encoding and
/// one or more image configurations.
pub struct MemoryImage {
    map: MemoryMap,
    lc: LifeCycleEncoder,
    seed: u64,
    data_perm: BitPermutation,

    /// Lock state per partition, indexed like `map.partitions()`
    locks: Vec<bool>,

    /// Item values per partition and item, indexed like the map
    values: Vec<Vec<Option<HexValue>>>,
}

impl MemoryImage {
    /// Create an image and merge the base image configuration.
    ///
    /// # Arguments
    ///
    /// * `map` - Validated memory map
    /// * `lc` - Life cycle encoding; its data width must match the OTP word
    /// * `config` - Base image configuration; must carry a seed
    /// * `data_perm` - Memory file bit permutation, empty for none
    pub fn new(
        map: MemoryMap,
        lc: LifeCycleEncoder,
        config: &ImageConfig,
        data_perm: &[usize],
    ) -> OtpResult<Self> {
        let otp_bits = map.otp().width * 8;
        if otp_bits != lc.code().data_width() {
            return Err(OtpError::InvalidConfig(format!(
                "OTP word width of {otp_bits} bits does not match the life cycle \
                 SECDED data width of {} bits",
                lc.code().data_width()
            )));
        }

        let seed = config
            .seed
            .as_ref()
            .ok_or_else(|| OtpError::missing("image config", "seed"))?;
        let seed = check_int(seed, "image config", "seed")?;

        let total_bits = lc.code().padded_width();
        let data_perm = if data_perm.is_empty() {
            BitPermutation::identity(total_bits)
        } else {
            BitPermutation::new(data_perm.to_vec(), total_bits)?
        };

        let locks = vec![false; map.partitions().len()];
        let values = map
            .partitions()
            .iter()
            .map(|p| vec![None; p.items.len()])
            .collect();

        let mut image = Self {
            map,
            lc,
            seed,
            data_perm,
            locks,
            values,
        };
        info!("Merging base image configuration");
        image.merge(config)?;
        Ok(image)
    }

    /// Merge an additional image configuration. Values it sets replace the
    /// ones merged before. Its seed, if any, is ignored.
    pub fn apply_override(&mut self, config: &ImageConfig) -> OtpResult<()> {
        if config.seed.is_some() {
            warn!("Ignoring seed of an override image configuration");
        }
        info!("Merging override image configuration");
        self.merge(config)
    }

    fn merge(&mut self, config: &ImageConfig) -> OtpResult<()> {
        check_unused("image config", &config.extra, &[])?;
        let parts = config
            .partitions
            .as_deref()
            .ok_or_else(|| OtpError::missing("image config", "partitions"))?;
        for part in parts {
            self.merge_part(part)?;
        }
        Ok(())
    }

    fn merge_part(&mut self, config: &ImagePartitionConfig) -> OtpResult<()> {
        let idx = self
            .map
            .part_index(&config.name)
            .ok_or_else(|| OtpError::unknown("partition", &config.name))?;
        let context = format!("partition {}", config.name);
        let (variant, hw_digest) = {
            let part = &self.map.partitions()[idx];
            (part.variant, part.hw_digest)
        };
        debug!("Merging partition {}", config.name);

        // Every entry sets the lock state, an omitted lock unlocks.
        let lock = match &config.lock {
            Some(lock) => check_bool(lock, &context, "lock")?,
            None => false,
        };
        if lock && !hw_digest {
            return Err(OtpError::InvalidConfig(format!(
                "partition {} cannot be locked since it has no hardware digest",
                config.name
            )));
        }
        self.locks[idx] = lock;

        let mut unused = Vec::new();
        if variant == Variant::LifeCycle {
            self.merge_lc_part(idx, config)?;
        } else {
            if config.state.is_some() {
                unused.push("state");
            }
            if config.count.is_some() {
                unused.push("count");
            }
            if config.items.is_empty() {
                warn!("Partition {} does not contain any items", config.name);
            }
            for item in &config.items {
                self.merge_item(idx, item)?;
            }
        }
        check_unused(&context, &config.extra, &unused)
    }

    fn merge_lc_part(&mut self, idx: usize, config: &ImagePartitionConfig) -> OtpResult<()> {
        let context = format!("partition {}", config.name);
        if !config.items.is_empty() {
            return Err(OtpError::InvalidConfig(format!(
                "items of the life cycle partition {} cannot be set directly, \
                 use the state and count fields instead",
                config.name
            )));
        }
        if self.locks[idx] {
            return Err(OtpError::InvalidConfig(format!(
                "life cycle partition {} cannot be locked",
                config.name
            )));
        }

        let state = match &config.state {
            Some(ConfigValue::Str(state)) => state.as_str(),
            Some(other) => return Err(OtpError::invalid(&context, "state", other)),
            None => RAW_STATE,
        };
        let count = match &config.count {
            Some(count) => check_int(count, &context, "count")?,
            None => 0,
        };
        if count == 0 && state != RAW_STATE {
            return Err(OtpError::InvalidConfig(format!(
                "life cycle transition count must be nonzero in state {state}"
            )));
        }
        info!("Life cycle state {state}, transition count {count}");

        let state_bytes = self.lc.encode(StateType::LcState, state)?;
        let count_bytes = self.lc.encode(StateType::LcCnt, &count.to_string())?;
        self.set_item(idx, LC_STATE_ITEM, &format_hex(&state_bytes).into())?;
        self.set_item(idx, LC_TRANSITION_CNT_ITEM, &format_hex(&count_bytes).into())
    }

    fn merge_item(&mut self, idx: usize, config: &ImageItemConfig) -> OtpResult<()> {
        let context = format!("item {}.{}", self.map.partitions()[idx].name, config.name);
        check_unused(&context, &config.extra, &[])?;
        let default = ConfigValue::from("0x0");
        self.set_item(idx, &config.name, config.value.as_ref().unwrap_or(&default))
    }

    /// Store `value` as the value of item `name` of partition `idx`.
    fn set_item(&mut self, idx: usize, name: &str, value: &ConfigValue) -> OtpResult<()> {
        let part = &self.map.partitions()[idx];
        let j = part
            .items
            .iter()
            .position(|i| i.name == name)
            .ok_or_else(|| OtpError::unknown("item", format!("{}.{name}", part.name)))?;
        let item = &part.items[j];
        let what = format!("{}.{name}", part.name);

        let value = if item.is_mubi {
            let flag = check_bool(value, &what, "value")?;
            HexValue::Fixed(mubi_bytes(flag, item.size * 8)?)
        } else {
            HexValue::parse(value, item.size * 8, &what)?
        };
        debug!("{what} = {value}");
        self.values[idx][j] = Some(value);
        Ok(())
    }

    /// Resolve every item value still set to `<random>`.
    pub fn gen_random_constants(&mut self) {
        let mut rng = SeededRng::new(self.seed, OTP_IMG_SEED_DIVERSIFIER);
        for (part, values) in self.map.partitions().iter().zip(self.values.iter_mut()) {
            for (item, value) in part.items.iter().zip(values.iter_mut()) {
                if item.is_mubi {
                    continue;
                }
                if let Some(value) = value {
                    if value.resolve(&mut rng, item.size * 8) {
                        debug!("Generated {}.{} = {value}", part.name, item.name);
                    }
                }
            }
        }
    }

    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    pub fn lc(&self) -> &LifeCycleEncoder {
        &self.lc
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Width of a memory file word in bits, ECC and padding included
    pub fn bitness(&self) -> usize {
        self.lc.code().padded_width()
    }

    pub fn data_perm(&self) -> &BitPermutation {
        &self.data_perm
    }

    pub fn is_locked(&self, partition: &str) -> bool {
        self.map
            .part_index(partition)
            .map(|idx| self.locks[idx])
            .unwrap_or(false)
    }

    /// Merged value of `item` in `partition`, if one was set
    pub fn item_value(&self, partition: &str, item: &str) -> Option<&HexValue> {
        let idx = self.map.part_index(partition)?;
        let j = self.map.partitions()[idx]
            .items
            .iter()
            .position(|i| i.name == item)?;
        self.values[idx][j].as_ref()
    }

    /// Resolved bytes of item `j` of partition `idx`, if a value was set.
    pub(crate) fn resolved_value(&self, idx: usize, j: usize) -> OtpResult<Option<&[u8]>> {
        match &self.values[idx][j] {
            None => Ok(None),
            Some(HexValue::Fixed(bytes)) => Ok(Some(bytes)),
            Some(HexValue::Random) => {
                let part = &self.map.partitions()[idx];
                Err(OtpError::Internal(format!(
                    "{}.{} has not been randomized yet",
                    part.name, part.items[j].name
                )))
            }
        }
    }

    /// Scramble and stream out a partition.
    ///
    /// Returns the partition bytes and one annotation per byte.
    pub fn stream_out(&self, partition: &str) -> OtpResult<(Vec<u8>, Vec<String>)> {
        let idx = self
            .map
            .part_index(partition)
            .ok_or_else(|| OtpError::unknown("partition", partition))?;
        self.stream_out_part(idx)
    }

    fn stream_out_part(&self, idx: usize) -> OtpResult<(Vec<u8>, Vec<String>)> {
        let part = &self.map.partitions()[idx];
        debug!("Streaming out partition {}", part.name);
        if part.size % SCRAMBLE_BLOCK_WIDTH != 0 {
            return Err(OtpError::Misaligned {
                what: format!("partition {}", part.name),
                value: part.size,
                alignment: SCRAMBLE_BLOCK_WIDTH,
            });
        }

        let mut annotations = vec![UNALLOCATED.to_string(); part.size];
        let mut defined = vec![false; part.size];
        let mut data = vec![0u8; part.size];
        for (j, item) in part.items.iter().enumerate() {
            let start = part.relative_offset(item);
            let value = self.resolved_value(idx, j)?;
            for k in 0..item.size {
                annotations[start + k] = format!("{}: {}", part.name, item.name);
                if let Some(bytes) = value {
                    if defined[start + k] {
                        return Err(OtpError::ItemCollision {
                            partition: part.name.clone(),
                            offset: start + k,
                        });
                    }
                    data[start + k] = bytes.get(k).copied().unwrap_or(0);
                    defined[start + k] = true;
                }
            }
        }

        let mut blocks: Vec<u64> = data
            .chunks_exact(SCRAMBLE_BLOCK_WIDTH)
            .map(|chunk| {
                let mut bytes = [0u8; SCRAMBLE_BLOCK_WIDTH];
                bytes.copy_from_slice(chunk);
                u64::from_le_bytes(bytes)
            })
            .collect();
        let block_defined: Vec<bool> = defined
            .chunks_exact(SCRAMBLE_BLOCK_WIDTH)
            .map(|chunk| chunk.iter().any(|&d| d))
            .collect();

        if part.secret {
            debug!("Scrambling partition {} with key {}", part.name, part.key_sel);
            let key = self.scrambling_key(part)?;
            for (block, _) in blocks
                .iter_mut()
                .zip(&block_defined)
                .filter(|(_, defined)| **defined)
            {
                *block = otp_scramble(*block, key);
            }
        }

        if part.hw_digest {
            self.digest_part(idx, &mut blocks)?;
        }

        let data: Vec<u8> = blocks.iter().flat_map(|b| b.to_le_bytes()).collect();
        Ok((data, annotations))
    }

    fn scrambling_key(&self, part: &Partition) -> OtpResult<u128> {
        self.map
            .key(&part.key_sel)
            .and_then(|key| key.value.as_u128())
            .ok_or_else(|| OtpError::unknown("scrambling key", &part.key_sel))
    }

    /// The digest of a hardware digest partition sits in its last block. It
    /// is only precomputed for locked partitions.
    fn digest_part(&self, idx: usize, blocks: &mut [u64]) -> OtpResult<()> {
        let part = &self.map.partitions()[idx];
        let Some((last, data)) = blocks.split_last_mut() else {
            return Ok(());
        };
        if *last != 0 {
            return Err(OtpError::DigestOverride(part.name.clone()));
        }
        if !self.locks[idx] {
            debug!("Partition {} is not locked, no digest computed", part.name);
            return Ok(());
        }

        let digest = self
            .map
            .digest(CNSTY_DIGEST)
            .ok_or_else(|| OtpError::unknown("digest", CNSTY_DIGEST))?;
        let (Some(iv), Some(cnst)) = (digest.iv.as_u128(), digest.cnst.as_u128()) else {
            return Err(OtpError::Internal(format!(
                "digest constants {CNSTY_DIGEST} are not resolved"
            )));
        };
        *last = otp_digest(data, iv as u64, cnst);
        debug!(
            "Locked partition {} with digest {:#018x} over {} bytes",
            part.name,
            *last,
            data.len() * DIGEST_SIZE
        );
        Ok(())
    }

    /// Stream out all partitions into one flat OTP byte array.
    pub fn gen_data(&self) -> OtpResult<(Vec<u8>, Vec<String>)> {
        let size = self.map.otp().size();
        let mut data = vec![0u8; size];
        let mut annotations = vec![String::new(); size];
        for (idx, part) in self.map.partitions().iter().enumerate() {
            let end = part.offset + part.size;
            if end > size {
                return Err(OtpError::InsufficientSpace {
                    what: format!("partition {}", part.name),
                    available: size.saturating_sub(part.offset),
                    required: part.size,
                });
            }
            let (part_data, part_annotations) = self.stream_out_part(idx)?;
            data[part.offset..end].copy_from_slice(&part_data);
            annotations[part.offset..end].clone_from_slice(&part_annotations);
        }
        Ok((data, annotations))
    }

    /// Generate the memory file contents.
    pub fn gen_memfile(&self) -> OtpResult<String> {
        info!("Generating memory file");
        let (data, annotations) = self.gen_data()?;
        render_memfile(&data, &annotations, self.lc.code(), &self.data_perm)
    }
}

/// Fail if a record carries fields no merge step consumed.
fn check_unused(context: &str, extra: &ExtraFields, consumed: &[&str]) -> OtpResult<()> {
    let mut fields: Vec<String> = consumed.iter().map(|f| f.to_string()).collect();
    fields.extend(extra.keys().cloned());
    if fields.is_empty() {
        return Ok(());
    }
    fields.sort();
    for field in &fields {
        debug!("Unused key '{field}' in {context}");
    }
    Err(OtpError::UnusedFields {
        context: context.into(),
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use otpgen_types::{LifeCycleConfig, MemoryMapConfig};
    use serde_json::json;

    fn map() -> MemoryMap {
        let config: MemoryMapConfig = serde_json::from_value(json!({
            "seed": "99",
            "otp": {"depth": 48, "width": 2},
            "scrambling": {
                "keys": [{"name": "Secret0Key", "value": "0x0123456789abcdef0123456789abcdef"}],
                "digests": [{"name": "CnstyDigest", "iv_value": "0x1122334455667788",
                             "cnst_value": "0x99aabbccddeeff00_1122334455667788"}]
            },
            "partitions": [
                {"name": "CFG", "variant": "Buffered", "hw_digest": true, "write_lock": "digest",
                 "items": [{"name": "A", "size": 4}, {"name": "EN", "size": 2, "ismubi": true}]},
                {"name": "SECRET", "variant": "Buffered", "secret": true, "hw_digest": true,
                 "key_sel": "Secret0Key", "write_lock": "digest",
                 "items": [{"name": "KEY", "size": 8}]},
                {"name": "LIFE_CYCLE", "variant": "LifeCycle",
                 "items": [{"name": "LC_TRANSITION_CNT", "size": 4},
                           {"name": "LC_STATE", "size": 4}]}
            ]
        }))
        .unwrap();
        MemoryMap::new(&config).unwrap()
    }

    fn lc() -> LifeCycleEncoder {
        let config: LifeCycleConfig = serde_json::from_value(json!({
            "seed": "5",
            "secded": {"data_width": 16, "ecc_width": 6, "ecc_matrix": [
                [0, 1, 3, 4, 6, 8, 10, 11, 13, 15],
                [0, 2, 3, 5, 6, 9, 10, 12, 13],
                [1, 2, 3, 7, 8, 9, 10, 14, 15],
                [4, 5, 6, 7, 8, 9, 10],
                [11, 12, 13, 14, 15],
                [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20]
            ]},
            "min_hw": 0, "max_hw": 22, "min_hd": 3,
            "tokens": [],
            "lc_state": {"RAW": ["0", "0"], "TEST": ["A0", "B1"]},
            "lc_cnt": {"0": ["0", "0"], "1": ["C0", "0"], "2": ["D0", "C1"]},
            "soc_dbg_state": {"RAW": ["0"]},
            "ownership_state": {"RAW": ["0"]},
            "auth_state": {"RAW": ["0"]}
        }))
        .unwrap();
        LifeCycleEncoder::new(&config).unwrap()
    }

    fn image(config: serde_json::Value) -> OtpResult<MemoryImage> {
        let config: ImageConfig = serde_json::from_value(config).unwrap();
        MemoryImage::new(map(), lc(), &config, &[])
    }

    fn overlay(image: &mut MemoryImage, config: serde_json::Value) -> OtpResult<()> {
        let config: ImageConfig = serde_json::from_value(config).unwrap();
        image.apply_override(&config)
    }

    #[test]
    fn test_merge_values() {
        let image = image(json!({
            "seed": 1,
            "partitions": [
                {"name": "CFG", "items": [{"name": "A", "value": "0xdeadbeef"},
                                          {"name": "EN", "value": true}]}
            ]
        }))
        .unwrap();
        assert_eq!(
            image.item_value("CFG", "A"),
            Some(&HexValue::Fixed(vec![0xef, 0xbe, 0xad, 0xde]))
        );
        assert_eq!(
            image.item_value("CFG", "EN"),
            Some(&HexValue::Fixed(vec![0x96, 0x96]))
        );
        assert_eq!(image.item_value("SECRET", "KEY"), None);
        assert_eq!(image.bitness(), 24);
        assert!(!image.is_locked("CFG"));
    }

    #[test]
    fn test_item_defaults() {
        let image = image(json!({
            "seed": 1,
            "partitions": [{"name": "CFG", "items": [{"name": "A"}, {"name": "EN"}]}]
        }))
        .unwrap();
        assert_eq!(image.item_value("CFG", "A"), Some(&HexValue::Fixed(vec![0; 4])));
        assert_eq!(image.item_value("CFG", "EN"), Some(&HexValue::Fixed(vec![0x69, 0x69])));
    }

    #[test]
    fn test_override_wins_and_resets_lock() {
        let mut image = image(json!({
            "seed": 1,
            "partitions": [{"name": "CFG", "lock": true, "items": [{"name": "A", "value": 1}]}]
        }))
        .unwrap();
        assert!(image.is_locked("CFG"));
        overlay(
            &mut image,
            json!({"seed": 7, "partitions": [{"name": "CFG", "items": [{"name": "A", "value": 2}]}]}),
        )
        .unwrap();
        assert!(!image.is_locked("CFG"));
        assert_eq!(image.seed(), 1);
        assert_eq!(image.item_value("CFG", "A"), Some(&HexValue::Fixed(vec![2, 0, 0, 0])));

        overlay(&mut image, json!({"partitions": [{"name": "CFG", "lock": "True"}]})).unwrap();
        assert!(image.is_locked("CFG"));
        overlay(&mut image, json!({"partitions": [{"name": "CFG", "lock": "False"}]})).unwrap();
        assert!(!image.is_locked("CFG"));

        // Partitions the override does not name keep their lock.
        overlay(&mut image, json!({"partitions": [{"name": "CFG", "lock": true}]})).unwrap();
        overlay(&mut image, json!({"partitions": [{"name": "SECRET"}]})).unwrap();
        assert!(image.is_locked("CFG"));
    }

    #[test]
    fn test_unlocking_override_drops_digest() {
        let mut image = image(json!({
            "seed": 1,
            "partitions": [{"name": "SECRET", "lock": true,
                            "items": [{"name": "KEY", "value": "0x1"}]}]
        }))
        .unwrap();
        overlay(
            &mut image,
            json!({"partitions": [{"name": "SECRET", "items": [{"name": "KEY", "value": "0x2"}]}]}),
        )
        .unwrap();
        image.gen_random_constants();
        let (data, _) = image.stream_out("SECRET").unwrap();
        assert!(data[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_partitions_key_required() {
        assert!(matches!(
            image(json!({"seed": 1})),
            Err(OtpError::MissingField { .. })
        ));
        let mut image = image(json!({"seed": 1, "partitions": []})).unwrap();
        assert!(matches!(
            overlay(&mut image, json!({})),
            Err(OtpError::MissingField { .. })
        ));
    }

    #[test]
    fn test_merge_errors() {
        let cases = [
            json!({"partitions": []}),
            json!({"seed": 1, "partitions": [{"name": "NOPE"}]}),
            json!({"seed": 1, "partitions": [{"name": "CFG", "items": [{"name": "B"}]}]}),
            json!({"seed": 1, "partitions": [{"name": "CFG", "items": [{"name": "A", "value": "0x1_0000_0000"}]}]}),
            json!({"seed": 1, "partitions": [{"name": "CFG", "items": [{"name": "EN", "value": "0x5"}]}]}),
            json!({"seed": 1, "partitions": [{"name": "CFG", "items": [{"name": "A", "valeu": 3}]}]}),
            json!({"seed": 1, "partitions": [{"name": "CFG", "state": "RAW"}]}),
            json!({"seed": 1, "partitions": [{"name": "CFG", "lokc": true}]}),
            json!({"seed": 1, "partitions": [], "comment": "x"}),
            json!({"seed": 1, "partitions": [{"name": "LIFE_CYCLE", "lock": true}]}),
        ];
        for (i, case) in cases.into_iter().enumerate() {
            assert!(image(case).is_err(), "case {i}");
        }

        let err = image(json!({
            "seed": 1,
            "partitions": [{"name": "CFG", "count": 2, "items": [{"name": "A", "vlaue": 1}]}]
        }))
        .err()
        .unwrap();
        assert!(matches!(err, OtpError::UnusedFields { .. }), "{err}");
    }

    #[test]
    fn test_lock_requires_hw_digest() {
        let map_config: MemoryMapConfig = serde_json::from_value(json!({
            "seed": "1",
            "otp": {"depth": 32, "width": 2},
            "scrambling": {"keys": [], "digests": []},
            "partitions": [
                {"name": "SW", "items": [{"name": "X", "size": 4}]},
                {"name": "LIFE_CYCLE", "variant": "LifeCycle",
                 "items": [{"name": "LC_TRANSITION_CNT", "size": 4},
                           {"name": "LC_STATE", "size": 4}]}
            ]
        }))
        .unwrap();
        let map = MemoryMap::new(&map_config).unwrap();
        let config: ImageConfig =
            serde_json::from_value(json!({"seed": 1, "partitions": [{"name": "SW", "lock": true}]}))
                .unwrap();
        assert!(matches!(
            MemoryImage::new(map, lc(), &config, &[]),
            Err(OtpError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_life_cycle_partition() {
        let mut image = image(json!({
            "seed": 1,
            "partitions": [{"name": "LIFE_CYCLE", "state": "TEST", "count": 2}]
        }))
        .unwrap();
        let state = image.lc().encode(StateType::LcState, "TEST").unwrap();
        let count = image.lc().encode(StateType::LcCnt, "2").unwrap();
        assert_eq!(image.item_value("LIFE_CYCLE", "LC_STATE"), Some(&HexValue::Fixed(state)));
        assert_eq!(
            image.item_value("LIFE_CYCLE", "LC_TRANSITION_CNT"),
            Some(&HexValue::Fixed(count))
        );

        // An entry without state or count resets to RAW.
        overlay(&mut image, json!({"partitions": [{"name": "LIFE_CYCLE"}]})).unwrap();
        assert_eq!(
            image.item_value("LIFE_CYCLE", "LC_STATE"),
            Some(&HexValue::Fixed(vec![0; 4]))
        );

        for bad in [
            json!({"partitions": [{"name": "LIFE_CYCLE", "state": "TEST"}]}),
            json!({"partitions": [{"name": "LIFE_CYCLE", "state": "PROD", "count": 1}]}),
            json!({"partitions": [{"name": "LIFE_CYCLE", "state": "TEST", "count": 9}]}),
            json!({"partitions": [{"name": "LIFE_CYCLE", "state": 3, "count": 1}]}),
            json!({"partitions": [{"name": "LIFE_CYCLE",
                                   "items": [{"name": "LC_STATE", "value": "0x1"}]}]}),
        ] {
            assert!(overlay(&mut image, bad.clone()).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_stream_out_plain() {
        let mut image = image(json!({
            "seed": 1,
            "partitions": [{"name": "CFG", "items": [{"name": "A", "value": "0x04030201"}]}]
        }))
        .unwrap();
        image.gen_random_constants();
        let (data, annotations) = image.stream_out("CFG").unwrap();
        assert_eq!(data.len(), 16);
        assert_eq!(&data[..6], &[1, 2, 3, 4, 0, 0]);
        assert!(data[6..].iter().all(|&b| b == 0));
        assert_eq!(annotations[0], "CFG: A");
        assert_eq!(annotations[4], "CFG: EN");
        assert_eq!(annotations[6], "unallocated");
        assert_eq!(annotations[8], "CFG: CFG_DIGEST");
    }

    #[test]
    fn test_stream_out_secret_and_digest() {
        let mut image = image(json!({
            "seed": 1,
            "partitions": [{"name": "SECRET", "lock": true,
                            "items": [{"name": "KEY", "value": "0x1122334455667788"}]}]
        }))
        .unwrap();
        image.gen_random_constants();
        let (data, _) = image.stream_out("SECRET").unwrap();

        let key = 0x0123456789abcdef0123456789abcdef;
        let scrambled = otp_scramble(0x1122334455667788, key);
        assert_eq!(&data[..8], &scrambled.to_le_bytes());
        let digest = otp_digest(
            &[scrambled],
            0x1122334455667788,
            0x99aabbccddeeff00_1122334455667788,
        );
        assert_eq!(&data[8..], &digest.to_le_bytes());
    }

    #[test]
    fn test_unlocked_digest_stays_zero() {
        let mut image = image(json!({
            "seed": 1,
            "partitions": [{"name": "SECRET", "items": [{"name": "KEY", "value": "0x1"}]}]
        }))
        .unwrap();
        image.gen_random_constants();
        let (data, _) = image.stream_out("SECRET").unwrap();
        assert!(data[8..].iter().all(|&b| b == 0));
        assert!(data[..8].iter().any(|&b| b != 0));
    }

    #[test]
    fn test_manual_digest_rejected() {
        let mut image = image(json!({
            "seed": 1,
            "partitions": [{"name": "CFG", "items": [{"name": "CFG_DIGEST", "value": "0x1"}]}]
        }))
        .unwrap();
        image.gen_random_constants();
        assert!(matches!(
            image.stream_out("CFG"),
            Err(OtpError::DigestOverride(name)) if name == "CFG"
        ));
    }

    #[test]
    fn test_random_values() {
        let config = json!({
            "seed": 11,
            "partitions": [{"name": "SECRET", "items": [{"name": "KEY", "value": "<random>"}]}]
        });
        let mut first = image(config.clone()).unwrap();
        assert!(matches!(first.stream_out("SECRET"), Err(OtpError::Internal(_))));
        first.gen_random_constants();
        let mut second = image(config).unwrap();
        second.gen_random_constants();

        let value = first.item_value("SECRET", "KEY").unwrap();
        assert_eq!(value.bytes().map(<[u8]>::len), Some(8));
        assert_eq!(Some(value), second.item_value("SECRET", "KEY"));

        // Resolving again does not redraw.
        let before = value.clone();
        first.gen_random_constants();
        assert_eq!(first.item_value("SECRET", "KEY"), Some(&before));
    }

    #[test]
    fn test_width_mismatch() {
        let map_config: MemoryMapConfig = serde_json::from_value(json!({
            "seed": "1",
            "otp": {"depth": 16, "width": 4},
            "scrambling": {"keys": [], "digests": []},
            "partitions": [
                {"name": "LIFE_CYCLE", "variant": "LifeCycle",
                 "items": [{"name": "LC_STATE", "size": 4}]}
            ]
        }))
        .unwrap();
        let map = MemoryMap::new(&map_config).unwrap();
        let config: ImageConfig =
            serde_json::from_value(json!({"seed": 1, "partitions": []})).unwrap();
        assert!(matches!(
            MemoryImage::new(map, lc(), &config, &[]),
            Err(OtpError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_data_perm() {
        let config: ImageConfig =
            serde_json::from_value(json!({"seed": 1, "partitions": []})).unwrap();
        let perm: Vec<usize> = (0..24).rev().collect();
        let image = MemoryImage::new(map(), lc(), &config, &perm).unwrap();
        assert!(!image.data_perm().is_identity());

        let short: Vec<usize> = (0..22).collect();
        assert!(matches!(
            MemoryImage::new(map(), lc(), &config, &short),
            Err(OtpError::InvalidPermutation(_))
        ));
    }

    #[test]
    fn test_memfile() {
        let mut image = image(json!({
            "seed": 1,
            "partitions": [{"name": "CFG", "items": [{"name": "A", "value": "0x1234"}]}]
        }))
        .unwrap();
        image.gen_random_constants();
        let memfile = image.gen_memfile().unwrap();
        let lines: Vec<_> = memfile.lines().collect();
        assert_eq!(lines[0], "// OTP MEM file with layout : 48 x 24bit ");
        assert_eq!(lines.len(), 49);
        assert_eq!(
            lines[1],
            format!("@000000 {:06x} // CFG: A", image.lc().code().encode(0x1234))
        );
        assert!(lines[48].starts_with("@00002f "));
    }
}
