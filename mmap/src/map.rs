/*++

Licensed under the Apache-2.0 license.

File Name:

   map.rs

Abstract:

    File contains the OTP memory map: validation of the memory map record,
    partition and item layout, and netlist constant generation.

--*/

use crate::partition::{Item, LockMode, Partition, Variant, DIGEST_SUFFIX, NO_KEY};
use log::{debug, info};
use otpgen_crypto::DIGEST_SIZE;
use otpgen_error::{OtpError, OtpResult};
use otpgen_types::{
    check_bool, check_int, is_mubi_width_valid, mubi_bytes, ConfigValue, HexValue, ItemConfig,
    MemoryMapConfig, OtpGeometryConfig, PartitionConfig, ScramblingConfig, SeededRng, RANDOM,
    SCRAMBLE_BLOCK_WIDTH,
};
use std::collections::{HashMap, HashSet};

/// Seed diversification constant of the memory map
pub const OTP_SEED_DIVERSIFIER: u128 = 177149201092001677687;

/// Scrambling key size in bytes
pub const KEY_SIZE: usize = 16;

/// Digest IV size in bytes
pub const IV_SIZE: usize = 8;

/// Digest finalization constant size in bytes
pub const CNST_SIZE: usize = 16;

const DEFAULT_DEPTH: u64 = 1024;
const DEFAULT_WIDTH: u64 = 2;

/// OTP array geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpGeometry {
    /// Number of words
    pub depth: usize,

    /// Word width in bytes
    pub width: usize,
}

impl OtpGeometry {
    /// Size in bytes
    pub fn size(&self) -> usize {
        self.depth * self.width
    }

    /// Word address width in bits
    pub fn addr_width(&self) -> u32 {
        ceil_log2(self.depth)
    }

    /// Byte address width in bits
    pub fn byte_addr_width(&self) -> u32 {
        ceil_log2(self.size())
    }
}

fn ceil_log2(value: usize) -> u32 {
    value.next_power_of_two().trailing_zeros()
}

/// Scrambling key netlist constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScramblingKey {
    pub name: String,
    pub value: HexValue,
}

/// Digest IV and finalization constant netlist constants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestConstants {
    pub name: String,
    pub iv: HexValue,
    pub cnst: HexValue,
}

/// Validated and laid out OTP memory map
#[derive(Debug, Clone)]
pub struct MemoryMap {
    seed: u64,
    otp: OtpGeometry,
    keys: Vec<ScramblingKey>,
    digests: Vec<DigestConstants>,
    partitions: Vec<Partition>,
    part_index: HashMap<String, usize>,
}

impl MemoryMap {
    /// Validate and lay out `config`, then generate its netlist constants
    /// from the configured seed.
    pub fn new(config: &MemoryMapConfig) -> OtpResult<Self> {
        info!("Parsing and validating OTP memory map");

        let seed = config
            .seed
            .as_ref()
            .ok_or_else(|| OtpError::missing("memory map", "seed"))?;
        let seed = check_int(seed, "memory map", "seed")?;
        let otp = validate_otp(
            config
                .otp
                .as_ref()
                .ok_or_else(|| OtpError::missing("memory map", "otp"))?,
        )?;
        let (keys, digests) = validate_scrambling(
            config
                .scrambling
                .as_ref()
                .ok_or_else(|| OtpError::missing("memory map", "scrambling"))?,
        )?;
        let part_configs = config
            .partitions
            .as_ref()
            .ok_or_else(|| OtpError::missing("memory map", "partitions"))?;

        let partitions = validate_parts(part_configs, &keys, otp)?;
        let part_index = partitions
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();

        let mut map = Self {
            seed,
            otp,
            keys,
            digests,
            partitions,
            part_index,
        };
        info!("Successfully parsed and validated OTP memory map");

        let mut rng = SeededRng::new(seed, OTP_SEED_DIVERSIFIER);
        debug!("OtpMemMap RNG seed: {seed}");
        map.gen_netlist_constants(&mut rng);
        Ok(map)
    }

    /// Resolve every `<random>` netlist constant: scrambling keys, digest
    /// IVs and constants, then the invalid defaults of all non-mubi items in
    /// layout order.
    pub fn gen_netlist_constants(&mut self, rng: &mut SeededRng) {
        debug!("Generating randomized scrambling netlist constants");
        for key in self.keys.iter_mut() {
            if key.value.resolve(rng, KEY_SIZE * 8) {
                debug!("> Randomized scr key {} with value {}", key.name, key.value);
            }
        }
        for digest in self.digests.iter_mut() {
            if digest.iv.resolve(rng, IV_SIZE * 8) {
                debug!("> Randomized digest {} iv_value {}", digest.name, digest.iv);
            }
            if digest.cnst.resolve(rng, CNST_SIZE * 8) {
                debug!("> Randomized digest {} cnst_value {}", digest.name, digest.cnst);
            }
        }

        debug!("Generating randomized invalid default netlist constants");
        for part in self.partitions.iter_mut() {
            for item in part.items.iter_mut().filter(|i| !i.is_mubi) {
                if item.inv_default.resolve(rng, item.size * 8) {
                    debug!(
                        "> Randomized invalid default for part {} item {}: {}",
                        part.name, item.name, item.inv_default
                    );
                }
            }
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn otp(&self) -> OtpGeometry {
        self.otp
    }

    pub fn keys(&self) -> &[ScramblingKey] {
        &self.keys
    }

    pub fn digests(&self) -> &[DigestConstants] {
        &self.digests
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn key(&self, name: &str) -> Option<&ScramblingKey> {
        self.keys.iter().find(|k| k.name == name)
    }

    pub fn digest(&self, name: &str) -> Option<&DigestConstants> {
        self.digests.iter().find(|d| d.name == name)
    }

    /// Index of partition `name` in layout order
    pub fn part_index(&self, name: &str) -> Option<usize> {
        self.part_index.get(name).copied()
    }

    pub fn get_part(&self, name: &str) -> Option<&Partition> {
        self.part_index(name).map(|i| &self.partitions[i])
    }

    pub fn get_item(&self, part: &str, item: &str) -> Option<&Item> {
        self.get_part(part).and_then(|p| p.item(item))
    }

    /// The life cycle partition, which is always last.
    pub fn lc_partition(&self) -> Option<&Partition> {
        self.partitions
            .last()
            .filter(|p| p.variant == Variant::LifeCycle)
    }
}

fn opt_int(
    value: &Option<ConfigValue>,
    default: u64,
    context: &str,
    field: &str,
) -> OtpResult<u64> {
    match value {
        Some(v) => check_int(v, context, field),
        None => Ok(default),
    }
}

fn opt_bool(value: &Option<ConfigValue>, context: &str, field: &str) -> OtpResult<bool> {
    match value {
        Some(v) => check_bool(v, context, field),
        None => Ok(false),
    }
}

fn validate_otp(otp: &OtpGeometryConfig) -> OtpResult<OtpGeometry> {
    let depth = opt_int(&otp.depth, DEFAULT_DEPTH, "otp", "depth")? as usize;
    let width = opt_int(&otp.width, DEFAULT_WIDTH, "otp", "width")? as usize;
    if depth == 0 {
        return Err(OtpError::invalid("otp", "depth", depth));
    }
    if width == 0 {
        return Err(OtpError::invalid("otp", "width", width));
    }
    Ok(OtpGeometry { depth, width })
}

fn validate_scrambling(
    scr: &ScramblingConfig,
) -> OtpResult<(Vec<ScramblingKey>, Vec<DigestConstants>)> {
    for (field, value, expected) in [
        ("key_size", &scr.key_size, KEY_SIZE),
        ("iv_size", &scr.iv_size, IV_SIZE),
        ("cnst_size", &scr.cnst_size, CNST_SIZE),
    ] {
        let size = opt_int(value, expected as u64, "scrambling", field)? as usize;
        if size != expected {
            return Err(OtpError::invalid("scrambling", field, size));
        }
    }

    let key_configs = scr
        .keys
        .as_ref()
        .ok_or_else(|| OtpError::missing("scrambling", "keys"))?;
    let digest_configs = scr
        .digests
        .as_ref()
        .ok_or_else(|| OtpError::missing("scrambling", "digests"))?;
    let random = ConfigValue::from(RANDOM);

    let mut keys: Vec<ScramblingKey> = Vec::with_capacity(key_configs.len());
    for key in key_configs {
        if key.name == NO_KEY || keys.iter().any(|k| k.name == key.name) {
            return Err(OtpError::DuplicateName {
                kind: "scrambling key",
                name: key.name.clone(),
            });
        }
        let value = key.value.as_ref().unwrap_or(&random);
        keys.push(ScramblingKey {
            name: key.name.clone(),
            value: HexValue::parse(value, KEY_SIZE * 8, &format!("key {}", key.name))?,
        });
    }

    let mut digests: Vec<DigestConstants> = Vec::with_capacity(digest_configs.len());
    for digest in digest_configs {
        if digests.iter().any(|d| d.name == digest.name) {
            return Err(OtpError::DuplicateName {
                kind: "digest",
                name: digest.name.clone(),
            });
        }
        let what = format!("digest {}", digest.name);
        digests.push(DigestConstants {
            name: digest.name.clone(),
            iv: HexValue::parse(
                digest.iv_value.as_ref().unwrap_or(&random),
                IV_SIZE * 8,
                &what,
            )?,
            cnst: HexValue::parse(
                digest.cnst_value.as_ref().unwrap_or(&random),
                CNST_SIZE * 8,
                &what,
            )?,
        });
    }
    Ok((keys, digests))
}

fn validate_item(config: &ItemConfig, part: &Partition) -> OtpResult<Item> {
    let ctx = format!("item {}.{}", part.name, config.name);
    let size = opt_int(&config.size, 0, &ctx, "size")? as usize;
    let is_digest = opt_bool(&config.isdigest, &ctx, "isdigest")?;
    let is_mubi = opt_bool(&config.ismubi, &ctx, "ismubi")?;
    let is_keymgr_creator = opt_bool(&config.iskeymgr_creator, &ctx, "iskeymgr_creator")?;
    let is_keymgr_owner = opt_bool(&config.iskeymgr_owner, &ctx, "iskeymgr_owner")?;

    // Creator and owner key material have separate write enables.
    if is_keymgr_creator && is_keymgr_owner {
        return Err(OtpError::InvalidConfig(format!(
            "key material {} cannot be associated with the creator and the owner",
            config.name
        )));
    }
    if is_keymgr_creator || is_keymgr_owner {
        if part.variant != Variant::Buffered {
            return Err(OtpError::InvalidConfig(format!(
                "key material {} must be stored in a buffered partition",
                config.name
            )));
        }
        if !part.secret {
            return Err(OtpError::InvalidConfig(format!(
                "key material {} must be stored in a secret partition",
                config.name
            )));
        }
    }

    let width = size * 8;
    let inv_default = if is_mubi {
        let value = opt_bool(&config.inv_default, &ctx, "inv_default")?;
        if !is_mubi_width_valid(width) {
            return Err(OtpError::invalid(&ctx, "size", size));
        }
        HexValue::Fixed(mubi_bytes(value, width)?)
    } else {
        let zero = ConfigValue::from("0x0");
        HexValue::parse(config.inv_default.as_ref().unwrap_or(&zero), width, &ctx)?
    };

    Ok(Item {
        name: config.name.clone(),
        size,
        offset: 0,
        is_mubi,
        is_digest,
        is_keymgr_creator,
        is_keymgr_owner,
        inv_default,
        desc: config.desc.clone(),
    })
}

/// Round `raw_size` up to whole scramble blocks and add room for a digest.
pub fn calc_size(has_digest: bool, raw_size: usize) -> usize {
    let size = raw_size.next_multiple_of(SCRAMBLE_BLOCK_WIDTH);
    if has_digest {
        size + DIGEST_SIZE
    } else {
        size
    }
}

fn validate_part(config: &PartitionConfig, keys: &[ScramblingKey]) -> OtpResult<Partition> {
    let ctx = format!("partition {}", config.name);
    debug!("Validating partition {}", config.name);

    let variant = Variant::parse(config.variant.as_deref().unwrap_or("Unbuffered"), &ctx)?;
    let key_sel = config.key_sel.clone().unwrap_or_else(|| NO_KEY.into());
    let write_lock = LockMode::parse(
        config.write_lock.as_deref().unwrap_or("none"),
        &ctx,
        "write_lock",
    )?;
    let read_lock = LockMode::parse(
        config.read_lock.as_deref().unwrap_or("none"),
        &ctx,
        "read_lock",
    )?;

    let mut part = Partition {
        name: config.name.clone(),
        variant,
        secret: opt_bool(&config.secret, &ctx, "secret")?,
        sw_digest: opt_bool(&config.sw_digest, &ctx, "sw_digest")?,
        hw_digest: opt_bool(&config.hw_digest, &ctx, "hw_digest")?,
        write_lock,
        read_lock,
        key_sel,
        absorb: opt_bool(&config.absorb, &ctx, "absorb")?,
        bkout_type: opt_bool(&config.bkout_type, &ctx, "bkout_type")?,
        integrity: opt_bool(&config.integrity, &ctx, "integrity")?,
        is_keymgr_creator: false,
        is_keymgr_owner: false,
        size: 0,
        offset: 0,
        desc: config.desc.clone(),
        items: Vec::new(),
    };

    if part.key_sel != NO_KEY && !keys.iter().any(|k| k.name == part.key_sel) {
        return Err(OtpError::unknown("scrambling key", part.key_sel.clone()));
    }
    if part.secret && part.key_sel == NO_KEY {
        return Err(OtpError::InvalidConfig(format!(
            "secret partition {} needs a key_sel other than {NO_KEY}",
            part.name
        )));
    }
    if part.sw_digest && part.hw_digest {
        return Err(OtpError::InvalidConfig(format!(
            "partition {} cannot have both a SW and a HW digest",
            part.name
        )));
    }
    if part.variant == Variant::Unbuffered && part.hw_digest {
        return Err(OtpError::InvalidConfig(format!(
            "unbuffered partition {} cannot have a HW digest",
            part.name
        )));
    }
    if part.variant == Variant::Buffered && part.read_lock == LockMode::Csr {
        return Err(OtpError::InvalidConfig(format!(
            "buffered partition {} cannot be CSR read locked",
            part.name
        )));
    }
    if !part.has_digest()
        && (part.write_lock == LockMode::Digest || part.read_lock == LockMode::Digest)
    {
        return Err(OtpError::InvalidConfig(format!(
            "partition {} can only be digest locked if it has a digest",
            part.name
        )));
    }

    let item_configs = config.items.as_deref().unwrap_or(&[]);
    if item_configs.is_empty() {
        return Err(OtpError::InvalidConfig(format!(
            "partition {} has no items",
            part.name
        )));
    }
    let mut names = HashSet::new();
    for item in item_configs {
        if !names.insert(item.name.as_str()) {
            return Err(OtpError::DuplicateName {
                kind: "item",
                name: format!("{}.{}", part.name, item.name),
            });
        }
    }

    let mut items = Vec::with_capacity(item_configs.len() + 1);
    for item in item_configs {
        items.push(validate_item(item, &part)?);
    }
    part.is_keymgr_creator = items.iter().any(|i| i.is_keymgr_creator);
    part.is_keymgr_owner = items.iter().any(|i| i.is_keymgr_owner);
    if part.is_keymgr_creator && part.is_keymgr_owner {
        return Err(OtpError::InvalidConfig(format!(
            "partition {} cannot hold key material for the creator and the owner",
            part.name
        )));
    }

    part.size = match &config.size {
        Some(size) => check_int(size, &ctx, "size")? as usize,
        None => calc_size(part.has_digest(), items.iter().map(|i| i.size).sum()),
    };
    if part.size % SCRAMBLE_BLOCK_WIDTH != 0 {
        return Err(OtpError::Misaligned {
            what: format!("size of partition {}", part.name),
            value: part.size,
            alignment: SCRAMBLE_BLOCK_WIDTH,
        });
    }
    part.items = items;
    Ok(part)
}

/// Hand out leftover scramble blocks round-robin to the absorbing
/// partitions, in input order.
fn distribute_unused(parts: &mut [Partition], available: usize) {
    let allocated: usize = parts.iter().map(|p| p.size).sum();
    let leftover_blocks = available.saturating_sub(allocated) / SCRAMBLE_BLOCK_WIDTH;
    let mut sponges: Vec<&mut Partition> = parts.iter_mut().filter(|p| p.absorb).collect();
    if sponges.is_empty() {
        return;
    }
    let num_sponges = sponges.len();
    for block in 0..leftover_blocks {
        sponges[block % num_sponges].size += SCRAMBLE_BLOCK_WIDTH;
    }
}

fn validate_parts(
    configs: &[PartitionConfig],
    keys: &[ScramblingKey],
    otp: OtpGeometry,
) -> OtpResult<Vec<Partition>> {
    let mut names = HashSet::new();
    for part in configs {
        if !names.insert(part.name.as_str()) {
            return Err(OtpError::DuplicateName {
                kind: "partition",
                name: part.name.clone(),
            });
        }
    }
    match configs.last() {
        Some(last) if last.variant.as_deref() == Some("LifeCycle") => {}
        _ => {
            return Err(OtpError::InvalidConfig(
                "the last partition must be the life cycle partition".into(),
            ))
        }
    }

    let mut parts = configs
        .iter()
        .map(|p| validate_part(p, keys))
        .collect::<OtpResult<Vec<_>>>()?;

    distribute_unused(&mut parts, otp.size());

    let mut current_offset = 0;
    for part in parts.iter_mut() {
        part.offset = current_offset;
        debug!(
            "Partition: offset {:4} | size {:4} | name | {}",
            part.offset, part.size, part.name
        );

        for item in part.items.iter_mut() {
            item.offset = current_offset;
            debug!(
                "> Item   : offset {:4} | size {:4} | name | {}",
                item.offset, item.size, item.name
            );
            current_offset += item.size;
        }

        if part.has_digest() {
            // The digest occupies the last scramble block of the partition.
            let digest_offset = (part.offset + part.size)
                .checked_sub(DIGEST_SIZE)
                .filter(|&o| o >= current_offset)
                .ok_or_else(|| OtpError::InsufficientSpace {
                    what: format!("digest of partition {}", part.name),
                    available: part.size,
                    required: current_offset - part.offset + DIGEST_SIZE,
                })?;
            let name = format!("{}{DIGEST_SUFFIX}", part.name);
            debug!("> > Digest {name} at offset {digest_offset} with size {DIGEST_SIZE}");
            part.items.push(Item {
                name,
                size: DIGEST_SIZE,
                offset: digest_offset,
                is_mubi: false,
                is_digest: true,
                is_keymgr_creator: false,
                is_keymgr_owner: false,
                inv_default: HexValue::Random,
                desc: None,
            });
            current_offset = digest_offset + DIGEST_SIZE;
        }

        let end = part.offset + part.size;
        if current_offset > end {
            return Err(OtpError::InsufficientSpace {
                what: format!("items of partition {}", part.name),
                available: part.size,
                required: current_offset - part.offset,
            });
        }
        current_offset = end;
    }

    if current_offset > otp.size() {
        return Err(OtpError::InsufficientSpace {
            what: "OTP partitions".into(),
            available: otp.size(),
            required: current_offset,
        });
    }

    debug!("Total number of partitions: {}", parts.len());
    debug!("Bytes available in OTP: {}", otp.size());
    debug!("Bytes required for partitions: {current_offset}");
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_size() {
        assert_eq!(calc_size(false, 0), 0);
        assert_eq!(calc_size(false, 4), 8);
        assert_eq!(calc_size(false, 16), 16);
        assert_eq!(calc_size(true, 4), 16);
        assert_eq!(calc_size(true, 9), 24);
    }

    #[test]
    fn test_geometry() {
        let otp = OtpGeometry {
            depth: 1024,
            width: 2,
        };
        assert_eq!(otp.size(), 2048);
        assert_eq!(otp.addr_width(), 10);
        assert_eq!(otp.byte_addr_width(), 11);
        let odd = OtpGeometry { depth: 5, width: 2 };
        assert_eq!(odd.addr_width(), 3);
    }

    fn sponge(name: &str, size: usize, absorb: bool) -> Partition {
        Partition {
            name: name.into(),
            variant: Variant::Unbuffered,
            secret: false,
            sw_digest: false,
            hw_digest: false,
            write_lock: LockMode::None,
            read_lock: LockMode::None,
            key_sel: NO_KEY.into(),
            absorb,
            bkout_type: false,
            integrity: false,
            is_keymgr_creator: false,
            is_keymgr_owner: false,
            size,
            offset: 0,
            desc: None,
            items: vec![],
        }
    }

    #[test]
    fn test_distribute_unused() {
        let mut parts = vec![
            sponge("A", 8, true),
            sponge("B", 8, false),
            sponge("C", 8, true),
        ];
        // 64 - 24 = 40 bytes = 5 blocks, 3 to A and 2 to C
        distribute_unused(&mut parts, 64);
        assert_eq!(parts[0].size, 32);
        assert_eq!(parts[1].size, 8);
        assert_eq!(parts[2].size, 24);

        // Unaligned leftovers are dropped.
        let mut parts = vec![sponge("A", 8, true)];
        distribute_unused(&mut parts, 20);
        assert_eq!(parts[0].size, 16);

        let mut parts = vec![sponge("A", 8, false)];
        distribute_unused(&mut parts, 64);
        assert_eq!(parts[0].size, 8);
    }
}
