/*++

Licensed under the Apache-2.0 license.

File Name:

   flash.rs

Abstract:

    File contains the flash image post-processing: recovery of the flash
    scrambling keys from a generated OTP image, and the ECC and XEX
    scrambling of flash memory file words.

--*/

use crate::memfile::{pack_words, MemFile};
use log::{debug, info};
use otpgen_crypto::{derive_key, otp_unscramble, FlashScrambler, LinearCode};
use otpgen_error::{OtpError, OtpResult};
use otpgen_mmap::MemoryMap;
use otpgen_types::{check_int, FlashEccConfig, SecdedConfig};

/// Multi-bit boolean true in four bits
pub const MUBI4_TRUE: u128 = 0x6;

const FLASH_WORD_SIZE: usize = 64;

/// Integrity ECC bits kept next to each flash word
const FLASH_INTEGRITY_ECC_SIZE: usize = 4;

const FLASH_DATA_DEFAULT_CFG_PART: &str = "CREATOR_SW_CFG";
const FLASH_DATA_DEFAULT_CFG_ITEM: &str = "CREATOR_SW_CFG_FLASH_DATA_DEFAULT_CFG";
const FLASH_DATA_DEFAULT_CFG_SIZE: usize = 32;

const SECRET1_PART: &str = "SECRET1";
const SECRET1_KEY: &str = "Secret1Key";
const SECRET1_BLOCK_SIZE: usize = 64;

const FLASH_ADDR_KEY: &str = "FlashAddrKey";
const FLASH_DATA_KEY: &str = "FlashDataKey";

/// 256-bit key seeds span four SECRET1 blocks each.
const KEY_SEED_BLOCKS: usize = 4;

/// Build a linear code from a SECDED description.
pub fn linear_code(config: &SecdedConfig, context: &str) -> OtpResult<LinearCode> {
    let data_width = config
        .data_width
        .as_ref()
        .ok_or_else(|| OtpError::missing(context, "data_width"))?;
    let ecc_width = config
        .ecc_width
        .as_ref()
        .ok_or_else(|| OtpError::missing(context, "ecc_width"))?;
    let rows = config
        .ecc_matrix
        .as_ref()
        .ok_or_else(|| OtpError::missing(context, "ecc_matrix"))?;

    let matrix = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|bit| check_int(bit, context, "ecc_matrix").map(|b| b as usize))
                .collect::<OtpResult<Vec<_>>>()
        })
        .collect::<OtpResult<Vec<_>>>()?;
    LinearCode::new(
        check_int(data_width, context, "data_width")? as usize,
        check_int(ecc_width, context, "ecc_width")? as usize,
        matrix,
    )
}

/// Integrity and reliability codes of a flash word
#[derive(Debug, Clone)]
pub struct FlashCodes {
    integrity: LinearCode,
    reliability: LinearCode,
}

impl FlashCodes {
    pub fn new(integrity: LinearCode, reliability: LinearCode) -> OtpResult<Self> {
        if integrity.data_width() != FLASH_WORD_SIZE {
            return Err(OtpError::invalid(
                "flash integrity code",
                "data_width",
                integrity.data_width(),
            ));
        }
        if integrity.ecc_width() < FLASH_INTEGRITY_ECC_SIZE {
            return Err(OtpError::invalid(
                "flash integrity code",
                "ecc_width",
                integrity.ecc_width(),
            ));
        }
        if reliability.data_width() != FLASH_WORD_SIZE + FLASH_INTEGRITY_ECC_SIZE {
            return Err(OtpError::invalid(
                "flash reliability code",
                "data_width",
                reliability.data_width(),
            ));
        }
        Ok(Self {
            integrity,
            reliability,
        })
    }

    pub fn from_config(config: &FlashEccConfig) -> OtpResult<Self> {
        let integrity = config
            .integrity
            .as_ref()
            .ok_or_else(|| OtpError::missing("flash ecc config", "integrity"))?;
        let reliability = config
            .reliability
            .as_ref()
            .ok_or_else(|| OtpError::missing("flash ecc config", "reliability"))?;
        Self::new(
            linear_code(integrity, "flash integrity code")?,
            linear_code(reliability, "flash reliability code")?,
        )
    }

    pub fn integrity(&self) -> &LinearCode {
        &self.integrity
    }

    pub fn reliability(&self) -> &LinearCode {
        &self.reliability
    }

    /// Encode one flash word.
    ///
    /// The integrity bits are computed over the plain data. With a
    /// scrambler the data bits are then replaced by their XEX scrambling
    /// before the reliability code is applied.
    pub fn encode(&self, data: u64, word_addr: u64, scrambler: Option<&FlashScrambler>) -> u128 {
        let intg_mask = (1u128 << (FLASH_WORD_SIZE + FLASH_INTEGRITY_ECC_SIZE)) - 1;
        let mut word = self.integrity.encode(data as u128) & intg_mask;
        if let Some(scrambler) = scrambler {
            let intg_ecc = word & (0xf << FLASH_WORD_SIZE);
            word = intg_ecc | scrambler.scramble(data, word_addr) as u128;
        }
        self.reliability.encode(word)
    }

    /// Hex digits of an encoded word
    pub fn hex_digits(&self) -> usize {
        self.reliability.codeword_width().div_ceil(4)
    }
}

/// Flash address and data scrambling keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashKeys {
    pub addr_key: u128,
    pub data_key: u128,
}

impl FlashKeys {
    /// Derive the keys from their 256-bit seeds with the flash key
    /// derivation constants of `map`.
    pub fn derive(map: &MemoryMap, addr_seed: [u128; 2], data_seed: [u128; 2]) -> OtpResult<Self> {
        Ok(Self {
            addr_key: derive_flash_key(map, FLASH_ADDR_KEY, addr_seed)?,
            data_key: derive_flash_key(map, FLASH_DATA_KEY, data_seed)?,
        })
    }

    /// Recover the keys from a generated OTP memory file.
    ///
    /// Returns `None` if the OTP image leaves flash data scrambling
    /// disabled.
    pub fn from_otp(map: &MemoryMap, otp: &MemFile) -> OtpResult<Option<Self>> {
        let word_bits = map.otp().width * 8;

        let cfg = otp.item_data(
            FLASH_DATA_DEFAULT_CFG_PART,
            FLASH_DATA_DEFAULT_CFG_ITEM,
            word_bits,
        );
        let cfg = pack_words(&cfg, word_bits, FLASH_DATA_DEFAULT_CFG_SIZE);
        let Some(&cfg) = cfg.first() else {
            return Err(OtpError::InvalidConfig(
                "cannot read flash scrambling enablement state from OTP".into(),
            ));
        };
        if cfg & 0xff != MUBI4_TRUE {
            info!("Flash data scrambling is disabled in OTP");
            return Ok(None);
        }
        info!("Flash data scrambling is enabled in OTP");

        let secret1 = otp.partition_data(SECRET1_PART, word_bits);
        let blocks = pack_words(&secret1, word_bits, SECRET1_BLOCK_SIZE);
        if blocks.len() < 2 * KEY_SEED_BLOCKS {
            return Err(OtpError::InvalidConfig(
                "cannot read flash scrambling key seeds from OTP".into(),
            ));
        }
        let key = map
            .key(SECRET1_KEY)
            .and_then(|k| k.value.as_u128())
            .ok_or_else(|| OtpError::unknown("scrambling key", SECRET1_KEY))?;
        let plain: Vec<u128> = blocks
            .iter()
            .map(|&b| otp_unscramble(b as u64, key) as u128)
            .collect();

        let seed = |start: usize| -> [u128; 2] {
            [
                plain[start] | (plain[start + 1] << 64),
                plain[start + 2] | (plain[start + 3] << 64),
            ]
        };
        Self::derive(map, seed(0), seed(KEY_SEED_BLOCKS)).map(Some)
    }

    pub fn scrambler(&self) -> OtpResult<FlashScrambler> {
        FlashScrambler::new(self.addr_key, self.data_key)
    }
}

fn derive_flash_key(map: &MemoryMap, name: &str, seed: [u128; 2]) -> OtpResult<u128> {
    let digest = map
        .digest(name)
        .ok_or_else(|| OtpError::unknown("digest", name))?;
    let (Some(iv), Some(cnst)) = (digest.iv.as_u128(), digest.cnst.as_u128()) else {
        return Err(OtpError::Internal(format!(
            "key derivation constants {name} are not resolved"
        )));
    };
    let key = derive_key(seed, iv as u64, cnst);
    debug!("Derived {name} {key:#034x}");
    Ok(key)
}

/// Add both ECC layers to every word of a flash memory file and scramble
/// the data if `keys` are given.
///
/// Only `@<address> <word>...` lines are kept. Word addresses count up from
/// the line address.
pub fn reformat_flash_vmem(
    text: &str,
    codes: &FlashCodes,
    keys: Option<&FlashKeys>,
) -> OtpResult<Vec<String>> {
    let scrambler = keys.map(FlashKeys::scrambler).transpose()?;
    let digits = codes.hex_digits();

    let mut lines = Vec::new();
    for (num, line) in text.lines().enumerate() {
        if !line.starts_with('@') {
            continue;
        }
        let context = format!("flash memory file line {}", num + 1);
        let mut fields = line.split_whitespace();
        let Some(addr_field) = fields.next() else {
            continue;
        };
        let address = u64::from_str_radix(&addr_field[1..], 16)
            .map_err(|_| OtpError::invalid(&context, "address", addr_field))?;

        let mut out = addr_field.to_string();
        for (offset, field) in fields.take_while(|f| !f.starts_with("//")).enumerate() {
            let data = u64::from_str_radix(field, 16)
                .map_err(|_| OtpError::invalid(&context, "value", field))?;
            let word = codes.encode(data, address + offset as u64, scrambler.as_ref());
            out.push_str(&format!(" {word:0digits$X}"));
        }
        lines.push(out);
    }
    Ok(lines)
}
