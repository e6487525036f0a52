/*++

Licensed under the Apache-2.0 license.

File Name:

   flash.rs

Abstract:

    File contains the flash memory file scrambling command.

--*/

use crate::config::{file_header, load_config, read_file, resolve_seed, seed_rng, write_file};
use anyhow::{anyhow, Context};
use clap::ArgMatches;
use log::info;
use otpgen_crypto::BitPermutation;
use otpgen_image::{linear_code, parse_data_perm, reformat_flash_vmem, FlashCodes, FlashKeys, MemFile};
use otpgen_mmap::MemoryMap;
use otpgen_types::{FlashEccConfig, LifeCycleConfig, MemoryMapConfig};
use std::path::PathBuf;

/// Run the command
pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let flash_path: &PathBuf = args
        .get_one::<PathBuf>("in-flash-vmem")
        .with_context(|| "in-flash-vmem arg not specified")?;

    let mmap_path: &PathBuf = args
        .get_one::<PathBuf>("in-otp-mmap")
        .with_context(|| "in-otp-mmap arg not specified")?;

    let otp_path: &PathBuf = args
        .get_one::<PathBuf>("in-otp-vmem")
        .with_context(|| "in-otp-vmem arg not specified")?;

    let ecc_path: &PathBuf = args
        .get_one::<PathBuf>("flash-ecc")
        .with_context(|| "flash-ecc arg not specified")?;

    let out_path: &PathBuf = args
        .get_one::<PathBuf>("out-flash-vmem")
        .with_context(|| "out-flash-vmem arg not specified")?;

    let mut rng = seed_rng(args);
    let mut mmap_config: MemoryMapConfig = load_config(mmap_path)?;
    resolve_seed(
        "OTP",
        &mut mmap_config.seed,
        args.get_one::<u64>("otp-seed").copied(),
        &mut rng,
    );
    let map = MemoryMap::new(&mmap_config)
        .with_context(|| format!("Invalid memory map {}", mmap_path.display()))?;

    let perm = match args.get_one::<String>("otp-data-perm") {
        Some(perm) => parse_data_perm(perm)?,
        None => Vec::new(),
    };
    let perm = if perm.is_empty() {
        None
    } else {
        let width = perm.len();
        Some(BitPermutation::new(perm, width)?)
    };
    let otp = MemFile::parse(&read_file(otp_path)?, perm.as_ref())
        .with_context(|| format!("Failed to parse {}", otp_path.display()))?;

    if let Some(lc_path) = args.get_one::<PathBuf>("lc-state-def") {
        let lc_config: LifeCycleConfig = load_config(lc_path)?;
        let secded = lc_config
            .secded
            .ok_or_else(|| anyhow!("{} has no secded code", lc_path.display()))?;
        otp.check_ecc(&linear_code(&secded, "secded")?)
            .with_context(|| format!("Corrupt OTP memory file {}", otp_path.display()))?;
        info!("OTP memory file ECC is consistent");
    }

    let ecc_config: FlashEccConfig = load_config(ecc_path)?;
    let codes = FlashCodes::from_config(&ecc_config)?;
    let keys = FlashKeys::from_otp(&map, &otp)?;

    let lines = reformat_flash_vmem(&read_file(flash_path)?, &codes, keys.as_ref())
        .with_context(|| format!("Failed to process {}", flash_path.display()))?;
    write_file(
        out_path,
        &format!("{}{}\n", file_header(args), lines.join("\n")),
    )
}
