// Licensed under the Apache-2.0 license

use crate::config::{load_config, resolve_seed, seed_rng, write_file};
use anyhow::Context;
use clap::ArgMatches;
use otpgen_mmap::MemoryMap;
use otpgen_types::MemoryMapConfig;
use std::path::PathBuf;

/// Run the command
pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let mmap_path: &PathBuf = args
        .get_one::<PathBuf>("mmap-def")
        .with_context(|| "mmap-def arg not specified")?;

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

    let tables = [
        ("Partitions", map.partitions_table()),
        ("Memory map", map.mmap_table()),
        ("Digests", map.digests_table()),
        ("Items", map.description_table()),
    ]
    .iter()
    .map(|(title, table)| format!("## {title}\n\n{table}\n"))
    .collect::<Vec<_>>()
    .join("\n");

    match args.get_one::<PathBuf>("out") {
        Some(path) => write_file(path, &tables),
        None => {
            print!("{tables}");
            Ok(())
        }
    }
}
