/*++

Licensed under the Apache-2.0 license.

File Name:

   config.rs

Abstract:

    File contains utilities for loading configuration files, resolving
    generator seeds and writing generated files.

--*/

use anyhow::Context;
use clap::ArgMatches;
use log::info;
use otpgen_types::ConfigValue;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load a JSON or, by `.toml` extension, TOML configuration file.
pub(crate) fn load_config<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read the config file {}", path.display()))?;

    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?,
        _ => serde_json::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?,
    };

    Ok(config)
}

pub(crate) fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub(crate) fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Source of the seeds a configuration leaves unset
pub(crate) fn seed_rng(args: &ArgMatches) -> ChaCha20Rng {
    match args.get_one::<u64>("seed") {
        Some(&seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    }
}

/// Pick the seed of a generator configuration.
///
/// A non-zero command line override wins over the seed in the file. A
/// missing seed is drawn from `rng`.
pub(crate) fn resolve_seed(
    component: &str,
    seed: &mut Option<ConfigValue>,
    cli_override: Option<u64>,
    rng: &mut ChaCha20Rng,
) {
    match (cli_override.filter(|&s| s != 0), seed.as_ref()) {
        (Some(value), _) => {
            info!("Forcing {component} seed to {value}");
            *seed = Some(ConfigValue::Int(value));
        }
        (None, Some(value)) => {
            info!("Using {component} seed {value} from configuration");
        }
        (None, None) => {
            let value: u64 = rng.gen();
            info!("No {component} seed specified, using random seed {value}");
            *seed = Some(ConfigValue::Int(value));
        }
    }
}

/// Comment header of generated files.
///
/// Only a stamped header carries the time and command line, so unstamped
/// outputs are reproducible.
pub(crate) fn file_header(args: &ArgMatches) -> String {
    if !args.get_flag("stamp") {
        return "//\n".into();
    }
    let now = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S %Z");
    let cmdline: Vec<String> = std::env::args().skip(1).collect();
    format!(
        "// Generated on {now} with\n// $ otp-img-gen {}\n//\n",
        cmdline.join(" ")
    )
}
