/*++

Licensed under the Apache-2.0 license.

File Name:

   img.rs

Abstract:

    File contains the OTP memory image generation command.

--*/

use crate::config::{file_header, load_config, read_file, resolve_seed, seed_rng, write_file};
use anyhow::Context;
use clap::ArgMatches;
use log::info;
use otpgen_image::{parse_data_perm, CHeaderOptions, MemoryImage};
use otpgen_lc::LifeCycleEncoder;
use otpgen_mmap::MemoryMap;
use otpgen_types::{ImageConfig, LifeCycleConfig, MemoryMapConfig};
use std::path::{Path, PathBuf};

/// Run the command
pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let lc_path: &PathBuf = args
        .get_one::<PathBuf>("lc-state-def")
        .with_context(|| "lc-state-def arg not specified")?;

    let mmap_path: &PathBuf = args
        .get_one::<PathBuf>("mmap-def")
        .with_context(|| "mmap-def arg not specified")?;

    let img_path: &PathBuf = args
        .get_one::<PathBuf>("img-cfg")
        .with_context(|| "img-cfg arg not specified")?;

    let out: &String = args
        .get_one::<String>("out")
        .with_context(|| "out arg not specified")?;

    let mut rng = seed_rng(args);

    let mut lc_config: LifeCycleConfig = load_config(lc_path)?;
    resolve_seed(
        "LC",
        &mut lc_config.seed,
        args.get_one::<u64>("lc-seed").copied(),
        &mut rng,
    );
    let lc = LifeCycleEncoder::new(&lc_config)
        .with_context(|| format!("Invalid life cycle definition {}", lc_path.display()))?;

    let mut mmap_config: MemoryMapConfig = load_config(mmap_path)?;
    resolve_seed(
        "OTP",
        &mut mmap_config.seed,
        args.get_one::<u64>("otp-seed").copied(),
        &mut rng,
    );
    let map = MemoryMap::new(&mmap_config)
        .with_context(|| format!("Invalid memory map {}", mmap_path.display()))?;

    let mut img_config: ImageConfig = load_config(img_path)?;
    resolve_seed(
        "image",
        &mut img_config.seed,
        args.get_one::<u64>("img-seed").copied(),
        &mut rng,
    );

    let data_perm = match args.get_one::<String>("data-perm") {
        Some(perm) => parse_data_perm(perm)?,
        None => Vec::new(),
    };

    let mut image = MemoryImage::new(map, lc, &img_config, &data_perm)
        .with_context(|| format!("Invalid image configuration {}", img_path.display()))?;

    if let Some(add_cfgs) = args.get_many::<PathBuf>("add-cfg") {
        for path in add_cfgs {
            let config: ImageConfig = load_config(path)?;
            image
                .apply_override(&config)
                .with_context(|| format!("Invalid image configuration {}", path.display()))?;
        }
    }

    image.gen_random_constants();

    let header = file_header(args);
    if let Some(c_out) = args.get_one::<PathBuf>("c-out") {
        return write_c_file(&image, &header, args.get_one::<PathBuf>("c-template"), c_out);
    }

    let memfile = image.gen_memfile()?;
    let out_path = out.replace("BITWIDTH", &image.bitness().to_string());
    write_file(Path::new(&out_path), &format!("{header}{memfile}\n"))
}

fn write_c_file(
    image: &MemoryImage,
    header: &str,
    template: Option<&PathBuf>,
    out_path: &Path,
) -> anyhow::Result<()> {
    let template = template.map(|path| read_file(path)).transpose()?;
    info!("Generating C file");
    let c_file = image.render_c_file(header, template.as_deref(), &CHeaderOptions::default())?;
    write_file(out_path, &c_file)
}
