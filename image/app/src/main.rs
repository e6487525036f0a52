/*++

Licensed under the Apache-2.0 license.

File Name:

   main.rs

Abstract:

    Main entry point of the OTP image generator application

--*/
use std::path::PathBuf;

use clap::{arg, value_parser, ArgAction, ArgMatches, Command};
use log::LevelFilter;
use simple_logger::SimpleLogger;

mod config;
mod flash;
mod img;
mod tables;

/// Entry point
fn main() {
    let sub_cmds = vec![
        Command::new("img")
            .about("Generate an OTP memory image")
            .arg(
                arg!(--"lc-state-def" <FILE> "Life cycle state definition file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"mmap-def" <FILE> "OTP memory map file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"img-cfg" <FILE> "Image configuration file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"add-cfg" <FILE> "Additional image configuration file, merged in order")
                    .required(false)
                    .action(ArgAction::Append)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"lc-seed" <U64> "Override the life cycle seed")
                    .required(false)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(--"otp-seed" <U64> "Override the memory map seed")
                    .required(false)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(--"img-seed" <U64> "Override the image seed")
                    .required(false)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(--"data-perm" <PERM> "Bit permutation of memory file words, e.g. \"[15:0],[21:16]\"")
                    .required(false)
                    .value_parser(value_parser!(String)),
            )
            .arg(
                arg!(-o --out <FILE> "Output memory file, BITWIDTH is replaced by the word width")
                    .required(false)
                    .default_value("otp-img.BITWIDTH.vmem")
                    .value_parser(value_parser!(String)),
            )
            .arg(
                arg!(--"c-template" <FILE> "Template for the C file")
                    .required(false)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"c-out" <FILE> "Write the C file instead of the memory file")
                    .required(false)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(arg!(--stamp "Add a time stamp and the command line to the file header")),
        Command::new("tables")
            .about("Print the memory map documentation tables")
            .arg(
                arg!(--"mmap-def" <FILE> "OTP memory map file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"otp-seed" <U64> "Override the memory map seed")
                    .required(false)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(-o --out <FILE> "Output Markdown file")
                    .required(false)
                    .value_parser(value_parser!(PathBuf)),
            ),
        Command::new("flash")
            .about("Add ECC and scrambling to a flash memory file")
            .arg(
                arg!(--"in-flash-vmem" <FILE> "Input flash memory file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"in-otp-mmap" <FILE> "OTP memory map file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"in-otp-vmem" <FILE> "Generated OTP memory file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"flash-ecc" <FILE> "Flash integrity and reliability codes")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"lc-state-def" <FILE> "Life cycle state definition, enables the OTP ECC check")
                    .required(false)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"otp-seed" <U64> "Override the memory map seed")
                    .required(false)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(--"otp-data-perm" <PERM> "Bit permutation of the OTP memory file words")
                    .required(false)
                    .value_parser(value_parser!(String)),
            )
            .arg(
                arg!(--"out-flash-vmem" <FILE> "Output flash memory file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(arg!(--stamp "Add a time stamp and the command line to the file header")),
    ];

    let cmd = Command::new("otp-img-gen")
        .arg_required_else_help(true)
        .subcommands(sub_cmds)
        .arg(arg!(-q --quiet "Only log warnings and errors").global(true))
        .arg(arg!(-v --verbose "Log debug messages").global(true))
        .arg(
            arg!(--seed <U64> "Seed for drawing the seeds a configuration does not set")
                .required(false)
                .global(true)
                .value_parser(value_parser!(u64)),
        )
        .about("OTP memory image generation tools")
        .get_matches();

    let _ = SimpleLogger::new().with_level(log_level(&cmd)).init();

    let result = match cmd.subcommand() {
        Some(("img", args)) => img::run_cmd(args),
        Some(("tables", args)) => tables::run_cmd(args),
        Some(("flash", args)) => flash::run_cmd(args),
        _ => unreachable!(),
    };

    result.unwrap_or_else(|e| {
        log::error!("{e:#}");
        std::process::exit(1);
    });
}

fn log_level(args: &ArgMatches) -> LevelFilter {
    if args.get_flag("verbose") {
        LevelFilter::Debug
    } else if args.get_flag("quiet") {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    }
}
