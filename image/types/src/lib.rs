/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the configuration records and value helpers shared by the
    OTP memory map, life cycle encoder and memory image generator.

--*/

mod config;
mod mubi;
mod rng;
mod value;

pub use config::*;
pub use mubi::{is_mubi_width_valid, mubi_bytes, mubi_value};
pub use rng::SeededRng;
pub use value::{
    bytes_to_u128, check_bool, check_int, format_hex, parse_hex, ConfigValue, HexValue, RANDOM,
};

/// Size of a scrambling block in bytes
pub const SCRAMBLE_BLOCK_WIDTH: usize = 8;
