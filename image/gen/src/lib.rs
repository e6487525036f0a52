/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the OTP memory image generator: image composition,
    memory file rendering and parsing, C file rendering and flash image
    post-processing.

--*/

mod cheader;
mod flash;
mod image;
mod memfile;
mod perm;

pub use cheader::{CHeaderItem, CHeaderOptions, CHeaderPartition, DEFAULT_C_TEMPLATE};
pub use flash::{linear_code, reformat_flash_vmem, FlashCodes, FlashKeys, MUBI4_TRUE};
pub use image::{
    MemoryImage, CNSTY_DIGEST, LC_STATE_ITEM, LC_TRANSITION_CNT_ITEM, OTP_IMG_SEED_DIVERSIFIER,
};
pub use memfile::{pack_words, render_memfile, MemFile, MemWord, MEMFILE_HEADER, UNALLOCATED};
pub use perm::parse_data_perm;
