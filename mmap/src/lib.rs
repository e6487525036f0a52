/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    OTP memory map. Validates the partition and item definitions, lays
    them out in the OTP address space and generates the netlist constants
    derived from the memory map seed.

--*/

mod map;
mod partition;
mod tables;

pub use map::{
    calc_size, DigestConstants, MemoryMap, OtpGeometry, ScramblingKey, CNST_SIZE, IV_SIZE,
    KEY_SIZE, OTP_SEED_DIVERSIFIER,
};
pub use partition::{Item, LockMode, Partition, Variant, DIGEST_SUFFIX, NO_KEY};
