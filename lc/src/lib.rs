/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Life cycle state encoding generator. Produces ECC protected word pairs
    where the second word of each pair can be programmed over the first
    without clearing any bit.

--*/

mod encoder;
mod search;
mod state;
mod token;

pub use encoder::{CodewordStats, LifeCycleEncoder, WordPair, MAX_LC_DATA_WIDTH};
pub use state::{StateType, WordSel};
pub use token::{hash_token, Token, TOKEN_HASH_CUSTOMIZATION};

/// Seed diversification constant of the life cycle encoder
pub const LC_SEED_DIVERSIFIER: u128 = 1939944205722120255;
