// Licensed under the Apache-2.0 license

use otpgen_error::{OtpError, OtpResult};
use std::fmt;
use std::str::FromStr;

/// Kinds of life cycle encoded values, in generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateType {
    LcState,
    LcCnt,
    SocDbgState,
    OwnershipState,
    AuthState,
}

impl StateType {
    pub const ALL: [StateType; 5] = [
        StateType::LcState,
        StateType::LcCnt,
        StateType::SocDbgState,
        StateType::OwnershipState,
        StateType::AuthState,
    ];

    /// Name of the state table in the configuration record
    pub fn name(self) -> &'static str {
        match self {
            StateType::LcState => "lc_state",
            StateType::LcCnt => "lc_cnt",
            StateType::SocDbgState => "soc_dbg_state",
            StateType::OwnershipState => "ownership_state",
            StateType::AuthState => "auth_state",
        }
    }

    /// Symbol letters selecting the base and incremental word
    fn letters(self) -> (char, char) {
        match self {
            StateType::LcState => ('A', 'B'),
            StateType::LcCnt => ('C', 'D'),
            StateType::SocDbgState => ('E', 'F'),
            StateType::OwnershipState => ('G', 'H'),
            StateType::AuthState => ('I', 'J'),
        }
    }

    /// Parse the symbol for word `index` of a state of this type.
    ///
    /// Legal symbols are `0`, or the base or incremental letter followed by
    /// the word index, e.g. `A3` or `B3` for word 3 of an `lc_state` entry.
    pub fn parse_symbol(self, symbol: &str, index: usize) -> OtpResult<WordSel> {
        if symbol == "0" {
            return Ok(WordSel::Zero);
        }
        let (base, incr) = self.letters();
        let mut chars = symbol.chars();
        let letter = chars.next();
        let suffix_ok = chars.as_str() == index.to_string();
        match letter {
            Some(l) if l == base && suffix_ok => Ok(WordSel::Base),
            Some(l) if l == incr && suffix_ok => Ok(WordSel::Incremental),
            _ => Err(OtpError::invalid(
                format!("{} word {index}", self.name()),
                "symbol",
                symbol,
            )),
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StateType {
    type Err = OtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| OtpError::unknown("state type", s))
    }
}

/// Which word of a generated pair a state uses at one word position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSel {
    /// Unprogrammed (all zero)
    Zero,
    Base,
    Incremental,
}
