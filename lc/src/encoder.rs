/*++

Licensed under the Apache-2.0 license.

File Name:

   encoder.rs

Abstract:

    File contains the life cycle encoder: configuration validation, word
    pair generation, token hashing and state encoding.

--*/

use crate::search::{max_codewords, Constraints, WordSearch};
use crate::state::{StateType, WordSel};
use crate::token::{hash_token, Token};
use crate::LC_SEED_DIVERSIFIER;
use log::debug;
use otpgen_crypto::{hamming_distance, LinearCode};
use otpgen_error::{OtpError, OtpResult};
use otpgen_types::{
    check_int, ConfigValue, HexValue, LifeCycleConfig, SecdedConfig, SeededRng, StateTable,
};
use std::collections::BTreeMap;

const CONTEXT: &str = "life cycle config";

/// Widest data word the exhaustive incremental search supports
pub const MAX_LC_DATA_WIDTH: usize = 16;

const DEFAULT_TOKEN_SIZE: usize = 128;

/// A base codeword and the codeword it can be incremented to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordPair {
    pub base: u128,
    pub incremental: u128,
}

/// Hamming statistics over all generated codewords
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodewordStats {
    /// Number of codeword pairs per Hamming distance, indexed by distance
    pub histogram: Vec<usize>,
    pub min_hd: u32,
    pub max_hd: u32,
    pub min_hw: u32,
    pub max_hw: u32,
}

impl CodewordStats {
    fn new(words: &[u128], width: usize) -> Self {
        let mut stats = CodewordStats {
            histogram: vec![0; width + 1],
            min_hd: width as u32,
            max_hd: 0,
            min_hw: width as u32,
            max_hw: 0,
        };
        for (i, &w) in words.iter().enumerate() {
            let weight = w.count_ones();
            stats.min_hw = stats.min_hw.min(weight);
            stats.max_hw = stats.max_hw.max(weight);
            for &w2 in &words[i + 1..] {
                let dist = hamming_distance(w, w2);
                stats.histogram[dist as usize] += 1;
                stats.min_hd = stats.min_hd.min(dist);
                stats.max_hd = stats.max_hd.max(dist);
            }
        }
        stats
    }

    /// Text histogram, one bar per distance
    pub fn bars(&self) -> Vec<String> {
        let total: usize = self.histogram.iter().sum();
        let max = self.histogram.iter().copied().max().unwrap_or(0);
        self.histogram
            .iter()
            .enumerate()
            .map(|(dist, &count)| {
                if count == 0 || max == 0 {
                    format!("{dist:2}: --")
                } else {
                    let percent = 100.0 * count as f64 / total as f64;
                    format!("{dist:2}: {} ({percent:.2}%)", "|".repeat(count * 20 / max))
                }
            })
            .collect()
    }
}

/// Life cycle state encoder.
///
/// Construction validates the configuration and generates all tokens and
/// word pairs from the configured seed.
#[derive(Debug, Clone)]
pub struct LifeCycleEncoder {
    seed: u64,
    code: LinearCode,
    constraints: Constraints,
    token_size: usize,
    tokens: Vec<Token>,
    states: BTreeMap<StateType, BTreeMap<String, Vec<WordSel>>>,
    num_words: BTreeMap<StateType, usize>,
    words: BTreeMap<StateType, Vec<WordPair>>,
    stats: CodewordStats,
}

impl LifeCycleEncoder {
    pub fn new(config: &LifeCycleConfig) -> OtpResult<Self> {
        debug!("Generate life cycle state");

        let seed = config
            .seed
            .as_ref()
            .ok_or_else(|| OtpError::missing(CONTEXT, "seed"))?;
        let seed = check_int(seed, CONTEXT, "seed")?;
        let secded = config
            .secded
            .as_ref()
            .ok_or_else(|| OtpError::missing(CONTEXT, "secded"))?;
        let token_configs = config
            .tokens
            .as_ref()
            .ok_or_else(|| OtpError::missing(CONTEXT, "tokens"))?;
        let mut tables = BTreeMap::new();
        for typ in StateType::ALL {
            let table =
                state_table(config, typ).ok_or_else(|| OtpError::missing(CONTEXT, typ.name()))?;
            tables.insert(typ, table);
        }

        debug!("Checking SECDED");
        let code = validate_secded(secded)?;

        debug!("Checking Hamming weight and distance constraints");
        let constraints = validate_constraints(config, code.codeword_width())?;

        debug!("Validating unhashed tokens");
        let token_size = match &config.token_size {
            Some(v) => check_int(v, CONTEXT, "token_size")? as usize,
            None => DEFAULT_TOKEN_SIZE,
        };
        if token_size == 0 || token_size % 8 != 0 {
            return Err(OtpError::invalid(CONTEXT, "token_size", token_size));
        }
        let mut unhashed = Vec::with_capacity(token_configs.len());
        for token in token_configs {
            if unhashed.iter().any(|(name, _): &(String, HexValue)| *name == token.name) {
                return Err(OtpError::DuplicateName {
                    kind: "token",
                    name: token.name.clone(),
                });
            }
            let value = token
                .value
                .clone()
                .unwrap_or_else(|| ConfigValue::from("0x0"));
            let what = format!("token {}", token.name);
            unhashed.push((token.name.clone(), HexValue::parse(&value, token_size, &what)?));
        }

        debug!("Checking state declarations");
        let mut states = BTreeMap::new();
        let mut num_words = BTreeMap::new();
        for (typ, table) in tables {
            let (count, parsed) = validate_state_table(typ, table)?;
            debug!("{typ}: {count} words per state");
            num_words.insert(typ, count);
            states.insert(typ, parsed);
        }

        let required = 2 * num_words.values().sum::<usize>() as u128;
        let bound = max_codewords(&code, constraints.min_hd);
        if required > bound {
            return Err(OtpError::InfeasibleConstraints(format!(
                "{required} codewords required but at most {bound} codewords of width {} \
                 can be {} bits apart",
                code.codeword_width(),
                constraints.min_hd
            )));
        }

        let mut rng = SeededRng::new(seed, LC_SEED_DIVERSIFIER);
        let tokens = generate_tokens(&mut rng, unhashed, token_size)?;

        let mut search = WordSearch::new(&code, constraints);
        let mut words = BTreeMap::new();
        for typ in StateType::ALL {
            let count = num_words.get(&typ).copied().unwrap_or(0);
            let mut pairs = Vec::with_capacity(count);
            for _ in 0..count {
                let (base, incremental) = search.next_pair(&mut rng)?;
                pairs.push(WordPair { base, incremental });
            }
            words.insert(typ, pairs);
        }
        let all_words = search.into_words();
        validate_words(&code, constraints, &all_words)?;

        let stats = CodewordStats::new(&all_words, code.codeword_width());
        debug!("Hamming distance histogram:");
        for bar in stats.bars() {
            debug!("{bar}");
        }
        debug!("Minimum HD: {}", stats.min_hd);
        debug!("Maximum HD: {}", stats.max_hd);
        debug!("Minimum HW: {}", stats.min_hw);
        debug!("Maximum HW: {}", stats.max_hw);

        Ok(Self {
            seed,
            code,
            constraints,
            token_size,
            tokens,
            states,
            num_words,
            words,
            stats,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The SECDED code protecting each life cycle word
    pub fn code(&self) -> &LinearCode {
        &self.code
    }

    pub fn min_hw(&self) -> u32 {
        self.constraints.min_hw
    }

    pub fn max_hw(&self) -> u32 {
        self.constraints.max_hw
    }

    pub fn min_hd(&self) -> u32 {
        self.constraints.min_hd
    }

    /// Token size in bits
    pub fn token_size(&self) -> usize {
        self.token_size
    }

    /// Unhashed tokens followed by their `<name>Hashed` counterparts
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn words(&self, typ: StateType) -> &[WordPair] {
        self.words.get(&typ).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn num_words(&self, typ: StateType) -> usize {
        self.num_words.get(&typ).copied().unwrap_or(0)
    }

    /// Names of the declared states of `typ`
    pub fn state_names(&self, typ: StateType) -> impl Iterator<Item = &str> {
        self.states
            .get(&typ)
            .into_iter()
            .flat_map(|table| table.keys().map(String::as_str))
    }

    pub fn stats(&self) -> &CodewordStats {
        &self.stats
    }

    /// Encode `state` of `typ` as `num_words * data_width` little-endian bits.
    ///
    /// Word `k` holds the data bits of the selected generated word, or zero.
    pub fn encode(&self, typ: StateType, state: &str) -> OtpResult<Vec<u8>> {
        let symbols = self
            .states
            .get(&typ)
            .and_then(|table| table.get(state))
            .ok_or_else(|| OtpError::unknown("life cycle state", format!("{typ}.{state}")))?;
        let pairs = self.words(typ);
        let word_bytes = self.code.data_width() / 8;

        let mut out = Vec::with_capacity(symbols.len() * word_bytes);
        for (k, sel) in symbols.iter().enumerate() {
            let data = match sel {
                WordSel::Zero => 0,
                WordSel::Base | WordSel::Incremental => {
                    let pair = pairs.get(k).ok_or_else(|| {
                        OtpError::Internal(format!("no generated word {k} for {typ}"))
                    })?;
                    let word = if *sel == WordSel::Base {
                        pair.base
                    } else {
                        pair.incremental
                    };
                    self.code.data(word)
                }
            };
            out.extend_from_slice(&data.to_le_bytes()[..word_bytes]);
        }
        Ok(out)
    }

    /// Encode `state` of `typ` parsed from its name.
    pub fn encode_by_name(&self, typ: &str, state: &str) -> OtpResult<Vec<u8>> {
        self.encode(typ.parse()?, state)
    }
}

fn state_table(config: &LifeCycleConfig, typ: StateType) -> Option<&StateTable> {
    match typ {
        StateType::LcState => config.lc_state.as_ref(),
        StateType::LcCnt => config.lc_cnt.as_ref(),
        StateType::SocDbgState => config.soc_dbg_state.as_ref(),
        StateType::OwnershipState => config.ownership_state.as_ref(),
        StateType::AuthState => config.auth_state.as_ref(),
    }
}

fn validate_secded(secded: &SecdedConfig) -> OtpResult<LinearCode> {
    let ctx = "secded";
    let data_width = match &secded.data_width {
        Some(v) => check_int(v, ctx, "data_width")? as usize,
        None => 0,
    };
    let ecc_width = match &secded.ecc_width {
        Some(v) => check_int(v, ctx, "ecc_width")? as usize,
        None => 0,
    };
    let total_width = data_width + ecc_width;

    if data_width % 8 != 0 || data_width == 0 {
        return Err(OtpError::invalid(ctx, "data_width", data_width));
    }
    if data_width > MAX_LC_DATA_WIDTH {
        return Err(OtpError::InvalidConfig(format!(
            "life cycle data width {data_width} exceeds the {MAX_LC_DATA_WIDTH} bits \
             supported by this encoder's exhaustive word search"
        )));
    }
    let rows = secded.ecc_matrix.as_deref().unwrap_or(&[]);
    if ecc_width != rows.len() {
        return Err(OtpError::InvalidConfig(format!(
            "ECC matrix has {} rows, expected {ecc_width}",
            rows.len()
        )));
    }

    let mut matrix = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        debug!("ECC bit {i} fanin: {row:?}");
        let mut fanin = Vec::with_capacity(row.len());
        for entry in row {
            let bit = check_int(entry, ctx, "ecc_matrix")? as usize;
            if bit >= total_width {
                return Err(OtpError::invalid(ctx, format!("ecc_matrix row {i}"), bit));
            }
            fanin.push(bit);
        }
        matrix.push(fanin);
    }
    LinearCode::new(data_width, ecc_width, matrix)
}

fn validate_constraints(config: &LifeCycleConfig, total_width: usize) -> OtpResult<Constraints> {
    let get = |value: &Option<ConfigValue>, field: &str| -> OtpResult<u32> {
        match value {
            Some(v) => Ok(check_int(v, CONTEXT, field)? as u32),
            None => Ok(0),
        }
    };
    let min_hw = get(&config.min_hw, "min_hw")?;
    let max_hw = get(&config.max_hw, "max_hw")?;
    let min_hd = get(&config.min_hd, "min_hd")?;
    let total = total_width as u32;

    if min_hw >= total || max_hw > total || min_hw >= max_hw {
        return Err(OtpError::InvalidConfig(format!(
            "Hamming weight constraints are inconsistent \
             (min_hw {min_hw}, max_hw {max_hw}, codeword width {total})"
        )));
    }
    if max_hw - min_hw + 1 < min_hd {
        return Err(OtpError::InvalidConfig(format!(
            "Hamming distance constraint {min_hd} is inconsistent \
             with weights {min_hw}..={max_hw}"
        )));
    }
    Ok(Constraints {
        min_hw,
        max_hw,
        min_hd,
    })
}

/// All entries of a table must have the same number of words, which is the
/// word count of that state type.
fn validate_state_table(
    typ: StateType,
    table: &StateTable,
) -> OtpResult<(usize, BTreeMap<String, Vec<WordSel>>)> {
    let mut num_words = None;
    let mut parsed = BTreeMap::new();
    for (state, symbols) in table {
        let expected = *num_words.get_or_insert(symbols.len());
        if symbols.len() != expected {
            return Err(OtpError::invalid(
                format!("{typ} entry {state}"),
                "length",
                symbols.len(),
            ));
        }
        let sels = symbols
            .iter()
            .enumerate()
            .map(|(j, symbol)| typ.parse_symbol(symbol, j))
            .collect::<OtpResult<Vec<_>>>()?;
        parsed.insert(state.clone(), sels);
    }
    Ok((num_words.unwrap_or(0), parsed))
}

fn generate_tokens(
    rng: &mut SeededRng,
    unhashed: Vec<(String, HexValue)>,
    token_size: usize,
) -> OtpResult<Vec<Token>> {
    let mut tokens = Vec::with_capacity(2 * unhashed.len());
    let mut hashed = Vec::with_capacity(unhashed.len());
    for (name, mut value) in unhashed {
        if value.resolve(rng, token_size) {
            debug!("Randomized token {name}");
        }
        let raw = value
            .bytes()
            .ok_or_else(|| OtpError::Internal(format!("token {name} unresolved")))?
            .to_vec();
        hashed.push(Token {
            name: format!("{name}Hashed"),
            value: hash_token(&raw),
        });
        tokens.push(Token { name, value: raw });
    }
    tokens.extend(hashed);
    Ok(tokens)
}

fn validate_words(code: &LinearCode, constraints: Constraints, words: &[u128]) -> OtpResult<()> {
    for (k, &w) in words.iter().enumerate() {
        if !code.is_valid(w) {
            return Err(OtpError::Internal(format!(
                "codeword {w:#x} at index {k} is not valid"
            )));
        }
        let weight = w.count_ones();
        if weight < constraints.min_hw || weight > constraints.max_hw {
            return Err(OtpError::Internal(format!(
                "codeword {w:#x} at index {k} has Hamming weight {weight}"
            )));
        }
        for (k2, &w2) in words.iter().enumerate().skip(k + 1) {
            if hamming_distance(w, w2) < constraints.min_hd {
                return Err(OtpError::Internal(format!(
                    "Hamming distance between codeword {w:#x} at index {k} and \
                     codeword {w2:#x} at index {k2} is too low"
                )));
            }
        }
    }
    Ok(())
}
