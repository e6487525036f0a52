// Licensed under the Apache-2.0 license

use otpgen_error::{OtpError, OtpResult};

/// Widest codeword (data plus parity) supported by [`LinearCode`]
pub const MAX_CODEWORD_WIDTH: usize = 128;

/// Hamming distance between two codewords
pub fn hamming_distance(a: u128, b: u128) -> u32 {
    (a ^ b).count_ones()
}

/// Linear error correcting code described by a parity fan-in matrix.
///
/// Codewords are integers. The data word occupies bits `0..data_width` and
/// parity bit `j` is stored at bit `data_width + j`. Row `j` of the matrix
/// lists the codeword bits XORed into parity bit `j`; it may reference data
/// bits and any parity bit computed before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearCode {
    data_width: usize,
    ecc_width: usize,
    matrix: Vec<Vec<usize>>,
    fanin_masks: Vec<u128>,
}

impl LinearCode {
    /// Create a code from its fan-in matrix.
    ///
    /// # Arguments
    ///
    /// * `data_width` - Number of data bits
    /// * `ecc_width` - Number of parity bits; must equal the number of matrix rows
    /// * `matrix` - Fan-in codeword bit indices for each parity bit
    pub fn new(data_width: usize, ecc_width: usize, matrix: Vec<Vec<usize>>) -> OtpResult<Self> {
        if data_width == 0 {
            return Err(OtpError::invalid("secded", "data_width", data_width));
        }
        if matrix.len() != ecc_width {
            return Err(OtpError::InvalidConfig(format!(
                "ECC matrix has {} rows but ecc_width is {ecc_width}",
                matrix.len()
            )));
        }
        if data_width + ecc_width > MAX_CODEWORD_WIDTH {
            return Err(OtpError::InvalidConfig(format!(
                "codeword width {} exceeds {MAX_CODEWORD_WIDTH} bits",
                data_width + ecc_width
            )));
        }

        let mut fanin_masks = Vec::with_capacity(ecc_width);
        for (j, row) in matrix.iter().enumerate() {
            let mut mask = 0u128;
            for &k in row {
                // A parity bit can only depend on bits computed before it.
                if k >= data_width + j {
                    return Err(OtpError::invalid(
                        format!("secded row {j}"),
                        "ecc_matrix",
                        format!("bit position {k} out of bounds"),
                    ));
                }
                mask ^= 1 << k;
            }
            fanin_masks.push(mask);
        }

        Ok(Self {
            data_width,
            ecc_width,
            matrix,
            fanin_masks,
        })
    }

    pub fn data_width(&self) -> usize {
        self.data_width
    }

    pub fn ecc_width(&self) -> usize {
        self.ecc_width
    }

    pub fn matrix(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    /// Total codeword width in bits
    pub fn codeword_width(&self) -> usize {
        self.data_width + self.ecc_width
    }

    /// Codeword width rounded up to whole bytes, in bits
    pub fn padded_width(&self) -> usize {
        self.codeword_width().div_ceil(8) * 8
    }

    /// Mask covering the data portion of a codeword
    pub fn data_mask(&self) -> u128 {
        low_mask(self.data_width)
    }

    /// Mask covering the whole codeword
    pub fn codeword_mask(&self) -> u128 {
        low_mask(self.codeword_width())
    }

    /// Append parity bits to `data`. Bits above `data_width` are ignored.
    pub fn encode(&self, data: u128) -> u128 {
        let mut codeword = data & self.data_mask();
        for (j, mask) in self.fanin_masks.iter().enumerate() {
            let bit = ((codeword & mask).count_ones() & 1) as u128;
            codeword |= bit << (self.data_width + j);
        }
        codeword
    }

    /// Syndrome of `codeword`; bit `j` is set when parity bit `j` mismatches.
    pub fn syndrome(&self, codeword: u128) -> u128 {
        self.fanin_masks
            .iter()
            .enumerate()
            .fold(0u128, |syndrome, (j, mask)| {
                let stored = (codeword >> (self.data_width + j)) & 1;
                let computed = ((codeword & mask).count_ones() & 1) as u128;
                syndrome | ((stored ^ computed) << j)
            })
    }

    /// Whether `codeword` has an all-zero syndrome.
    pub fn is_valid(&self, codeword: u128) -> bool {
        codeword & !self.codeword_mask() == 0 && self.syndrome(codeword) == 0
    }

    /// Data portion of `codeword`
    pub fn data(&self, codeword: u128) -> u128 {
        codeword & self.data_mask()
    }
}

fn low_mask(width: usize) -> u128 {
    if width >= 128 {
        !0
    } else {
        (1u128 << width) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hamming(7,4) arranged as data bits 0..4, parity 4..7.
    fn hamming_7_4() -> LinearCode {
        LinearCode::new(4, 3, vec![vec![0, 1, 3], vec![0, 2, 3], vec![1, 2, 3]]).unwrap()
    }

    /// 16-bit data, 6 parity bits, last row is an overall parity over
    /// everything computed before it.
    fn secded_22_16() -> LinearCode {
        LinearCode::new(
            16,
            6,
            vec![
                vec![0, 1, 3, 4, 6, 8, 10, 11, 13, 15],
                vec![0, 2, 3, 5, 6, 9, 10, 12, 13],
                vec![1, 2, 3, 7, 8, 9, 10, 14, 15],
                vec![4, 5, 6, 7, 8, 9, 10],
                vec![11, 12, 13, 14, 15],
                (0..21).collect(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_encode_hamming() {
        let code = hamming_7_4();
        // data 0b1011: p0 = d0^d1^d3 = 1, p1 = d0^d2^d3 = 0, p2 = d1^d2^d3 = 0
        assert_eq!(code.encode(0b1011), 0b001_1011);
        assert_eq!(code.encode(0), 0);
        assert_eq!(code.encode(0xff), code.encode(0xf));
    }

    #[test]
    fn test_parity_may_reference_earlier_parity() {
        let code = LinearCode::new(2, 2, vec![vec![0, 1], vec![0, 2]]).unwrap();
        // p0 = d0 ^ d1 = 1; p1 = d0 ^ p0 = 0
        assert_eq!(code.encode(0b01), 0b0101);
        // p0 = 0; p1 = d0 ^ p0 = 1
        assert_eq!(code.encode(0b11), 0b1011);
    }

    #[test]
    fn test_all_codewords_valid() {
        let code = secded_22_16();
        for data in (0..=0xffffu128).step_by(7) {
            assert!(code.is_valid(code.encode(data)));
            assert_eq!(code.data(code.encode(data)), data);
        }
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let code = secded_22_16();
        for data in [0u128, 0x1234, 0xffff, 0x8001] {
            let codeword = code.encode(data);
            for bit in 0..code.codeword_width() {
                assert!(!code.is_valid(codeword ^ (1 << bit)), "bit {bit}");
            }
        }
        let code = hamming_7_4();
        for data in 0..16u128 {
            let codeword = code.encode(data);
            for bit in 0..7 {
                assert_ne!(code.syndrome(codeword ^ (1 << bit)), 0);
            }
        }
    }

    #[test]
    fn test_bits_above_codeword_invalid() {
        let code = hamming_7_4();
        assert!(!code.is_valid(1 << 7));
    }

    #[test]
    fn test_widths() {
        let code = secded_22_16();
        assert_eq!(code.codeword_width(), 22);
        assert_eq!(code.padded_width(), 24);
        assert_eq!(code.data_mask(), 0xffff);
    }

    #[test]
    fn test_invalid_matrix() {
        assert!(matches!(
            LinearCode::new(4, 2, vec![vec![0]]),
            Err(OtpError::InvalidConfig(_))
        ));
        // Row 0 may not reference its own parity bit.
        assert!(matches!(
            LinearCode::new(4, 1, vec![vec![4]]),
            Err(OtpError::InvalidValue { .. })
        ));
        assert!(LinearCode::new(120, 9, vec![vec![0]; 9]).is_err());
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(0b1010, 0b0101), 4);
        assert_eq!(hamming_distance(7, 7), 0);
    }
}
