/*++

Licensed under the Apache-2.0 license.

File Name:

   memfile.rs

Abstract:

    File contains the writer and reader of the line oriented OTP memory
    file format: one `@<word index> <hex word> // <annotations>` line per
    ECC protected OTP word.

--*/

use log::debug;
use otpgen_crypto::{BitPermutation, LinearCode};
use otpgen_error::{OtpError, OtpResult};

/// Prefix of the first line of every generated memory file
pub const MEMFILE_HEADER: &str = "// OTP MEM file with layout :";

/// Annotation of bytes that no item covers
pub const UNALLOCATED: &str = "unallocated";

/// Render `data` as a memory file.
///
/// Every `data_width` bit word is ECC encoded, zero padded to whole bytes
/// and permuted with `perm` before it is written out. `annotations` holds
/// one entry per byte of `data`.
pub fn render_memfile(
    data: &[u8],
    annotations: &[String],
    code: &LinearCode,
    perm: &BitPermutation,
) -> OtpResult<String> {
    let bytes_per_word = code.data_width() / 8;
    let bitness = code.padded_width();
    if code.data_width() % 8 != 0 || data.len() % bytes_per_word != 0 {
        return Err(OtpError::Misaligned {
            what: "memory file data".into(),
            value: data.len(),
            alignment: bytes_per_word,
        });
    }
    if annotations.len() != data.len() {
        return Err(OtpError::Internal(format!(
            "{} annotations for {} bytes",
            annotations.len(),
            data.len()
        )));
    }
    if perm.width() != bitness {
        return Err(OtpError::InvalidPermutation(format!(
            "permutation width {} does not match the {bitness} bit word",
            perm.width()
        )));
    }

    let num_words = data.len() / bytes_per_word;
    let digits = bitness / 4;
    let layout = format!("{num_words} x {bitness}bit");
    debug!("Memory layout (with ECC) : {layout}");

    let mut lines = Vec::with_capacity(num_words + 1);
    lines.push(format!("{MEMFILE_HEADER} {layout} "));
    for (index, (word, notes)) in data
        .chunks_exact(bytes_per_word)
        .zip(annotations.chunks_exact(bytes_per_word))
        .enumerate()
    {
        let value = word
            .iter()
            .rev()
            .fold(0u128, |acc, &b| (acc << 8) | b as u128);
        let encoded = perm.apply(code.encode(value));

        let mut unique: Vec<&str> = Vec::with_capacity(notes.len());
        for note in notes {
            if !unique.contains(&note.as_str()) {
                unique.push(note);
            }
        }
        lines.push(format!(
            "@{index:06x} {encoded:0digits$x} // {}",
            unique.join(", ")
        ));
    }
    Ok(lines.join("\n"))
}

/// One word of a parsed memory file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemWord {
    /// Word index
    pub address: usize,

    /// Codeword with the bit permutation undone
    pub raw: u128,

    pub annotations: Vec<String>,
}

/// A parsed memory file
#[derive(Debug, Clone, Default)]
pub struct MemFile {
    words: Vec<MemWord>,
}

impl MemFile {
    /// Parse memory file text. Comment lines and blank lines are skipped.
    ///
    /// # Arguments
    ///
    /// * `text` - Memory file contents
    /// * `perm` - Bit permutation applied when the file was written, if any
    pub fn parse(text: &str, perm: Option<&BitPermutation>) -> OtpResult<Self> {
        let mut words = Vec::new();
        for (num, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let context = format!("memory file line {}", num + 1);
            let (body, comment) = match line.split_once("//") {
                Some((body, comment)) => (body, comment.trim()),
                None => (line, ""),
            };

            let mut fields = body.split_whitespace();
            let (Some(addr), Some(value), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(OtpError::invalid(context, "line", line));
            };
            let address = addr
                .strip_prefix('@')
                .and_then(|a| usize::from_str_radix(a, 16).ok())
                .ok_or_else(|| OtpError::invalid(&context, "address", addr))?;
            let mut raw = u128::from_str_radix(value, 16)
                .map_err(|_| OtpError::invalid(&context, "value", value))?;

            if let Some(perm) = perm {
                if perm.width() < 128 && raw >> perm.width() != 0 {
                    return Err(OtpError::ValueOverflow {
                        what: context,
                        bits: perm.width(),
                    });
                }
                raw = perm.invert(raw);
            }

            let annotations = if comment.is_empty() {
                Vec::new()
            } else {
                comment.split(", ").map(str::to_string).collect()
            };
            words.push(MemWord {
                address,
                raw,
                annotations,
            });
        }
        Ok(Self { words })
    }

    pub fn words(&self) -> &[MemWord] {
        &self.words
    }

    /// Check every word against `code`.
    pub fn check_ecc(&self, code: &LinearCode) -> OtpResult<()> {
        match self.words.iter().find(|w| !code.is_valid(w.raw)) {
            Some(word) => Err(OtpError::invalid(
                format!("memory file word @{:06x}", word.address),
                "ecc",
                format!("{:x}", word.raw),
            )),
            None => Ok(()),
        }
    }

    /// Data bits of the words annotated with `<partition>: <item>`
    pub fn item_data(&self, partition: &str, item: &str, data_width: usize) -> Vec<u128> {
        let annotation = format!("{partition}: {item}");
        self.select(data_width, |note| note == annotation)
    }

    /// Data bits of the words annotated with any item of `partition`
    pub fn partition_data(&self, partition: &str, data_width: usize) -> Vec<u128> {
        let prefix = format!("{partition}: ");
        self.select(data_width, |note| note.starts_with(&prefix))
    }

    fn select(&self, data_width: usize, matches: impl Fn(&str) -> bool) -> Vec<u128> {
        let mask = if data_width >= 128 {
            u128::MAX
        } else {
            (1u128 << data_width) - 1
        };
        self.words
            .iter()
            .filter(|w| w.annotations.iter().any(|n| matches(n)))
            .map(|w| w.raw & mask)
            .collect()
    }
}

/// Concatenate `word_bits` wide words, least significant first, into
/// `block_bits` wide blocks. A trailing partial block is dropped.
pub fn pack_words(words: &[u128], word_bits: usize, block_bits: usize) -> Vec<u128> {
    if word_bits == 0 || block_bits % word_bits != 0 {
        return Vec::new();
    }
    words
        .chunks_exact(block_bits / word_bits)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u128, |acc, (i, &w)| acc | (w << (i * word_bits)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> LinearCode {
        let matrix = vec![
            vec![0, 1, 3, 4, 6],
            vec![0, 2, 3, 5, 6],
            vec![1, 2, 3, 7],
            vec![4, 5, 6, 7],
        ];
        LinearCode::new(8, 4, matrix).unwrap()
    }

    fn notes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render() {
        let code = code();
        let perm = BitPermutation::identity(16);
        let text = render_memfile(
            &[0x00, 0x5a],
            &notes(&["A: X", "unallocated"]),
            &code,
            &perm,
        )
        .unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "// OTP MEM file with layout : 2 x 16bit ");
        assert_eq!(lines[1], "@000000 0000 // A: X");
        assert_eq!(
            lines[2],
            format!("@000001 {:04x} // unallocated", code.encode(0x5a))
        );
    }

    #[test]
    fn test_render_dedups_annotations() {
        let code = LinearCode::new(16, 2, vec![vec![0, 2, 4], vec![1, 3, 5]]).unwrap();
        let perm = BitPermutation::identity(24);
        let text = render_memfile(
            &[1, 2, 3, 4],
            &notes(&["P: B", "P: A", "P: A", "P: B"]),
            &code,
            &perm,
        )
        .unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[1].ends_with("// P: B, P: A"));
        assert!(lines[2].ends_with("// P: A, P: B"));
        // 24 bit words print as six digits.
        assert_eq!(lines[1].split(' ').nth(1).map(str::len), Some(6));
    }

    #[test]
    fn test_render_errors() {
        let code = LinearCode::new(16, 2, vec![vec![0], vec![1]]).unwrap();
        let perm = BitPermutation::identity(24);
        assert!(matches!(
            render_memfile(&[1, 2, 3], &notes(&["a", "b", "c"]), &code, &perm),
            Err(OtpError::Misaligned { .. })
        ));
        assert!(matches!(
            render_memfile(&[1, 2], &notes(&["a", "b"]), &code, &BitPermutation::identity(18)),
            Err(OtpError::InvalidPermutation(_))
        ));
    }

    #[test]
    fn test_parse_round_trip() {
        let code = LinearCode::new(16, 6, vec![
            vec![0, 1, 3, 4, 6, 8, 10, 11, 13, 15],
            vec![0, 2, 3, 5, 6, 9, 10, 12, 13],
            vec![1, 2, 3, 7, 8, 9, 10, 14, 15],
            vec![4, 5, 6, 7, 8, 9, 10],
            vec![11, 12, 13, 14, 15],
            (0..21).collect(),
        ])
        .unwrap();
        let perm: Vec<usize> = (8..24).chain(0..8).collect();
        let perm = BitPermutation::new(perm, 24).unwrap();
        let data = [0x34, 0x12, 0xff, 0x00, 0x00, 0x00];
        let annotations = notes(&["A: FOO", "A: FOO", "A: BAR", "A: BAR", "B: X", "B: X"]);
        let text = render_memfile(&data, &annotations, &code, &perm).unwrap();

        let memfile = MemFile::parse(&text, Some(&perm)).unwrap();
        memfile.check_ecc(&code).unwrap();
        assert_eq!(memfile.words().len(), 3);
        assert_eq!(memfile.words()[2].address, 2);
        assert_eq!(memfile.item_data("A", "FOO", 16), vec![0x1234]);
        assert_eq!(memfile.partition_data("A", 16), vec![0x1234, 0x00ff]);
        assert!(memfile.item_data("C", "FOO", 16).is_empty());

        // Without undoing the permutation the words no longer decode.
        let scrambled = MemFile::parse(&text, None).unwrap();
        assert!(scrambled.check_ecc(&code).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(MemFile::parse("@000000", None).is_err());
        assert!(MemFile::parse("000000 1234", None).is_err());
        assert!(MemFile::parse("@00000g 1234", None).is_err());
        assert!(MemFile::parse("@000000 12x4", None).is_err());
        assert!(MemFile::parse("@000000 1234 5678", None).is_err());
        let perm = BitPermutation::identity(8);
        assert!(matches!(
            MemFile::parse("@000000 1ff", Some(&perm)),
            Err(OtpError::ValueOverflow { bits: 8, .. })
        ));
        let memfile = MemFile::parse("// header\n\n@000001 ab\n", Some(&perm)).unwrap();
        assert_eq!(memfile.words()[0].raw, 0xab);
        assert!(memfile.words()[0].annotations.is_empty());
    }

    #[test]
    fn test_pack_words() {
        let words = [0x1111, 0x2222, 0x3333, 0x4444, 0x5555];
        assert_eq!(
            pack_words(&words, 16, 32),
            vec![0x2222_1111, 0x4444_3333]
        );
        assert_eq!(pack_words(&words, 16, 64), vec![0x4444_3333_2222_1111]);
        assert!(pack_words(&words, 16, 24).is_empty());
    }
}
