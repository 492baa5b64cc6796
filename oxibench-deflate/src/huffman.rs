//! Canonical Huffman coding.
//!
//! This module builds optimal prefix codes from symbol frequencies, assigns
//! canonical code values from code lengths alone, and decodes symbols with a
//! table-driven decoder. It is shared by the Deflate codec and the wavelet
//! coefficient coder.
//!
//! # Canonical codes
//!
//! Codes are assigned in order of (length ascending, symbol ascending), so
//! the per-symbol length table is all a decoder needs to rebuild them. Codes
//! are emitted MSB-first into the LSB-first bit stream, which means every
//! code value is stored bit-reversed.
//!
//! # Alphabets used by the Deflate codec
//!
//! - **Literal/Length**: 0-285 (0-255 literals, 256 EOB, 257-285 lengths)
//! - **Distance**: 0-29 (back-reference distances)

use crate::tables::CODE_LENGTH_ORDER;
use oxibench_core::error::{OxiBenchError, Result};
use oxibench_core::{BitReader, BitWriter};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Maximum code length (15 bits).
pub const MAX_CODE_LENGTH: usize = 15;

/// Size of the literal/length alphabet (0-285).
pub const LITLEN_ALPHABET_SIZE: usize = 286;

/// Size of the distance alphabet (0-29).
pub const DISTANCE_ALPHABET_SIZE: usize = 30;

/// End of block symbol.
pub const END_OF_BLOCK: u16 = 256;

/// Reverse the low `length` bits of `code`.
#[inline]
pub fn reverse_bits(mut code: u32, length: u8) -> u32 {
    let mut reversed = 0u32;
    for _ in 0..length {
        reversed = (reversed << 1) | (code & 1);
        code >>= 1;
    }
    reversed
}

/// Count codes of each length, rejecting lengths above the maximum.
fn count_lengths(code_lengths: &[u8]) -> Result<[u32; MAX_CODE_LENGTH + 1]> {
    let mut bl_count = [0u32; MAX_CODE_LENGTH + 1];
    for &len in code_lengths {
        if len as usize > MAX_CODE_LENGTH {
            return Err(OxiBenchError::invalid_code(
                0,
                format!("code length {} exceeds maximum {}", len, MAX_CODE_LENGTH),
            ));
        }
        if len > 0 {
            bl_count[len as usize] += 1;
        }
    }

    // Kraft check: sum of 2^(MAX - len) must not exceed 2^MAX
    let kraft: u64 = (1..=MAX_CODE_LENGTH)
        .map(|len| (bl_count[len] as u64) << (MAX_CODE_LENGTH - len))
        .sum();
    if kraft > 1u64 << MAX_CODE_LENGTH {
        return Err(OxiBenchError::invalid_code(0, "over-subscribed Huffman code"));
    }

    Ok(bl_count)
}

/// First canonical code for each length.
fn first_codes(bl_count: &[u32; MAX_CODE_LENGTH + 1]) -> [u32; MAX_CODE_LENGTH + 1] {
    let mut next_code = [0u32; MAX_CODE_LENGTH + 1];
    let mut code = 0u32;
    for bits in 1..=MAX_CODE_LENGTH {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }
    next_code
}

/// A canonical Huffman code for encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanCode {
    /// Code length per symbol (0 = unused).
    lengths: Vec<u8>,
    /// Bit-reversed code per symbol, ready for LSB-first output.
    codes: Vec<u32>,
}

impl HuffmanCode {
    /// Assign canonical codes from a length table.
    ///
    /// Fails with `InvalidCode` when a length exceeds [`MAX_CODE_LENGTH`] or
    /// the lengths over-subscribe the code space.
    pub fn from_lengths(code_lengths: &[u8]) -> Result<Self> {
        let bl_count = count_lengths(code_lengths)?;
        let mut next_code = first_codes(&bl_count);

        let mut codes = vec![0u32; code_lengths.len()];
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len > 0 {
                codes[symbol] = reverse_bits(next_code[len as usize], len);
                next_code[len as usize] += 1;
            }
        }

        Ok(Self {
            lengths: code_lengths.to_vec(),
            codes,
        })
    }

    /// Build an optimal length-limited code for the given frequencies.
    pub fn from_frequencies(frequencies: &[u32], max_length: u8) -> Result<Self> {
        let mut builder = HuffmanBuilder::new(frequencies.len(), max_length);
        for (symbol, &freq) in frequencies.iter().enumerate() {
            builder.add_count(symbol as u16, freq);
        }
        Self::from_lengths(&builder.build_lengths())
    }

    /// Code length per symbol.
    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }

    /// Code length of `symbol` (0 when unused).
    pub fn length(&self, symbol: u16) -> u8 {
        self.lengths.get(symbol as usize).copied().unwrap_or(0)
    }

    /// Canonical (MSB-first) code value of `symbol`.
    pub fn canonical_code(&self, symbol: u16) -> Option<u32> {
        let len = self.length(symbol);
        (len > 0).then(|| reverse_bits(self.codes[symbol as usize], len))
    }

    /// Number of symbols with a code.
    pub fn used_symbols(&self) -> usize {
        self.lengths.iter().filter(|&&l| l > 0).count()
    }

    /// Write the code for `symbol`.
    #[inline]
    pub fn encode_symbol(&self, writer: &mut BitWriter, symbol: u16) -> Result<()> {
        let len = self.length(symbol);
        if len == 0 {
            return Err(OxiBenchError::invalid_parameter(
                "symbol",
                format!("symbol {} has no code", symbol),
            ));
        }
        writer.write_bits(self.codes[symbol as usize], len);
        Ok(())
    }

    /// Encode a symbol sequence, returning the bytes and the exact bit count.
    pub fn encode(&self, symbols: &[u16]) -> Result<(Vec<u8>, u64)> {
        let mut writer = BitWriter::new();
        for &symbol in symbols {
            self.encode_symbol(&mut writer, symbol)?;
        }
        let bits = writer.bits_written();
        Ok((writer.finish(), bits))
    }

    /// Total bits needed to code symbols with the given frequencies.
    pub fn cost(&self, frequencies: &[u32]) -> u64 {
        frequencies
            .iter()
            .zip(&self.lengths)
            .map(|(&f, &l)| f as u64 * l as u64)
            .sum()
    }
}

/// A Huffman decoder.
///
/// This uses a table-based approach for fast decoding. For codes up to
/// `FAST_BITS` length, we use a direct lookup table. For longer codes, and
/// near the end of the stream, we fall back to walking the canonical code
/// one bit at a time.
#[derive(Debug, Clone)]
pub struct HuffmanDecoder {
    /// Direct lookup table: (symbol, code_length); length 0 means "slow path".
    fast_table: Vec<(u16, u8)>,
    /// Number of bits for fast lookup.
    fast_bits: u8,
    /// Maximum code length in this code.
    max_code_length: u8,
    /// Symbols sorted by (length, symbol).
    symbols: Vec<u16>,
    /// First canonical code of each length.
    base_codes: [u32; MAX_CODE_LENGTH + 1],
    /// Index into `symbols` of the first symbol of each length.
    symbol_offsets: [u16; MAX_CODE_LENGTH + 1],
    /// Number of codes of each length.
    counts: [u32; MAX_CODE_LENGTH + 1],
}

impl HuffmanDecoder {
    /// Number of bits for fast lookup table.
    const FAST_BITS: u8 = 9;

    /// Build a decoder from code lengths.
    ///
    /// An all-zero table is accepted; decoding from it fails with
    /// `InvalidCode`.
    pub fn from_lengths(code_lengths: &[u8]) -> Result<Self> {
        let bl_count = count_lengths(code_lengths)?;
        let max_length = code_lengths.iter().copied().max().unwrap_or(0);
        let base_codes = first_codes(&bl_count);

        let mut symbol_offsets = [0u16; MAX_CODE_LENGTH + 1];
        let mut offset = 0u16;
        for bits in 1..=MAX_CODE_LENGTH {
            symbol_offsets[bits] = offset;
            offset += bl_count[bits] as u16;
        }

        let mut symbols = vec![0u16; offset as usize];
        let mut fill = symbol_offsets;
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len > 0 {
                symbols[fill[len as usize] as usize] = symbol as u16;
                fill[len as usize] += 1;
            }
        }

        let fast_bits = Self::FAST_BITS.min(max_length.max(1));
        let fast_table_size = 1usize << fast_bits;
        let mut fast_table = vec![(0u16, 0u8); fast_table_size];
        let mut next_code = base_codes;
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let code = next_code[len as usize];
            next_code[len as usize] += 1;
            if len > fast_bits {
                continue;
            }

            // Fill all entries that start with this code
            let reversed = reverse_bits(code, len) as usize;
            for i in 0..1usize << (fast_bits - len) {
                fast_table[reversed | (i << len)] = (symbol as u16, len);
            }
        }

        Ok(Self {
            fast_table,
            fast_bits,
            max_code_length: max_length,
            symbols,
            base_codes,
            symbol_offsets,
            counts: bl_count,
        })
    }

    /// Maximum code length.
    pub fn max_code_length(&self) -> u8 {
        self.max_code_length
    }

    /// Decode one symbol.
    #[inline]
    pub fn decode_symbol(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        if self.max_code_length == 0 {
            return Err(OxiBenchError::invalid_code(
                reader.bit_position(),
                "empty Huffman code",
            ));
        }

        // Not enough bits left for a full lookup: take the slow path
        match reader.peek_bits(self.fast_bits) {
            Ok(bits) => {
                let (symbol, len) = self.fast_table[bits as usize];
                if len > 0 {
                    reader.skip_bits(len)?;
                    return Ok(symbol);
                }
                self.decode_slow(reader)
            }
            Err(_) => self.decode_slow(reader),
        }
    }

    /// Walk the canonical code one bit at a time.
    fn decode_slow(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        let start = reader.bit_position();
        let mut code = 0u32;

        for len in 1..=self.max_code_length as usize {
            code = (code << 1) | reader.read_bits(1)?;

            let count = self.counts[len];
            if count > 0 && code >= self.base_codes[len] && code - self.base_codes[len] < count {
                let idx = self.symbol_offsets[len] as usize + (code - self.base_codes[len]) as usize;
                return Ok(self.symbols[idx]);
            }
        }

        Err(OxiBenchError::invalid_code(start, "unassigned Huffman code"))
    }

    /// Decode exactly `count` symbols.
    pub fn decode(&self, reader: &mut BitReader<'_>, count: usize) -> Result<Vec<u16>> {
        let mut out = Vec::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            out.push(self.decode_symbol(reader)?);
        }
        Ok(out)
    }
}

/// Builder for creating Huffman code lengths from frequencies.
#[derive(Debug)]
pub struct HuffmanBuilder {
    frequencies: Vec<u32>,
    max_length: u8,
}

impl HuffmanBuilder {
    /// Create a new Huffman builder.
    pub fn new(alphabet_size: usize, max_length: u8) -> Self {
        Self {
            frequencies: vec![0; alphabet_size],
            max_length: max_length.clamp(1, MAX_CODE_LENGTH as u8),
        }
    }

    /// Add a symbol occurrence.
    pub fn add(&mut self, symbol: u16) {
        self.add_count(symbol, 1);
    }

    /// Add multiple occurrences of a symbol.
    pub fn add_count(&mut self, symbol: u16, count: u32) {
        if let Some(freq) = self.frequencies.get_mut(symbol as usize) {
            *freq = freq.saturating_add(count);
        }
    }

    /// Accumulated frequencies.
    pub fn frequencies(&self) -> &[u32] {
        &self.frequencies
    }

    /// Build code lengths from frequencies.
    ///
    /// Returns an array where `result[i]` is the code length for symbol `i`.
    /// Unused symbols get length 0; a lone symbol gets a 1-bit code.
    pub fn build_lengths(&self) -> Vec<u8> {
        let mut lengths = vec![0u8; self.frequencies.len()];

        let used: Vec<usize> = self
            .frequencies
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f > 0)
            .map(|(i, _)| i)
            .collect();

        match used.len() {
            0 => return lengths,
            1 => {
                lengths[used[0]] = 1;
                return lengths;
            }
            _ => {}
        }

        let depths = self.merge_tree(&used);
        for (&symbol, &depth) in used.iter().zip(&depths) {
            lengths[symbol] = depth.min(u8::MAX as usize) as u8;
        }

        if depths.iter().any(|&d| d > self.max_length as usize) {
            self.limit_lengths(&mut lengths);
        }

        lengths
    }

    /// Build the merge tree and return the leaf depth of each used symbol.
    ///
    /// The two lightest nodes are merged first; equal weights are broken by
    /// creation order (leaves by symbol, then internal nodes as created).
    fn merge_tree(&self, used: &[usize]) -> Vec<usize> {
        let leaves = used.len();
        let mut parent = vec![usize::MAX; 2 * leaves - 1];
        let mut heap: BinaryHeap<Reverse<(u64, usize)>> = used
            .iter()
            .enumerate()
            .map(|(node, &symbol)| Reverse((self.frequencies[symbol] as u64, node)))
            .collect();

        let mut next = leaves;
        while heap.len() > 1 {
            let (Some(Reverse((w1, a))), Some(Reverse((w2, b)))) = (heap.pop(), heap.pop()) else {
                break;
            };
            parent[a] = next;
            parent[b] = next;
            heap.push(Reverse((w1 + w2, next)));
            next += 1;
        }

        // Parents are always created after their children, so one reverse
        // pass over the internal nodes settles every depth.
        let mut depth = vec![0usize; 2 * leaves - 1];
        for node in (0..2 * leaves - 2).rev() {
            depth[node] = depth[parent[node]] + 1;
        }
        depth.truncate(leaves);
        depth
    }

    /// Clamp lengths to `max_length` and restore the Kraft inequality.
    ///
    /// While the code is over-subscribed, the least frequent of the longest
    /// codes still below the limit is lengthened by one bit.
    fn limit_lengths(&self, lengths: &mut [u8]) {
        let max_len = self.max_length;
        for len in lengths.iter_mut() {
            if *len > max_len {
                *len = max_len;
            }
        }

        let budget = 1u64 << max_len;
        let mut kraft: u64 = lengths
            .iter()
            .filter(|&&l| l > 0)
            .map(|&l| 1u64 << (max_len - l))
            .sum();

        while kraft > budget {
            let candidate = lengths
                .iter()
                .enumerate()
                .filter(|&(_, &l)| l > 0 && l < max_len)
                .max_by(|&(a, &la), &(b, &lb)| {
                    la.cmp(&lb)
                        .then(self.frequencies[b].cmp(&self.frequencies[a]))
                        .then(a.cmp(&b))
                })
                .map(|(i, _)| i);

            let Some(i) = candidate else {
                break;
            };
            kraft -= 1u64 << (max_len - lengths[i] - 1);
            lengths[i] += 1;
        }
    }
}

/// Size of the code-length alphabet (0-15 lengths, 16-18 run codes).
pub const CODELEN_ALPHABET_SIZE: usize = 19;

/// Longest code in the code-length alphabet.
const MAX_CODELEN_CODE_LENGTH: u8 = 7;

/// Run-length encode code lengths.
///
/// Returns `(symbol, extra_value, extra_bits)` tuples and symbol frequencies.
/// Symbol 16 repeats the previous length 3-6 times, 17 codes 3-10 zeros and
/// 18 codes 11-138 zeros.
fn rle_encode_lengths(lengths: &[u8]) -> (Vec<(u8, u8, u8)>, [u32; CODELEN_ALPHABET_SIZE]) {
    let mut symbols = Vec::new();
    let mut freqs = [0u32; CODELEN_ALPHABET_SIZE];
    let mut i = 0;

    while i < lengths.len() {
        let len = lengths[i];
        let run = lengths[i..].iter().take_while(|&&l| l == len).count();
        let mut count = run;

        if len == 0 {
            while count > 0 {
                if count >= 11 {
                    let n = count.min(138);
                    symbols.push((18, (n - 11) as u8, 7));
                    freqs[18] += 1;
                    count -= n;
                } else if count >= 3 {
                    let n = count.min(10);
                    symbols.push((17, (n - 3) as u8, 3));
                    freqs[17] += 1;
                    count -= n;
                } else {
                    symbols.push((0, 0, 0));
                    freqs[0] += 1;
                    count -= 1;
                }
            }
        } else {
            // First occurrence, then repeats with symbol 16
            symbols.push((len, 0, 0));
            freqs[len as usize] += 1;
            count -= 1;

            while count > 0 {
                if count >= 3 {
                    let n = count.min(6);
                    symbols.push((16, (n - 3) as u8, 2));
                    freqs[16] += 1;
                    count -= n;
                } else {
                    symbols.push((len, 0, 0));
                    freqs[len as usize] += 1;
                    count -= 1;
                }
            }
        }

        i += run;
    }

    (symbols, freqs)
}

/// Write a code-length table.
///
/// Layout: 4 bits `hclen - 4`, then `hclen` 3-bit lengths of the
/// code-length code in [`CODE_LENGTH_ORDER`], then the run-length coded
/// lengths. The reader must know `lengths.len()`.
pub fn write_code_lengths(writer: &mut BitWriter, lengths: &[u8]) -> Result<()> {
    let (symbols, freqs) = rle_encode_lengths(lengths);
    let codelen = HuffmanCode::from_frequencies(&freqs, MAX_CODELEN_CODE_LENGTH)?;

    let hclen = CODE_LENGTH_ORDER
        .iter()
        .rposition(|&sym| codelen.length(sym as u16) > 0)
        .map_or(4, |last| (last + 1).max(4));

    writer.write_bits((hclen - 4) as u32, 4);
    for &sym in &CODE_LENGTH_ORDER[..hclen] {
        writer.write_bits(codelen.length(sym as u16) as u32, 3);
    }

    for &(sym, extra, extra_bits) in &symbols {
        codelen.encode_symbol(writer, sym as u16)?;
        writer.write_bits(extra as u32, extra_bits);
    }

    Ok(())
}

/// Read a code-length table of exactly `count` entries.
pub fn read_code_lengths(reader: &mut BitReader<'_>, count: usize) -> Result<Vec<u8>> {
    let hclen = reader.read_bits(4)? as usize + 4;
    if hclen > CODELEN_ALPHABET_SIZE {
        return Err(OxiBenchError::invalid_code(
            reader.bit_position(),
            format!("{} code-length codes", hclen),
        ));
    }

    let mut codelen_lengths = [0u8; CODELEN_ALPHABET_SIZE];
    for &sym in &CODE_LENGTH_ORDER[..hclen] {
        codelen_lengths[sym] = reader.read_bits(3)? as u8;
    }
    let decoder = HuffmanDecoder::from_lengths(&codelen_lengths)?;

    let mut lengths = Vec::with_capacity(count);
    while lengths.len() < count {
        let position = reader.bit_position();
        let sym = decoder.decode_symbol(reader)?;
        let (value, repeat) = match sym {
            0..=15 => (sym as u8, 1),
            16 => {
                let Some(&prev) = lengths.last() else {
                    return Err(OxiBenchError::invalid_code(position, "repeat with no previous length"));
                };
                (prev, 3 + reader.read_bits(2)? as usize)
            }
            17 => (0, 3 + reader.read_bits(3)? as usize),
            _ => (0, 11 + reader.read_bits(7)? as usize),
        };

        if lengths.len() + repeat > count {
            return Err(OxiBenchError::invalid_code(
                position,
                format!("code lengths overrun table of {}", count),
            ));
        }
        lengths.extend(std::iter::repeat_n(value, repeat));
    }

    Ok(lengths)
}
