//! Entropy coding of quantized subbands.
//!
//! Each quantized coefficient becomes one symbol plus raw extra bits:
//!
//! | symbol   | meaning                         | extra bits                    |
//! |----------|---------------------------------|-------------------------------|
//! | 0        | a single zero                   | none                          |
//! | 1..=24   | magnitude category `c`          | sign, then `c - 1` mantissa   |
//! | 25..=48  | run of `r` zeros, `2^k ≤ r < 2^(k+1)`, `k = symbol - 24` | `k` bits of `r - 2^k` |
//!
//! A value `v ≠ 0` has category `c = bit_length(|v|)`; the mantissa is
//! `|v| - 2^(c-1)`. Runs never cross subbands.
//!
//! The approximation subband gets its own Huffman table, and each detail
//! level gets one table shared by its three orientations, because coefficient
//! statistics differ far more between levels than between orientations.
//!
//! # Stream layout
//!
//! ```text
//! stream   := subband_count:u16le  (width:u32le height:u32le) * subband_count
//!             table_len:u32le  tables[table_len]
//!             payload_len:u32le  payload[payload_len]
//! tables   := one code-length table per subband group (see huffman)
//! payload  := symbols + extra bits of every subband, in order
//! ```

use crate::quant::MAX_QUANTIZED;
use log::debug;
use oxibench_core::error::{OxiBenchError, Result};
use oxibench_core::{BitReader, BitWriter, ByteReader};
use oxibench_deflate::huffman::{
    HuffmanCode, HuffmanDecoder, MAX_CODE_LENGTH, read_code_lengths, write_code_lengths,
};

/// Symbol for a single zero coefficient.
pub const ZERO_SYMBOL: u16 = 0;

/// Largest magnitude category.
pub const MAX_CATEGORY: u8 = 24;

/// First zero-run symbol.
pub const RUN_BASE: u16 = MAX_CATEGORY as u16 + 1;

/// Largest zero-run class `k`.
pub const MAX_RUN_CLASS: u8 = 24;

/// Longest run one symbol can carry.
pub const MAX_RUN: usize = (1 << (MAX_RUN_CLASS as usize + 1)) - 1;

/// Number of coefficient symbols.
pub const ALPHABET_SIZE: usize = RUN_BASE as usize + MAX_RUN_CLASS as usize;

/// Cap on up-front allocation while decoding untrusted shapes.
const MAX_PREALLOC: usize = 1 << 20;

/// One quantized subband.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subband {
    /// Width in coefficients.
    pub width: usize,
    /// Height in coefficients.
    pub height: usize,
    /// Row-major values.
    pub values: Vec<i32>,
}

impl Subband {
    /// Wrap row-major values.
    pub fn new(width: usize, height: usize, values: Vec<i32>) -> Self {
        Self {
            width,
            height,
            values,
        }
    }
}

/// A symbol together with its raw extra bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token {
    symbol: u16,
    extra: u32,
    extra_bits: u8,
}

impl Token {
    const ZERO: Token = Token {
        symbol: ZERO_SYMBOL,
        extra: 0,
        extra_bits: 0,
    };

    fn value(v: i32) -> Token {
        let magnitude = v.unsigned_abs();
        let category = (32 - magnitude.leading_zeros()) as u8;
        let mantissa = magnitude - (1 << (category - 1));
        Token {
            symbol: category as u16,
            extra: u32::from(v < 0) | (mantissa << 1),
            extra_bits: category,
        }
    }

    /// Run of `run` zeros, `2 <= run <= MAX_RUN`.
    fn run(run: usize) -> Token {
        let class = run.ilog2() as u8;
        Token {
            symbol: RUN_BASE + class as u16 - 1,
            extra: (run - (1 << class)) as u32,
            extra_bits: class,
        }
    }
}

/// Append the tokens for a run of zeros.
fn push_zero_run(tokens: &mut Vec<Token>, mut run: usize) {
    while run >= 2 {
        let chunk = run.min(MAX_RUN);
        tokens.push(Token::run(chunk));
        run -= chunk;
    }
    if run == 1 {
        tokens.push(Token::ZERO);
    }
}

/// Turn a subband into tokens.
fn tokenize(values: &[i32]) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(values.len() / 2 + 1);
    let mut zeros = 0usize;

    for &v in values {
        if v == 0 {
            zeros += 1;
            continue;
        }
        push_zero_run(&mut tokens, zeros);
        zeros = 0;
        tokens.push(Token::value(v));
    }
    push_zero_run(&mut tokens, zeros);

    tokens
}

/// Huffman table used by subband `index`.
#[inline]
fn table_index(index: usize) -> usize {
    if index == 0 { 0 } else { 1 + (index - 1) / 3 }
}

/// Number of tables for `subband_count` subbands.
fn table_count(subband_count: usize) -> usize {
    table_index(subband_count - 1) + 1
}

fn check_subband_count(count: usize, bit_position: u64) -> Result<()> {
    if count == 0 || (count - 1) % 3 != 0 {
        return Err(OxiBenchError::invalid_code(
            bit_position,
            format!("{} subbands is not 1 + 3 per level", count),
        ));
    }
    Ok(())
}

/// Encode subbands (approximation first, then three per level).
pub fn encode_subbands(subbands: &[Subband]) -> Result<Vec<u8>> {
    let count = u16::try_from(subbands.len())
        .map_err(|_| OxiBenchError::invalid_parameter("subbands", "too many subbands"))?;
    if subbands.is_empty() || (subbands.len() - 1) % 3 != 0 {
        return Err(OxiBenchError::invalid_parameter(
            "subbands",
            format!("{} subbands is not 1 + 3 per level", subbands.len()),
        ));
    }

    let mut output = Vec::new();
    output.extend_from_slice(&count.to_le_bytes());

    let mut tokens = Vec::with_capacity(subbands.len());
    let mut frequencies = vec![[0u32; ALPHABET_SIZE]; table_count(subbands.len())];
    for (i, band) in subbands.iter().enumerate() {
        if band.width == 0 || band.height == 0 || band.values.len() != band.width * band.height {
            return Err(OxiBenchError::invalid_parameter(
                "subbands",
                format!(
                    "subband {} is {}x{} with {} values",
                    i,
                    band.width,
                    band.height,
                    band.values.len()
                ),
            ));
        }
        if band.values.iter().any(|v| v.unsigned_abs() > MAX_QUANTIZED as u32) {
            return Err(OxiBenchError::invalid_parameter(
                "subbands",
                format!("subband {} holds a value beyond ±{}", i, MAX_QUANTIZED),
            ));
        }
        let width = u32::try_from(band.width)
            .map_err(|_| OxiBenchError::invalid_parameter("subbands", "width exceeds u32"))?;
        let height = u32::try_from(band.height)
            .map_err(|_| OxiBenchError::invalid_parameter("subbands", "height exceeds u32"))?;
        output.extend_from_slice(&width.to_le_bytes());
        output.extend_from_slice(&height.to_le_bytes());

        let band_tokens = tokenize(&band.values);
        let freqs = &mut frequencies[table_index(i)];
        for token in &band_tokens {
            freqs[token.symbol as usize] += 1;
        }
        tokens.push(band_tokens);
    }

    let codes = frequencies
        .iter()
        .map(|freqs| HuffmanCode::from_frequencies(freqs, MAX_CODE_LENGTH as u8))
        .collect::<Result<Vec<_>>>()?;

    let mut table_writer = BitWriter::new();
    for code in &codes {
        write_code_lengths(&mut table_writer, code.lengths())?;
    }
    let tables = table_writer.finish();

    let mut payload_writer = BitWriter::new();
    for (i, band_tokens) in tokens.iter().enumerate() {
        let code = &codes[table_index(i)];
        for token in band_tokens {
            code.encode_symbol(&mut payload_writer, token.symbol)?;
            payload_writer.write_bits(token.extra, token.extra_bits);
        }
    }
    let payload = payload_writer.finish();

    let table_len = u32::try_from(tables.len())
        .map_err(|_| OxiBenchError::invalid_parameter("subbands", "tables exceed 4 GiB"))?;
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| OxiBenchError::invalid_parameter("subbands", "payload exceeds 4 GiB"))?;
    output.extend_from_slice(&table_len.to_le_bytes());
    output.extend_from_slice(&tables);
    output.extend_from_slice(&payload_len.to_le_bytes());
    output.extend_from_slice(&payload);

    debug!(
        "coded {} subbands with {} tables: {} table bytes, {} payload bytes",
        subbands.len(),
        codes.len(),
        tables.len(),
        payload.len()
    );

    Ok(output)
}

/// Decode one coefficient, or a run of zeros, from `reader`.
fn decode_token(
    decoder: &HuffmanDecoder,
    reader: &mut BitReader<'_>,
    out: &mut Vec<i32>,
    limit: usize,
    bit_offset: u64,
) -> Result<()> {
    let position = bit_offset + reader.bit_position();
    let symbol = decoder.decode_symbol(reader)?;

    match symbol {
        ZERO_SYMBOL => out.push(0),
        1..=24 => {
            let category = symbol as u8;
            let extra = reader.read_bits(category)?;
            let magnitude = (1i32 << (category - 1)) + (extra >> 1) as i32;
            out.push(if extra & 1 == 1 { -magnitude } else { magnitude });
        }
        _ => {
            let class = (symbol - RUN_BASE + 1) as u8;
            if class > MAX_RUN_CLASS {
                return Err(OxiBenchError::invalid_code(
                    position,
                    format!("coefficient symbol {}", symbol),
                ));
            }
            let run = (1usize << class) + reader.read_bits(class)? as usize;
            if out.len() + run > limit {
                return Err(OxiBenchError::invalid_code(
                    position,
                    "zero run overruns subband",
                ));
            }
            out.try_reserve(run).map_err(|_| {
                OxiBenchError::resource_exhausted(run.saturating_mul(size_of::<i32>()))
            })?;
            out.resize(out.len() + run, 0);
        }
    }

    if out.len() > limit {
        return Err(OxiBenchError::invalid_code(
            position,
            "coefficient overruns subband",
        ));
    }
    Ok(())
}

/// Decode a stream produced by [`encode_subbands`].
///
/// Subband shapes come from the stream itself.
pub fn decode_subbands(data: &[u8]) -> Result<Vec<Subband>> {
    decode_with_layout(data, None)
}

/// Decode a stream whose subbands must have exactly the shapes in `layout`.
///
/// Shapes are checked before any coefficient is decoded.
pub fn decode_subbands_for(data: &[u8], layout: &[(usize, usize)]) -> Result<Vec<Subband>> {
    decode_with_layout(data, Some(layout))
}

fn decode_with_layout(data: &[u8], layout: Option<&[(usize, usize)]>) -> Result<Vec<Subband>> {
    let mut cursor = ByteReader::new(data);

    let count = cursor.read_u16_le()? as usize;
    check_subband_count(count, 0)?;
    if let Some(layout) = layout {
        if count != layout.len() {
            return Err(OxiBenchError::invalid_code(
                0,
                format!("{} subbands, expected {}", count, layout.len()),
            ));
        }
    }

    let mut shapes = Vec::with_capacity(count);
    for i in 0..count {
        let position = cursor.bit_position();
        let width = cursor.read_u32_le()? as usize;
        let height = cursor.read_u32_le()? as usize;
        let len = width.checked_mul(height).filter(|&n| n > 0).ok_or_else(|| {
            OxiBenchError::invalid_code(position, format!("subband shape {}x{}", width, height))
        })?;
        if let Some(&expected) = layout.and_then(|l| l.get(i)) {
            if (width, height) != expected {
                return Err(OxiBenchError::invalid_code(
                    position,
                    format!(
                        "subband {} is {}x{}, expected {}x{}",
                        i, width, height, expected.0, expected.1
                    ),
                ));
            }
        }
        shapes.push((width, height, len));
    }

    let table_len = cursor.read_u32_le()? as usize;
    let table_start = cursor.bit_position();
    let tables = cursor.take(table_len)?;
    let mut table_reader = BitReader::new(tables);
    let decoders = (0..table_count(count))
        .map(|_| {
            let lengths = read_code_lengths(&mut table_reader, ALPHABET_SIZE)?;
            HuffmanDecoder::from_lengths(&lengths)
        })
        .collect::<Result<Vec<_>>>()?;
    if table_reader.bits_remaining() >= 8 {
        return Err(OxiBenchError::invalid_code(
            table_start + table_reader.bit_position(),
            "code tables shorter than their length field",
        ));
    }

    let payload_len = cursor.read_u32_le()? as usize;
    let payload_start = cursor.bit_position();
    let payload = cursor.take(payload_len)?;
    if cursor.remaining() > 0 {
        return Err(OxiBenchError::invalid_code(
            cursor.bit_position(),
            format!("{} bytes after payload", cursor.remaining()),
        ));
    }

    let mut reader = BitReader::new(payload);
    let mut subbands = Vec::with_capacity(count);
    for (i, &(width, height, len)) in shapes.iter().enumerate() {
        let decoder = &decoders[table_index(i)];
        let mut values = Vec::with_capacity(len.min(MAX_PREALLOC));
        while values.len() < len {
            decode_token(decoder, &mut reader, &mut values, len, payload_start)?;
        }
        subbands.push(Subband::new(width, height, values));
    }

    if reader.bits_remaining() >= 8 {
        return Err(OxiBenchError::invalid_code(
            payload_start + reader.bit_position(),
            format!("{} unused payload bits", reader.bits_remaining()),
        ));
    }

    Ok(subbands)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_subbands() -> Vec<Subband> {
        vec![
            Subband::new(2, 2, vec![120, 98, -77, 101]),
            Subband::new(2, 2, vec![0, 3, 0, -1]),
            Subband::new(2, 2, vec![0, 0, 0, 0]),
            Subband::new(2, 2, vec![1, 0, 0, 0]),
            Subband::new(4, 3, vec![0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0]),
            Subband::new(4, 3, vec![-5; 12]),
            Subband::new(4, 3, vec![0; 12]),
        ]
    }

    #[test]
    fn test_value_tokens() {
        assert_eq!(
            Token::value(1),
            Token {
                symbol: 1,
                extra: 0,
                extra_bits: 1
            }
        );
        assert_eq!(
            Token::value(-1),
            Token {
                symbol: 1,
                extra: 1,
                extra_bits: 1
            }
        );
        // 5 = 0b101: category 3, mantissa 1
        assert_eq!(
            Token::value(-5),
            Token {
                symbol: 3,
                extra: 0b11,
                extra_bits: 3
            }
        );
        assert_eq!(Token::value(MAX_QUANTIZED).symbol, MAX_CATEGORY as u16);
    }

    #[test]
    fn test_run_tokens() {
        let mut tokens = Vec::new();
        push_zero_run(&mut tokens, 1);
        assert_eq!(tokens, vec![Token::ZERO]);

        tokens.clear();
        push_zero_run(&mut tokens, 2);
        assert_eq!(
            tokens,
            vec![Token {
                symbol: RUN_BASE,
                extra: 0,
                extra_bits: 1
            }]
        );

        tokens.clear();
        push_zero_run(&mut tokens, 13);
        assert_eq!(
            tokens,
            vec![Token {
                symbol: RUN_BASE + 2,
                extra: 5,
                extra_bits: 3
            }]
        );

        // Longest run, then a leftover single zero
        tokens.clear();
        push_zero_run(&mut tokens, MAX_RUN + 1);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].symbol as usize, ALPHABET_SIZE - 1);
        assert_eq!(tokens[1], Token::ZERO);
    }

    #[test]
    fn test_tokenize_mixed() {
        let tokens = tokenize(&[0, 0, 0, 7, 0, -2]);
        let symbols: Vec<u16> = tokens.iter().map(|t| t.symbol).collect();
        assert_eq!(symbols, vec![RUN_BASE, 3, ZERO_SYMBOL, 2]);
    }

    #[test]
    fn test_table_grouping() {
        assert_eq!(table_index(0), 0);
        assert_eq!((1..=3).map(table_index).collect::<Vec<_>>(), vec![1, 1, 1]);
        assert_eq!(table_index(4), 2);
        assert_eq!(table_count(1), 1);
        assert_eq!(table_count(7), 3);
    }

    #[test]
    fn test_subbands_roundtrip() {
        let subbands = sample_subbands();
        let encoded = encode_subbands(&subbands).unwrap();
        assert_eq!(decode_subbands(&encoded).unwrap(), subbands);
    }

    #[test]
    fn test_extreme_values() {
        let subbands = vec![Subband::new(
            3,
            1,
            vec![MAX_QUANTIZED, -MAX_QUANTIZED, 0],
        )];
        let encoded = encode_subbands(&subbands).unwrap();
        assert_eq!(decode_subbands(&encoded).unwrap(), subbands);

        let too_big = vec![Subband::new(1, 1, vec![MAX_QUANTIZED + 1])];
        assert!(encode_subbands(&too_big).is_err());
    }

    #[test]
    fn test_rejects_bad_layout() {
        let mut subbands = sample_subbands();
        subbands.pop();
        assert!(matches!(
            encode_subbands(&subbands),
            Err(OxiBenchError::InvalidParameter { .. })
        ));

        let wrong_len = vec![Subband::new(2, 2, vec![1, 2, 3])];
        assert!(encode_subbands(&wrong_len).is_err());
    }

    #[test]
    fn test_truncated_stream() {
        let encoded = encode_subbands(&sample_subbands()).unwrap();
        for cut in 0..encoded.len() {
            let err = decode_subbands(&encoded[..cut]).unwrap_err();
            assert!(err.is_format_error(), "cut at {} gave {:?}", cut, err);
        }
    }

    /// One subband of `width` zeros coded as `runs` maximal zero runs.
    fn zero_run_stream(width: u32, runs: usize) -> Vec<u8> {
        let run = Token::run(MAX_RUN);
        let mut freqs = [0u32; ALPHABET_SIZE];
        freqs[run.symbol as usize] = 1;
        let code = HuffmanCode::from_frequencies(&freqs, MAX_CODE_LENGTH as u8).unwrap();

        let mut table_writer = BitWriter::new();
        write_code_lengths(&mut table_writer, code.lengths()).unwrap();
        let tables = table_writer.finish();

        let mut payload_writer = BitWriter::new();
        for _ in 0..runs {
            code.encode_symbol(&mut payload_writer, run.symbol).unwrap();
            payload_writer.write_bits(run.extra, run.extra_bits);
        }
        let payload = payload_writer.finish();

        let mut stream = Vec::new();
        stream.extend_from_slice(&1u16.to_le_bytes());
        stream.extend_from_slice(&width.to_le_bytes());
        stream.extend_from_slice(&1u32.to_le_bytes());
        stream.extend_from_slice(&(tables.len() as u32).to_le_bytes());
        stream.extend_from_slice(&tables);
        stream.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        stream.extend_from_slice(&payload);
        stream
    }

    #[test]
    fn test_oversized_shape_rejected_before_decoding() {
        let stream = zero_run_stream(MAX_RUN as u32 * 64, 64);
        assert!(stream.len() < 512);

        let err = decode_subbands_for(&stream, &[(8, 8)]).unwrap_err();
        assert!(matches!(err, OxiBenchError::InvalidCode { .. }), "{:?}", err);

        let err = decode_subbands_for(&stream, &[(4, 4), (4, 4)]).unwrap_err();
        assert!(matches!(err, OxiBenchError::InvalidCode { .. }), "{:?}", err);
    }

    #[test]
    fn test_expected_layout_accepts_matching_stream() {
        let subbands = sample_subbands();
        let encoded = encode_subbands(&subbands).unwrap();
        let layout: Vec<(usize, usize)> = subbands.iter().map(|s| (s.width, s.height)).collect();
        assert_eq!(decode_subbands_for(&encoded, &layout).unwrap(), subbands);
    }

    #[test]
    fn test_corrupt_subband_count() {
        let mut encoded = encode_subbands(&sample_subbands()).unwrap();
        encoded[0] = 6;
        assert!(matches!(
            decode_subbands(&encoded),
            Err(OxiBenchError::InvalidCode { .. })
        ));
    }
}
