//! Deflate-style compression.
//!
//! The stream is self-describing and byte oriented at the block level:
//!
//! ```text
//! stream  := version:u8  original_len:u64le  block+
//! block   := flags:u8 (bit0 = final, bit1 = stored)
//!            stored: len:u32le  bytes[len]
//!            coded:  table_len:u16le  table[table_len]
//!                    payload_len:u32le  payload[payload_len]
//! table   := (nlit - 257):u8  (ndist - 1):u8  code lengths (see huffman)
//! payload := Huffman-coded literal/length + distance symbols, then EOB
//! ```
//!
//! Each coded block carries its own literal/length and distance codes. A
//! block is stored verbatim whenever coding would not make it smaller.

use crate::huffman::{
    DISTANCE_ALPHABET_SIZE, END_OF_BLOCK, HuffmanCode, LITLEN_ALPHABET_SIZE, MAX_CODE_LENGTH,
    write_code_lengths,
};
use crate::lz77::{Lz77Config, Lz77Token, find_tokens};
use crate::tables::{distance_to_code, length_to_code};
use log::debug;
use oxibench_core::error::{OxiBenchError, Result};
use oxibench_core::{BitWriter, CompressionLevel};

/// Stream format version.
pub const STREAM_VERSION: u8 = 1;

/// Size of the stream header (version + original length).
pub const HEADER_SIZE: usize = 9;

/// Input bytes covered by one block.
pub const BLOCK_SIZE: usize = 64 * 1024;

/// Block flag: last block of the stream.
pub const FLAG_FINAL: u8 = 0b01;

/// Block flag: block is stored verbatim.
pub const FLAG_STORED: u8 = 0b10;

/// Deflate compressor.
#[derive(Debug, Clone, Copy)]
pub struct Deflater {
    /// Compression level.
    level: CompressionLevel,
    /// Matcher parameters derived from the level.
    config: Lz77Config,
    /// Input bytes per block.
    block_size: usize,
}

impl Deflater {
    /// Create a new compressor with the specified level (0-9).
    pub fn new(level: impl Into<CompressionLevel>) -> Self {
        let level = level.into();
        Self {
            level,
            config: Lz77Config::for_level(level.level()),
            block_size: BLOCK_SIZE,
        }
    }

    /// Override the block size (at least one byte).
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Compression level.
    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    /// Compress `data` into a self-describing stream.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        output
            .try_reserve(data.len() / 2 + HEADER_SIZE + 16)
            .map_err(|_| OxiBenchError::resource_exhausted(data.len() / 2))?;

        output.push(STREAM_VERSION);
        output.extend_from_slice(&(data.len() as u64).to_le_bytes());

        if data.is_empty() {
            write_stored_block(&mut output, &[], true)?;
            return Ok(output);
        }

        if self.level == CompressionLevel::NONE {
            let mut chunks = data.chunks(self.block_size).peekable();
            while let Some(chunk) = chunks.next() {
                write_stored_block(&mut output, chunk, chunks.peek().is_none())?;
            }
            return Ok(output);
        }

        let tokens = find_tokens(data, &self.config)?;

        // Split tokens into blocks of roughly `block_size` input bytes
        let mut token_start = 0;
        let mut byte_start = 0;
        let mut byte_end = 0;
        for (i, token) in tokens.iter().enumerate() {
            byte_end += token.span();
            let is_last = i + 1 == tokens.len();
            if byte_end - byte_start >= self.block_size || is_last {
                write_block(
                    &mut output,
                    &tokens[token_start..=i],
                    &data[byte_start..byte_end],
                    is_last,
                )?;
                token_start = i + 1;
                byte_start = byte_end;
            }
        }

        debug!(
            "deflate level {}: {} -> {} bytes ({} tokens)",
            self.level.level(),
            data.len(),
            output.len(),
            tokens.len()
        );

        Ok(output)
    }
}

impl Default for Deflater {
    fn default() -> Self {
        Self::new(CompressionLevel::DEFAULT)
    }
}

/// Compress `data` at `level` (0-9).
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    Deflater::new(level).compress(data)
}

/// Append a stored block.
fn write_stored_block(output: &mut Vec<u8>, raw: &[u8], is_final: bool) -> Result<()> {
    let len = u32::try_from(raw.len())
        .map_err(|_| OxiBenchError::invalid_parameter("block", "stored block exceeds 4 GiB"))?;

    let mut flags = FLAG_STORED;
    if is_final {
        flags |= FLAG_FINAL;
    }
    output.push(flags);
    output.extend_from_slice(&len.to_le_bytes());
    output.extend_from_slice(raw);
    Ok(())
}

/// Count symbol frequencies in tokens, including one end-of-block.
fn count_frequencies(
    tokens: &[Lz77Token],
) -> ([u32; LITLEN_ALPHABET_SIZE], [u32; DISTANCE_ALPHABET_SIZE]) {
    let mut litlen_freq = [0u32; LITLEN_ALPHABET_SIZE];
    let mut dist_freq = [0u32; DISTANCE_ALPHABET_SIZE];

    for token in tokens {
        match *token {
            Lz77Token::Literal(byte) => {
                litlen_freq[byte as usize] += 1;
            }
            Lz77Token::Match { length, distance } => {
                let (len_code, _, _) = length_to_code(length);
                litlen_freq[len_code as usize] += 1;

                let (dist_code, _, _) = distance_to_code(distance);
                dist_freq[dist_code as usize] += 1;
            }
        }
    }
    litlen_freq[END_OF_BLOCK as usize] += 1;

    (litlen_freq, dist_freq)
}

/// Number of leading table entries to transmit, keeping at least `min`.
fn used_prefix(lengths: &[u8], min: usize) -> usize {
    lengths
        .iter()
        .rposition(|&l| l > 0)
        .map_or(min, |last| (last + 1).max(min))
}

/// Serialize the code tables of a coded block.
fn encode_tables(litlen: &HuffmanCode, dist: &HuffmanCode) -> Result<Vec<u8>> {
    let nlit = used_prefix(litlen.lengths(), 257);
    let ndist = used_prefix(dist.lengths(), 1);

    let mut combined = Vec::with_capacity(nlit + ndist);
    combined.extend_from_slice(&litlen.lengths()[..nlit]);
    combined.extend_from_slice(&dist.lengths()[..ndist]);

    let mut writer = BitWriter::new();
    writer.write_bits((nlit - 257) as u32, 8);
    writer.write_bits((ndist - 1) as u32, 8);
    write_code_lengths(&mut writer, &combined)?;
    Ok(writer.finish())
}

/// Huffman-code the tokens of one block, ending with end-of-block.
fn encode_payload(
    tokens: &[Lz77Token],
    litlen: &HuffmanCode,
    dist: &HuffmanCode,
    raw_len: usize,
) -> Result<Vec<u8>> {
    let mut writer = BitWriter::with_capacity(raw_len / 2 + 8);

    for token in tokens {
        match *token {
            Lz77Token::Literal(byte) => {
                litlen.encode_symbol(&mut writer, byte as u16)?;
            }
            Lz77Token::Match { length, distance } => {
                let (len_code, len_extra_bits, len_extra) = length_to_code(length);
                litlen.encode_symbol(&mut writer, len_code)?;
                writer.write_bits(len_extra as u32, len_extra_bits);

                let (dist_code, dist_extra_bits, dist_extra) = distance_to_code(distance);
                dist.encode_symbol(&mut writer, dist_code)?;
                writer.write_bits(dist_extra as u32, dist_extra_bits);
            }
        }
    }
    litlen.encode_symbol(&mut writer, END_OF_BLOCK)?;

    Ok(writer.finish())
}

/// Append one block, coded or stored, whichever is smaller.
fn write_block(
    output: &mut Vec<u8>,
    tokens: &[Lz77Token],
    raw: &[u8],
    is_final: bool,
) -> Result<()> {
    let (litlen_freq, dist_freq) = count_frequencies(tokens);
    let litlen = HuffmanCode::from_frequencies(&litlen_freq, MAX_CODE_LENGTH as u8)?;
    let dist = HuffmanCode::from_frequencies(&dist_freq, MAX_CODE_LENGTH as u8)?;

    let table = encode_tables(&litlen, &dist)?;
    let payload = encode_payload(tokens, &litlen, &dist, raw.len())?;

    let coded_size = 1 + 2 + table.len() + 4 + payload.len();
    let stored_size = 1 + 4 + raw.len();
    if coded_size >= stored_size {
        debug!(
            "block of {} bytes stored (coded would be {})",
            raw.len(),
            coded_size
        );
        return write_stored_block(output, raw, is_final);
    }

    let table_len = u16::try_from(table.len())
        .map_err(|_| OxiBenchError::invalid_parameter("block", "code table exceeds 64 KiB"))?;
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| OxiBenchError::invalid_parameter("block", "payload exceeds 4 GiB"))?;

    output.push(if is_final { FLAG_FINAL } else { 0 });
    output.extend_from_slice(&table_len.to_le_bytes());
    output.extend_from_slice(&table);
    output.extend_from_slice(&payload_len.to_le_bytes());
    output.extend_from_slice(&payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflate::inflate;

    #[test]
    fn test_header_layout() {
        let compressed = deflate(b"abc", 6).unwrap();
        assert_eq!(compressed[0], STREAM_VERSION);
        assert_eq!(&compressed[1..9], &3u64.to_le_bytes());
        // Too short to benefit from coding
        assert_eq!(compressed[9], FLAG_FINAL | FLAG_STORED);
    }

    #[test]
    fn test_level_0_stores() {
        let data = vec![7u8; 1000];
        let compressed = deflate(&data, 0).unwrap();
        assert_eq!(compressed.len(), HEADER_SIZE + 5 + data.len());
        assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn test_multiple_blocks() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 13) as u8).collect();
        let deflater = Deflater::new(6).with_block_size(1000);
        let compressed = deflater.compress(&data).unwrap();
        assert!(compressed.len() < data.len() / 4);
        assert_eq!(inflate(&compressed).unwrap(), data);

        let stored = Deflater::new(0).with_block_size(1000).compress(&data).unwrap();
        assert_eq!(stored.len(), HEADER_SIZE + 5 * (5 + 1000));
        assert_eq!(inflate(&stored).unwrap(), data);
    }

    #[test]
    fn test_incompressible_falls_back_to_stored() {
        let mut seed: u64 = 0x9E3779B97F4A7C15;
        let data: Vec<u8> = (0..4096)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                seed as u8
            })
            .collect();
        let compressed = deflate(&data, 9).unwrap();
        assert!(compressed.len() <= HEADER_SIZE + 5 + data.len());
        assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn test_used_prefix() {
        assert_eq!(used_prefix(&[0, 0, 0], 1), 1);
        assert_eq!(used_prefix(&[0, 3, 0, 2, 0], 1), 4);
        assert_eq!(used_prefix(&[1; 300][..286], 257), 286);
    }
}
