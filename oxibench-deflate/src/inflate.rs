//! Deflate-style decompression.
//!
//! Reverses [`crate::deflate`]: reads each block's code tables, rebuilds the
//! canonical codes, decodes tokens and replays matches. Every length field is
//! checked against the bytes actually present, so a corrupt stream fails with
//! `TruncatedStream` or `InvalidCode` instead of producing output of the
//! wrong length.

use crate::deflate::{FLAG_FINAL, FLAG_STORED, STREAM_VERSION};
use crate::huffman::{
    DISTANCE_ALPHABET_SIZE, END_OF_BLOCK, HuffmanDecoder, LITLEN_ALPHABET_SIZE, read_code_lengths,
};
use crate::lz77::copy_match;
use crate::tables::{DISTANCE_EXTRA_BITS, LENGTH_EXTRA_BITS, decode_distance, decode_length};
use log::debug;
use oxibench_core::{BitReader, ByteReader};
use oxibench_core::error::{OxiBenchError, Result};

/// Output reserved up front, whatever the header claims.
const MAX_PREALLOC: usize = 1 << 24;

/// Deflate decompressor.
#[derive(Debug, Default, Clone, Copy)]
pub struct Inflater;

impl Inflater {
    /// Create a new decompressor.
    pub fn new() -> Self {
        Self
    }

    /// Decompress a complete stream.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut cursor = ByteReader::new(data);

        let version = cursor.read_u8()?;
        if version != STREAM_VERSION {
            return Err(OxiBenchError::invalid_header(format!(
                "unsupported stream version {}",
                version
            )));
        }
        let expected = usize::try_from(cursor.read_u64_le()?)
            .map_err(|_| OxiBenchError::invalid_header("original length exceeds usize"))?;

        let mut output = Vec::new();
        output
            .try_reserve(expected.min(MAX_PREALLOC))
            .map_err(|_| OxiBenchError::resource_exhausted(expected.min(MAX_PREALLOC)))?;

        let mut blocks = 0usize;
        loop {
            let block_start = cursor.bit_position();
            let flags = cursor.read_u8()?;
            if flags & !(FLAG_FINAL | FLAG_STORED) != 0 {
                return Err(OxiBenchError::invalid_code(
                    block_start,
                    format!("unknown block flags {:#04x}", flags),
                ));
            }

            if flags & FLAG_STORED != 0 {
                let len = cursor.read_u32_le()? as usize;
                let raw = cursor.take(len)?;
                if output.len() + raw.len() > expected {
                    return Err(OxiBenchError::invalid_code(
                        block_start,
                        "stored block overruns original length",
                    ));
                }
                output.extend_from_slice(raw);
            } else {
                self.decode_coded_block(&mut cursor, &mut output, expected)?;
            }
            blocks += 1;

            if flags & FLAG_FINAL != 0 {
                break;
            }
        }

        if cursor.remaining() > 0 {
            return Err(OxiBenchError::invalid_code(
                cursor.bit_position(),
                format!("{} bytes after final block", cursor.remaining()),
            ));
        }
        if output.len() < expected {
            return Err(OxiBenchError::truncated(
                (expected - output.len()) as u64 * 8,
                cursor.bit_position(),
            ));
        }

        debug!(
            "inflate: {} -> {} bytes in {} blocks",
            data.len(),
            output.len(),
            blocks
        );

        Ok(output)
    }

    /// Decode one Huffman-coded block into `output`.
    fn decode_coded_block(
        &self,
        cursor: &mut ByteReader<'_>,
        output: &mut Vec<u8>,
        expected: usize,
    ) -> Result<()> {
        let table_len = cursor.read_u16_le()? as usize;
        let table_start = cursor.bit_position();
        let table = cursor.take(table_len)?;
        let (litlen, dist) = read_tables(table, table_start)?;

        let payload_len = cursor.read_u32_le()? as usize;
        let payload_start = cursor.bit_position();
        let payload = cursor.take(payload_len)?;
        let mut reader = BitReader::new(payload);

        loop {
            let position = payload_start + reader.bit_position();
            let symbol = litlen.decode_symbol(&mut reader)?;

            if symbol < 256 {
                if output.len() >= expected {
                    return Err(OxiBenchError::invalid_code(
                        position,
                        "literal overruns original length",
                    ));
                }
                output.push(symbol as u8);
                continue;
            }
            if symbol == END_OF_BLOCK {
                break;
            }

            let extra_bits = LENGTH_EXTRA_BITS
                .get(symbol as usize - 257)
                .copied()
                .ok_or_else(|| {
                    OxiBenchError::invalid_code(position, format!("length symbol {}", symbol))
                })?;
            let extra = reader.read_bits(extra_bits)? as u16;
            let length = decode_length(symbol, extra).ok_or_else(|| {
                OxiBenchError::invalid_code(position, format!("length symbol {}", symbol))
            })? as usize;

            let dist_symbol = dist.decode_symbol(&mut reader)?;
            let extra_bits = DISTANCE_EXTRA_BITS[dist_symbol as usize];
            let extra = reader.read_bits(extra_bits)? as u16;
            let distance = decode_distance(dist_symbol, extra).ok_or_else(|| {
                OxiBenchError::invalid_code(position, format!("distance symbol {}", dist_symbol))
            })? as usize;

            if output.len() + length > expected {
                return Err(OxiBenchError::invalid_code(
                    position,
                    "match overruns original length",
                ));
            }
            copy_match(output, length, distance, position)?;
        }

        // Only the zero padding of the last byte may follow end-of-block
        if reader.bits_remaining() >= 8 {
            return Err(OxiBenchError::invalid_code(
                payload_start + reader.bit_position(),
                format!("{} unused payload bits", reader.bits_remaining()),
            ));
        }

        Ok(())
    }
}

/// Parse the literal/length and distance codes of a coded block.
fn read_tables(table: &[u8], table_start: u64) -> Result<(HuffmanDecoder, HuffmanDecoder)> {
    let mut reader = BitReader::new(table);
    let nlit = reader.read_bits(8)? as usize + 257;
    let ndist = reader.read_bits(8)? as usize + 1;
    if nlit > LITLEN_ALPHABET_SIZE || ndist > DISTANCE_ALPHABET_SIZE {
        return Err(OxiBenchError::invalid_code(
            table_start,
            format!("table sizes nlit={} ndist={}", nlit, ndist),
        ));
    }

    let lengths = read_code_lengths(&mut reader, nlit + ndist)?;
    if reader.bits_remaining() >= 8 {
        return Err(OxiBenchError::invalid_code(
            table_start + reader.bit_position(),
            "code table shorter than its length field",
        ));
    }

    let litlen = HuffmanDecoder::from_lengths(&lengths[..nlit])?;
    let dist = HuffmanDecoder::from_lengths(&lengths[nlit..])?;
    Ok((litlen, dist))
}

/// Decompress a stream produced by [`crate::deflate::deflate`].
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    Inflater::new().decompress(data)
}
