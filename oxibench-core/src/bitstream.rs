//! Bit-level I/O for the entropy coders.
//!
//! This module provides `BitWriter` and `BitReader` for writing and reading
//! data at the bit level, used by the Huffman stages of both codecs.
//!
//! # Bit Ordering
//!
//! Bits are packed LSB-first: the first bit written lands in the least
//! significant bit of the first byte. Multi-bit values are written with their
//! least significant bit first, so a value written with `write_bits(v, n)` is
//! returned unchanged by `read_bits(n)`.
//!
//! # Example
//!
//! ```
//! use oxibench_core::bitstream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_bits(0b101, 3);
//! writer.write_bits(0b1100, 4);
//! let bytes = writer.finish();
//!
//! let mut reader = BitReader::new(&bytes);
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1100);
//! ```

use crate::error::{OxiBenchError, Result};

/// A forward-only bit reader over a byte slice.
///
/// Bytes are pulled into a 64-bit buffer on demand. Reads past the end of the
/// slice fail with `TruncatedStream`; the cursor never moves backwards.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    /// Source bytes.
    data: &'a [u8],
    /// Next byte of `data` to load into the buffer.
    pos: usize,
    /// Bit buffer (LSB-first).
    buffer: u64,
    /// Number of valid bits in buffer.
    bits_in_buffer: u8,
    /// Total bits consumed.
    total_bits_read: u64,
}

impl<'a> BitReader<'a> {
    /// Create a new `BitReader` over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            buffer: 0,
            bits_in_buffer: 0,
            total_bits_read: 0,
        }
    }

    /// Get the total number of bits read so far.
    pub fn bits_read(&self) -> u64 {
        self.total_bits_read
    }

    /// Get the current bit position (for error reporting).
    pub fn bit_position(&self) -> u64 {
        self.total_bits_read
    }

    /// Number of unread bits left in the stream.
    pub fn bits_remaining(&self) -> u64 {
        (self.data.len() - self.pos) as u64 * 8 + self.bits_in_buffer as u64
    }

    /// Whether every bit has been consumed.
    pub fn is_empty(&self) -> bool {
        self.bits_remaining() == 0
    }

    /// Ensure at least `count` bits are available in the buffer.
    #[inline]
    fn fill_buffer(&mut self, count: u8) -> Result<()> {
        debug_assert!(count <= 57, "Cannot fill more than 57 bits at once");

        while self.bits_in_buffer < count {
            match self.data.get(self.pos) {
                Some(&byte) => {
                    self.buffer |= (byte as u64) << self.bits_in_buffer;
                    self.bits_in_buffer += 8;
                    self.pos += 1;
                }
                None => {
                    return Err(OxiBenchError::truncated(
                        (count - self.bits_in_buffer) as u64,
                        self.total_bits_read,
                    ));
                }
            }
        }

        Ok(())
    }

    /// Read up to 32 bits from the stream.
    ///
    /// The first bit read ends up in the LSB of the result.
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32, "Cannot read more than 32 bits at once");

        if count == 0 {
            return Ok(0);
        }

        self.fill_buffer(count)?;

        let mask = (1u64 << count).wrapping_sub(1);
        let result = (self.buffer & mask) as u32;

        self.buffer >>= count;
        self.bits_in_buffer -= count;
        self.total_bits_read += count as u64;

        Ok(result)
    }

    /// Peek at up to 32 bits without consuming them.
    ///
    /// Fails with `TruncatedStream` if fewer than `count` bits remain, even
    /// though a shorter read might still succeed.
    #[inline]
    pub fn peek_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32, "Cannot peek more than 32 bits at once");

        if count == 0 {
            return Ok(0);
        }

        self.fill_buffer(count)?;

        let mask = (1u64 << count) - 1;
        Ok((self.buffer & mask) as u32)
    }

    /// Skip a number of bits.
    pub fn skip_bits(&mut self, count: u8) -> Result<()> {
        if count == 0 {
            return Ok(());
        }

        self.fill_buffer(count)?;

        self.buffer >>= count;
        self.bits_in_buffer -= count;
        self.total_bits_read += count as u64;

        Ok(())
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Align to the next byte boundary by discarding partial bits.
    pub fn align_to_byte(&mut self) {
        let remainder = self.bits_in_buffer % 8;
        if remainder > 0 {
            self.buffer >>= remainder;
            self.bits_in_buffer -= remainder;
            self.total_bits_read += remainder as u64;
        }
    }

    /// Read bytes into `buf`.
    ///
    /// The reader must be byte-aligned before calling this method.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        debug_assert!(self.bits_in_buffer % 8 == 0, "read_bytes needs byte alignment");

        let needed = buf.len() as u64 * 8;
        if self.bits_remaining() < needed {
            return Err(OxiBenchError::truncated(
                needed - self.bits_remaining(),
                self.total_bits_read,
            ));
        }

        // Drain whole bytes still held in the bit buffer
        let mut offset = 0;
        while self.bits_in_buffer >= 8 && offset < buf.len() {
            buf[offset] = (self.buffer & 0xFF) as u8;
            self.buffer >>= 8;
            self.bits_in_buffer -= 8;
            offset += 1;
        }

        let rest = buf.len() - offset;
        buf[offset..].copy_from_slice(&self.data[self.pos..self.pos + rest]);
        self.pos += rest;
        self.total_bits_read += needed;

        Ok(())
    }
}

/// An append-only bit writer producing a byte vector.
///
/// Bits accumulate in a 64-bit buffer and complete bytes are moved to the
/// output. Call `finish()` to pad the final partial byte with zeros and take
/// the bytes.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    /// Completed bytes.
    output: Vec<u8>,
    /// Bit buffer (LSB-first).
    buffer: u64,
    /// Number of bits in buffer.
    bits_in_buffer: u8,
    /// Total bits written.
    total_bits_written: u64,
}

impl BitWriter {
    /// Create an empty `BitWriter`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `BitWriter` with room for `bytes` output bytes.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            output: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    /// Get the total number of bits written so far, excluding padding.
    pub fn bits_written(&self) -> u64 {
        self.total_bits_written
    }

    /// Number of bytes the stream occupies once padded.
    pub fn byte_len(&self) -> usize {
        self.output.len() + (self.bits_in_buffer as usize).div_ceil(8)
    }

    /// Move complete bytes from the buffer to the output.
    #[inline]
    fn flush_bytes(&mut self) {
        while self.bits_in_buffer >= 8 {
            self.output.push((self.buffer & 0xFF) as u8);
            self.buffer >>= 8;
            self.bits_in_buffer -= 8;
        }
    }

    /// Write the low `count` bits of `value` (0-32 bits, LSB-first).
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u8) {
        debug_assert!(count <= 32, "Cannot write more than 32 bits at once");

        if count == 0 {
            return;
        }

        let mask = if count == 32 {
            u32::MAX
        } else {
            (1u32 << count).wrapping_sub(1)
        };
        let value = value & mask;

        self.buffer |= (value as u64) << self.bits_in_buffer;
        self.bits_in_buffer += count;
        self.total_bits_written += count as u64;

        self.flush_bytes();
    }

    /// Write a single bit.
    #[inline(always)]
    pub fn write_bit(&mut self, bit: bool) {
        self.buffer |= (bit as u64) << self.bits_in_buffer;
        self.bits_in_buffer += 1;
        self.total_bits_written += 1;

        if self.bits_in_buffer >= 8 {
            self.flush_bytes();
        }
    }

    /// Pad to byte boundary with zeros.
    pub fn align_to_byte(&mut self) {
        if self.bits_in_buffer % 8 != 0 {
            let padding = 8 - (self.bits_in_buffer % 8);
            self.write_bits(0, padding);
        }
    }

    /// Write whole bytes.
    ///
    /// Unaligned writers merge the bytes bit by bit.
    pub fn write_bytes(&mut self, buf: &[u8]) {
        if self.bits_in_buffer == 0 {
            self.output.extend_from_slice(buf);
            self.total_bits_written += buf.len() as u64 * 8;
        } else {
            for &byte in buf {
                self.write_bits(byte as u32, 8);
            }
        }
    }

    /// Pad the final partial byte with zero bits.
    pub fn flush(&mut self) {
        self.align_to_byte();
        self.flush_bytes();
    }

    /// Flush and return the written bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.flush();
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitreader_basic() {
        // 0b10110101 = 0xB5
        let data = [0xB5];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(1).unwrap(), 1); // LSB first
        assert_eq!(reader.read_bits(1).unwrap(), 0);
        assert_eq!(reader.read_bits(1).unwrap(), 1);
        assert_eq!(reader.read_bits(1).unwrap(), 0);
        assert_eq!(reader.read_bits(1).unwrap(), 1);
        assert_eq!(reader.read_bits(1).unwrap(), 1);
        assert_eq!(reader.read_bits(1).unwrap(), 0);
        assert_eq!(reader.read_bits(1).unwrap(), 1);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_bitreader_multi_byte() {
        let data = [0xFF, 0x00];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(4).unwrap(), 0xF);
        assert_eq!(reader.read_bits(8).unwrap(), 0x0F); // Crosses byte boundary
        assert_eq!(reader.read_bits(4).unwrap(), 0x0);
    }

    #[test]
    fn test_bitreader_peek() {
        let data = [0xAB];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.peek_bits(4).unwrap(), 0xB);
        assert_eq!(reader.peek_bits(4).unwrap(), 0xB);
        assert_eq!(reader.read_bits(4).unwrap(), 0xB);
        assert_eq!(reader.peek_bits(4).unwrap(), 0xA);
        assert_eq!(reader.bits_read(), 4);
    }

    #[test]
    fn test_truncated_read() {
        let data = [0x12];
        let mut reader = BitReader::new(&data);

        reader.read_bits(5).unwrap();
        let err = reader.read_bits(4).unwrap_err();
        assert!(matches!(
            err,
            OxiBenchError::TruncatedStream {
                needed: 1,
                bit_position: 5
            }
        ));

        // A failed peek keeps the remaining bits readable
        assert!(reader.peek_bits(9).is_err());
        assert_eq!(reader.read_bits(3).unwrap(), 0);
    }

    #[test]
    fn test_bitwriter_basic() {
        let mut writer = BitWriter::new();
        // Write 0b10110101 bit by bit
        writer.write_bit(true);
        writer.write_bit(false);
        writer.write_bit(true);
        writer.write_bit(false);
        writer.write_bit(true);
        writer.write_bit(true);
        writer.write_bit(false);
        writer.write_bit(true);
        assert_eq!(writer.finish(), vec![0xB5]);
    }

    #[test]
    fn test_bitwriter_multi_bits() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_bits(0b11001, 5);
        // 3 bits: 101, 5 bits: 11001 -> 11001_101 = 0xCD
        assert_eq!(writer.finish(), vec![0xCD]);
    }

    #[test]
    fn test_padding_and_counts() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b11, 2);
        assert_eq!(writer.bits_written(), 2);
        assert_eq!(writer.byte_len(), 1);
        writer.write_bits(u32::MAX, 32);
        assert_eq!(writer.bits_written(), 34);
        let bytes = writer.finish();
        assert_eq!(bytes.len(), 5);
        // Padding bits are zero
        assert_eq!(bytes[4], 0b11);
    }

    #[test]
    fn test_roundtrip() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_bits(0b1111, 4);
        writer.write_bits(0b10, 2);
        writer.write_bits(0b110011, 6);
        writer.write_bits(0xDEAD_BEEF, 32);
        let written = writer.bits_written();
        let output = writer.finish();

        let mut reader = BitReader::new(&output);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(4).unwrap(), 0b1111);
        assert_eq!(reader.read_bits(2).unwrap(), 0b10);
        assert_eq!(reader.read_bits(6).unwrap(), 0b110011);
        assert_eq!(reader.read_bits(32).unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.bits_read(), written);
    }

    #[test]
    fn test_align_to_byte() {
        let data = [0xFF, 0xAA];
        let mut reader = BitReader::new(&data);

        reader.read_bits(3).unwrap();
        reader.align_to_byte();
        assert_eq!(reader.read_bits(8).unwrap(), 0xAA);
    }

    #[test]
    fn test_read_bytes() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(8).unwrap(), 0x12);
        let mut buf = [0u8; 2];
        reader.read_bytes(&mut buf).unwrap();
        assert_eq!(buf, [0x34, 0x56]);
        assert_eq!(reader.bits_remaining(), 16);

        let mut too_long = [0u8; 3];
        assert!(reader.read_bytes(&mut too_long).is_err());
        reader.read_bytes(&mut buf).unwrap();
        assert_eq!(buf, [0x78, 0x9A]);
    }

    #[test]
    fn test_unaligned_write_bytes() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_bytes(&[0xFF]);
        let bytes = writer.finish();
        assert_eq!(bytes, vec![0xFF, 0x01]);
    }
}
