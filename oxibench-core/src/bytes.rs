//! Little-endian field reader for byte-framed stream headers.
//!
//! Codec streams frame their bit-packed sections with byte-aligned length
//! fields. [`ByteReader`] reads those fields and reports truncation with the
//! bit position where reading stopped, matching [`crate::BitReader`].

use crate::error::{OxiBenchError, Result};

/// Forward-only cursor over a byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Start reading at the beginning of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Current position in bits.
    pub fn bit_position(&self) -> u64 {
        self.pos as u64 * 8
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Borrow the next `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(OxiBenchError::truncated(
                (len - self.remaining()) as u64 * 8,
                self.bit_position(),
            ));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a little-endian `u16`.
    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `u32`.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `u64`.
    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `f64`.
    pub fn read_f64_le(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_fields() {
        let mut data = vec![7u8];
        data.extend_from_slice(&0x1234u16.to_le_bytes());
        data.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        data.extend_from_slice(&2.5f64.to_le_bytes());

        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.read_u32_le().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.read_f64_le().unwrap(), 2.5);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.position(), data.len());
    }

    #[test]
    fn test_truncated_field() {
        let data = [1u8, 2, 3];
        let mut reader = ByteReader::new(&data);
        reader.read_u8().unwrap();

        match reader.read_u32_le().unwrap_err() {
            OxiBenchError::TruncatedStream {
                needed,
                bit_position,
            } => {
                assert_eq!(needed, 16);
                assert_eq!(bit_position, 8);
            }
            other => panic!("unexpected error {:?}", other),
        }
        // Nothing consumed by the failed read
        assert_eq!(reader.remaining(), 2);
    }
}
