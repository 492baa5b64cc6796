//! # OxiBench Core
//!
//! Core components for the OxiBench image compression harness.
//!
//! This crate provides the building blocks shared by every codec:
//!
//! - [`bitstream`]: Bit-level I/O for variable-length codes (Huffman, etc.)
//! - [`bytes`]: Little-endian framing fields
//! - [`pixel`]: Immutable 8-bit image buffers
//! - [`traits`]: The codec trait driven by the experiment runner
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L4: Front end                                           │
//! │     CLI, parameter grids, result reporting             │
//! ├─────────────────────────────────────────────────────────┤
//! │ L3: Evaluation                                          │
//! │     Metrics (PSNR, SSIM, ratio), experiment runner     │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     Deflate (LZ77+Huffman), DWT (wavelet+quantizer)    │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: BitStream (this crate)                              │
//! │     BitReader/BitWriter, PixelBuffer                   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxibench_core::bitstream::{BitReader, BitWriter};
//! use oxibench_core::PixelBuffer;
//!
//! let mut writer = BitWriter::new();
//! writer.write_bits(0xABC, 12);
//! let bytes = writer.finish();
//!
//! let mut reader = BitReader::new(&bytes);
//! assert_eq!(reader.read_bits(12).unwrap(), 0xABC);
//!
//! let image = PixelBuffer::grayscale(2, 2, vec![0, 64, 128, 255]).unwrap();
//! assert_eq!(image.pixel_count(), 4);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod bytes;
pub mod error;
pub mod pixel;
pub mod traits;

// Re-exports for convenience
pub use bitstream::{BitReader, BitWriter};
pub use bytes::ByteReader;
pub use error::{OxiBenchError, Result, try_alloc};
pub use pixel::{MAX_PIXEL_VALUE, PixelBuffer};
pub use traits::{CompressionLevel, ImageCodec, ImageShape};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bitstream::{BitReader, BitWriter};
    pub use crate::error::{OxiBenchError, Result};
    pub use crate::pixel::PixelBuffer;
    pub use crate::traits::{CompressionLevel, ImageCodec, ImageShape};
}
