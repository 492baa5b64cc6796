//! # OxiBench DWT
//!
//! Pure Rust lossy image codec built from a multi-level 2D discrete wavelet
//! transform, uniform scalar quantization and Huffman coding of the
//! quantized coefficients.
//!
//! ## Pipeline
//!
//! ```text
//! channel plane ─► forward DWT ─► quantize ─► coefficient coder ─► bytes
//!                  (wavelet)      (quant)     (coder)
//! ```
//!
//! ## Supported families
//!
//! `haar`, `db1`-`db4`, `sym2`-`sym4`, `coif1`, `bior1.1`, `bior2.2`, `bior4.4`.
//!
//! ## Example
//!
//! ```rust
//! use oxibench_core::PixelBuffer;
//! use oxibench_dwt::{DwtCodec, WaveletFamily};
//!
//! let samples: Vec<u8> = (0..64 * 64).map(|i| (i % 64) as u8).collect();
//! let image = PixelBuffer::grayscale(64, 64, samples).unwrap();
//!
//! let codec = DwtCodec::new(WaveletFamily::Haar, 2, 4.0).unwrap();
//! let compressed = codec.compress(&image).unwrap();
//! let restored = codec.decompress(&compressed).unwrap();
//! assert_eq!(restored.shape(), image.shape());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod coder;
pub mod quant;
pub mod wavelet;

// Re-exports
pub use codec::{DwtCodec, DwtHeader, decompress, decompress_any, read_header};
pub use coder::{Subband, decode_subbands, decode_subbands_for, encode_subbands};
pub use quant::{QuantizedCoefficient, Quantizer, dequantize, quantize};
pub use wavelet::{
    Decomposition, DetailLevel, FilterBank, Plane, WaveletFamily, forward, inverse, subband_layout,
};
