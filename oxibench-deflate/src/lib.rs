//! # OxiBench Deflate
//!
//! Pure Rust lossless codec: LZ77 dictionary matching followed by canonical
//! Huffman coding of literals, match lengths and distances.
//!
//! This crate also hosts the Huffman engine used by the wavelet codec's
//! coefficient coder.
//!
//! ## Features
//!
//! - **Compression**: LZ77 + per-block Huffman codes
//!   - Effort levels 0-9
//!   - Stored fallback for blocks that do not shrink
//! - **Decompression**: exact reconstruction with full stream validation
//!
//! ## Example
//!
//! ```rust
//! use oxibench_deflate::{deflate, inflate};
//!
//! // Compress data
//! let original = b"Hello, World! Hello, World!";
//! let compressed = deflate(original, 6).unwrap();
//!
//! // Decompress data
//! let decompressed = inflate(&compressed).unwrap();
//! assert_eq!(&decompressed, original);
//! ```
//!
//! ## Compression Levels
//!
//! - Level 0: No compression (stored blocks)
//! - Level 1-3: Fast compression
//! - Level 4-6: Balanced (default is 6)
//! - Level 7-9: Best compression (slower)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod deflate;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod tables;

// Re-exports
pub use codec::DeflateCodec;
pub use deflate::{Deflater, deflate};
pub use huffman::{HuffmanBuilder, HuffmanCode, HuffmanDecoder};
pub use inflate::{Inflater, inflate};
pub use lz77::{Lz77Config, Lz77Encoder, Lz77Token, find_tokens, replay};
