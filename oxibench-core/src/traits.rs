//! Core traits shared by the codecs.
//!
//! Every codec under test implements [`ImageCodec`], which is the seam the
//! experiment runner drives: encode an image to bytes, decode the bytes back
//! to an image of a known shape.

use crate::error::Result;
use crate::pixel::PixelBuffer;

/// `(width, height, channels)` of an image.
pub type ImageShape = (usize, usize, usize);

/// An image codec driven by the experiment runner.
pub trait ImageCodec {
    /// Short human-readable label including the codec parameters.
    fn label(&self) -> String;

    /// Whether decoding reproduces the input exactly.
    fn is_lossless(&self) -> bool;

    /// Compress an image to a self-describing byte stream.
    fn encode(&self, image: &PixelBuffer) -> Result<Vec<u8>>;

    /// Decompress a stream produced by [`ImageCodec::encode`].
    ///
    /// `shape` is the shape of the encoded image; codecs whose streams carry
    /// the shape verify it and fail with `DimensionMismatch` on disagreement.
    fn decode(&self, data: &[u8], shape: ImageShape) -> Result<PixelBuffer>;
}

/// Compression effort level for the lossless codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// No compression (store only).
    pub const NONE: Self = Self(0);
    /// Fastest compression.
    pub const FAST: Self = Self(1);
    /// Default compression (balanced).
    pub const DEFAULT: Self = Self(6);
    /// Best compression (slowest).
    pub const BEST: Self = Self(9);

    /// Create a custom compression level (0-9).
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    /// Get the level value.
    pub fn level(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for CompressionLevel {
    fn from(level: u8) -> Self {
        Self::new(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_level() {
        assert_eq!(CompressionLevel::NONE.level(), 0);
        assert_eq!(CompressionLevel::FAST.level(), 1);
        assert_eq!(CompressionLevel::DEFAULT.level(), 6);
        assert_eq!(CompressionLevel::BEST.level(), 9);

        // Test clamping
        assert_eq!(CompressionLevel::new(100).level(), 9);
        assert_eq!(CompressionLevel::from(3), CompressionLevel::new(3));
        assert!(CompressionLevel::FAST < CompressionLevel::BEST);
    }
}
