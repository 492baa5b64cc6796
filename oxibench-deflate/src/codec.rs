//! Lossless image codec built on the Deflate stream.

use crate::deflate::Deflater;
use crate::inflate::inflate;
use oxibench_core::error::{OxiBenchError, Result};
use oxibench_core::{CompressionLevel, ImageCodec, ImageShape, PixelBuffer};

/// Compresses the interleaved samples of an image as one Deflate stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeflateCodec {
    deflater: Deflater,
}

impl DeflateCodec {
    /// Codec at the given effort level (0-9).
    pub fn new(level: impl Into<CompressionLevel>) -> Self {
        Self {
            deflater: Deflater::new(level),
        }
    }

    /// Effort level.
    pub fn level(&self) -> CompressionLevel {
        self.deflater.level()
    }
}

impl ImageCodec for DeflateCodec {
    fn label(&self) -> String {
        format!("deflate-L{}", self.level().level())
    }

    fn is_lossless(&self) -> bool {
        true
    }

    fn encode(&self, image: &PixelBuffer) -> Result<Vec<u8>> {
        self.deflater.compress(image.samples())
    }

    fn decode(&self, data: &[u8], shape: ImageShape) -> Result<PixelBuffer> {
        let samples = inflate(data)?;
        let (width, height, channels) = shape;
        if samples.len() != width * height * channels {
            return Err(OxiBenchError::dimension_mismatch(
                shape,
                (samples.len(), 1, 1),
            ));
        }
        PixelBuffer::new(width, height, channels, samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_roundtrip() {
        let samples: Vec<u8> = (0..16 * 16 * 3).map(|i| (i / 7) as u8).collect();
        let image = PixelBuffer::new(16, 16, 3, samples).unwrap();

        let codec = DeflateCodec::new(6);
        assert_eq!(codec.label(), "deflate-L6");
        assert!(codec.is_lossless());

        let bytes = codec.encode(&image).unwrap();
        let decoded = codec.decode(&bytes, image.shape()).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_wrong_shape() {
        let image = PixelBuffer::filled(4, 4, 1, 9).unwrap();
        let codec = DeflateCodec::new(1);
        let bytes = codec.encode(&image).unwrap();
        let err = codec.decode(&bytes, (4, 5, 1)).unwrap_err();
        assert!(matches!(err, OxiBenchError::DimensionMismatch { .. }));
    }
}
