//! Lossy wavelet image codec.
//!
//! Each channel is transformed, quantized and entropy coded independently.
//!
//! ```text
//! stream  := "DWT1"  family:u8  levels:u8  step:f64le
//!            width:u32le  height:u32le  channels:u8
//!            (len:u32le  coefficients[len]) * channels
//! ```
//!
//! The coefficient streams are described in [`crate::coder`].

use crate::coder::{Subband, decode_subbands_for, encode_subbands};
use crate::quant::Quantizer;
use crate::wavelet::{Decomposition, Plane, WaveletFamily, forward, inverse, subband_layout};
use log::debug;
use oxibench_core::error::{OxiBenchError, Result, try_alloc};
use oxibench_core::pixel::MAX_CHANNELS;
use oxibench_core::{ByteReader, ImageCodec, ImageShape, PixelBuffer};

/// Stream magic.
pub const MAGIC: [u8; 4] = *b"DWT1";

/// Size of the stream header.
pub const HEADER_SIZE: usize = 4 + 1 + 1 + 8 + 4 + 4 + 1;

/// Deepest transform a header can describe.
pub const MAX_LEVELS: usize = u8::MAX as usize;

/// Parsed stream header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwtHeader {
    /// Wavelet family.
    pub family: WaveletFamily,
    /// Decomposition levels.
    pub levels: usize,
    /// Quantization step.
    pub step: f64,
    /// Image width.
    pub width: usize,
    /// Image height.
    pub height: usize,
    /// Samples per pixel.
    pub channels: usize,
}

impl DwtHeader {
    fn write(&self, output: &mut Vec<u8>) -> Result<()> {
        let width = u32::try_from(self.width)
            .map_err(|_| OxiBenchError::invalid_parameter("width", "exceeds u32"))?;
        let height = u32::try_from(self.height)
            .map_err(|_| OxiBenchError::invalid_parameter("height", "exceeds u32"))?;

        output.extend_from_slice(&MAGIC);
        output.push(self.family.id());
        output.push(self.levels as u8);
        output.extend_from_slice(&self.step.to_le_bytes());
        output.extend_from_slice(&width.to_le_bytes());
        output.extend_from_slice(&height.to_le_bytes());
        output.push(self.channels as u8);
        Ok(())
    }

    /// Parse and validate the header at the start of `cursor`.
    fn read(cursor: &mut ByteReader<'_>) -> Result<Self> {
        let magic = cursor.take(MAGIC.len())?;
        if magic != MAGIC.as_slice() {
            return Err(OxiBenchError::invalid_header(format!(
                "bad magic {:02x?}",
                magic
            )));
        }

        let family = WaveletFamily::from_id(cursor.read_u8()?)?;
        let levels = cursor.read_u8()? as usize;
        let step = cursor.read_f64_le()?;
        let width = cursor.read_u32_le()? as usize;
        let height = cursor.read_u32_le()? as usize;
        let channels = cursor.read_u8()? as usize;

        if !step.is_finite() || step <= 0.0 {
            return Err(OxiBenchError::invalid_header(format!(
                "quantization step {}",
                step
            )));
        }
        if width == 0 || height == 0 || channels == 0 || channels > MAX_CHANNELS {
            return Err(OxiBenchError::invalid_header(format!(
                "image shape {}x{}x{}",
                width, height, channels
            )));
        }
        let max = family.max_level(width.min(height));
        if levels == 0 || levels > max {
            return Err(OxiBenchError::invalid_header(format!(
                "{} levels for {} on {}x{} (max {})",
                levels, family, width, height, max
            )));
        }

        Ok(Self {
            family,
            levels,
            step,
            width,
            height,
            channels,
        })
    }
}

/// Wavelet codec with a fixed family, depth and quantization step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwtCodec {
    family: WaveletFamily,
    levels: usize,
    quantizer: Quantizer,
}

impl DwtCodec {
    /// Create a codec.
    ///
    /// Fails with `InvalidParameter` when `levels` is outside `1..=255` or
    /// the step is not positive and finite. Whether the depth suits a given
    /// image is checked by [`DwtCodec::compress`].
    pub fn new(family: WaveletFamily, levels: usize, step: f64) -> Result<Self> {
        if levels == 0 || levels > MAX_LEVELS {
            return Err(OxiBenchError::invalid_parameter(
                "levels",
                format!("expected 1..={}, got {}", MAX_LEVELS, levels),
            ));
        }
        Ok(Self {
            family,
            levels,
            quantizer: Quantizer::new(step)?,
        })
    }

    /// Wavelet family.
    pub fn family(&self) -> WaveletFamily {
        self.family
    }

    /// Decomposition levels.
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Quantization step.
    pub fn step(&self) -> f64 {
        self.quantizer.step()
    }

    /// Compress an image.
    pub fn compress(&self, image: &PixelBuffer) -> Result<Vec<u8>> {
        let (width, height, channels) = image.shape();
        let header = DwtHeader {
            family: self.family,
            levels: self.levels,
            step: self.step(),
            width,
            height,
            channels,
        };

        let mut output = Vec::with_capacity(HEADER_SIZE + image.byte_len() / 4);
        header.write(&mut output)?;

        for channel in 0..channels {
            let mut data: Vec<f64> = try_alloc(width * height)?;
            for (slot, sample) in data.iter_mut().zip(image.channel_samples(channel)) {
                *slot = f64::from(sample);
            }
            let plane = Plane::new(width, height, data)?;

            let decomposition = forward(&plane, self.family, self.levels)?;
            let subbands: Vec<Subband> = decomposition
                .subbands()
                .zip(self.quantizer.quantize_decomposition(&decomposition))
                .map(|(band, values)| Subband::new(band.width(), band.height(), values))
                .collect();

            let coded = encode_subbands(&subbands)?;
            let len = u32::try_from(coded.len())
                .map_err(|_| OxiBenchError::invalid_parameter("image", "channel exceeds 4 GiB"))?;
            output.extend_from_slice(&len.to_le_bytes());
            output.extend_from_slice(&coded);
        }

        debug!(
            "dwt {} L{} Q{}: {}x{}x{} -> {} bytes",
            self.family,
            self.levels,
            self.step(),
            width,
            height,
            channels,
            output.len()
        );

        Ok(output)
    }

    /// Decompress a stream made by this codec's configuration.
    pub fn decompress(&self, data: &[u8]) -> Result<PixelBuffer> {
        decompress(data, self.family, self.levels)
    }
}

/// Decompress, checking that the stream uses `family` and `levels`.
///
/// A mismatch fails with `InvalidParameter`.
pub fn decompress(data: &[u8], family: WaveletFamily, levels: usize) -> Result<PixelBuffer> {
    let mut cursor = ByteReader::new(data);
    let header = DwtHeader::read(&mut cursor)?;
    if header.family != family || header.levels != levels {
        return Err(OxiBenchError::invalid_parameter(
            "wavelet",
            format!(
                "stream uses {} with {} levels, expected {} with {}",
                header.family, header.levels, family, levels
            ),
        ));
    }
    decode_body(&mut cursor, &header)
}

/// Decompress using whatever family and depth the header names.
pub fn decompress_any(data: &[u8]) -> Result<PixelBuffer> {
    let mut cursor = ByteReader::new(data);
    let header = DwtHeader::read(&mut cursor)?;
    decode_body(&mut cursor, &header)
}

/// Read just the header of a stream.
pub fn read_header(data: &[u8]) -> Result<DwtHeader> {
    DwtHeader::read(&mut ByteReader::new(data))
}

fn decode_body(cursor: &mut ByteReader<'_>, header: &DwtHeader) -> Result<PixelBuffer> {
    let quantizer = Quantizer::new(header.step)?;
    let layout = subband_layout(header.width, header.height, header.levels);

    let mut planes = Vec::with_capacity(header.channels);
    for _ in 0..header.channels {
        let len = cursor.read_u32_le()? as usize;
        let subbands = decode_subbands_for(cursor.take(len)?, &layout)?;

        let values: Vec<Vec<i32>> = subbands.into_iter().map(|s| s.values).collect();
        let decomposition: Decomposition = quantizer.dequantize_decomposition(
            header.family,
            header.width,
            header.height,
            header.levels,
            &values,
        )?;
        planes.push(inverse(&decomposition).to_samples());
    }

    if cursor.remaining() > 0 {
        return Err(OxiBenchError::invalid_code(
            cursor.bit_position(),
            format!("{} bytes after last channel", cursor.remaining()),
        ));
    }

    PixelBuffer::from_planes(header.width, header.height, &planes)
}

impl ImageCodec for DwtCodec {
    fn label(&self) -> String {
        format!("dwt-{}-L{}-Q{}", self.family, self.levels, self.step())
    }

    fn is_lossless(&self) -> bool {
        false
    }

    fn encode(&self, image: &PixelBuffer) -> Result<Vec<u8>> {
        self.compress(image)
    }

    fn decode(&self, data: &[u8], shape: ImageShape) -> Result<PixelBuffer> {
        let image = self.decompress(data)?;
        if image.shape() != shape {
            return Err(OxiBenchError::dimension_mismatch(shape, image.shape()));
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize, channels: usize) -> PixelBuffer {
        let samples = (0..width * height * channels)
            .map(|i| {
                let pixel = i / channels;
                ((pixel % width) * 3 + (pixel / width) * 2 + (i % channels) * 40) as u8
            })
            .collect();
        PixelBuffer::new(width, height, channels, samples).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let codec = DwtCodec::new(WaveletFamily::Db2, 2, 8.0).unwrap();
        let bytes = codec.compress(&gradient(16, 12, 1)).unwrap();

        assert_eq!(&bytes[..4], b"DWT1");
        let header = read_header(&bytes).unwrap();
        assert_eq!(header.family, WaveletFamily::Db2);
        assert_eq!(header.levels, 2);
        assert_eq!(header.step, 8.0);
        assert_eq!((header.width, header.height, header.channels), (16, 12, 1));
    }

    #[test]
    fn test_small_step_is_near_lossless() {
        let image = gradient(20, 15, 3);
        let codec = DwtCodec::new(WaveletFamily::Haar, 2, 0.5).unwrap();
        let decoded = codec.decode(&codec.encode(&image).unwrap(), image.shape()).unwrap();

        let max_diff = image
            .samples()
            .iter()
            .zip(decoded.samples())
            .map(|(&a, &b)| (a as i32 - b as i32).abs())
            .max()
            .unwrap();
        assert!(max_diff <= 1, "max diff {}", max_diff);
    }

    #[test]
    fn test_family_mismatch() {
        let codec = DwtCodec::new(WaveletFamily::Haar, 1, 4.0).unwrap();
        let bytes = codec.compress(&gradient(8, 8, 1)).unwrap();

        assert!(matches!(
            decompress(&bytes, WaveletFamily::Db1, 1),
            Err(OxiBenchError::InvalidParameter { .. })
        ));
        assert!(matches!(
            decompress(&bytes, WaveletFamily::Haar, 2),
            Err(OxiBenchError::InvalidParameter { .. })
        ));
        assert!(decompress_any(&bytes).is_ok());
    }

    #[test]
    fn test_invalid_construction() {
        assert!(DwtCodec::new(WaveletFamily::Haar, 0, 1.0).is_err());
        assert!(DwtCodec::new(WaveletFamily::Haar, 300, 1.0).is_err());
        assert!(DwtCodec::new(WaveletFamily::Haar, 1, 0.0).is_err());
        assert!(DwtCodec::new(WaveletFamily::Haar, 1, f64::NAN).is_err());
    }

    #[test]
    fn test_too_deep_for_image() {
        let codec = DwtCodec::new(WaveletFamily::Db4, 3, 10.0).unwrap();
        assert!(matches!(
            codec.compress(&gradient(16, 16, 1)),
            Err(OxiBenchError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_bad_magic() {
        let codec = DwtCodec::new(WaveletFamily::Haar, 1, 4.0).unwrap();
        let mut bytes = codec.compress(&gradient(8, 8, 1)).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            decompress_any(&bytes),
            Err(OxiBenchError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_oversized_subband_shape_is_rejected() {
        let codec = DwtCodec::new(WaveletFamily::Haar, 1, 4.0).unwrap();
        let bytes = codec.compress(&gradient(8, 8, 1)).unwrap();

        // Same subband count as the header's layout, first shape blown up
        let bands = vec![Subband::new(4, 4, vec![0; 16]); 4];
        let mut block = encode_subbands(&bands).unwrap();
        block[2..6].copy_from_slice(&(1u32 << 31).to_le_bytes());

        let mut crafted = bytes[..HEADER_SIZE].to_vec();
        crafted.extend_from_slice(&(block.len() as u32).to_le_bytes());
        crafted.extend_from_slice(&block);

        assert!(matches!(
            decompress(&crafted, WaveletFamily::Haar, 1),
            Err(OxiBenchError::InvalidCode { .. })
        ));
    }

    #[test]
    fn test_label() {
        let codec = DwtCodec::new(WaveletFamily::Bior22, 3, 12.5).unwrap();
        assert_eq!(codec.label(), "dwt-bior2.2-L3-Q12.5");
        assert!(!codec.is_lossless());
    }
}
