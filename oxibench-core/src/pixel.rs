//! Immutable 8-bit pixel buffers.
//!
//! A [`PixelBuffer`] is the unit every codec consumes and every metric
//! compares. Samples are interleaved (`y * width * channels + x * channels + c`)
//! and never change after construction, so one buffer can be shared across
//! worker threads behind an `Arc`.

use crate::error::{OxiBenchError, Result};

/// Largest value an 8-bit sample can hold.
pub const MAX_PIXEL_VALUE: u8 = 255;

/// Largest channel count accepted (grey, grey+alpha, RGB, RGBA).
pub const MAX_CHANNELS: usize = 4;

/// A validated `width × height × channels` grid of 8-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    channels: usize,
    samples: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap `samples` as an image.
    ///
    /// Fails with `InvalidParameter` when a dimension is zero, the channel
    /// count is outside `1..=4`, or the sample count does not match.
    pub fn new(width: usize, height: usize, channels: usize, samples: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(OxiBenchError::invalid_parameter(
                "dimensions",
                format!("image must be non-empty, got {}x{}", width, height),
            ));
        }
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(OxiBenchError::invalid_parameter(
                "channels",
                format!("expected 1..={}, got {}", MAX_CHANNELS, channels),
            ));
        }
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .ok_or_else(|| {
                OxiBenchError::invalid_parameter("dimensions", "sample count overflows usize")
            })?;
        if samples.len() != expected {
            return Err(OxiBenchError::invalid_parameter(
                "samples",
                format!(
                    "{}x{}x{} needs {} samples, got {}",
                    width,
                    height,
                    channels,
                    expected,
                    samples.len()
                ),
            ));
        }

        Ok(Self {
            width,
            height,
            channels,
            samples,
        })
    }

    /// Single-channel image.
    pub fn grayscale(width: usize, height: usize, samples: Vec<u8>) -> Result<Self> {
        Self::new(width, height, 1, samples)
    }

    /// Image with every sample set to `value`.
    pub fn filled(width: usize, height: usize, channels: usize, value: u8) -> Result<Self> {
        let len = width.saturating_mul(height).saturating_mul(channels);
        Self::new(width, height, channels, vec![value; len])
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Samples per pixel.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// `(width, height, channels)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.channels)
    }

    /// Number of pixels (not samples).
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Size of the raw samples in bytes.
    pub fn byte_len(&self) -> usize {
        self.samples.len()
    }

    /// Sample at `(x, y, channel)`.
    pub fn get(&self, x: usize, y: usize, channel: usize) -> Option<u8> {
        if x >= self.width || y >= self.height || channel >= self.channels {
            return None;
        }
        Some(self.samples[(y * self.width + x) * self.channels + channel])
    }

    /// Iterate over one channel in row-major order.
    pub fn channel_samples(&self, channel: usize) -> impl Iterator<Item = u8> + '_ {
        self.samples
            .iter()
            .skip(channel)
            .step_by(self.channels)
            .copied()
    }

    /// Copy one channel out as a row-major plane.
    pub fn channel_plane(&self, channel: usize) -> Vec<u8> {
        if self.channels == 1 {
            return self.samples.clone();
        }
        self.channel_samples(channel).collect()
    }

    /// Interleave per-channel planes back into an image.
    pub fn from_planes(width: usize, height: usize, planes: &[Vec<u8>]) -> Result<Self> {
        let channels = planes.len();
        if planes.iter().any(|p| p.len() != width * height) {
            return Err(OxiBenchError::invalid_parameter(
                "planes",
                format!("every plane must hold {} samples", width * height),
            ));
        }
        if channels == 1 {
            return Self::new(width, height, 1, planes[0].clone());
        }

        let mut samples = Vec::with_capacity(width * height * channels);
        for i in 0..width * height {
            for plane in planes {
                samples.push(plane[i]);
            }
        }
        Self::new(width, height, channels, samples)
    }

    /// Check that `other` has the same shape.
    pub fn ensure_same_shape(&self, other: &PixelBuffer) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(OxiBenchError::dimension_mismatch(self.shape(), other.shape()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates() {
        assert!(PixelBuffer::new(2, 2, 1, vec![0; 4]).is_ok());
        assert!(PixelBuffer::new(0, 2, 1, vec![]).is_err());
        assert!(PixelBuffer::new(2, 2, 5, vec![0; 20]).is_err());
        assert!(PixelBuffer::new(2, 2, 3, vec![0; 11]).is_err());
        assert!(PixelBuffer::new(usize::MAX, 2, 1, vec![]).is_err());
    }

    #[test]
    fn test_channel_planes() {
        let samples = vec![1, 10, 2, 20, 3, 30, 4, 40];
        let img = PixelBuffer::new(2, 2, 2, samples.clone()).unwrap();

        assert_eq!(img.channel_plane(0), vec![1, 2, 3, 4]);
        assert_eq!(img.channel_plane(1), vec![10, 20, 30, 40]);
        assert_eq!(img.get(1, 1, 1), Some(40));
        assert_eq!(img.get(2, 0, 0), None);

        let planes = vec![img.channel_plane(0), img.channel_plane(1)];
        let rebuilt = PixelBuffer::from_planes(2, 2, &planes).unwrap();
        assert_eq!(rebuilt.samples(), samples.as_slice());
    }

    #[test]
    fn test_shape_mismatch() {
        let a = PixelBuffer::filled(4, 4, 1, 0).unwrap();
        let b = PixelBuffer::filled(4, 3, 1, 0).unwrap();
        let err = a.ensure_same_shape(&b).unwrap_err();
        assert!(matches!(err, OxiBenchError::DimensionMismatch { .. }));
        assert!(a.ensure_same_shape(&a.clone()).is_ok());
    }
}
