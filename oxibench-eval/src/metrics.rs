//! Image quality and compression metrics.
//!
//! - **MSE / PSNR**: `10 * log10(255² / MSE)`, infinite for identical images
//! - **SSIM**: 7×7 uniform window, `K1 = 0.01`, `K2 = 0.03`, `L = 255`,
//!   sample covariance, averaged over windows that fit inside the image
//! - **Compression ratio**: uncompressed bytes / compressed bytes
//! - **Bits per pixel**: compressed bits / pixel count
//!
//! Every comparison requires both images to share width, height and channel
//! count.

use crate::serde_util;
use oxibench_core::error::{OxiBenchError, Result};
use oxibench_core::{MAX_PIXEL_VALUE, PixelBuffer};
use serde::{Deserialize, Serialize};

/// Side of the SSIM window.
pub const SSIM_WINDOW: usize = 7;

/// SSIM luminance constant factor.
pub const SSIM_K1: f64 = 0.01;

/// SSIM contrast constant factor.
pub const SSIM_K2: f64 = 0.03;

/// Mean squared error over all samples.
pub fn mse(original: &PixelBuffer, reconstructed: &PixelBuffer) -> Result<f64> {
    original.ensure_same_shape(reconstructed)?;

    let sum: f64 = original
        .samples()
        .iter()
        .zip(reconstructed.samples())
        .map(|(&a, &b)| {
            let diff = f64::from(a) - f64::from(b);
            diff * diff
        })
        .sum();
    Ok(sum / original.byte_len() as f64)
}

/// Peak signal-to-noise ratio in dB.
///
/// Returns `f64::INFINITY` when the images are identical.
pub fn psnr(original: &PixelBuffer, reconstructed: &PixelBuffer) -> Result<f64> {
    Ok(psnr_from_mse(mse(original, reconstructed)?))
}

/// PSNR for an already computed MSE.
pub fn psnr_from_mse(mse: f64) -> f64 {
    if mse == 0.0 {
        return f64::INFINITY;
    }
    let peak = f64::from(MAX_PIXEL_VALUE);
    10.0 * (peak * peak / mse).log10()
}

/// Summed-area tables of one channel pair.
struct WindowSums {
    stride: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    xx: Vec<f64>,
    yy: Vec<f64>,
    xy: Vec<f64>,
}

impl WindowSums {
    fn new(a: &[f64], b: &[f64], width: usize, height: usize) -> Self {
        let stride = width + 1;
        let size = stride * (height + 1);
        let mut sums = Self {
            stride,
            x: vec![0.0; size],
            y: vec![0.0; size],
            xx: vec![0.0; size],
            yy: vec![0.0; size],
            xy: vec![0.0; size],
        };

        for row in 0..height {
            let (mut rx, mut ry, mut rxx, mut ryy, mut rxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for col in 0..width {
                let (p, q) = (a[row * width + col], b[row * width + col]);
                rx += p;
                ry += q;
                rxx += p * p;
                ryy += q * q;
                rxy += p * q;

                let above = row * stride + col + 1;
                let at = above + stride;
                sums.x[at] = sums.x[above] + rx;
                sums.y[at] = sums.y[above] + ry;
                sums.xx[at] = sums.xx[above] + rxx;
                sums.yy[at] = sums.yy[above] + ryy;
                sums.xy[at] = sums.xy[above] + rxy;
            }
        }
        sums
    }

    /// Sum of `table` over columns `x0..x1` and rows `y0..y1`.
    fn rect(&self, table: &[f64], x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        let s = self.stride;
        table[y1 * s + x1] - table[y0 * s + x1] - table[y1 * s + x0] + table[y0 * s + x0]
    }

    /// SSIM of the window `x0..x1` × `y0..y1`.
    fn window_ssim(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        let n = ((x1 - x0) * (y1 - y0)) as f64;
        let cov_norm = if n > 1.0 { n / (n - 1.0) } else { 1.0 };
        let peak = f64::from(MAX_PIXEL_VALUE);
        let c1 = (SSIM_K1 * peak).powi(2);
        let c2 = (SSIM_K2 * peak).powi(2);

        let ux = self.rect(&self.x, x0, y0, x1, y1) / n;
        let uy = self.rect(&self.y, x0, y0, x1, y1) / n;
        let vx = (self.rect(&self.xx, x0, y0, x1, y1) / n - ux * ux) * cov_norm;
        let vy = (self.rect(&self.yy, x0, y0, x1, y1) / n - uy * uy) * cov_norm;
        let vxy = (self.rect(&self.xy, x0, y0, x1, y1) / n - ux * uy) * cov_norm;

        ((2.0 * ux * uy + c1) * (2.0 * vxy + c2)) / ((ux * ux + uy * uy + c1) * (vx + vy + c2))
    }
}

/// Mean SSIM of one channel.
fn channel_ssim(a: &[f64], b: &[f64], width: usize, height: usize) -> f64 {
    let sums = WindowSums::new(a, b, width, height);

    // Too small for a 7x7 window: one window over the whole image
    if width < SSIM_WINDOW || height < SSIM_WINDOW {
        return sums.window_ssim(0, 0, width, height);
    }

    let mut total = 0.0;
    let mut count = 0usize;
    for y0 in 0..=height - SSIM_WINDOW {
        for x0 in 0..=width - SSIM_WINDOW {
            total += sums.window_ssim(x0, y0, x0 + SSIM_WINDOW, y0 + SSIM_WINDOW);
            count += 1;
        }
    }
    total / count as f64
}

/// Structural similarity index, averaged over channels.
///
/// Identical images score exactly 1.0.
pub fn ssim(original: &PixelBuffer, reconstructed: &PixelBuffer) -> Result<f64> {
    original.ensure_same_shape(reconstructed)?;
    if original.samples() == reconstructed.samples() {
        return Ok(1.0);
    }

    let (width, height, channels) = original.shape();
    let total: f64 = (0..channels)
        .map(|c| {
            let a: Vec<f64> = original.channel_samples(c).map(f64::from).collect();
            let b: Vec<f64> = reconstructed.channel_samples(c).map(f64::from).collect();
            channel_ssim(&a, &b, width, height)
        })
        .sum();
    Ok(total / channels as f64)
}

/// `uncompressed / compressed`; infinite for an empty stream.
pub fn compression_ratio(uncompressed: usize, compressed: usize) -> f64 {
    if compressed == 0 {
        return f64::INFINITY;
    }
    uncompressed as f64 / compressed as f64
}

/// Compressed bits per pixel.
pub fn bits_per_pixel(compressed: usize, pixels: usize) -> Result<f64> {
    if pixels == 0 {
        return Err(OxiBenchError::invalid_parameter(
            "pixels",
            "bits per pixel of an empty image",
        ));
    }
    Ok(compressed as f64 * 8.0 / pixels as f64)
}

/// All metrics of one compression run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Mean squared error.
    pub mse: f64,
    /// Peak signal-to-noise ratio (dB).
    #[serde(with = "serde_util::float")]
    pub psnr: f64,
    /// Structural similarity.
    pub ssim: f64,
    /// Uncompressed / compressed size.
    #[serde(with = "serde_util::float")]
    pub compression_ratio: f64,
    /// Compressed bits per pixel.
    pub bits_per_pixel: f64,
}

impl QualityMetrics {
    /// Score a reconstruction against its original.
    pub fn evaluate(
        original: &PixelBuffer,
        reconstructed: &PixelBuffer,
        compressed_len: usize,
    ) -> Result<Self> {
        let mse = mse(original, reconstructed)?;
        Ok(Self {
            mse,
            psnr: psnr_from_mse(mse),
            ssim: ssim(original, reconstructed)?,
            compression_ratio: compression_ratio(original.byte_len(), compressed_len),
            bits_per_pixel: bits_per_pixel(compressed_len, original.pixel_count())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn golden_pair() -> (PixelBuffer, PixelBuffer) {
        let (w, h) = (16usize, 16usize);
        let a: Vec<u8> = (0..h)
            .flat_map(|y| (0..w).map(move |x| ((x * 16 + y * 7) % 256) as u8))
            .collect();
        let b: Vec<u8> = (0..h)
            .flat_map(|y| (0..w).map(move |x| (x, y)))
            .map(|(x, y)| {
                let v = a[y * w + x] as i32 + ((x * 3 + y * 5) % 11) as i32 - 5;
                v.clamp(0, 255) as u8
            })
            .collect();
        (
            PixelBuffer::grayscale(w, h, a).unwrap(),
            PixelBuffer::grayscale(w, h, b).unwrap(),
        )
    }

    #[test]
    fn test_identical_images() {
        let (a, _) = golden_pair();
        assert_eq!(mse(&a, &a).unwrap(), 0.0);
        assert_eq!(psnr(&a, &a).unwrap(), f64::INFINITY);
        assert_eq!(ssim(&a, &a).unwrap(), 1.0);
    }

    #[test]
    fn test_golden_values() {
        let (a, b) = golden_pair();
        assert!((mse(&a, &b).unwrap() - 9.90625).abs() < 1e-12);
        assert!((psnr(&a, &b).unwrap() - 38.171710769700645).abs() < 1e-9);
        assert!((ssim(&a, &b).unwrap() - 0.9971915307581759).abs() < 1e-9);
    }

    #[test]
    fn test_small_image_global_window() {
        let a: Vec<u8> = (0..20).map(|i| (i * 37 % 256) as u8).collect();
        let b: Vec<u8> = (0..20).map(|i| ((i * 37 + 9) % 256) as u8).collect();
        let a = PixelBuffer::grayscale(5, 4, a).unwrap();
        let b = PixelBuffer::grayscale(5, 4, b).unwrap();
        assert!((ssim(&a, &b).unwrap() - 0.9968228668860657).abs() < 1e-9);
    }

    #[test]
    fn test_known_psnr() {
        let a = PixelBuffer::filled(4, 4, 1, 100).unwrap();
        let b = PixelBuffer::filled(4, 4, 1, 110).unwrap();
        assert_eq!(mse(&a, &b).unwrap(), 100.0);
        let expected = 10.0 * (255.0f64 * 255.0 / 100.0).log10();
        assert!((psnr(&a, &b).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = PixelBuffer::filled(4, 4, 1, 0).unwrap();
        let b = PixelBuffer::filled(4, 4, 3, 0).unwrap();
        for result in [mse(&a, &b), psnr(&a, &b), ssim(&a, &b)] {
            assert!(matches!(
                result,
                Err(OxiBenchError::DimensionMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_ratio_and_bpp() {
        assert_eq!(compression_ratio(1000, 250), 4.0);
        assert_eq!(compression_ratio(1000, 0), f64::INFINITY);
        assert_eq!(bits_per_pixel(100, 400).unwrap(), 2.0);
        assert!(bits_per_pixel(100, 0).is_err());
    }

    #[test]
    fn test_evaluate() {
        let (a, b) = golden_pair();
        let metrics = QualityMetrics::evaluate(&a, &b, 64).unwrap();
        assert_eq!(metrics.compression_ratio, 4.0);
        assert_eq!(metrics.bits_per_pixel, 2.0);
        assert!(metrics.psnr > 38.0 && metrics.psnr < 38.5);
        assert!(metrics.ssim < 1.0);
    }
}
