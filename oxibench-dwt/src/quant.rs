//! Uniform scalar quantization of wavelet coefficients.
//!
//! ```text
//!   q = round(c / step)      (half away from zero)
//!   c' = q * step
//! ```
//!
//! Quantized values are clamped to `±(2^24 - 1)` so every value fits the
//! coefficient coder's 24 magnitude categories.

use crate::wavelet::{Decomposition, Plane, WaveletFamily, subband_layout};
use oxibench_core::error::{OxiBenchError, Result};

/// Largest quantized magnitude.
pub const MAX_QUANTIZED: i32 = (1 << 24) - 1;

/// A quantized value and the step that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizedCoefficient {
    /// Quantization index.
    pub value: i32,
    /// Step size.
    pub step: f64,
}

impl QuantizedCoefficient {
    /// Reconstructed coefficient.
    pub fn dequantize(&self) -> f64 {
        self.value as f64 * self.step
    }
}

/// Quantizer with a fixed step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    step: f64,
}

impl Quantizer {
    /// Create a quantizer; the step must be positive and finite.
    pub fn new(step: f64) -> Result<Self> {
        if !step.is_finite() || step <= 0.0 {
            return Err(OxiBenchError::invalid_parameter(
                "quant_step",
                format!("step must be positive and finite, got {}", step),
            ));
        }
        Ok(Self { step })
    }

    /// Step size.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Quantize one coefficient.
    #[inline]
    pub fn quantize(&self, coefficient: f64) -> i32 {
        (coefficient / self.step)
            .round()
            .clamp(-(MAX_QUANTIZED as f64), MAX_QUANTIZED as f64) as i32
    }

    /// Quantize one coefficient, keeping the step alongside.
    pub fn quantize_coefficient(&self, coefficient: f64) -> QuantizedCoefficient {
        QuantizedCoefficient {
            value: self.quantize(coefficient),
            step: self.step,
        }
    }

    /// Reconstruct one coefficient.
    #[inline]
    pub fn dequantize(&self, value: i32) -> f64 {
        value as f64 * self.step
    }

    /// Quantize a plane in row-major order.
    pub fn quantize_plane(&self, plane: &Plane) -> Vec<i32> {
        plane.data().iter().map(|&c| self.quantize(c)).collect()
    }

    /// Reconstruct a `width × height` plane.
    pub fn dequantize_plane(&self, width: usize, height: usize, values: &[i32]) -> Result<Plane> {
        Plane::new(
            width,
            height,
            values.iter().map(|&q| self.dequantize(q)).collect(),
        )
    }

    /// Quantize every subband, in [`subband_layout`] order.
    pub fn quantize_decomposition(&self, decomposition: &Decomposition) -> Vec<Vec<i32>> {
        decomposition
            .subbands()
            .map(|band| self.quantize_plane(band))
            .collect()
    }

    /// Rebuild a decomposition from quantized subbands.
    pub fn dequantize_decomposition(
        &self,
        family: WaveletFamily,
        width: usize,
        height: usize,
        levels: usize,
        subbands: &[Vec<i32>],
    ) -> Result<Decomposition> {
        let layout = subband_layout(width, height, levels);
        if subbands.len() != layout.len() {
            return Err(OxiBenchError::invalid_parameter(
                "subbands",
                format!("expected {} subbands, got {}", layout.len(), subbands.len()),
            ));
        }
        let planes = layout
            .iter()
            .zip(subbands)
            .map(|(&(w, h), values)| self.dequantize_plane(w, h, values))
            .collect::<Result<Vec<_>>>()?;
        Decomposition::from_subbands(family, width, height, levels, planes)
    }
}

/// `round(coefficient / step)`, clamped to `±(2^24 - 1)`.
pub fn quantize(coefficient: f64, step: f64) -> Result<i32> {
    Ok(Quantizer::new(step)?.quantize(coefficient))
}

/// `value * step`.
pub fn dequantize(value: i32, step: f64) -> Result<f64> {
    Ok(Quantizer::new(step)?.dequantize(value))
}
