//! Codec configurations and the parameter grid that enumerates them.

use crate::serde_util;
use oxibench_core::error::{OxiBenchError, Result};
use oxibench_core::ImageCodec;
use oxibench_deflate::DeflateCodec;
use oxibench_dwt::codec::MAX_LEVELS;
use oxibench_dwt::{DwtCodec, Quantizer, WaveletFamily};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest Deflate level.
pub const MAX_DEFLATE_LEVEL: u8 = 9;

/// Position of a configuration in its batch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConfigId(pub usize);

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One codec with all of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "codec", rename_all = "snake_case")]
pub enum Configuration {
    /// Lossless LZ77 + Huffman.
    Deflate {
        /// Compression level (0-9).
        level: u8,
    },
    /// Lossy wavelet codec.
    Dwt {
        /// Wavelet family.
        #[serde(with = "serde_util::wavelet")]
        wavelet: WaveletFamily,
        /// Decomposition depth.
        levels: usize,
        /// Quantization step.
        quant_step: f64,
    },
}

impl Configuration {
    /// Label matching [`ImageCodec::label`] of the codec it builds.
    pub fn label(&self) -> String {
        match self {
            Self::Deflate { level } => format!("deflate-L{}", level),
            Self::Dwt {
                wavelet,
                levels,
                quant_step,
            } => format!("dwt-{}-L{}-Q{}", wavelet, levels, quant_step),
        }
    }

    /// Whether the codec reproduces its input exactly.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Deflate { .. })
    }

    /// Check every field against its range.
    ///
    /// Depth against a concrete image is checked when the codec runs.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Deflate { level } => validate_deflate_level(level),
            Self::Dwt {
                levels, quant_step, ..
            } => {
                validate_dwt_level(levels)?;
                Quantizer::new(quant_step).map(|_| ())
            }
        }
    }

    /// Build the codec.
    pub fn codec(&self) -> Result<Box<dyn ImageCodec + Send + Sync>> {
        self.validate()?;
        match *self {
            Self::Deflate { level } => Ok(Box::new(DeflateCodec::new(level))),
            Self::Dwt {
                wavelet,
                levels,
                quant_step,
            } => Ok(Box::new(DwtCodec::new(wavelet, levels, quant_step)?)),
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn validate_deflate_level(level: u8) -> Result<()> {
    if level > MAX_DEFLATE_LEVEL {
        return Err(OxiBenchError::invalid_parameter(
            "deflate_level",
            format!("level must be 0-{}, got {}", MAX_DEFLATE_LEVEL, level),
        ));
    }
    Ok(())
}

fn validate_dwt_level(levels: usize) -> Result<()> {
    if levels == 0 || levels > MAX_LEVELS {
        return Err(OxiBenchError::invalid_parameter(
            "dwt_levels",
            format!("levels must be 1-{}, got {}", MAX_LEVELS, levels),
        ));
    }
    Ok(())
}

/// Cartesian sweep over codec parameters.
///
/// Missing JSON fields fall back to the default sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterGrid {
    /// Deflate levels.
    pub deflate_levels: Vec<u8>,
    /// Wavelet family names.
    pub wavelets: Vec<String>,
    /// DWT decomposition depths.
    pub dwt_levels: Vec<usize>,
    /// Quantization steps.
    pub quant_steps: Vec<f64>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            deflate_levels: (1..=9).collect(),
            wavelets: ["haar", "db1", "db4", "sym2", "coif1", "bior2.2"]
                .into_iter()
                .map(String::from)
                .collect(),
            dwt_levels: (2..=30).step_by(2).collect(),
            quant_steps: (1..=20).map(|i| f64::from(i) * 5.0).collect(),
        }
    }
}

impl ParameterGrid {
    /// Parse a grid from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let grid: Self = serde_json::from_str(json)
            .map_err(|e| OxiBenchError::invalid_parameter("grid", e.to_string()))?;
        grid.validate()?;
        Ok(grid)
    }

    /// Check every listed value.
    pub fn validate(&self) -> Result<()> {
        for &level in &self.deflate_levels {
            validate_deflate_level(level)?;
        }
        self.families()?;
        for &levels in &self.dwt_levels {
            validate_dwt_level(levels)?;
        }
        for &step in &self.quant_steps {
            Quantizer::new(step)?;
        }
        Ok(())
    }

    /// Resolve the wavelet names.
    pub fn families(&self) -> Result<Vec<WaveletFamily>> {
        self.wavelets
            .iter()
            .map(|name| WaveletFamily::from_name(name))
            .collect()
    }

    /// Number of configurations.
    pub fn len(&self) -> usize {
        self.deflate_levels.len()
            + self.wavelets.len() * self.dwt_levels.len() * self.quant_steps.len()
    }

    /// Whether the grid yields no configuration.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deflate levels first, then wavelet × depth × step, numbered in order.
    pub fn enumerate(&self) -> Result<Vec<(ConfigId, Configuration)>> {
        self.validate()?;
        let families = self.families()?;

        let deflate = self
            .deflate_levels
            .iter()
            .map(|&level| Configuration::Deflate { level });
        let dwt = families.into_iter().flat_map(|wavelet| {
            self.dwt_levels.iter().flat_map(move |&levels| {
                self.quant_steps
                    .iter()
                    .map(move |&quant_step| Configuration::Dwt {
                        wavelet,
                        levels,
                        quant_step,
                    })
            })
        });

        Ok(deflate
            .chain(dwt)
            .enumerate()
            .map(|(i, config)| (ConfigId(i), config))
            .collect())
    }
}
