//! # OxiBench Eval
//!
//! Evaluation engine for the OxiBench harness: quality metrics, parameter
//! grids and a parallel experiment runner.
//!
//! ## Components
//!
//! - [`metrics`]: MSE, PSNR, SSIM, compression ratio, bits per pixel
//! - [`grid`]: codec configurations and the parameter sweep
//! - [`runner`]: bounded worker pool with per-configuration failure isolation
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use oxibench_core::PixelBuffer;
//! use oxibench_eval::{Orchestrator, ParameterGrid, RunRecord};
//!
//! let samples: Vec<u8> = (0..32 * 32).map(|i| (i % 32 * 8) as u8).collect();
//! let image = Arc::new(PixelBuffer::grayscale(32, 32, samples).unwrap());
//!
//! let grid = ParameterGrid {
//!     deflate_levels: vec![6],
//!     wavelets: vec!["haar".into()],
//!     dwt_levels: vec![2],
//!     quant_steps: vec![10.0],
//! };
//! let mut records: Vec<RunRecord> = Vec::new();
//! let report = Orchestrator::new(2)
//!     .unwrap()
//!     .run(image, grid.enumerate().unwrap(), &mut records)
//!     .unwrap();
//! assert_eq!(report.results.len(), 2);
//! assert_eq!(records.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod grid;
pub mod metrics;
pub mod runner;
mod serde_util;

// Re-exports
pub use grid::{ConfigId, Configuration, ParameterGrid};
pub use metrics::{QualityMetrics, bits_per_pixel, compression_ratio, mse, psnr, ssim};
pub use runner::{
    BatchReport, CancellationToken, CompressionResult, FailureRecord, Measurement, NullSink,
    Orchestrator, ResultSink, RunRecord, measure, run_grid,
};
