//! Command implementations for OxiBench CLI.

pub mod single;
pub mod sweep;
pub mod wavelets;

pub use single::{SingleOptions, cmd_single};
pub use sweep::{SweepOptions, cmd_sweep};
pub use wavelets::cmd_wavelets;

use oxibench_eval::{BatchReport, CompressionResult, FailureRecord};
use serde::Serialize;

/// JSON output for a batch.
#[derive(Debug, Serialize)]
pub(crate) struct ReportJson<'a> {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub results: Vec<&'a CompressionResult>,
    pub failures: &'a [FailureRecord],
}

impl<'a> ReportJson<'a> {
    pub fn new(
        shape: (usize, usize, usize),
        results: Vec<&'a CompressionResult>,
        report: &'a BatchReport,
    ) -> Self {
        let (width, height, channels) = shape;
        Self {
            width,
            height,
            channels,
            results,
            failures: &report.failures,
        }
    }
}
