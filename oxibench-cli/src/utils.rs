//! Utility functions for the CLI.

use indicatif::{ProgressBar, ProgressStyle};
use oxibench_core::PixelBuffer;
use oxibench_eval::{CompressionResult, FailureRecord, ResultSink, RunRecord};
use std::path::Path;

/// Create a progress bar with standard styling.
pub fn create_progress_bar(len: u64, enable: bool) -> ProgressBar {
    if !enable {
        return ProgressBar::hidden();
    }

    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░ ");
    let pb = ProgressBar::new(len);
    pb.set_style(style);
    pb
}

/// Advances a progress bar as records arrive.
pub struct ProgressSink {
    bar: ProgressBar,
}

impl ProgressSink {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ResultSink for ProgressSink {
    fn record(&mut self, record: &RunRecord) {
        match record {
            RunRecord::Success(r) => self.bar.set_message(r.label.clone()),
            RunRecord::Failure(f) => self.bar.set_message(format!("{} failed", f.label)),
        }
        self.bar.inc(1);
    }
}

/// Read a headerless file of interleaved 8-bit samples.
pub fn load_raw_image(
    path: &Path,
    width: usize,
    height: usize,
    channels: usize,
) -> Result<PixelBuffer, Box<dyn std::error::Error>> {
    let samples = std::fs::read(path)?;
    log::info!(
        "Loaded {} ({} bytes) as {}x{}x{}",
        path.display(),
        samples.len(),
        width,
        height,
        channels
    );
    Ok(PixelBuffer::new(width, height, channels, samples)?)
}

/// Format a metric that may be infinite.
fn format_metric(value: f64, precision: usize) -> String {
    if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{:.*}", precision, value)
    }
}

/// Print results in a formatted table.
pub fn print_results(results: &[&CompressionResult]) {
    println!(
        "{:>5}  {:<24} {:>13} {:>10} {:>8} {:>7} {:>9} {:>8} {:>9}",
        "Id", "Configuration", "Dimensions", "Bytes", "Ratio", "BPP", "PSNR", "SSIM", "Time"
    );
    println!("{}", "-".repeat(106));

    for r in results {
        println!(
            "{:>5}  {:<24} {:>13} {:>10} {:>8} {:>7.3} {:>9} {:>8.4} {:>8.1}ms",
            r.id.0,
            r.label,
            format_dimensions(r.width, r.height, r.channels),
            r.compressed_bytes,
            format_metric(r.metrics.compression_ratio, 3),
            r.metrics.bits_per_pixel,
            format_metric(r.metrics.psnr, 2),
            r.metrics.ssim,
            r.duration.as_secs_f64() * 1000.0
        );
    }
}

/// `WxHxC` image shape.
pub fn format_dimensions(width: usize, height: usize, channels: usize) -> String {
    format!("{}x{}x{}", width, height, channels)
}

/// Print failed and cancelled configurations.
pub fn print_failures(failures: &[FailureRecord]) {
    if failures.is_empty() {
        return;
    }

    println!();
    println!("Failures ({}):", failures.len());
    for f in failures {
        let status = if f.cancelled { "cancelled" } else { "failed" };
        println!(
            "  {:>5}  {:<24} {} after {} attempt(s): {}",
            f.id.0, f.label, status, f.attempts, f.reason
        );
    }
}
