//! Parallel experiment runner.
//!
//! Each configuration runs as one task on a bounded rayon pool. Tasks share
//! the image through an `Arc`, send their outcome back over a channel, and
//! run inside `catch_unwind` so a panicking codec only fails its own
//! configuration.
//!
//! ```text
//!  configs ──► pool.spawn ──► measure ──► mpsc ──► ResultSink
//!                 │ (n workers)                      │
//!                 └─ CancellationToken               └─► BatchReport
//! ```

use crate::grid::{ConfigId, Configuration, ParameterGrid};
use crate::metrics::QualityMetrics;
use crate::serde_util;
use log::{debug, info, warn};
use oxibench_core::error::{OxiBenchError, Result};
use oxibench_core::PixelBuffer;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

/// Default worker count.
pub const DEFAULT_WORKERS: usize = 4;

/// Attempts per configuration when failures are transient.
pub const MAX_ATTEMPTS: u32 = 2;

/// Shared flag that stops a batch between configurations.
///
/// An [`Orchestrator`] clears its token once a batch has drained, so a
/// cancellation covers the batch in flight (or the next one, if none is
/// running) and never the batches after it.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop every configuration that has not started yet.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// What one successful codec run produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Compressed stream length.
    pub compressed_bytes: usize,
    /// Quality and size metrics.
    pub metrics: QualityMetrics,
    /// Encode plus decode time.
    pub duration: Duration,
}

/// Compress, decompress and score one configuration.
///
/// Lossless codecs must reproduce the input exactly.
pub fn measure(config: &Configuration, image: &PixelBuffer) -> Result<Measurement> {
    let codec = config.codec()?;

    let start = Instant::now();
    let compressed = codec.encode(image)?;
    let restored = codec.decode(&compressed, image.shape())?;
    let duration = start.elapsed();

    if codec.is_lossless() && restored.samples() != image.samples() {
        return Err(OxiBenchError::worker_failure(
            config.label(),
            "lossless round trip changed the image",
        ));
    }

    let metrics = QualityMetrics::evaluate(image, &restored, compressed.len())?;
    Ok(Measurement {
        compressed_bytes: compressed.len(),
        metrics,
        duration,
    })
}

/// A configuration that completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionResult {
    /// Position in the batch.
    pub id: ConfigId,
    /// Codec parameters.
    pub configuration: Configuration,
    /// Codec label.
    pub label: String,
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Samples per pixel.
    pub channels: usize,
    /// Input size.
    pub uncompressed_bytes: usize,
    /// Output size.
    pub compressed_bytes: usize,
    /// Quality and size metrics.
    #[serde(flatten)]
    pub metrics: QualityMetrics,
    /// Encode plus decode time.
    #[serde(with = "serde_util::duration_secs")]
    pub duration: Duration,
    /// Attempts used.
    pub attempts: u32,
}

/// A configuration that failed or never ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Position in the batch.
    pub id: ConfigId,
    /// Codec parameters.
    pub configuration: Configuration,
    /// Codec label.
    pub label: String,
    /// Error message.
    pub reason: String,
    /// Attempts used; 0 when cancelled.
    pub attempts: u32,
    /// Skipped because the batch was cancelled.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

/// Outcome of one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunRecord {
    /// Compressed and scored.
    Success(CompressionResult),
    /// Failed, panicked or cancelled.
    Failure(FailureRecord),
}

impl RunRecord {
    /// Position in the batch.
    pub fn id(&self) -> ConfigId {
        match self {
            Self::Success(r) => r.id,
            Self::Failure(f) => f.id,
        }
    }

    /// Codec parameters.
    pub fn configuration(&self) -> &Configuration {
        match self {
            Self::Success(r) => &r.configuration,
            Self::Failure(f) => &f.configuration,
        }
    }

    /// Whether the configuration completed.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Receives each record as soon as its configuration finishes.
pub trait ResultSink {
    /// Accept one record.
    fn record(&mut self, record: &RunRecord);
}

impl ResultSink for Vec<RunRecord> {
    fn record(&mut self, record: &RunRecord) {
        self.push(record.clone());
    }
}

/// Sink that drops every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ResultSink for NullSink {
    fn record(&mut self, _record: &RunRecord) {}
}

/// Every record of a batch, split by outcome and ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Completed configurations.
    pub results: Vec<CompressionResult>,
    /// Failed or cancelled configurations.
    pub failures: Vec<FailureRecord>,
}

impl BatchReport {
    /// Number of configurations covered.
    pub fn len(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    /// Whether the batch was empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configurations skipped by cancellation.
    pub fn cancelled(&self) -> usize {
        self.failures.iter().filter(|f| f.cancelled).count()
    }

    /// Results by compression ratio (best first), then compressed size.
    pub fn ranked(&self) -> Vec<&CompressionResult> {
        let mut ranked: Vec<&CompressionResult> = self.results.iter().collect();
        ranked.sort_by(|a, b| {
            b.metrics
                .compression_ratio
                .total_cmp(&a.metrics.compression_ratio)
                .then(a.compressed_bytes.cmp(&b.compressed_bytes))
                .then(a.id.cmp(&b.id))
        });
        ranked
    }

    fn push(&mut self, record: RunRecord) {
        match record {
            RunRecord::Success(r) => self.results.push(r),
            RunRecord::Failure(f) => self.failures.push(f),
        }
    }

    fn sort(&mut self) {
        self.results.sort_by_key(|r| r.id);
        self.failures.sort_by_key(|f| f.id);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Run one configuration with panic isolation and one retry.
fn execute<F>(
    id: ConfigId,
    config: Configuration,
    image: &PixelBuffer,
    runner: &F,
    cancel: &CancellationToken,
) -> RunRecord
where
    F: Fn(&Configuration, &PixelBuffer) -> Result<Measurement>,
{
    let label = config.label();
    let failure = |reason: String, attempts: u32, cancelled: bool| {
        RunRecord::Failure(FailureRecord {
            id,
            configuration: config,
            label: label.clone(),
            reason,
            attempts,
            cancelled,
        })
    };

    if cancel.is_cancelled() {
        return failure(OxiBenchError::Cancelled.to_string(), 0, true);
    }

    let mut attempts = 0;
    loop {
        attempts += 1;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| runner(&config, image)))
            .unwrap_or_else(|payload| {
                Err(OxiBenchError::worker_failure(
                    label.clone(),
                    panic_message(payload),
                ))
            });

        match outcome {
            Ok(m) => {
                debug!(
                    "{} {}: {} bytes, ratio {:.3}, psnr {:.2}",
                    id, label, m.compressed_bytes, m.metrics.compression_ratio, m.metrics.psnr
                );
                return RunRecord::Success(CompressionResult {
                    id,
                    configuration: config,
                    label: label.clone(),
                    width: image.width(),
                    height: image.height(),
                    channels: image.channels(),
                    uncompressed_bytes: image.byte_len(),
                    compressed_bytes: m.compressed_bytes,
                    metrics: m.metrics,
                    duration: m.duration,
                    attempts,
                });
            }
            Err(e) if e.is_transient() && attempts < MAX_ATTEMPTS => {
                warn!("{} {} failed ({}), retrying", id, label, e);
            }
            Err(e) => {
                warn!("{} {} failed: {}", id, label, e);
                return failure(e.to_string(), attempts, false);
            }
        }
    }
}

/// Runs batches of configurations on a fixed-size worker pool.
pub struct Orchestrator {
    pool: rayon::ThreadPool,
    workers: usize,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Create a pool with `workers` threads.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(OxiBenchError::invalid_parameter(
                "workers",
                "at least one worker is required",
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("oxibench-worker-{}", i))
            .build()
            .map_err(|e| OxiBenchError::invalid_parameter("workers", e.to_string()))?;
        Ok(Self {
            pool,
            workers,
            cancel: CancellationToken::new(),
        })
    }

    /// Pool size.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Token that cancels this orchestrator's current batch.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every configuration with [`measure`].
    pub fn run(
        &self,
        image: Arc<PixelBuffer>,
        configs: Vec<(ConfigId, Configuration)>,
        sink: &mut dyn ResultSink,
    ) -> Result<BatchReport> {
        self.run_with(image, configs, sink, Arc::new(measure))
    }

    /// Run every configuration with a custom measurement function.
    pub fn run_with<F>(
        &self,
        image: Arc<PixelBuffer>,
        configs: Vec<(ConfigId, Configuration)>,
        sink: &mut dyn ResultSink,
        runner: Arc<F>,
    ) -> Result<BatchReport>
    where
        F: Fn(&Configuration, &PixelBuffer) -> Result<Measurement> + Send + Sync + 'static,
    {
        let total = configs.len();
        let (width, height, channels) = image.shape();
        info!(
            "Running {} configurations on {} workers ({}x{}x{})",
            total, self.workers, width, height, channels
        );

        let (tx, rx) = mpsc::channel::<RunRecord>();
        for (id, config) in configs {
            let tx = tx.clone();
            let image = Arc::clone(&image);
            let runner = Arc::clone(&runner);
            let cancel = self.cancel.clone();
            self.pool.spawn(move || {
                let record = execute(id, config, &image, runner.as_ref(), &cancel);
                // The receiver only disappears if the caller unwound.
                let _ = tx.send(record);
            });
        }
        drop(tx);

        let mut report = BatchReport::default();
        for record in rx {
            sink.record(&record);
            report.push(record);
        }
        self.cancel.reset();

        if report.len() != total {
            return Err(OxiBenchError::worker_failure(
                "batch",
                format!("{} of {} configurations reported", report.len(), total),
            ));
        }
        report.sort();

        info!(
            "Batch finished: {} succeeded, {} failed ({} cancelled)",
            report.results.len(),
            report.failures.len(),
            report.cancelled()
        );
        Ok(report)
    }
}

/// Enumerate a grid and run it on a fresh pool.
pub fn run_grid(
    image: Arc<PixelBuffer>,
    grid: &ParameterGrid,
    workers: usize,
    sink: &mut dyn ResultSink,
) -> Result<BatchReport> {
    let configs = grid.enumerate()?;
    Orchestrator::new(workers)?.run(image, configs, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxibench_dwt::WaveletFamily;

    fn gradient(width: usize, height: usize) -> PixelBuffer {
        let samples = (0..height)
            .flat_map(|y| (0..width).map(move |x| ((x * 4 + y * 2) % 256) as u8))
            .collect();
        PixelBuffer::grayscale(width, height, samples).unwrap()
    }

    #[test]
    fn test_measure_deflate() {
        let image = gradient(32, 32);
        let m = measure(&Configuration::Deflate { level: 6 }, &image).unwrap();
        assert_eq!(m.metrics.psnr, f64::INFINITY);
        assert_eq!(m.metrics.ssim, 1.0);
        assert!(m.metrics.compression_ratio > 1.0);
        assert_eq!(m.metrics.mse, 0.0);
    }

    #[test]
    fn test_measure_dwt() {
        let image = gradient(32, 32);
        let config = Configuration::Dwt {
            wavelet: WaveletFamily::Haar,
            levels: 2,
            quant_step: 8.0,
        };
        let m = measure(&config, &image).unwrap();
        assert!(m.metrics.ssim > 0.0 && m.metrics.ssim <= 1.0);
        assert!(m.compressed_bytes > 0);
        assert_eq!(
            m.metrics.bits_per_pixel,
            m.compressed_bytes as f64 * 8.0 / 1024.0
        );
    }

    #[test]
    fn test_measure_too_deep() {
        let image = gradient(8, 8);
        let config = Configuration::Dwt {
            wavelet: WaveletFamily::Haar,
            levels: 9,
            quant_step: 8.0,
        };
        assert!(matches!(
            measure(&config, &image),
            Err(OxiBenchError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_zero_workers() {
        assert!(Orchestrator::new(0).is_err());
        assert_eq!(Orchestrator::new(2).unwrap().workers(), 2);
    }

    #[test]
    fn test_ranking() {
        let image = Arc::new(gradient(32, 32));
        let configs = vec![
            (ConfigId(0), Configuration::Deflate { level: 0 }),
            (ConfigId(1), Configuration::Deflate { level: 9 }),
        ];
        let report = Orchestrator::new(2)
            .unwrap()
            .run(image, configs, &mut NullSink)
            .unwrap();
        let ranked = report.ranked();
        assert_eq!(ranked[0].id, ConfigId(1));
        assert_eq!(ranked[1].id, ConfigId(0));
        assert!(ranked[0].metrics.compression_ratio >= ranked[1].metrics.compression_ratio);
    }

    #[test]
    fn test_record_json() {
        let record = RunRecord::Failure(FailureRecord {
            id: ConfigId(3),
            configuration: Configuration::Deflate { level: 2 },
            label: "deflate-L2".into(),
            reason: "Cancelled".into(),
            attempts: 0,
            cancelled: true,
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["id"], 3);
        assert_eq!(json["configuration"]["codec"], "deflate");
        assert_eq!(json["cancelled"], true);
    }
}
