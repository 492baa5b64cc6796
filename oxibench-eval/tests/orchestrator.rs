//! Failure isolation, retries and cancellation.

use oxibench_core::{OxiBenchError, PixelBuffer};
use oxibench_dwt::WaveletFamily;
use oxibench_eval::{
    ConfigId, Configuration, Orchestrator, ParameterGrid, RunRecord, measure,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn image() -> Arc<PixelBuffer> {
    let samples = (0..32 * 32).map(|i| ((i * 7) % 256) as u8).collect();
    Arc::new(PixelBuffer::grayscale(32, 32, samples).unwrap())
}

fn configs() -> Vec<(ConfigId, Configuration)> {
    ParameterGrid {
        deflate_levels: vec![1, 6, 9],
        wavelets: vec!["haar".into(), "db2".into()],
        dwt_levels: vec![1, 2],
        quant_steps: vec![5.0, 20.0],
    }
    .enumerate()
    .unwrap()
}

#[test]
fn test_panic_is_isolated() {
    let runner = Arc::new(|config: &Configuration, image: &PixelBuffer| {
        if *config == (Configuration::Deflate { level: 6 }) {
            panic!("codec exploded");
        }
        measure(config, image)
    });

    let mut records: Vec<RunRecord> = Vec::new();
    let report = Orchestrator::new(3)
        .unwrap()
        .run_with(image(), configs(), &mut records, runner)
        .unwrap();

    assert_eq!(records.len(), 11);
    assert_eq!(report.results.len(), 10);
    assert_eq!(report.failures.len(), 1);

    let failure = &report.failures[0];
    assert_eq!(failure.id, ConfigId(1));
    assert_eq!(failure.label, "deflate-L6");
    assert!(failure.reason.contains("codec exploded"));
    assert_eq!(failure.attempts, 1);
    assert!(!failure.cancelled);
}

#[test]
fn test_too_deep_configuration_fails_alone() {
    let mut configs = configs();
    configs.push((
        ConfigId(11),
        Configuration::Dwt {
            wavelet: WaveletFamily::Haar,
            levels: 10,
            quant_step: 5.0,
        },
    ));

    let report = Orchestrator::new(4)
        .unwrap()
        .run(image(), configs, &mut Vec::<RunRecord>::new())
        .unwrap();

    assert_eq!(report.results.len(), 11);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, ConfigId(11));
    assert!(report.failures[0].reason.contains("levels"));
}

#[test]
fn test_transient_failure_is_retried_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let runner = Arc::new(move |config: &Configuration, image: &PixelBuffer| {
        match *config {
            Configuration::Deflate { level: 1 } => {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(OxiBenchError::resource_exhausted(1 << 30));
                }
                measure(config, image)
            }
            Configuration::Deflate { level: 9 } => Err(OxiBenchError::resource_exhausted(1 << 40)),
            _ => measure(config, image),
        }
    });

    let report = Orchestrator::new(2)
        .unwrap()
        .run_with(image(), configs(), &mut Vec::<RunRecord>::new(), runner)
        .unwrap();

    let recovered = report
        .results
        .iter()
        .find(|r| r.id == ConfigId(0))
        .unwrap();
    assert_eq!(recovered.attempts, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, ConfigId(2));
    assert_eq!(report.failures[0].attempts, 2);
}

#[test]
fn test_permanent_failure_is_not_retried() {
    let runner = Arc::new(|config: &Configuration, image: &PixelBuffer| {
        if config.is_lossless() {
            return Err(OxiBenchError::invalid_code(0, "bad table"));
        }
        measure(config, image)
    });

    let report = Orchestrator::new(2)
        .unwrap()
        .run_with(image(), configs(), &mut Vec::<RunRecord>::new(), runner)
        .unwrap();
    assert_eq!(report.failures.len(), 3);
    assert!(report.failures.iter().all(|f| f.attempts == 1));
}

#[test]
fn test_cancel_before_run() {
    let orchestrator = Orchestrator::new(2).unwrap();
    orchestrator.cancellation_token().cancel();

    let mut records: Vec<RunRecord> = Vec::new();
    let report = orchestrator.run(image(), configs(), &mut records).unwrap();

    assert!(report.results.is_empty());
    assert_eq!(report.failures.len(), 11);
    assert_eq!(report.cancelled(), 11);
    assert!(report.failures.iter().all(|f| f.attempts == 0));
    assert_eq!(records.len(), 11);
}

#[test]
fn test_cancel_mid_batch() {
    let orchestrator = Orchestrator::new(1).unwrap();
    let token = orchestrator.cancellation_token();
    let runner = Arc::new(move |config: &Configuration, image: &PixelBuffer| {
        token.cancel();
        measure(config, image)
    });

    let report = orchestrator
        .run_with(image(), configs(), &mut Vec::<RunRecord>::new(), runner)
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.cancelled(), 10);
    assert_eq!(report.len(), 11);
}

#[test]
fn test_cancellation_does_not_outlive_its_batch() {
    let orchestrator = Orchestrator::new(2).unwrap();
    orchestrator.cancellation_token().cancel();

    let first = orchestrator
        .run(image(), configs(), &mut Vec::<RunRecord>::new())
        .unwrap();
    assert_eq!(first.cancelled(), 11);
    assert!(!orchestrator.cancellation_token().is_cancelled());

    let second = orchestrator
        .run(image(), configs(), &mut Vec::<RunRecord>::new())
        .unwrap();
    assert_eq!(second.results.len(), 11);
    assert_eq!(second.cancelled(), 0);
}
