//! End-to-end comparisons of the lossless and lossy paths.

use oxibench_core::PixelBuffer;
use oxibench_dwt::WaveletFamily;
use oxibench_eval::{
    ConfigId, Configuration, NullSink, Orchestrator, ParameterGrid, RunRecord, measure, run_grid,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

fn noise(width: usize, height: usize, seed: u64) -> PixelBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut samples = vec![0u8; width * height];
    rng.fill(samples.as_mut_slice());
    PixelBuffer::grayscale(width, height, samples).unwrap()
}

fn smooth(width: usize, height: usize) -> PixelBuffer {
    let samples = (0..height)
        .flat_map(|y| {
            (0..width).map(move |x| {
                let v = 128.0 + 60.0 * ((x as f64) / 7.0).sin() + 40.0 * ((y as f64) / 5.0).cos();
                v.round().clamp(0.0, 255.0) as u8
            })
        })
        .collect();
    PixelBuffer::grayscale(width, height, samples).unwrap()
}

#[test]
fn test_noise_is_incompressible_losslessly() {
    let image = noise(256, 256, 7);
    let m = measure(&Configuration::Deflate { level: 6 }, &image).unwrap();
    assert!(
        m.metrics.compression_ratio > 0.95 && m.metrics.compression_ratio < 1.01,
        "ratio {}",
        m.metrics.compression_ratio
    );
    assert_eq!(m.metrics.psnr, f64::INFINITY);
    assert_eq!(m.metrics.ssim, 1.0);
}

#[test]
fn test_noise_haar_is_lossy() {
    let image = noise(256, 256, 7);

    let fine = Configuration::Dwt {
        wavelet: WaveletFamily::Haar,
        levels: 1,
        quant_step: 1.0,
    };
    let m = measure(&fine, &image).unwrap();
    assert!(m.metrics.psnr.is_finite());
    assert!(m.metrics.ssim < 1.0);

    let coarse = Configuration::Dwt {
        wavelet: WaveletFamily::Haar,
        levels: 1,
        quant_step: 40.0,
    };
    let m = measure(&coarse, &image).unwrap();
    assert!(m.metrics.psnr < 30.0, "psnr {}", m.metrics.psnr);
}

#[test]
fn test_small_grid_yields_every_record() {
    init_logger();
    let image = Arc::new(smooth(48, 40));
    let grid = ParameterGrid {
        deflate_levels: vec![1, 6, 9],
        wavelets: vec!["haar".into(), "db2".into()],
        dwt_levels: vec![1, 2],
        quant_steps: vec![5.0, 20.0],
    };
    let configs = grid.enumerate().unwrap();

    let mut records: Vec<RunRecord> = Vec::new();
    let report = run_grid(image, &grid, 4, &mut records).unwrap();

    assert_eq!(records.len(), 11);
    assert_eq!(report.results.len(), 11);
    assert!(report.failures.is_empty());

    for (result, (id, config)) in report.results.iter().zip(&configs) {
        assert_eq!(result.id, *id);
        assert_eq!(result.configuration, *config);
        assert_eq!(result.label, config.label());
        assert_eq!(result.attempts, 1);
        assert_eq!((result.width, result.height, result.channels), (48, 40, 1));
        assert_eq!(result.uncompressed_bytes, 48 * 40);
    }

    let mut seen: Vec<ConfigId> = records.iter().map(RunRecord::id).collect();
    seen.sort();
    assert_eq!(seen, (0..11).map(ConfigId).collect::<Vec<_>>());
}

#[test]
fn test_lossy_stream_is_smaller_on_smooth_image() {
    let image = Arc::new(smooth(64, 64));
    let configs = vec![
        (ConfigId(0), Configuration::Deflate { level: 9 }),
        (
            ConfigId(1),
            Configuration::Dwt {
                wavelet: WaveletFamily::Db4,
                levels: 3,
                quant_step: 50.0,
            },
        ),
    ];
    let report = Orchestrator::new(2)
        .unwrap()
        .run(image, configs, &mut NullSink)
        .unwrap();

    let deflate = &report.results[0];
    let dwt = &report.results[1];
    assert_eq!(deflate.metrics.psnr, f64::INFINITY);
    assert!(dwt.compressed_bytes < deflate.compressed_bytes);
    assert!(dwt.metrics.psnr < deflate.metrics.psnr);
    assert_eq!(report.ranked()[0].id, ConfigId(1));
}

#[test]
fn test_color_image() {
    let gray = smooth(32, 32);
    let samples: Vec<u8> = gray
        .samples()
        .iter()
        .flat_map(|&v| [v, 255 - v, v / 2])
        .collect();
    let image = PixelBuffer::new(32, 32, 3, samples).unwrap();

    let config = Configuration::Dwt {
        wavelet: WaveletFamily::Sym2,
        levels: 2,
        quant_step: 4.0,
    };
    let m = measure(&config, &image).unwrap();
    assert!(m.metrics.psnr > 30.0, "psnr {}", m.metrics.psnr);
    assert!(m.metrics.ssim > 0.9);
}
