//! Single command implementation.

use super::ReportJson;
use crate::utils::{load_raw_image, print_failures, print_results};
use oxibench_dwt::WaveletFamily;
use oxibench_eval::{ConfigId, Configuration, NullSink, Orchestrator};
use std::path::Path;
use std::sync::Arc;

/// Options for a single Deflate-vs-DWT comparison.
pub struct SingleOptions<'a> {
    pub input: &'a Path,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub level: u8,
    pub wavelet: &'a str,
    pub dwt_level: usize,
    pub quant: f64,
    pub json: bool,
}

pub fn cmd_single(options: &SingleOptions) -> Result<(), Box<dyn std::error::Error>> {
    let image = load_raw_image(options.input, options.width, options.height, options.channels)?;
    let shape = image.shape();

    let configs = vec![
        (ConfigId(0), Configuration::Deflate { level: options.level }),
        (
            ConfigId(1),
            Configuration::Dwt {
                wavelet: WaveletFamily::from_name(options.wavelet)?,
                levels: options.dwt_level,
                quant_step: options.quant,
            },
        ),
    ];
    for (_, config) in &configs {
        config.validate()?;
    }

    let report = Orchestrator::new(2)?.run(Arc::new(image), configs, &mut NullSink)?;
    let results: Vec<_> = report.results.iter().collect();

    if options.json {
        let json = ReportJson::new(shape, results, &report);
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("Image: {}x{}x{}", shape.0, shape.1, shape.2);
        println!();
        print_results(&results);
        print_failures(&report.failures);
    }

    if report.failures.is_empty() {
        Ok(())
    } else {
        Err(format!("{} configuration(s) failed", report.failures.len()).into())
    }
}
