//! Sweep command implementation.

use super::ReportJson;
use crate::utils::{
    ProgressSink, create_progress_bar, load_raw_image, print_failures, print_results,
};
use oxibench_eval::{Orchestrator, ParameterGrid};
use std::path::Path;
use std::sync::Arc;

/// Options for a grid sweep.
pub struct SweepOptions<'a> {
    pub input: &'a Path,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub workers: usize,
    pub grid: Option<&'a Path>,
    pub top: Option<usize>,
    pub json: bool,
    pub progress: bool,
}

fn load_grid(path: Option<&Path>) -> Result<ParameterGrid, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(ParameterGrid::from_json(&text)?)
        }
        None => Ok(ParameterGrid::default()),
    }
}

pub fn cmd_sweep(options: &SweepOptions) -> Result<(), Box<dyn std::error::Error>> {
    let image = load_raw_image(options.input, options.width, options.height, options.channels)?;
    let shape = image.shape();
    let grid = load_grid(options.grid)?;
    let configs = grid.enumerate()?;

    let orchestrator = Orchestrator::new(options.workers)?;
    let bar = create_progress_bar(configs.len() as u64, options.progress && !options.json);
    let mut sink = ProgressSink::new(bar);
    let report = orchestrator.run(Arc::new(image), configs, &mut sink)?;
    sink.finish();

    let mut ranked = report.ranked();
    if let Some(top) = options.top {
        ranked.truncate(top);
    }

    if options.json {
        let json = ReportJson::new(shape, ranked, &report);
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!(
            "Image: {}x{}x{}, {} configurations on {} workers",
            shape.0,
            shape.1,
            shape.2,
            report.len(),
            orchestrator.workers()
        );
        println!();
        print_results(&ranked);
        print_failures(&report.failures);
    }
    Ok(())
}
