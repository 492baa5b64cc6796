//! OxiBench CLI - lossless Deflate vs. lossy wavelet coding on raw images.

mod commands;
mod utils;

use clap::{Parser, Subcommand};
use commands::{SingleOptions, SweepOptions, cmd_single, cmd_sweep, cmd_wavelets};
use oxibench_eval::runner::DEFAULT_WORKERS;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oxibench")]
#[command(
    author,
    version,
    about = "Pure Rust image compression benchmark - Deflate vs. DWT"
)]
#[command(long_about = "
OxiBench compresses a raw 8-bit image with a lossless Deflate codec and a
lossy wavelet codec, then reports PSNR, SSIM, compression ratio and bits
per pixel.

Input files hold interleaved samples with no header (width*height*channels
bytes).

Examples:
  oxibench single photo.raw --width 512 --height 512
  oxibench single photo.raw -W 640 -H 480 -c 3 --wavelet db4 --dwt-level 3 --quant 20
  oxibench sweep photo.raw -W 512 -H 512 --workers 8
  oxibench sweep photo.raw -W 512 -H 512 --grid grid.json --json
  oxibench wavelets
")]
struct Cli {
    /// Log codec events (debug level) unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Raw image intake shared by the image commands.
#[derive(clap::Args)]
struct ImageArgs {
    /// Raw sample file
    input: PathBuf,

    /// Image width in pixels
    #[arg(short = 'W', long)]
    width: usize,

    /// Image height in pixels
    #[arg(short = 'H', long)]
    height: usize,

    /// Samples per pixel (1-4)
    #[arg(short, long, default_value_t = 1)]
    channels: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one Deflate and one DWT configuration
    #[command(alias = "s")]
    Single {
        #[command(flatten)]
        image: ImageArgs,

        /// Deflate level (0-9)
        #[arg(short, long, default_value_t = 6)]
        level: u8,

        /// Wavelet family
        #[arg(long, default_value = "haar")]
        wavelet: String,

        /// DWT decomposition depth
        #[arg(long, default_value_t = 1)]
        dwt_level: usize,

        /// Quantization step
        #[arg(short, long, default_value_t = 10.0)]
        quant: f64,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,
    },

    /// Run a full parameter grid
    Sweep {
        #[command(flatten)]
        image: ImageArgs,

        /// Worker threads
        #[arg(long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,

        /// JSON parameter grid (defaults to the built-in sweep)
        #[arg(short, long)]
        grid: Option<PathBuf>,

        /// Show only the best N results
        #[arg(short, long)]
        top: Option<usize>,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,

        /// Hide the progress bar
        #[arg(long = "no-progress", action = clap::ArgAction::SetFalse)]
        progress: bool,
    },

    /// List the supported wavelet families
    Wavelets,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Single {
            image,
            level,
            wavelet,
            dwt_level,
            quant,
            json,
        } => cmd_single(&SingleOptions {
            input: &image.input,
            width: image.width,
            height: image.height,
            channels: image.channels,
            level,
            wavelet: &wavelet,
            dwt_level,
            quant,
            json,
        }),
        Commands::Sweep {
            image,
            workers,
            grid,
            top,
            json,
            progress,
        } => cmd_sweep(&SweepOptions {
            input: &image.input,
            width: image.width,
            height: image.height,
            channels: image.channels,
            workers,
            grid: grid.as_deref(),
            top,
            json,
            progress,
        }),
        Commands::Wavelets => cmd_wavelets(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep_progress(args: &[&str]) -> bool {
        let base = ["oxibench", "sweep", "img.raw", "-W", "8", "-H", "8"];
        let cli = Cli::try_parse_from(base.iter().chain(args).copied()).unwrap();
        match cli.command {
            Commands::Sweep { progress, .. } => progress,
            _ => panic!("expected sweep"),
        }
    }

    #[test]
    fn test_progress_flag() {
        assert!(sweep_progress(&[]));
        assert!(!sweep_progress(&["--no-progress"]));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
