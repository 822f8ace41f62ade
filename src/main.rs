//! Batch command line front end.
//!
//! ```bash
//! region-morphometry --image-dir images --annotation-dir labels --output-dir out
//! region-morphometry --image-dir images --annotation-dir labels --output-dir out \
//!     --px-per-mm 21.5 --font /usr/share/fonts/truetype/dejavu/DejaVuSans.ttf
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{error, info};
use region_morphometry::{AnalysisConfig, AnalysisError, run_batch};

/// Measure annotated regions and write a CSV table plus annotated images
#[derive(Parser, Debug)]
#[command(name = "region-morphometry", version, about, long_about = None)]
struct Args {
    /// Directory containing the source images
    #[arg(long, value_name = "DIR")]
    image_dir: PathBuf,

    /// Directory containing one LabelMe JSON file per image
    #[arg(long, value_name = "DIR")]
    annotation_dir: PathBuf,

    /// Directory receiving the result table and visualizations
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Pixels per millimetre [default: 19]
    #[arg(long, value_name = "PX")]
    px_per_mm: Option<f64>,

    /// TrueType font used for labels and the info panel
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,

    /// JSON configuration file; explicit flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn build_config(args: &Args) -> Result<AnalysisConfig, AnalysisError> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(px_per_mm) = args.px_per_mm {
        config.pixels_per_mm = px_per_mm;
    }
    if let Some(font) = &args.font {
        config.font_path = Some(font.clone());
    }
    config.validate()?;
    Ok(config)
}

fn print_progress(index: usize, total: usize, message: &str) {
    let percent = (index + 1) * 100 / total.max(1);
    println!("[{percent:3}%] {message}");
}

fn run(args: &Args) -> Result<(), AnalysisError> {
    let config = build_config(args)?;
    info!("Scale: {} px/mm", config.pixels_per_mm);

    let report = run_batch(
        &config,
        &args.image_dir,
        &args.annotation_dir,
        &args.output_dir,
        print_progress,
    )?;

    let results = &report.results;
    println!(
        "Analyzed {} region(s) in {} visualization(s), {} image(s) failed",
        results.records.len(),
        results.visualizations.len(),
        results.failures.len()
    );
    for failure in &results.failures {
        println!("  {}: {}", failure.image_id, failure.reason);
    }
    match &report.results_file {
        Some(path) => println!("Results saved to {}", path.display()),
        None => println!("No regions measured, no result table written"),
    }
    println!("Visualizations saved to {}", report.visualization_dir.display());
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(&args) {
        error!("{e}");
        process::exit(1);
    }
}
