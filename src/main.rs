// Command-line front end for the `astro_mosaic` library: picks up image paths
// from the arguments, runs the batch driver, and renders progress as a bar.

use anyhow::Context;
use astro_mosaic::batch::{BatchSummary, ProgressObserver, run_batch};
use astro_mosaic::pipeline::{MosaicPipeline, PipelineConfig};
use clap::Parser;
use flexi_logger::{Duplicate, FileSpec, Logger};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "astro_mosaic",
    about = "Tile-parallel bright-object analyzer: annotates astronomical images and reassembles them into mosaics."
)]
struct Cli {
    /// Input images (tif/jpg/png).
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Root directory for per-image artifacts.
    #[arg(short, long, default_value = "image_result")]
    output: PathBuf,

    /// Tiles per image axis; each image splits into a G x G grid.
    #[arg(short, long, default_value_t = 4)]
    grid_size: u32,

    /// Upper bound on concurrently analyzed tiles. Defaults to the CPU count.
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// TrueType font used for burned-in labels.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Log level filter.
    #[arg(long, default_value = "info")]
    log_level: String,
}

struct BarProgress(ProgressBar);

impl ProgressObserver for BarProgress {
    fn on_image_completed(&self, completed: usize, _total: usize) {
        self.0.set_position(completed as u64);
    }

    fn on_batch_finished(&self, summary: &BatchSummary) {
        self.0.finish_with_message(format!(
            "{}/{} images processed, {} objects detected",
            summary.processed, summary.total, summary.objects
        ));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _logger = Logger::try_with_str(&cli.log_level)
        .context("invalid log level")?
        .log_to_file(FileSpec::default().directory("logs"))
        .duplicate_to_stderr(Duplicate::Warn)
        .start()
        .context("logger initialization failed")?;

    let mut config = PipelineConfig {
        grid_size: cli.grid_size,
        output_root: cli.output,
        font_path: cli.font,
        ..PipelineConfig::default()
    };
    if let Some(workers) = cli.workers {
        config.max_parallel_tiles = workers;
    }

    let pipeline = MosaicPipeline::new(config);
    let bar = ProgressBar::new(cli.images.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .context("bad progress template")?,
    );

    let summary = run_batch(&pipeline, &cli.images, &BarProgress(bar)).await;

    for (path, reason) in &summary.failures {
        eprintln!("failed: {}: {reason}", path.display());
    }
    if summary.processed == 0 {
        anyhow::bail!("all {} images failed", summary.total);
    }
    Ok(())
}
