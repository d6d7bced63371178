// THEORY:
// The `batch` module drives the pipeline across a list of input images. It is
// deliberately sequential: concurrency exists only *inside* one image's tile
// set, never across images, so memory stays bounded by a single mosaic. The
// path list is an explicit argument - there is no ambient selection state.
//
// Progress and completion are reported through the `ProgressObserver` trait
// so the library stays ignorant of how the front end renders them (log lines
// here, a progress bar in the CLI). A failed image is recorded in the summary
// and the batch moves on; one bad input never costs the rest of the run.

use crate::pipeline::MosaicPipeline;
use log::{error, info};
use std::path::PathBuf;

/// Receives batch progress. `on_image_completed` fires after every image,
/// successful or not, so `completed / total` is a monotonically increasing
/// percentage; `on_batch_finished` fires exactly once at the end.
pub trait ProgressObserver: Send + Sync {
    fn on_image_completed(&self, completed: usize, total: usize);
    fn on_batch_finished(&self, summary: &BatchSummary);
}

/// Default observer: progress goes to the log like everything else.
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_image_completed(&self, completed: usize, total: usize) {
        info!(
            "progress: {:.0}% ({completed}/{total})",
            completed as f64 / total as f64 * 100.0
        );
    }

    fn on_batch_finished(&self, summary: &BatchSummary) {
        info!(
            "batch finished: {}/{} images processed, {} objects detected",
            summary.processed, summary.total, summary.objects
        );
    }
}

/// Aggregate outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub objects: usize,
    /// Images that failed, with the rendered reason. Never aborts the batch.
    pub failures: Vec<(PathBuf, String)>,
}

/// Processes each input image in order, one at a time.
pub async fn run_batch(
    pipeline: &MosaicPipeline,
    paths: &[PathBuf],
    observer: &dyn ProgressObserver,
) -> BatchSummary {
    let mut summary = BatchSummary {
        total: paths.len(),
        ..BatchSummary::default()
    };

    for (index, path) in paths.iter().enumerate() {
        match pipeline.process_image(path).await {
            Ok(image_summary) => {
                summary.processed += 1;
                summary.objects += image_summary.objects;
            }
            Err(err) => {
                error!("{}: {err}", path.display());
                summary.failures.push((path.clone(), err.to_string()));
            }
        }
        observer.on_image_completed(index + 1, paths.len());
    }

    observer.on_batch_finished(&summary);
    summary
}
