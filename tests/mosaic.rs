// End-to-end checks: a synthetic sky image goes through the full pipeline and
// must come out as a same-sized mosaic with one report per tile slot, and the
// batch driver must keep going past a bad input while reporting progress.

use astro_mosaic::batch::{BatchSummary, ProgressObserver, run_batch};
use astro_mosaic::pipeline::{MosaicPipeline, PipelineConfig};
use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::tempdir;

/// Black frame with a few bright squares scattered around.
fn synthetic_sky(width: u32, height: u32) -> RgbImage {
    let mut image = RgbImage::new(width, height);
    for (cx, cy) in [(10u32, 12u32), (50, 40), (80, 70)] {
        for y in cy..(cy + 8).min(height) {
            for x in cx..(cx + 8).min(width) {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
    }
    image
}

fn test_config(output_root: &Path) -> PipelineConfig {
    PipelineConfig {
        grid_size: 4,
        output_root: output_root.to_path_buf(),
        ..PipelineConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn full_pipeline_produces_mosaic_and_reports() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("sky.png");
    synthetic_sky(96, 96).save(&input).expect("save input");

    let pipeline = MosaicPipeline::new(test_config(&dir.path().join("out")));
    let summary = pipeline.process_image(&input).await.expect("process_image");

    assert_eq!(summary.tiles, 16);
    assert!(summary.objects >= 3, "expected the squares to be detected");

    let out_dir = dir.path().join("out/sky");
    let mosaic = image::open(out_dir.join("new_image.tif"))
        .expect("mosaic readable")
        .to_rgb8();
    assert_eq!(mosaic.dimensions(), (96, 96));

    for slot in 0..16 {
        assert!(
            out_dir.join(format!("{slot}.txt")).exists(),
            "report {slot} missing"
        );
        assert!(
            out_dir.join(format!("image_crop/{slot}.tif")).exists(),
            "crop {slot} missing"
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn non_divisible_dimensions_reassemble_exactly() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("odd.png");
    synthetic_sky(101, 67).save(&input).expect("save input");

    let pipeline = MosaicPipeline::new(test_config(&dir.path().join("out")));
    let summary = pipeline.process_image(&input).await.expect("process_image");

    let mosaic = image::open(&summary.mosaic_path)
        .expect("mosaic readable")
        .to_rgb8();
    assert_eq!(mosaic.dimensions(), (101, 67));
}

struct CountingObserver {
    ticks: AtomicUsize,
    finished: AtomicBool,
}

impl ProgressObserver for CountingObserver {
    fn on_image_completed(&self, completed: usize, total: usize) {
        assert!(completed <= total);
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    fn on_batch_finished(&self, _summary: &BatchSummary) {
        self.finished.store(true, Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn batch_survives_bad_input_and_reports_progress() {
    let dir = tempdir().expect("tempdir");
    let good = dir.path().join("good.png");
    synthetic_sky(64, 64).save(&good).expect("save input");
    let missing = dir.path().join("no_such_image.png");

    let pipeline = MosaicPipeline::new(test_config(&dir.path().join("out")));
    let observer = CountingObserver {
        ticks: AtomicUsize::new(0),
        finished: AtomicBool::new(false),
    };

    let summary = run_batch(&pipeline, &[good, missing.clone()], &observer).await;

    assert_eq!(summary.total, 2);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0, missing);
    assert_eq!(observer.ticks.load(Ordering::SeqCst), 2);
    assert!(observer.finished.load(Ordering::SeqCst));
}
