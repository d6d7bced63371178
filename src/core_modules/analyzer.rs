// THEORY:
// The `analyzer` is the worker of the system: everything that happens to a
// single tile happens here, on one thread, with exclusive ownership of the
// tile's buffers. The stages mirror a classic bright-object heuristic:
//
// 1.  **Sharpen**: a 3x3 unsharp-mask convolution exaggerates compact bright
//     features. This runs on a *working copy*; the annotation overlay keeps
//     the original pixels so the final mosaic looks like the source image
//     plus markings, not like the processed intermediate.
// 2.  **Grayscale + blur + threshold**: the working copy collapses to a
//     single channel, a Gaussian blur (sigma tuned to a 5x5 kernel) knocks
//     out single-pixel noise, and a fixed binarization at 200/255 leaves a
//     foreground mask of bright regions.
// 3.  **Contours**: only outermost boundaries are kept; holes inside a
//     bright region are irrelevant to classification.
// 4.  **Measure + classify**: per contour we take the polygon area (fed to
//     the classifier), the axis-aligned bounding box, the box center as the
//     centroid, and the summed pre-blur grayscale intensity inside the box as
//     brightness. A detection the classifier rejects is skipped; the tile
//     carries on.
// 5.  **Annotate + persist**: boxes and labels are burned into the overlay,
//     which is saved as the slot-named crop next to the slot-named report.
//
// Zero detections is a perfectly normal outcome: the report file is written
// empty and the annotated tile equals the original.

use crate::core_modules::artifacts;
use crate::core_modules::classifier::classifier::{ObjectClass, classify};
use crate::core_modules::tile::tile::{AnnotatedTile, Tile};
use crate::error::PipelineError;
use ab_glyph::FontVec;
use image::{GrayImage, Rgb, RgbImage, imageops};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::contrast::{ThresholdType, threshold};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::filter::{filter3x3, gaussian_blur_f32};
use imageproc::rect::Rect;
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

const SHARPEN_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];
const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const LABEL_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
/// Labels sit this many pixels above the box's top-left corner.
const LABEL_Y_OFFSET: i32 = 15;

/// Everything a tile worker needs besides the tile itself. Shared read-only
/// across all workers of one image.
pub struct AnalyzeContext {
    pub binarize_threshold: u8,
    pub blur_sigma: f32,
    pub label_scale: f32,
    /// Font for burned-in labels; boxes are drawn without text when absent.
    pub font: Option<Arc<FontVec>>,
    pub crops_dir: PathBuf,
    pub reports_dir: PathBuf,
}

/// A contour-derived detection. Ephemeral: it exists for the report and the
/// overlay, and is dropped once the tile is annotated.
pub struct DetectedObject {
    /// Bounding-box center, in tile-local coordinates.
    pub centroid: (f64, f64),
    /// Summed grayscale intensity within the bounding box.
    pub brightness: u64,
    /// Bounding-box area in pixels.
    pub size: u32,
    pub class: ObjectClass,
}

impl DetectedObject {
    pub fn report_line(&self) -> String {
        format!(
            "coordinates: ({}, {}); brightness: {}; size: {}; type: {}",
            self.centroid.0, self.centroid.1, self.brightness, self.size, self.class
        )
    }
}

struct ContourMetrics {
    /// x, y, width, height of the axis-aligned bounding box.
    bbox: (u32, u32, u32, u32),
    contour_area: f64,
    brightness: u64,
    centroid: (f64, f64),
}

/// Runs the full detection pipeline on one tile and persists its artifacts.
/// Consumes the tile; returns the annotated tile keyed by the same slot.
pub fn analyze_tile(ctx: &AnalyzeContext, tile: Tile) -> Result<AnnotatedTile, PipelineError> {
    let Tile {
        slot,
        region,
        pixels,
    } = tile;
    let report_path = ctx.reports_dir.join(format!("{slot}.txt"));

    // Degenerate edge tile: nothing to analyze, but the report still exists.
    if region.is_empty() {
        artifacts::write_report(&report_path, &[])?;
        return Ok(AnnotatedTile {
            slot,
            region,
            image: pixels,
            object_count: 0,
        });
    }

    let mut overlay = pixels.clone();

    let sharpened: RgbImage = filter3x3::<Rgb<u8>, f32, u8>(&pixels, &SHARPEN_KERNEL);
    let gray = imageops::grayscale(&sharpened);
    let blurred = gaussian_blur_f32(&gray, ctx.blur_sigma);
    let mask = threshold(&blurred, ctx.binarize_threshold, ThresholdType::Binary);

    let contours = find_contours::<u32>(&mask);
    let mut objects = Vec::new();
    for contour in contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
    {
        let Some(metrics) = measure_contour(contour, &gray) else {
            continue;
        };
        let class = match classify(metrics.contour_area, metrics.brightness as f64) {
            Ok(class) => class,
            Err(err) => {
                // A single degenerate detection never sinks the tile.
                debug!("tile {slot}: skipping detection: {err}");
                continue;
            }
        };

        let (x, y, w, h) = metrics.bbox;
        draw_box(&mut overlay, x, y, w, h);
        if let Some(font) = &ctx.font {
            draw_text_mut(
                &mut overlay,
                LABEL_COLOR,
                x as i32,
                y as i32 - LABEL_Y_OFFSET,
                ctx.label_scale,
                font.as_ref(),
                &class.to_string(),
            );
        }

        objects.push(DetectedObject {
            centroid: metrics.centroid,
            brightness: metrics.brightness,
            size: w * h,
            class,
        });
    }

    artifacts::write_report(&report_path, &objects)?;
    artifacts::save_image(&ctx.crops_dir.join(format!("{slot}.tif")), &overlay)?;

    Ok(AnnotatedTile {
        slot,
        region,
        image: overlay,
        object_count: objects.len(),
    })
}

/// Measures one external contour against the (pre-blur) grayscale tile.
fn measure_contour(contour: &Contour<u32>, gray: &GrayImage) -> Option<ContourMetrics> {
    let first = contour.points.first()?;
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
    for point in &contour.points {
        min_x = min_x.min(point.x);
        max_x = max_x.max(point.x);
        min_y = min_y.min(point.y);
        max_y = max_y.max(point.y);
    }
    let width = max_x - min_x + 1;
    let height = max_y - min_y + 1;

    // Shoelace formula over the boundary polygon.
    let points = &contour.points;
    let mut doubled_area = 0i64;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        doubled_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    let contour_area = doubled_area.unsigned_abs() as f64 / 2.0;

    let mut brightness = 0u64;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            brightness += u64::from(gray.get_pixel(x, y)[0]);
        }
    }

    Some(ContourMetrics {
        bbox: (min_x, min_y, width, height),
        contour_area,
        brightness,
        centroid: (
            min_x as f64 + width as f64 / 2.0,
            min_y as f64 + height as f64 / 2.0,
        ),
    })
}

/// Hollow rectangle, two pixels thick.
fn draw_box(canvas: &mut RgbImage, x: u32, y: u32, w: u32, h: u32) {
    draw_hollow_rect_mut(canvas, Rect::at(x as i32, y as i32).of_size(w, h), BOX_COLOR);
    if w > 2 && h > 2 {
        draw_hollow_rect_mut(
            canvas,
            Rect::at(x as i32 + 1, y as i32 + 1).of_size(w - 2, h - 2),
            BOX_COLOR,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::tile::tile::{Tile, TileRegion};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn context(dir: &Path) -> AnalyzeContext {
        let crops_dir = dir.join("image_crop");
        fs::create_dir_all(&crops_dir).expect("crops dir");
        AnalyzeContext {
            binarize_threshold: 200,
            blur_sigma: 1.1,
            label_scale: 14.0,
            font: None,
            crops_dir,
            reports_dir: dir.to_path_buf(),
        }
    }

    fn tile_with_pixels(slot: usize, pixels: RgbImage) -> Tile {
        let (width, height) = pixels.dimensions();
        Tile {
            slot,
            region: TileRegion {
                x: 0,
                y: 0,
                width,
                height,
            },
            pixels,
        }
    }

    #[test]
    fn blank_tile_yields_no_detections() {
        let dir = tempdir().expect("tempdir");
        let ctx = context(dir.path());
        let original = RgbImage::new(48, 48);
        let annotated = analyze_tile(&ctx, tile_with_pixels(2, original.clone())).expect("analyze");

        assert_eq!(annotated.object_count, 0);
        assert_eq!(annotated.image.as_raw(), original.as_raw());
        let report = fs::read_to_string(dir.path().join("2.txt")).expect("report");
        assert!(report.is_empty());
    }

    #[test]
    fn bright_square_is_detected_and_annotated() {
        let dir = tempdir().expect("tempdir");
        let ctx = context(dir.path());

        let mut pixels = RgbImage::new(64, 64);
        for y in 20..30 {
            for x in 20..30 {
                pixels.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let original = pixels.clone();
        let annotated = analyze_tile(&ctx, tile_with_pixels(7, pixels)).expect("analyze");

        assert_eq!(annotated.object_count, 1);
        assert_ne!(annotated.image.as_raw(), original.as_raw());

        let report = fs::read_to_string(dir.path().join("7.txt")).expect("report");
        // A 10x10 patch is well past the small-object rules: it reads as a star.
        assert!(report.contains("type: star"), "report was: {report}");
        assert!(ctx.crops_dir.join("7.tif").exists());
    }

    #[test]
    fn empty_region_short_circuits() {
        let dir = tempdir().expect("tempdir");
        let ctx = context(dir.path());
        let tile = Tile {
            slot: 15,
            region: TileRegion {
                x: 5,
                y: 0,
                width: 0,
                height: 12,
            },
            pixels: RgbImage::new(0, 12),
        };
        let annotated = analyze_tile(&ctx, tile).expect("analyze");
        assert_eq!(annotated.object_count, 0);
        assert!(dir.path().join("15.txt").exists());
        assert!(!ctx.crops_dir.join("15.tif").exists());
    }
}
