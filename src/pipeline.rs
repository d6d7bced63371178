// THEORY:
// The `pipeline` module is the top-level API for processing one image. It
// encapsulates the full stack - partition, parallel tile analysis,
// reassembly, persistence - behind a single `MosaicPipeline` with a flat,
// tunable `PipelineConfig`. The stages run strictly in order per image:
//
//   decode -> partition -> run_tiles (parallel) -> reassemble -> persist
//
// and any failure past the per-detection level aborts that image before a
// partial mosaic can be written. Cross-image behavior (batching, progress)
// lives one level up in the `batch` module.

use crate::core_modules::analyzer::{AnalyzeContext, analyze_tile};
use crate::core_modules::artifacts;
use crate::core_modules::coordinator::run_tiles;
use crate::core_modules::reassembler::reassemble;
use crate::core_modules::tile::tile::partition;
use crate::error::PipelineError;
use ab_glyph::FontVec;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Re-export key data structures for the public API.
pub use crate::core_modules::analyzer::DetectedObject;
pub use crate::core_modules::classifier::classifier::{ObjectClass, classify};
pub use crate::core_modules::tile::tile::{AnnotatedTile, Tile, TileRegion};

/// Locations probed for a label font when none is configured.
const FONT_FALLBACKS: [&str; 3] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "arial.ttf",
];

/// Configuration for the MosaicPipeline, allowing for tunable behavior.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tiles per image axis; each image splits into grid_size^2 tiles.
    pub grid_size: u32,
    /// Foreground cutoff applied to the blurred grayscale working copy.
    pub binarize_threshold: u8,
    /// Gaussian sigma for the denoising blur (1.1 matches a 5x5 kernel).
    pub blur_sigma: f32,
    /// Pixel scale for burned-in label text.
    pub label_scale: f32,
    /// Upper bound on concurrently analyzed tiles.
    pub max_parallel_tiles: usize,
    /// Root directory receiving one artifact directory per input image.
    pub output_root: PathBuf,
    /// Explicit label font; system fallbacks are probed when absent.
    pub font_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid_size: 4,
            binarize_threshold: 200,
            blur_sigma: 1.1,
            label_scale: 14.0,
            max_parallel_tiles: num_cpus::get(),
            output_root: PathBuf::from("image_result"),
            font_path: None,
        }
    }
}

/// What one successfully processed image produced.
#[derive(Debug)]
pub struct ImageSummary {
    pub source: PathBuf,
    pub mosaic_path: PathBuf,
    pub tiles: usize,
    pub objects: usize,
}

/// The main, top-level struct for the tiling/analysis/reassembly engine.
pub struct MosaicPipeline {
    config: PipelineConfig,
    font: Option<Arc<FontVec>>,
}

impl MosaicPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let font = load_font(config.font_path.as_deref());
        if font.is_none() {
            warn!("no usable label font found; bounding boxes will be drawn without labels");
        }
        Self { config, font }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the full pipeline for one image: decode, partition, analyze all
    /// tiles in parallel, reassemble, and persist the annotated mosaic to
    /// `<output_root>/<stem>/new_image.tif`.
    pub async fn process_image(&self, path: &Path) -> Result<ImageSummary, PipelineError> {
        let image = image::open(path)
            .map_err(|err| {
                PipelineError::InvalidInput(format!("cannot decode {}: {err}", path.display()))
            })?
            .to_rgb8();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                PipelineError::InvalidInput(format!(
                    "cannot derive an output name from {}",
                    path.display()
                ))
            })?;

        let out_dir = self.config.output_root.join(stem);
        let crops_dir = out_dir.join("image_crop");
        fs::create_dir_all(&crops_dir).map_err(|err| PipelineError::PersistenceFailure {
            path: crops_dir.clone(),
            reason: err.to_string(),
        })?;

        let tiles = partition(&image, self.config.grid_size)?;
        let tile_count = tiles.len();
        info!(
            "{}: {}x{} split into {tile_count} tiles",
            path.display(),
            image.width(),
            image.height()
        );

        let ctx = Arc::new(AnalyzeContext {
            binarize_threshold: self.config.binarize_threshold,
            blur_sigma: self.config.blur_sigma,
            label_scale: self.config.label_scale,
            font: self.font.clone(),
            crops_dir,
            reports_dir: out_dir.clone(),
        });
        let completed = run_tiles(tiles, self.config.max_parallel_tiles, move |tile| {
            analyze_tile(&ctx, tile)
        })
        .await?;
        let objects: usize = completed.values().map(|tile| tile.object_count).sum();

        let mosaic = reassemble(completed, self.config.grid_size)?;
        let mosaic_path = out_dir.join("new_image.tif");
        artifacts::save_image(&mosaic_path, &mosaic)?;
        info!(
            "{}: {objects} objects detected, mosaic written to {}",
            path.display(),
            mosaic_path.display()
        );

        Ok(ImageSummary {
            source: path.to_path_buf(),
            mosaic_path,
            tiles: tile_count,
            objects,
        })
    }
}

fn load_font(configured: Option<&Path>) -> Option<Arc<FontVec>> {
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(FONT_FALLBACKS.iter().map(PathBuf::from));
    for candidate in candidates {
        let Ok(bytes) = fs::read(&candidate) else {
            continue;
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                info!("label font: {}", candidate.display());
                return Some(Arc::new(font));
            }
            Err(err) => warn!("{} is not a usable font: {err}", candidate.display()),
        }
    }
    None
}
