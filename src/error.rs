// THEORY:
// Every failure the pipeline can produce is expressed as one variant of
// `PipelineError`, so callers (the batch driver, the CLI) can decide policy
// from the variant alone. The propagation rules are deliberately uneven:
// an `UnclassifiableObject` is recovered *inside* the analyzer (the one
// degenerate detection is skipped, the tile continues), while every other
// variant aborts the current image. Nothing aborts the batch.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad grid size, an empty image, or an undecodable input file.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No classification rule matched a detection. Recovered per-detection.
    #[error("no rule classifies object with area {area} and brightness {brightness}")]
    UnclassifiableObject { area: f64, brightness: f64 },

    /// A tile worker crashed or vanished without publishing a result.
    #[error("tile analysis failed: {0}")]
    TileAnalysisFailure(String),

    /// A slot was missing or tile geometry was inconsistent during reassembly.
    #[error("reassembly mismatch: {0}")]
    ReassemblyMismatch(String),

    /// An artifact (crop, report, or mosaic) could not be written.
    #[error("failed to persist {path}: {reason}")]
    PersistenceFailure { path: PathBuf, reason: String },
}
