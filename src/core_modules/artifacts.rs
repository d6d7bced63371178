// THEORY:
// Thin persistence helpers for the three artifact kinds the pipeline writes:
// annotated tile crops, per-tile text reports, and the final mosaic. Encoding
// is delegated to the `image` crate's extension-driven encoders (the `.tif`
// paths select the TIFF encoder). Every failure is folded into
// `PersistenceFailure` with the offending path, so callers never have to
// distinguish encoder errors from filesystem errors.

use crate::core_modules::analyzer::DetectedObject;
use crate::error::PipelineError;
use image::RgbImage;
use std::fs;
use std::io::Write;
use std::path::Path;

fn persist_error(path: &Path, reason: impl ToString) -> PipelineError {
    PipelineError::PersistenceFailure {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Writes an image to `path`, with the format chosen from the extension.
pub fn save_image(path: &Path, image: &RgbImage) -> Result<(), PipelineError> {
    image.save(path).map_err(|err| persist_error(path, err))
}

/// Writes the per-tile report: one line per detected object. The file is
/// created even when there are no detections.
pub fn write_report(path: &Path, objects: &[DetectedObject]) -> Result<(), PipelineError> {
    let mut file = fs::File::create(path).map_err(|err| persist_error(path, err))?;
    for object in objects {
        writeln!(file, "{}", object.report_line()).map_err(|err| persist_error(path, err))?;
    }
    Ok(())
}
