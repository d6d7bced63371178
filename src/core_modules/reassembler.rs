// THEORY:
// The `reassembler` is the exact inverse of the partitioner's enumeration:
// for each column c, the tiles with slots c*G + 0 .. c*G + (G-1) stack top to
// bottom into a strip, and the strips line up left to right. Because every
// `AnnotatedTile` still carries its source-coordinate `TileRegion`, the
// stitching does not assume a uniform grid: edge tiles that truncated to a
// smaller (even zero) size land at their recorded origins, and images whose
// dimensions don't divide evenly by G round-trip exactly.
//
// The price for tolerating uneven tiles is strict validation. Before a single
// pixel is copied, the mapping must hold every slot exactly once with pixel
// buffers matching their regions; during stitching, every column must agree
// on its x and width, and rows and columns must be contiguous from edge to
// edge. Any violation is a `ReassemblyMismatch` - a corrupted mosaic is never
// written silently.

use crate::core_modules::tile::tile::AnnotatedTile;
use crate::error::PipelineError;
use image::{RgbImage, imageops};
use std::collections::HashMap;

/// Reconstructs the full mosaic from a completed slot mapping.
/// Consumes the tiles; their buffers are released when this returns.
pub fn reassemble(
    tiles: HashMap<usize, AnnotatedTile>,
    grid_size: u32,
) -> Result<RgbImage, PipelineError> {
    if grid_size == 0 {
        return Err(PipelineError::InvalidInput(
            "grid size must be at least 1".to_string(),
        ));
    }
    let g = grid_size as usize;
    let expected = g * g;

    let mut by_slot: Vec<&AnnotatedTile> = Vec::with_capacity(expected);
    for slot in 0..expected {
        let tile = tiles.get(&slot).ok_or_else(|| {
            PipelineError::ReassemblyMismatch(format!("slot {slot} missing from completed mapping"))
        })?;
        if tile.image.dimensions() != (tile.region.width, tile.region.height) {
            return Err(PipelineError::ReassemblyMismatch(format!(
                "slot {slot}: buffer is {:?} but region is {}x{}",
                tile.image.dimensions(),
                tile.region.width,
                tile.region.height
            )));
        }
        by_slot.push(tile);
    }

    // Canvas dimensions follow from the first column's heights and the first
    // row's widths; contiguity checks below hold every other tile to them.
    let canvas_width: u32 = (0..g).map(|c| by_slot[c * g].region.width).sum();
    let canvas_height: u32 = (0..g).map(|r| by_slot[r].region.height).sum();
    if canvas_width == 0 || canvas_height == 0 {
        return Err(PipelineError::ReassemblyMismatch(
            "tiles cover zero area".to_string(),
        ));
    }

    let mut canvas = RgbImage::new(canvas_width, canvas_height);
    let mut x_cursor = 0u32;
    for c in 0..g {
        let column_width = by_slot[c * g].region.width;
        let mut y_cursor = 0u32;
        for r in 0..g {
            let tile = by_slot[c * g + r];
            if tile.region.width != column_width {
                return Err(PipelineError::ReassemblyMismatch(format!(
                    "column {c}: slot {} is {} wide, column is {column_width}",
                    tile.slot, tile.region.width
                )));
            }
            if tile.region.x != x_cursor || tile.region.y != y_cursor {
                return Err(PipelineError::ReassemblyMismatch(format!(
                    "slot {}: expected origin ({x_cursor}, {y_cursor}), found ({}, {})",
                    tile.slot, tile.region.x, tile.region.y
                )));
            }
            imageops::replace(&mut canvas, &tile.image, x_cursor as i64, y_cursor as i64);
            y_cursor += tile.region.height;
        }
        if y_cursor != canvas_height {
            return Err(PipelineError::ReassemblyMismatch(format!(
                "column {c} stacks to height {y_cursor}, canvas is {canvas_height}"
            )));
        }
        x_cursor += column_width;
    }

    Ok(canvas)
}
