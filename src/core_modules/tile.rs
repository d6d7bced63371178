// THEORY:
// The `tile` module defines the spatial unit of the whole system. A source
// image is partitioned into a fixed G x G grid of `Tile`s, each of which is
// analyzed by exactly one worker and eventually stitched back into the mosaic.
//
// Key architectural principles:
// 1.  **Slot index as identity**: A tile carries a single `slot` value, its
//     0-based position in a fixed column-major enumeration (outer loop over
//     columns, inner loop over rows, slot = c * G + r). That index is the
//     *only* identity a tile needs: workers finish in arbitrary order and the
//     reassembler recovers the layout from slots alone.
// 2.  **Ceil-division sizing**: Interior tiles are ceil(width / G) by
//     ceil(height / G) pixels. Tiles on the right and bottom edges truncate to
//     the image bounds, so they can be smaller than interior tiles, down to
//     zero-sized when G outgrows a dimension. The grid always covers the image
//     exactly, with no gaps and no overlaps.
// 3.  **Regions travel with pixels**: Every tile records its `TileRegion` in
//     source coordinates. The region survives analysis and the concurrency
//     boundary, which is what lets the reassembler place unevenly sized edge
//     tiles correctly instead of assuming a uniform grid.

pub mod tile {
    use crate::error::PipelineError;
    use image::{RgbImage, imageops};

    /// A tile's rectangle in source-image coordinates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TileRegion {
        pub x: u32,
        pub y: u32,
        pub width: u32,
        pub height: u32,
    }

    impl TileRegion {
        pub fn is_empty(&self) -> bool {
            self.width == 0 || self.height == 0
        }
    }

    /// A rectangular sub-region of a source image, the unit of parallel analysis.
    pub struct Tile {
        /// Position in the column-major enumeration; the sole reassembly key.
        pub slot: usize,
        pub region: TileRegion,
        pub pixels: RgbImage,
    }

    /// A tile with detections burned in, as published by a worker.
    pub struct AnnotatedTile {
        pub slot: usize,
        pub region: TileRegion,
        pub image: RgbImage,
        /// How many objects were detected and annotated on this tile.
        pub object_count: usize,
    }

    /// Splits an image into a `grid_size` x `grid_size` grid of tiles in
    /// column-major order. Produces exactly `grid_size`^2 tiles covering the
    /// image without gaps or overlaps.
    pub fn partition(image: &RgbImage, grid_size: u32) -> Result<Vec<Tile>, PipelineError> {
        if grid_size == 0 {
            return Err(PipelineError::InvalidInput(
                "grid size must be at least 1".to_string(),
            ));
        }
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidInput(format!(
                "image has zero area ({width}x{height})"
            )));
        }

        let tile_width = width.div_ceil(grid_size);
        let tile_height = height.div_ceil(grid_size);

        let mut tiles = Vec::with_capacity((grid_size * grid_size) as usize);
        for c in 0..grid_size {
            for r in 0..grid_size {
                let x = (c * tile_width).min(width);
                let y = (r * tile_height).min(height);
                let w = ((c + 1) * tile_width).min(width) - x;
                let h = ((r + 1) * tile_height).min(height) - y;

                let slot = (c * grid_size + r) as usize;
                let pixels = imageops::crop_imm(image, x, y, w, h).to_image();
                tiles.push(Tile {
                    slot,
                    region: TileRegion {
                        x,
                        y,
                        width: w,
                        height: h,
                    },
                    pixels,
                });
            }
        }
        Ok(tiles)
    }
}
