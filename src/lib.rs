// THEORY:
// This file is the main entry point for the `astro_mosaic` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (like the bundled CLI binary).
//
// The primary goal is to export the `MosaicPipeline` and its associated data
// structures (`PipelineConfig`, `ImageSummary`, the batch driver) as the clean,
// high-level interface for the whole engine. The internal analysis layers
// (`core_modules`) stay encapsulated behind it: consumers hand the pipeline a
// list of image paths and get back per-tile artifacts plus a reassembled,
// annotated mosaic per image.

pub mod batch;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use error::PipelineError;
