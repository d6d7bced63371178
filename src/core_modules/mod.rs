pub mod analyzer;
pub mod artifacts;
pub mod classifier;
pub mod coordinator;
pub mod reassembler;
pub mod tile;
