//! Fragmented MP4 output: per-track sample assembly and box generation.

pub mod boxes;
mod segment;

pub use boxes::Mp4Generator;
pub use segment::{AudioSegmentStream, TrackFragment, VideoSegmentStream};
