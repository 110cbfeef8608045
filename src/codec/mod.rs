pub mod aac;
pub mod h264;

// Re-export the elementary stream splitters
pub use aac::{AacFrame, AacStream, AudioConfig};
pub use h264::{H264Stream, NalUnit, NalUnitType};
