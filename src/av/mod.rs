//! Media model shared by every pipeline stage: timestamps, tracks and
//! samples.

mod timestamp;
mod track;

pub use timestamp::*;
pub use track::*;

/// Codec carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecType {
    /// H.264/AVC video (PMT stream type 0x1b)
    H264,
    /// AAC audio in ADTS framing (PMT stream type 0x0f)
    AAC,
}

impl CodecType {
    /// Short codec name used in track announcements.
    pub fn name(&self) -> &'static str {
        match self {
            CodecType::H264 => "avc",
            CodecType::AAC => "adts",
        }
    }

    pub fn track_type(&self) -> TrackType {
        match self {
            CodecType::H264 => TrackType::Video,
            CodecType::AAC => TrackType::Audio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackType {
    Video,
    Audio,
}

impl std::fmt::Display for TrackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackType::Video => f.write_str("video"),
            TrackType::Audio => f.write_str("audio"),
        }
    }
}
