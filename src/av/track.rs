use bytes::Bytes;

use super::{CodecType, TrackType};
use crate::codec::aac::AudioConfig;

/// Timescale of every track produced by the transmuxer (the PES clock).
pub const TRACK_TIMESCALE: u32 = 90_000;

/// Track announced by a PMT: `{id, codec, type}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackInfo {
    /// Elementary PID; also used as the MP4 track ID.
    pub id: u32,
    pub codec: CodecType,
    pub track_type: TrackType,
}

/// Decoder configuration for an H.264 track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub profile_idc: u8,
    pub profile_compatibility: u8,
    pub level_idc: u8,
    /// Raw SPS NAL unit (header byte included, no start code).
    pub sps: Bytes,
    /// Raw PPS NAL unit (header byte included, no start code).
    pub pps: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackConfig {
    Video(VideoConfig),
    Audio(AudioConfig),
}

/// A fully described track, ready for the init segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: u32,
    pub timescale: u32,
    pub config: TrackConfig,
}

impl Track {
    pub fn video(id: u32, config: VideoConfig) -> Self {
        Self {
            id,
            timescale: TRACK_TIMESCALE,
            config: TrackConfig::Video(config),
        }
    }

    pub fn audio(id: u32, config: AudioConfig) -> Self {
        Self {
            id,
            timescale: TRACK_TIMESCALE,
            config: TrackConfig::Audio(config),
        }
    }
}

/// Sample dependency flags, ISO/IEC 14496-12 8.8.3.1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleFlags {
    pub is_leading: u8,
    /// 2: does not depend on others (sync sample), 1: depends on others
    pub depends_on: u8,
    pub is_depended_on: u8,
    pub has_redundancy: u8,
    pub degradation_priority: u16,
    pub is_non_sync_sample: bool,
}

impl SampleFlags {
    pub fn sync() -> Self {
        Self {
            depends_on: 2,
            ..Default::default()
        }
    }

    pub fn non_sync() -> Self {
        Self {
            depends_on: 1,
            is_non_sync_sample: true,
            ..Default::default()
        }
    }

    /// 32-bit `sample_flags` as written in `trun`/`trex`.
    pub fn to_u32(&self) -> u32 {
        ((self.is_leading as u32 & 0x03) << 26)
            | ((self.depends_on as u32 & 0x03) << 24)
            | ((self.is_depended_on as u32 & 0x03) << 22)
            | ((self.has_redundancy as u32 & 0x03) << 20)
            | ((self.is_non_sync_sample as u32) << 16)
            | self.degradation_priority as u32
    }

    /// One `sdtp` entry.
    pub fn to_sdtp(&self) -> u8 {
        ((self.is_leading & 0x03) << 6)
            | ((self.depends_on & 0x03) << 4)
            | ((self.is_depended_on & 0x03) << 2)
            | (self.has_redundancy & 0x03)
    }
}

/// One `trun` entry. Durations and offsets are in track timescale ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    pub duration: u32,
    pub size: u32,
    pub composition_time_offset: u32,
    pub flags: SampleFlags,
}
