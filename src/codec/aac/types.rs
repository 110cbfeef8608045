use bytes::Bytes;

use crate::av::Timestamp;

/// Samples per AAC frame.
pub const SAMPLES_PER_FRAME: u32 = 1024;

/// Fixed ADTS header length; two more bytes follow when a CRC is present.
pub const ADTS_HEADER_SIZE: usize = 7;

/// Sampling frequencies indexed by `sampling_frequency_index`.
pub const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// ADTS `profile` field. The MPEG-4 audio object type is the profile plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileType {
    Main = 0,
    LC = 1,
    SSR = 2,
    LTP = 3,
}

impl From<u8> for ProfileType {
    fn from(value: u8) -> Self {
        match value & 0x03 {
            0 => ProfileType::Main,
            1 => ProfileType::LC,
            2 => ProfileType::SSR,
            _ => ProfileType::LTP,
        }
    }
}

impl ProfileType {
    pub fn object_type(&self) -> u8 {
        *self as u8 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    pub protection_absent: bool,
    pub profile: ProfileType,
    pub sampling_frequency_index: u8,
    pub channel_configuration: u8,
    /// Whole frame length, header included.
    pub frame_length: u16,
    pub number_of_raw_blocks: u8,
}

impl AdtsHeader {
    /// 7 bytes, or 9 when a CRC follows the fixed header.
    pub fn header_length(&self) -> usize {
        if self.protection_absent {
            ADTS_HEADER_SIZE
        } else {
            ADTS_HEADER_SIZE + 2
        }
    }

    pub fn sample_rate(&self) -> Option<u32> {
        SAMPLE_RATES
            .get(self.sampling_frequency_index as usize)
            .copied()
    }

    pub fn audio_config(&self) -> Option<AudioConfig> {
        Some(AudioConfig {
            object_type: self.profile.object_type(),
            sample_rate: self.sample_rate()?,
            channel_count: self.channel_configuration,
            sampling_frequency_index: self.sampling_frequency_index,
        })
    }
}

/// Decoder configuration of an AAC track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    pub object_type: u8,
    pub sample_rate: u32,
    pub channel_count: u8,
    pub sampling_frequency_index: u8,
}

impl AudioConfig {
    /// Two-byte AudioSpecificConfig for the `esds` decoder descriptor.
    pub fn audio_specific_config(&self) -> [u8; 2] {
        [
            (self.object_type << 3) | (self.sampling_frequency_index >> 1),
            ((self.sampling_frequency_index & 0x01) << 7) | ((self.channel_count & 0x0F) << 3),
        ]
    }

    /// Duration of one frame in 90kHz ticks.
    pub fn frame_duration(&self) -> u64 {
        self.frame_offset(1)
    }

    /// Offset of the `index`th frame from the first one, in 90kHz ticks.
    pub fn frame_offset(&self, index: u64) -> u64 {
        index * SAMPLES_PER_FRAME as u64 * crate::av::PTS_HZ / self.sample_rate as u64
    }
}

/// One raw AAC frame with its ADTS header removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AacFrame {
    pub pts: Timestamp,
    pub dts: Timestamp,
    pub data: Bytes,
    pub audio_config: AudioConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_specific_config() {
        let config = AudioConfig {
            object_type: 2,
            sample_rate: 44100,
            channel_count: 2,
            sampling_frequency_index: 4,
        };
        assert_eq!(config.audio_specific_config(), [0x12, 0x10]);
        assert_eq!(config.frame_duration(), 2089);
        assert_eq!(config.frame_offset(3), 6269);
    }

    #[test]
    fn test_profile_object_type() {
        assert_eq!(ProfileType::from(1).object_type(), 2);
        assert_eq!(ProfileType::Main.object_type(), 1);
    }
}
