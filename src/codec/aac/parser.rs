use super::types::{AdtsHeader, ProfileType, ADTS_HEADER_SIZE};
use crate::error::{MuxError, Result};
use crate::utils::BitReader;

/// True if `data` starts with an ADTS syncword followed by layer 0.
pub fn is_adts_sync(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && (data[1] & 0xF6) == 0xF0
}

/// Offset of the first ADTS syncword in `data`, if any.
pub fn find_adts_sync(data: &[u8]) -> Option<usize> {
    (0..data.len().saturating_sub(1)).find(|&i| is_adts_sync(&data[i..]))
}

pub fn parse_adts_header(data: &[u8]) -> Result<AdtsHeader> {
    if data.len() < ADTS_HEADER_SIZE {
        return Err(MuxError::Parser("ADTS header too short".into()));
    }

    let mut reader = BitReader::new(data);

    let sync_word = reader.read_bits(12)?;
    if sync_word != 0xFFF {
        return Err(MuxError::Parser("Invalid ADTS sync word".into()));
    }

    reader.skip_bits(1)?; // id
    let layer = reader.read_bits(2)?;
    if layer != 0 {
        return Err(MuxError::Parser(format!("invalid ADTS layer {}", layer)));
    }
    let protection_absent = reader.read_flag()?;

    let profile = ProfileType::from(reader.read_bits(2)? as u8);
    let sampling_frequency_index = reader.read_bits(4)? as u8;
    reader.skip_bits(1)?; // private_bit
    let channel_configuration = reader.read_bits(3)? as u8;
    // original_copy, home, copyright_id_bit, copyright_id_start
    reader.skip_bits(4)?;
    let frame_length = reader.read_bits(13)? as u16;
    reader.skip_bits(11)?; // buffer_fullness
    let number_of_raw_blocks = reader.read_bits(2)? as u8;

    let header = AdtsHeader {
        protection_absent,
        profile,
        sampling_frequency_index,
        channel_configuration,
        frame_length,
        number_of_raw_blocks,
    };

    if header.sample_rate().is_none() {
        return Err(MuxError::Parser(format!(
            "reserved sampling frequency index {}",
            sampling_frequency_index
        )));
    }
    if (frame_length as usize) < header.header_length() {
        return Err(MuxError::Parser(format!(
            "ADTS frame length {} shorter than its header",
            frame_length
        )));
    }

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_adts_header() {
        // ADTS header for AAC-LC, 44.1kHz, stereo
        let data = vec![
            0xFF, 0xF1, // Sync word + ID(0) + Layer(0) + Protection(1)
            0x50, // Profile(1=LC) + SampleRate(4=44.1) + Private(0)
            0x80, // Channel(2=stereo) + Original(0) + Home(0) + ...
            0x43, 0x80, // Frame length = 540
            0x00, // Buffer fullness + blocks
        ];

        let header = parse_adts_header(&data).unwrap();
        assert_eq!(header.profile, ProfileType::LC);
        assert_eq!(header.sampling_frequency_index, 4);
        assert_eq!(header.sample_rate(), Some(44100));
        assert_eq!(header.channel_configuration, 2);
        assert_eq!(header.frame_length, 540);
        assert_eq!(header.header_length(), 7);
    }

    #[test]
    fn test_minimal_frame_header() {
        let header = parse_adts_header(&[0xFF, 0xF1, 0x00, 0xFC, 0x01, 0x20, 0x00]).unwrap();
        assert_eq!(header.frame_length, 9);
        assert_eq!(header.sample_rate(), Some(96000));
        assert_eq!(header.channel_configuration, 3);
        assert_eq!(header.profile.object_type(), 1);
    }

    #[test]
    fn test_crc_header_length() {
        let header = parse_adts_header(&[0xFF, 0xF0, 0x50, 0x80, 0x01, 0x40, 0x00]).unwrap();
        assert!(!header.protection_absent);
        assert_eq!(header.header_length(), 9);
        assert_eq!(header.frame_length, 10);
    }

    #[test]
    fn test_invalid_headers() {
        assert!(parse_adts_header(&[0xFF, 0xF1, 0x50]).is_err());
        assert!(parse_adts_header(&[0xFE, 0xF1, 0x50, 0x80, 0x43, 0x80, 0x00]).is_err());
        // reserved sampling frequency index 13
        assert!(parse_adts_header(&[0xFF, 0xF1, 0x74, 0x80, 0x43, 0x80, 0x00]).is_err());
        // frame_length 3
        assert!(parse_adts_header(&[0xFF, 0xF1, 0x50, 0x80, 0x00, 0x60, 0x00]).is_err());
    }

    #[test]
    fn test_find_sync() {
        assert_eq!(find_adts_sync(&[0x00, 0xFF, 0x12, 0xFF, 0xF1]), Some(3));
        assert_eq!(find_adts_sync(&[0xFF]), None);
        assert_eq!(find_adts_sync(&[]), None);
    }
}
