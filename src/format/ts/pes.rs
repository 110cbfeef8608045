use crate::av::{Timestamp, PTS_MASK};
use crate::error::{MuxError, Result};

/// Fixed part of a PES header: start code, stream id, length, two flag
/// bytes and the header data length.
pub const PES_FIXED_HEADER_SIZE: usize = 9;

/// Optional-field view of a PES header, enough to locate the payload and
/// recover timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesHeader {
    /// Stream identifier indicating content type (video/audio/etc.)
    pub stream_id: u8,
    /// PES_packet_length; zero for unbounded video packets
    pub packet_length: u16,
    /// Set when the payload starts with an access unit or syncword
    pub data_alignment_indicator: bool,
    /// `PTS_DTS_flags` bits from the second flag byte (0x80 PTS, 0x40 DTS)
    pub pts_dts_flags: u8,
    /// Bytes of optional header data following the fixed header
    pub header_data_length: u8,
    pub pts: Option<Timestamp>,
    pub dts: Option<Timestamp>,
}

impl PesHeader {
    /// Parses the header at the start of a PES packet.
    pub fn parse(payload: &[u8]) -> Result<PesHeader> {
        if payload.len() < PES_FIXED_HEADER_SIZE {
            return Err(MuxError::InvalidData(format!(
                "PES header truncated ({} bytes)",
                payload.len()
            )));
        }
        if payload[..3] != [0x00, 0x00, 0x01] {
            return Err(MuxError::InvalidData("missing PES start code prefix".into()));
        }

        let pts_dts_flags = payload[7] & 0xC0;
        let mut header = PesHeader {
            stream_id: payload[3],
            packet_length: ((payload[4] as u16) << 8) | payload[5] as u16,
            data_alignment_indicator: (payload[6] & 0x04) != 0,
            pts_dts_flags,
            header_data_length: payload[8],
            pts: None,
            dts: None,
        };

        if header.payload_offset() > payload.len() {
            return Err(MuxError::InvalidData(
                "PES header data exceeds packet payload".into(),
            ));
        }

        if pts_dts_flags & 0x80 != 0 {
            header.pts = Some(read_timestamp(&payload[9..])?);
            header.dts = header.pts;
            if pts_dts_flags & 0x40 != 0 {
                header.dts = Some(read_timestamp(&payload[14..])?);
            }
        }

        Ok(header)
    }

    /// Offset of the elementary stream data within the PES packet.
    pub fn payload_offset(&self) -> usize {
        PES_FIXED_HEADER_SIZE + self.header_data_length as usize
    }
}

/// Decodes a 5-byte packed 33-bit timestamp.
///
/// Layout: `xxxx TTT1 | TTTTTTTT | TTTTTTT1 | TTTTTTTT | TTTTTTT1`.
pub fn read_timestamp(data: &[u8]) -> Result<Timestamp> {
    if data.len() < 5 {
        return Err(MuxError::InvalidData("PES timestamp truncated".into()));
    }

    let ticks = (((data[0] as u64) & 0x0E) << 29)
        | ((data[1] as u64) << 22)
        | (((data[2] as u64) & 0xFE) << 14)
        | ((data[3] as u64) << 7)
        | ((data[4] as u64) >> 1);

    Ok(Timestamp::from_ticks(ticks & PTS_MASK))
}

/// Encodes a timestamp with the given 4-bit prefix (0x2 PTS only, 0x3 PTS
/// followed by DTS, 0x1 DTS).
pub fn write_timestamp(prefix: u8, ts: Timestamp) -> [u8; 5] {
    let ticks = ts.ticks() & PTS_MASK;
    [
        (prefix << 4) | (((ticks >> 29) & 0x0E) as u8) | 0x01,
        (ticks >> 22) as u8,
        (((ticks >> 14) & 0xFE) as u8) | 0x01,
        (ticks >> 7) as u8,
        (((ticks << 1) & 0xFE) as u8) | 0x01,
    ]
}
