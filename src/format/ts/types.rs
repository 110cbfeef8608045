use std::collections::BTreeMap;

use crate::av::CodecType;
use crate::error::{MuxError, Result};

// PIDs
pub const PID_PAT: u16 = 0x0000;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;

// Elementary Stream Types
pub const STREAM_TYPE_H264: u8 = 0x1b;
pub const STREAM_TYPE_AAC: u8 = 0x0f;

// Constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_SYNC_BYTE: u8 = 0x47;

/// Maps a PMT stream type to the codec it carries.
pub fn codec_for_stream_type(stream_type: u8) -> Option<CodecType> {
    match stream_type {
        STREAM_TYPE_H264 => Some(CodecType::H264),
        STREAM_TYPE_AAC => Some(CodecType::AAC),
        _ => None,
    }
}

/// Decoded 4-byte transport packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsHeader {
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    /// 1: payload only, 2: adaptation field only, 3: both
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
}

impl TsHeader {
    pub fn parse(data: &[u8]) -> Result<TsHeader> {
        if data.len() < TS_HEADER_SIZE {
            return Err(MuxError::InvalidData("TS packet too short".into()));
        }
        if data[0] != TS_SYNC_BYTE {
            return Err(MuxError::InvalidData(format!(
                "invalid sync byte 0x{:02x}",
                data[0]
            )));
        }

        Ok(TsHeader {
            transport_error: (data[1] & 0x80) != 0,
            payload_unit_start: (data[1] & 0x40) != 0,
            transport_priority: (data[1] & 0x20) != 0,
            pid: (((data[1] & 0x1F) as u16) << 8) | data[2] as u16,
            scrambling_control: (data[3] >> 6) & 0x03,
            adaptation_field_control: (data[3] & 0x30) >> 4,
            continuity_counter: data[3] & 0x0F,
        })
    }

    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control & 0x02 != 0
    }

    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control & 0x01 != 0
    }

    /// Offset of the payload within the packet, if the packet has one.
    pub fn payload_offset(&self, packet: &[u8]) -> Option<usize> {
        if !self.has_payload() {
            return None;
        }
        let mut offset = TS_HEADER_SIZE;
        if self.has_adaptation_field() {
            offset += *packet.get(TS_HEADER_SIZE)? as usize + 1;
        }
        if offset < packet.len() {
            Some(offset)
        } else {
            None
        }
    }
}

/// Program association: only the first program's PMT PID is retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pat {
    pub program_number: u16,
    pub pmt_pid: u16,
}

/// Elementary PID to stream type, in PID order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramMapTable {
    pub pcr_pid: u16,
    streams: BTreeMap<u16, u8>,
}

impl ProgramMapTable {
    pub fn new(pcr_pid: u16) -> Self {
        Self {
            pcr_pid,
            streams: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, elementary_pid: u16, stream_type: u8) {
        self.streams.insert(elementary_pid, stream_type);
    }

    pub fn stream_type(&self, elementary_pid: u16) -> Option<u8> {
        self.streams.get(&elementary_pid).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, u8)> + '_ {
        self.streams.iter().map(|(&pid, &stream_type)| (pid, stream_type))
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// First PID carrying `codec`.
    pub fn pid_for(&self, codec: CodecType) -> Option<u16> {
        self.iter()
            .find(|&(_, stream_type)| codec_for_stream_type(stream_type) == Some(codec))
            .map(|(pid, _)| pid)
    }
}

impl std::ops::Index<u16> for ProgramMapTable {
    type Output = u8;

    fn index(&self, elementary_pid: u16) -> &u8 {
        &self.streams[&elementary_pid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ts_header() {
        let data = [0x47, 0x41, 0x00, 0x3A];
        let header = TsHeader::parse(&data).unwrap();
        assert!(header.payload_unit_start);
        assert!(!header.transport_error);
        assert_eq!(header.pid, 0x100);
        assert_eq!(header.adaptation_field_control, 3);
        assert!(header.has_adaptation_field());
        assert_eq!(header.continuity_counter, 0x0A);

        assert!(TsHeader::parse(&[0x48, 0x40, 0x00, 0x10]).is_err());
        assert!(TsHeader::parse(&[0x47, 0x40]).is_err());
    }

    #[test]
    fn test_payload_offset() {
        let mut packet = [0xFFu8; TS_PACKET_SIZE];
        packet[..5].copy_from_slice(&[0x47, 0x40, 0x00, 0x30, 0x07]);
        let header = TsHeader::parse(&packet).unwrap();
        assert_eq!(header.payload_offset(&packet), Some(12));

        // adaptation field fills the packet
        packet[4] = 183;
        assert_eq!(header.payload_offset(&packet), None);
    }

    #[test]
    fn test_no_payload_without_payload_flag() {
        let mut packet = [0xFFu8; TS_PACKET_SIZE];
        // adaptation field only
        packet[..5].copy_from_slice(&[0x47, 0x40, 0x00, 0x20, 0x07]);
        let header = TsHeader::parse(&packet).unwrap();
        assert!(header.has_adaptation_field());
        assert!(!header.has_payload());
        assert_eq!(header.payload_offset(&packet), None);

        // reserved
        packet[3] = 0x00;
        let header = TsHeader::parse(&packet).unwrap();
        assert!(!header.has_adaptation_field());
        assert_eq!(header.payload_offset(&packet), None);
    }

    #[test]
    fn test_program_map_table() {
        let mut pmt = ProgramMapTable::new(0x11);
        pmt.insert(0x12, STREAM_TYPE_AAC);
        pmt.insert(0x11, STREAM_TYPE_H264);
        pmt.insert(0x13, 0x15);

        assert_eq!(pmt[0x11], STREAM_TYPE_H264);
        assert_eq!(pmt.stream_type(0x13), Some(0x15));
        assert_eq!(pmt.pid_for(CodecType::AAC), Some(0x12));
        assert_eq!(pmt.pid_for(CodecType::H264), Some(0x11));
        assert_eq!(pmt.len(), 3);
    }
}
