use bytes::Bytes;

use super::pes::PesHeader;
use super::types::*;
use crate::av::Timestamp;
use crate::error::{MuxError, Result};
use crate::format::Stream;
use crate::utils::Crc32Mpeg2;

/// PES fragment forwarded by [`TransportParseStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesPacket {
    pub pid: u16,
    /// Stream type from the current PMT, if the PID is listed there.
    pub stream_type: Option<u8>,
    pub payload_unit_start: bool,
    pub data_alignment_indicator: bool,
    pub pts: Option<Timestamp>,
    pub dts: Option<Timestamp>,
    /// Elementary stream bytes with the PES header removed.
    pub data: Bytes,
}

#[derive(Debug)]
pub enum TransportEvent {
    Pat {
        pid: u16,
        pat: Pat,
    },
    Pmt {
        pid: u16,
        program_map_table: ProgramMapTable,
    },
    Pes(PesPacket),
    /// A PES started on `pid` but its header did not parse. The unit is
    /// skipped up to the next payload_unit_start.
    CorruptPes {
        pid: u16,
        error: MuxError,
    },
    /// Non-fatal: the offending packet was skipped.
    Error(MuxError),
}

/// Decodes transport packet headers and dispatches PAT, PMT and PES
/// payloads.
#[derive(Debug, Default)]
pub struct TransportParseStream {
    pmt_pid: Option<u16>,
    program_map_table: Option<ProgramMapTable>,
    verify_crc: bool,
}

impl TransportParseStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop PAT/PMT sections whose CRC_32 does not match.
    pub fn with_crc_verification(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    pub fn pmt_pid(&self) -> Option<u16> {
        self.pmt_pid
    }

    pub fn program_map_table(&self) -> Option<&ProgramMapTable> {
        self.program_map_table.as_ref()
    }

    fn parse_packet(&mut self, packet: &Bytes) -> Result<Option<TransportEvent>> {
        let header = TsHeader::parse(packet)?;

        let offset = match header.payload_offset(packet) {
            Some(offset) => offset,
            None => return Ok(None),
        };
        let payload = packet.slice(offset..);

        if header.pid == PID_PAT {
            let section = psi_section(&payload, header.payload_unit_start)?;
            self.parse_pat(section).map(|pat| {
                pat.map(|pat| TransportEvent::Pat {
                    pid: header.pid,
                    pat,
                })
            })
        } else if Some(header.pid) == self.pmt_pid {
            let section = psi_section(&payload, header.payload_unit_start)?;
            self.parse_pmt(section).map(|pmt| {
                pmt.map(|program_map_table| TransportEvent::Pmt {
                    pid: header.pid,
                    program_map_table,
                })
            })
        } else {
            match self.parse_pes(header.pid, header.payload_unit_start, payload) {
                Ok(pes) => Ok(Some(TransportEvent::Pes(pes))),
                Err(error) => Ok(Some(TransportEvent::CorruptPes {
                    pid: header.pid,
                    error,
                })),
            }
        }
    }

    fn check_crc(&self, section: &[u8]) -> Result<()> {
        if !self.verify_crc {
            return Ok(());
        }
        let section_length = section_length(section)?;
        let end = 3 + section_length;
        if end > section.len() || !Crc32Mpeg2::verify_section(&section[..end]) {
            return Err(MuxError::InvalidData("PSI section CRC mismatch".into()));
        }
        Ok(())
    }

    fn parse_pat(&mut self, section: &[u8]) -> Result<Option<Pat>> {
        // table header (8) + first program entry (4)
        if section.len() < 12 {
            return Err(MuxError::InvalidData("PAT section truncated".into()));
        }
        if section[0] != TABLE_ID_PAT {
            return Err(MuxError::InvalidData(format!(
                "unexpected table id 0x{:02x} on PAT pid",
                section[0]
            )));
        }
        self.check_crc(section)?;

        let pat = Pat {
            program_number: ((section[8] as u16) << 8) | section[9] as u16,
            pmt_pid: (((section[10] & 0x1F) as u16) << 8) | section[11] as u16,
        };
        if self.pmt_pid != Some(pat.pmt_pid) {
            log::debug!("PAT maps program {} to PMT pid 0x{:04x}", pat.program_number, pat.pmt_pid);
        }
        self.pmt_pid = Some(pat.pmt_pid);
        Ok(Some(pat))
    }

    fn parse_pmt(&mut self, section: &[u8]) -> Result<Option<ProgramMapTable>> {
        if section.len() < 12 {
            return Err(MuxError::InvalidData("PMT section truncated".into()));
        }
        if section[0] != TABLE_ID_PMT {
            return Err(MuxError::InvalidData(format!(
                "unexpected table id 0x{:02x} on PMT pid",
                section[0]
            )));
        }

        // PMTs with current_next_indicator unset describe a future program
        // and are ignored.
        if section[5] & 0x01 == 0 {
            return Ok(None);
        }
        self.check_crc(section)?;

        let pcr_pid = (((section[8] & 0x1F) as u16) << 8) | section[9] as u16;
        let program_info_length = (((section[10] & 0x0F) as usize) << 8) | section[11] as usize;

        // entries stop at the CRC_32 that closes the section
        let table_end = (3 + section_length(section)?)
            .saturating_sub(4)
            .min(section.len());

        let mut pmt = ProgramMapTable::new(pcr_pid);
        let mut pos = 12 + program_info_length;
        while pos + 5 <= table_end {
            let stream_type = section[pos];
            let elementary_pid = (((section[pos + 1] & 0x1F) as u16) << 8) | section[pos + 2] as u16;
            let es_info_length = (((section[pos + 3] & 0x0F) as usize) << 8) | section[pos + 4] as usize;

            pmt.insert(elementary_pid, stream_type);
            pos += 5 + es_info_length;
        }

        if self.program_map_table.as_ref() != Some(&pmt) {
            log::debug!(
                "PMT updated: {:?}",
                pmt.iter()
                    .map(|(pid, st)| format!("0x{:04x}=0x{:02x}", pid, st))
                    .collect::<Vec<_>>()
            );
        }
        self.program_map_table = Some(pmt.clone());
        Ok(Some(pmt))
    }

    fn parse_pes(&self, pid: u16, payload_unit_start: bool, payload: Bytes) -> Result<PesPacket> {
        let stream_type = self
            .program_map_table
            .as_ref()
            .and_then(|pmt| pmt.stream_type(pid));

        if !payload_unit_start {
            return Ok(PesPacket {
                pid,
                stream_type,
                payload_unit_start,
                data_alignment_indicator: false,
                pts: None,
                dts: None,
                data: payload,
            });
        }

        let header = PesHeader::parse(&payload)
            .map_err(|e| MuxError::InvalidData(format!("pid 0x{:04x}: {}", pid, e)))?;

        Ok(PesPacket {
            pid,
            stream_type,
            payload_unit_start,
            data_alignment_indicator: header.data_alignment_indicator,
            pts: header.pts,
            dts: header.dts,
            data: payload.slice(header.payload_offset()..),
        })
    }
}

impl Stream<Bytes> for TransportParseStream {
    type Output = TransportEvent;

    fn push(&mut self, packet: Bytes, out: &mut Vec<TransportEvent>) {
        match self.parse_packet(&packet) {
            Ok(Some(event)) => out.push(event),
            Ok(None) => {}
            Err(e) => out.push(TransportEvent::Error(e)),
        }
    }

    fn end(&mut self, _out: &mut Vec<TransportEvent>) {}
}

/// Locates the start of a PSI section within a packet payload.
///
/// The pointer field is skipped when a section starts in this packet. A
/// section whose section_syntax_indicator is clear after the skip is read
/// from the start of the payload instead, for muxers that omit the pointer
/// field.
fn psi_section(payload: &[u8], payload_unit_start: bool) -> Result<&[u8]> {
    let Some(&pointer) = payload.first() else {
        return Err(MuxError::InvalidData("empty PSI payload".into()));
    };
    if payload_unit_start {
        match payload.get(pointer as usize + 1..) {
            Some(section) if section.len() >= 3 && section[1] & 0x80 != 0 => {
                return Ok(section)
            }
            _ => log::trace!("PSI section without pointer field"),
        }
    }
    Ok(payload)
}

fn section_length(section: &[u8]) -> Result<usize> {
    if section.len() < 3 {
        return Err(MuxError::InvalidData("PSI section truncated".into()));
    }
    Ok((((section[1] & 0x0F) as usize) << 8) | section[2] as usize)
}
