#![allow(dead_code)]

use std::collections::HashMap;

use hlsmux::av::Timestamp;
use hlsmux::format::ts::{write_timestamp, TS_PACKET_SIZE};
use hlsmux::utils::Crc32Mpeg2;

pub const PMT_PID: u16 = 0x1000;
pub const VIDEO_PID: u16 = 0x100;
pub const AUDIO_PID: u16 = 0x101;

/// Baseline profile, level 3.0, 640x480.
pub const SPS: [u8; 9] = [0x67, 0x42, 0xC0, 0x1E, 0xED, 0x01, 0x40, 0x7B, 0x20];
pub const PPS: [u8; 2] = [0x68, 0xD0];
pub const IDR: [u8; 6] = [0x65, 0x88, 0x84, 0x00, 0x33, 0xFF];
pub const AUD: [u8; 2] = [0x09, 0xF0];
pub const SLICE: [u8; 5] = [0x41, 0x9A, 0x02, 0x04, 0x80];

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Annex-B framing with 4-byte start codes.
pub fn annex_b(nal_units: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nal_units {
        out.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        out.extend_from_slice(nal);
    }
    out
}

/// ADTS frame for 44.1kHz AAC-LC stereo around `payload`.
pub fn adts_frame(payload: &[u8]) -> Vec<u8> {
    let len = payload.len() + 7;
    let mut frame = vec![
        0xFF,
        0xF1,
        0x50,
        0x80 | ((len >> 11) & 0x03) as u8,
        (len >> 3) as u8,
        (((len & 0x07) << 5) | 0x1F) as u8,
        0xFC,
    ];
    frame.extend_from_slice(payload);
    frame
}

/// Writes a transport stream packet by packet, tracking continuity counters.
#[derive(Default)]
pub struct TsWriter {
    data: Vec<u8>,
    continuity: HashMap<u16, u8>,
}

impl TsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn next_cc(&mut self, pid: u16) -> u8 {
        let cc = self.continuity.entry(pid).or_insert(0);
        let current = *cc;
        *cc = (*cc + 1) & 0x0F;
        current
    }

    /// One packet; payloads shorter than 184 bytes are padded with
    /// adaptation field stuffing.
    fn packet(&mut self, pid: u16, payload_unit_start: bool, payload: &[u8]) {
        assert!(payload.len() <= TS_PACKET_SIZE - 4);
        let cc = self.next_cc(pid);
        let stuffing = TS_PACKET_SIZE - 4 - payload.len();

        self.data.push(0x47);
        self.data
            .push(((payload_unit_start as u8) << 6) | ((pid >> 8) as u8 & 0x1F));
        self.data.push(pid as u8);
        if stuffing == 0 {
            self.data.push(0x10 | cc);
        } else {
            self.data.push(0x30 | cc);
            self.data.push((stuffing - 1) as u8);
            if stuffing > 1 {
                self.data.push(0x00);
                self.data.extend(std::iter::repeat(0xFF).take(stuffing - 2));
            }
        }
        self.data.extend_from_slice(payload);
    }

    /// A single packet carrying `payload` as is.
    pub fn raw(&mut self, pid: u16, payload_unit_start: bool, payload: &[u8]) -> &mut Self {
        self.packet(pid, payload_unit_start, payload);
        self
    }

    fn section(&mut self, pid: u16, mut section: Vec<u8>) {
        let crc = Crc32Mpeg2::calculate(&section);
        section.extend_from_slice(&crc.to_be_bytes());

        let mut payload = vec![0x00]; // pointer_field
        payload.extend_from_slice(&section);
        payload.resize(TS_PACKET_SIZE - 4, 0xFF);
        self.packet(pid, true, &payload);
    }

    pub fn pat(&mut self) -> &mut Self {
        self.section(
            0,
            vec![
                0x00,
                0xB0,
                0x0D,
                0x00,
                0x01,
                0xC1,
                0x00,
                0x00,
                0x00,
                0x01,
                0xE0 | (PMT_PID >> 8) as u8,
                PMT_PID as u8,
            ],
        );
        self
    }

    /// PMT listing `(stream_type, pid)` pairs.
    pub fn pmt(&mut self, streams: &[(u8, u16)]) -> &mut Self {
        let section_length = 9 + streams.len() * 5 + 4;
        let mut section = vec![
            0x02,
            0xB0,
            section_length as u8,
            0x00,
            0x01,
            0xC1,
            0x00,
            0x00,
            0xE0 | (VIDEO_PID >> 8) as u8,
            VIDEO_PID as u8,
            0xF0,
            0x00,
        ];
        for &(stream_type, pid) in streams {
            section.extend_from_slice(&[
                stream_type,
                0xE0 | (pid >> 8) as u8,
                pid as u8,
                0xF0,
                0x00,
            ]);
        }
        self.section(PMT_PID, section);
        self
    }

    /// A PES packet split over as many TS packets as needed.
    pub fn pes(&mut self, pid: u16, pts: u64, dts: Option<u64>, data: &[u8]) -> &mut Self {
        let stream_id = if pid == AUDIO_PID { 0xC0 } else { 0xE0 };
        let mut pes = vec![0x00, 0x00, 0x01, stream_id, 0x00, 0x00, 0x84];
        match dts {
            Some(dts) => {
                pes.extend_from_slice(&[0xC0, 10]);
                pes.extend_from_slice(&write_timestamp(0x3, Timestamp::from_ticks(pts)));
                pes.extend_from_slice(&write_timestamp(0x1, Timestamp::from_ticks(dts)));
            }
            None => {
                pes.extend_from_slice(&[0x80, 5]);
                pes.extend_from_slice(&write_timestamp(0x2, Timestamp::from_ticks(pts)));
            }
        }
        pes.extend_from_slice(data);

        for (i, chunk) in pes.chunks(TS_PACKET_SIZE - 4).enumerate() {
            self.packet(pid, i == 0, chunk);
        }
        self
    }
}

/// Top-level boxes of `data` as `(type, payload)`.
pub fn boxes(data: &[u8]) -> Vec<(String, &[u8])> {
    let mut result = Vec::new();
    let mut pos = 0;
    while pos + 8 <= data.len() {
        let size = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        assert!(size >= 8 && pos + size <= data.len(), "bad box size {}", size);
        let box_type = String::from_utf8_lossy(&data[pos + 4..pos + 8]).into_owned();
        result.push((box_type, &data[pos + 8..pos + size]));
        pos += size;
    }
    assert_eq!(pos, data.len(), "trailing bytes after last box");
    result
}

pub fn box_types(data: &[u8]) -> Vec<String> {
    boxes(data).into_iter().map(|(t, _)| t).collect()
}

/// Payload of the first box named `name` directly inside `data`.
pub fn child<'a>(data: &'a [u8], name: &str) -> &'a [u8] {
    boxes(data)
        .into_iter()
        .find(|(t, _)| t == name)
        .map(|(_, payload)| payload)
        .unwrap_or_else(|| panic!("no {} box", name))
}

pub fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
