use bytes::BytesMut;

use super::types::{NalUnit, NalUnitType};
use crate::av::Timestamp;
use crate::format::ts::ElementaryFrame;
use crate::format::Stream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchState {
    SeekingStartCode,
    InNalUnit,
}

/// Splits Annex-B video frames into NAL units.
///
/// Zero bytes are not committed to the current NAL unit until the byte that
/// follows them is known, so a start code split across two pushes is still
/// recognised.
#[derive(Debug)]
pub struct H264Stream {
    state: SearchState,
    /// Zero bytes seen but not yet committed.
    zeros: usize,
    nal: BytesMut,
    pts: Timestamp,
    dts: Timestamp,
}

impl Default for H264Stream {
    fn default() -> Self {
        Self {
            state: SearchState::SeekingStartCode,
            zeros: 0,
            nal: BytesMut::new(),
            pts: Timestamp::ZERO,
            dts: Timestamp::ZERO,
        }
    }
}

impl H264Stream {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&mut self, out: &mut Vec<NalUnit>) {
        if self.nal.is_empty() {
            return;
        }
        let data = self.nal.split().freeze();
        out.push(NalUnit {
            nal_unit_type: NalUnitType::from(data[0]),
            data,
            pts: self.pts,
            dts: self.dts,
        });
    }

    fn commit_zeros(&mut self) {
        self.nal.resize(self.nal.len() + self.zeros, 0x00);
        self.zeros = 0;
    }
}

impl Stream<ElementaryFrame> for H264Stream {
    type Output = NalUnit;

    fn push(&mut self, frame: ElementaryFrame, out: &mut Vec<NalUnit>) {
        let data = &frame.data[..];
        let mut i = 0;

        while i < data.len() {
            let byte = data[i];

            if byte == 0x00 {
                self.zeros += 1;
                i += 1;
                continue;
            }

            if byte == 0x01 && self.zeros >= 2 {
                // start code; extra leading zeros belong to it
                if self.state == SearchState::InNalUnit {
                    self.emit(out);
                }
                self.state = SearchState::InNalUnit;
                self.zeros = 0;
                self.pts = frame.pts;
                self.dts = frame.dts;
                i += 1;
                continue;
            }

            match self.state {
                SearchState::SeekingStartCode => {
                    self.zeros = 0;
                    i += 1;
                }
                SearchState::InNalUnit => {
                    self.commit_zeros();
                    let run = data[i..]
                        .iter()
                        .position(|&b| b == 0x00)
                        .unwrap_or(data.len() - i);
                    self.nal.extend_from_slice(&data[i..i + run]);
                    i += run;
                }
            }
        }
    }

    fn end(&mut self, out: &mut Vec<NalUnit>) {
        // trailing zeros are trailing_zero_8bits, not payload
        self.zeros = 0;
        if self.state == SearchState::InNalUnit {
            self.emit(out);
        }
        self.state = SearchState::SeekingStartCode;
    }
}
