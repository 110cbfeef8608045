use bytes::{Buf, BytesMut};

use super::parser::{find_adts_sync, is_adts_sync, parse_adts_header};
use super::types::{AacFrame, ADTS_HEADER_SIZE};
use crate::av::Timestamp;
use crate::format::ts::ElementaryFrame;
use crate::format::Stream;

/// Splits ADTS-framed audio into raw AAC frames.
///
/// Every ADTS frame starting inside a PES frame is stamped with the PES
/// PTS plus its position times the frame duration. A frame left incomplete
/// at the end of a push is completed by the next one and keeps the timing
/// it started with.
#[derive(Debug, Default)]
pub struct AacStream {
    buffer: BytesMut,
    /// Timestamp of the incomplete frame at the front of `buffer`.
    carry_pts: Option<Timestamp>,
    last_frame_duration: u64,
}

impl AacStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops bytes up to the next syncword, returning how many were skipped.
    fn resync(&mut self) -> usize {
        if is_adts_sync(&self.buffer) {
            return 0;
        }
        let skip = match find_adts_sync(&self.buffer) {
            Some(offset) => offset,
            // keep a trailing 0xFF, it may begin the next syncword
            None if self.buffer.last() == Some(&0xFF) => self.buffer.len() - 1,
            None => self.buffer.len(),
        };
        self.buffer.advance(skip);
        skip
    }
}

impl Stream<ElementaryFrame> for AacStream {
    type Output = AacFrame;

    fn push(&mut self, frame: ElementaryFrame, out: &mut Vec<AacFrame>) {
        let mut carried = self.buffer.len();
        self.buffer.extend_from_slice(&frame.data);
        let mut index = 0u64;

        loop {
            let skipped = self.resync();
            if skipped > 0 {
                log::warn!("skipped {} bytes looking for ADTS syncword", skipped);
                if skipped >= carried {
                    self.carry_pts = None;
                }
                carried = carried.saturating_sub(skipped);
            }
            if self.buffer.len() < ADTS_HEADER_SIZE {
                break;
            }

            let header = match parse_adts_header(&self.buffer) {
                Ok(header) => header,
                Err(e) => {
                    log::warn!("dropping corrupt ADTS header: {}", e);
                    self.buffer.advance(1);
                    carried = carried.saturating_sub(1);
                    continue;
                }
            };
            let audio_config = match header.audio_config() {
                Some(config) => config,
                None => {
                    self.buffer.advance(1);
                    carried = carried.saturating_sub(1);
                    continue;
                }
            };
            self.last_frame_duration = audio_config.frame_duration();

            let pts = match self.carry_pts.filter(|_| carried > 0) {
                Some(pts) => pts,
                None => {
                    let pts = frame.pts + audio_config.frame_offset(index);
                    index += 1;
                    pts
                }
            };

            let frame_length = header.frame_length as usize;
            if self.buffer.len() < frame_length {
                self.carry_pts = Some(pts);
                break;
            }

            let mut adts = self.buffer.split_to(frame_length);
            adts.advance(header.header_length());
            carried = carried.saturating_sub(frame_length);
            self.carry_pts = None;

            out.push(AacFrame {
                pts,
                dts: pts,
                data: adts.freeze(),
                audio_config,
            });
        }

        if !self.buffer.is_empty() && self.carry_pts.is_none() {
            // header not yet complete
            self.carry_pts = Some(frame.pts + index * self.last_frame_duration);
        }
    }

    fn end(&mut self, _out: &mut Vec<AacFrame>) {
        if !self.buffer.is_empty() {
            log::warn!(
                "dropping {} bytes of incomplete ADTS frame at end of stream",
                self.buffer.len()
            );
            self.buffer.clear();
        }
        self.carry_pts = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::TrackType;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    fn audio(pts: u64, data: &[u8]) -> ElementaryFrame {
        ElementaryFrame {
            track_type: TrackType::Audio,
            pid: 0x12,
            pts: Timestamp::from_ticks(pts),
            dts: Timestamp::from_ticks(pts),
            data: Bytes::copy_from_slice(data),
        }
    }

    // 96kHz, 3 channels, frame_length 9
    const MINIMAL: [u8; 9] = [0xFF, 0xF1, 0x00, 0xFC, 0x01, 0x20, 0x00, 0xAA, 0xBB];

    // 44.1kHz AAC-LC stereo with `payload` bytes
    fn adts_frame(payload: &[u8]) -> Vec<u8> {
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

    #[test]
    fn test_single_frame() {
        let mut stream = AacStream::new();
        let mut out = Vec::new();
        stream.push(audio(0, &MINIMAL), &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(&out[0].data[..], &[0xAA, 0xBB]);
        assert_eq!(out[0].dts, out[0].pts);
        assert_eq!(out[0].audio_config.sample_rate, 96000);
        assert_eq!(out[0].audio_config.channel_count, 3);
        assert_eq!(out[0].audio_config.object_type, 1);
    }

    #[test]
    fn test_frames_within_pes_are_spaced() {
        let mut data = adts_frame(&[1, 2, 3]);
        data.extend(adts_frame(&[4, 5]));
        data.extend(adts_frame(&[6]));

        let mut stream = AacStream::new();
        let mut out = Vec::new();
        stream.push(audio(90_000, &data), &mut out);

        let pts: Vec<u64> = out.iter().map(|f| f.pts.ticks()).collect();
        assert_eq!(pts, vec![90_000, 92_089, 94_179]);
        assert_eq!(&out[1].data[..], &[4, 5]);
    }

    #[test]
    fn test_incomplete_frame_is_carried() {
        let first = adts_frame(&[1, 2, 3, 4]);
        let second = adts_frame(&[5]);

        let mut stream = AacStream::new();
        let mut out = Vec::new();
        stream.push(audio(1000, &first[..5]), &mut out);
        assert!(out.is_empty());

        let mut rest = first[5..].to_vec();
        rest.extend_from_slice(&second);
        stream.push(audio(3089, &rest), &mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].pts.ticks(), 1000);
        assert_eq!(&out[0].data[..], &[1, 2, 3, 4]);
        assert_eq!(out[1].pts.ticks(), 3089);
        assert_eq!(&out[1].data[..], &[5]);
    }

    #[test]
    fn test_resyncs_after_garbage() {
        let mut data = vec![0x00, 0x12, 0xFF, 0x34];
        data.extend_from_slice(&MINIMAL);

        let mut stream = AacStream::new();
        let mut out = Vec::new();
        stream.push(audio(0, &data), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(&out[0].data[..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_end_drops_partial_frame() {
        let mut stream = AacStream::new();
        let mut out = Vec::new();
        stream.push(audio(0, &MINIMAL[..8]), &mut out);
        stream.end(&mut out);
        assert!(out.is_empty());

        stream.push(audio(0, &MINIMAL), &mut out);
        assert_eq!(out.len(), 1);
    }
}
