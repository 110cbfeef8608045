use bytes::{Bytes, BytesMut};

use super::parser::{PesPacket, TransportEvent};
use super::types::ProgramMapTable;
use crate::av::{CodecType, Timestamp, TrackInfo, TrackType};
use crate::error::MuxError;
use crate::format::Stream;

/// One complete PES payload for a tracked PID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementaryFrame {
    pub track_type: TrackType,
    pub pid: u16,
    pub pts: Timestamp,
    pub dts: Timestamp,
    pub data: Bytes,
}

#[derive(Debug)]
pub enum ElementaryEvent {
    /// Tracks announced by the latest PMT.
    Metadata(Vec<TrackInfo>),
    Frame(ElementaryFrame),
    /// Forwarded from the transport layer.
    Error(MuxError),
}

#[derive(Debug)]
struct PendingFrame {
    pts: Timestamp,
    dts: Timestamp,
    data: BytesMut,
}

#[derive(Debug)]
struct ElementaryTrack {
    pid: u16,
    codec: CodecType,
    pending: Option<PendingFrame>,
    last_timestamps: Option<(Timestamp, Timestamp)>,
}

impl ElementaryTrack {
    fn new(pid: u16, codec: CodecType) -> Self {
        Self {
            pid,
            codec,
            pending: None,
            last_timestamps: None,
        }
    }

    fn info(&self) -> TrackInfo {
        TrackInfo {
            id: self.pid as u32,
            codec: self.codec,
            track_type: self.codec.track_type(),
        }
    }

    fn flush(&mut self, out: &mut Vec<ElementaryEvent>) {
        if let Some(frame) = self.pending.take() {
            if frame.data.is_empty() {
                return;
            }
            out.push(ElementaryEvent::Frame(ElementaryFrame {
                track_type: self.codec.track_type(),
                pid: self.pid,
                pts: frame.pts,
                dts: frame.dts,
                data: frame.data.freeze(),
            }));
        }
    }

    fn push(&mut self, pes: PesPacket, out: &mut Vec<ElementaryEvent>) {
        if !pes.payload_unit_start {
            match self.pending.as_mut() {
                Some(frame) => frame.data.extend_from_slice(&pes.data),
                None => log::trace!(
                    "dropping {} continuation bytes on pid 0x{:04x} with no open frame",
                    pes.data.len(),
                    self.pid
                ),
            }
            return;
        }

        self.flush(out);

        let (pts, dts) = match (pes.pts, pes.dts) {
            (Some(pts), dts) => (pts, dts.unwrap_or(pts)),
            (None, _) => self.last_timestamps.unwrap_or_else(|| {
                log::debug!("pid 0x{:04x}: PES without PTS before any timed PES", self.pid);
                (Timestamp::ZERO, Timestamp::ZERO)
            }),
        };
        self.last_timestamps = Some((pts, dts));

        let mut data = BytesMut::with_capacity(pes.data.len());
        data.extend_from_slice(&pes.data);
        self.pending = Some(PendingFrame { pts, dts, data });
    }
}

/// Reassembles PES payloads spread over many transport packets into whole
/// elementary frames, one accumulation per tracked PID.
///
/// Only the first H.264 and the first ADTS stream of the program are
/// tracked; everything else is dropped without buffering.
#[derive(Debug, Default)]
pub struct ElementaryStream {
    video: Option<ElementaryTrack>,
    audio: Option<ElementaryTrack>,
}

impl ElementaryStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks currently announced, video first.
    pub fn tracks(&self) -> Vec<TrackInfo> {
        self.video
            .iter()
            .chain(self.audio.iter())
            .map(ElementaryTrack::info)
            .collect()
    }

    fn update_tracks(&mut self, pmt: &ProgramMapTable, out: &mut Vec<ElementaryEvent>) {
        for (slot, codec) in [
            (&mut self.video, CodecType::H264),
            (&mut self.audio, CodecType::AAC),
        ] {
            let pid = pmt.pid_for(codec);
            if slot.as_ref().map(|track| track.pid) == pid {
                continue;
            }
            if let Some(mut old) = slot.take() {
                old.flush(out);
            }
            *slot = pid.map(|pid| ElementaryTrack::new(pid, codec));
        }
        out.push(ElementaryEvent::Metadata(self.tracks()));
    }

    fn track_for(&mut self, pid: u16) -> Option<&mut ElementaryTrack> {
        match (&mut self.video, &mut self.audio) {
            (Some(track), _) if track.pid == pid => Some(track),
            (_, Some(track)) if track.pid == pid => Some(track),
            _ => None,
        }
    }
}

impl Stream<TransportEvent> for ElementaryStream {
    type Output = ElementaryEvent;

    fn push(&mut self, event: TransportEvent, out: &mut Vec<ElementaryEvent>) {
        match event {
            TransportEvent::Pat { .. } => {}
            TransportEvent::Pmt {
                program_map_table, ..
            } => self.update_tracks(&program_map_table, out),
            TransportEvent::Pes(pes) => match self.track_for(pes.pid) {
                Some(track) => track.push(pes, out),
                None => log::trace!("ignoring PES on untracked pid 0x{:04x}", pes.pid),
            },
            TransportEvent::CorruptPes { pid, error } => {
                // the open frame ended where the bad unit began; its
                // continuations find no frame and are dropped
                if let Some(track) = self.track_for(pid) {
                    track.flush(out);
                }
                out.push(ElementaryEvent::Error(error));
            }
            TransportEvent::Error(e) => out.push(ElementaryEvent::Error(e)),
        }
    }

    fn end(&mut self, out: &mut Vec<ElementaryEvent>) {
        if let Some(track) = self.video.as_mut() {
            track.flush(out);
        }
        if let Some(track) = self.audio.as_mut() {
            track.flush(out);
        }
    }
}
