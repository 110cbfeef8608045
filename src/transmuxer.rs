use bytes::{Bytes, BytesMut};

use crate::av::{Sample, Track, TrackInfo, TrackType};
use crate::codec::aac::AacStream;
use crate::codec::h264::H264Stream;
use crate::config::Config;
use crate::error::{MuxError, Result};
use crate::format::mp4::{AudioSegmentStream, Mp4Generator, TrackFragment, VideoSegmentStream};
use crate::format::ts::{ElementaryEvent, ElementaryStream, PacketStream, TransportParseStream};
use crate::format::Stream;

/// Per-track summary of one `moof` inside a [`MediaSegment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentInfo {
    pub track_id: u32,
    pub track_type: TrackType,
    pub sequence_number: u32,
    pub base_media_decode_time: u64,
    pub samples: Vec<Sample>,
}

/// One `moof` + `mdat` pair per track, concatenated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSegment {
    pub data: Bytes,
    pub fragments: Vec<FragmentInfo>,
}

#[derive(Debug)]
pub enum TransmuxEvent {
    /// The program's track list changed.
    Metadata(Vec<TrackInfo>),
    /// `ftyp` + `moov`; precedes the first media segment and any segment
    /// whose track configuration differs from the previous one.
    InitSegment(Bytes),
    MediaSegment(MediaSegment),
    /// A non-fatal fault; the affected input was skipped.
    Error(MuxError),
}

/// Converts MPEG-TS segments carrying H.264 and ADTS AAC into fragmented
/// MP4.
///
/// Every call runs the whole pipeline synchronously and returns the events
/// it produced. Media segments are cut by [`flush`](Transmuxer::flush) and
/// [`end`](Transmuxer::end); after `end` the instance refuses further
/// input.
///
/// ```rust
/// use hlsmux::{Transmuxer, TransmuxEvent};
///
/// # fn main() -> hlsmux::Result<()> {
/// let mut transmuxer = Transmuxer::new();
/// let events = transmuxer.push(&[0u8; 100])?;
/// assert!(events.is_empty());
/// let events = transmuxer.end()?;
/// assert!(events.iter().all(|e| !matches!(e, TransmuxEvent::MediaSegment(_))));
/// assert!(transmuxer.push(&[]).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Transmuxer {
    config: Config,
    packets: PacketStream,
    transport: TransportParseStream,
    elementary: ElementaryStream,
    h264: H264Stream,
    aac: AacStream,
    video: Option<VideoSegmentStream>,
    audio: Option<AudioSegmentStream>,
    generator: Mp4Generator,
    announced_tracks: Option<Vec<TrackInfo>>,
    init_tracks: Option<Vec<Track>>,
    ended: bool,
}

impl Default for Transmuxer {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl Transmuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            transport: TransportParseStream::new().with_crc_verification(config.verify_psi_crc),
            config,
            packets: PacketStream::new(),
            elementary: ElementaryStream::new(),
            h264: H264Stream::new(),
            aac: AacStream::new(),
            video: None,
            audio: None,
            generator: Mp4Generator::new(),
            announced_tracks: None,
            init_tracks: None,
            ended: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Feeds a chunk of transport stream bytes of any size.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<TransmuxEvent>> {
        self.check_not_ended()?;

        let mut packets = Vec::new();
        self.packets.push(data, &mut packets);

        let mut events = Vec::new();
        let mut transport_events = Vec::new();
        let mut elementary_events = Vec::new();
        for packet in packets {
            self.transport.push(packet, &mut transport_events);
            for event in transport_events.drain(..) {
                self.elementary.push(event, &mut elementary_events);
            }
            for event in elementary_events.drain(..) {
                self.handle_elementary(event, &mut events);
            }
        }
        Ok(events)
    }

    /// Emits a media segment from the samples completed so far. The newest
    /// video access unit waits for the next segment.
    pub fn flush(&mut self) -> Result<Vec<TransmuxEvent>> {
        self.check_not_ended()?;
        let mut events = Vec::new();
        self.flush_segments(false, &mut events);
        Ok(events)
    }

    /// Finalizes buffered frames and samples and emits the last media
    /// segment.
    pub fn end(&mut self) -> Result<Vec<TransmuxEvent>> {
        self.check_not_ended()?;
        self.ended = true;

        let mut events = Vec::new();

        let mut packets = Vec::new();
        self.packets.end(&mut packets);
        let mut transport_events = Vec::new();
        for packet in packets {
            self.transport.push(packet, &mut transport_events);
        }
        self.transport.end(&mut transport_events);

        let mut elementary_events = Vec::new();
        for event in transport_events {
            self.elementary.push(event, &mut elementary_events);
        }
        self.elementary.end(&mut elementary_events);
        for event in elementary_events {
            self.handle_elementary(event, &mut events);
        }

        self.end_video_stage();
        self.end_audio_stage();

        self.flush_segments(true, &mut events);
        log::debug!("transmuxer ended, {} fragments written", self.generator.next_sequence_number() - 1);
        Ok(events)
    }

    /// Moves the NAL unit still open in the H.264 splitter into the video
    /// segment stream.
    fn end_video_stage(&mut self) {
        let mut nal_units = Vec::new();
        self.h264.end(&mut nal_units);
        if let Some(video) = self.video.as_mut() {
            nal_units.into_iter().for_each(|nal| video.push(nal));
        }
    }

    fn end_audio_stage(&mut self) {
        let mut frames = Vec::new();
        self.aac.end(&mut frames);
        if let Some(audio) = self.audio.as_mut() {
            frames.into_iter().for_each(|frame| audio.push(frame));
        }
    }

    fn check_not_ended(&self) -> Result<()> {
        if self.ended {
            return Err(MuxError::Ended);
        }
        Ok(())
    }

    fn handle_elementary(&mut self, event: ElementaryEvent, events: &mut Vec<TransmuxEvent>) {
        match event {
            ElementaryEvent::Metadata(tracks) => {
                self.update_tracks(&tracks, events);
                if self.announced_tracks.as_ref() != Some(&tracks) {
                    self.announced_tracks = Some(tracks.clone());
                    events.push(TransmuxEvent::Metadata(tracks));
                }
            }
            ElementaryEvent::Frame(frame) => match frame.track_type {
                TrackType::Video => {
                    let mut nal_units = Vec::new();
                    self.h264.push(frame, &mut nal_units);
                    if let Some(video) = self.video.as_mut() {
                        nal_units.into_iter().for_each(|nal| video.push(nal));
                    }
                }
                TrackType::Audio => {
                    let mut frames = Vec::new();
                    self.aac.push(frame, &mut frames);
                    if let Some(audio) = self.audio.as_mut() {
                        frames.into_iter().for_each(|frame| audio.push(frame));
                    }
                }
            },
            ElementaryEvent::Error(e) => {
                log::debug!("transport error: {}", e);
                events.push(TransmuxEvent::Error(e));
            }
        }
    }

    /// Creates segment streams for newly announced tracks. Media buffered
    /// for a track that moves or disappears is written out first.
    fn update_tracks(&mut self, tracks: &[TrackInfo], events: &mut Vec<TransmuxEvent>) {
        let video_id = tracks
            .iter()
            .find(|t| t.track_type == TrackType::Video)
            .map(|t| t.id);
        let audio_id = tracks
            .iter()
            .find(|t| t.track_type == TrackType::Audio)
            .map(|t| t.id);

        let video_changed = self.video.as_ref().map(VideoSegmentStream::track_id) != video_id;
        let audio_changed = self.audio.as_ref().map(AudioSegmentStream::track_id) != audio_id;
        if !video_changed && !audio_changed {
            return;
        }

        if video_changed {
            self.end_video_stage();
        }
        if audio_changed {
            self.end_audio_stage();
        }
        self.flush_segments(video_changed, events);

        if video_changed {
            log::debug!("video track now {:?}", video_id);
            self.video = video_id.map(|id| VideoSegmentStream::new(id, &self.config));
            self.h264 = H264Stream::new();
        }
        if audio_changed {
            log::debug!("audio track now {:?}", audio_id);
            self.audio = audio_id.map(AudioSegmentStream::new);
            self.aac = AacStream::new();
        }
    }

    /// Writes the buffered samples as one media segment. `finish_video`
    /// includes the newest video access unit.
    fn flush_segments(&mut self, finish_video: bool, events: &mut Vec<TransmuxEvent>) {
        let mut fragments: Vec<(TrackType, TrackFragment)> = Vec::new();

        if let Some(video) = self.video.as_mut() {
            let fragment = if finish_video {
                video.finish()
            } else {
                video.flush()
            };
            match fragment {
                Ok(Some(fragment)) => fragments.push((TrackType::Video, fragment)),
                Ok(None) => {}
                Err(e) => events.push(TransmuxEvent::Error(e)),
            }
        }
        if let Some(audio) = self.audio.as_mut() {
            match audio.flush() {
                Ok(Some(fragment)) => fragments.push((TrackType::Audio, fragment)),
                Ok(None) => {}
                Err(e) => events.push(TransmuxEvent::Error(e)),
            }
        }
        if fragments.is_empty() {
            return;
        }

        let tracks: Vec<Track> = self
            .video
            .as_ref()
            .and_then(VideoSegmentStream::track)
            .into_iter()
            .chain(self.audio.as_ref().and_then(AudioSegmentStream::track))
            .collect();
        if self.init_tracks.as_ref() != Some(&tracks) {
            log::debug!("init segment for {} tracks", tracks.len());
            events.push(TransmuxEvent::InitSegment(
                self.generator.init_segment(&tracks),
            ));
            self.init_tracks = Some(tracks);
        }

        let mut data = BytesMut::new();
        let mut infos = Vec::with_capacity(fragments.len());
        for (track_type, fragment) in fragments {
            let sequence_number = self.generator.next_sequence_number();
            data.extend_from_slice(&self.generator.fragment(
                fragment.track_id,
                fragment.base_media_decode_time,
                &fragment.samples,
                &fragment.data,
            ));
            infos.push(FragmentInfo {
                track_id: fragment.track_id,
                track_type,
                sequence_number,
                base_media_decode_time: fragment.base_media_decode_time,
                samples: fragment.samples,
            });
        }

        events.push(TransmuxEvent::MediaSegment(MediaSegment {
            data: data.freeze(),
            fragments: infos,
        }));
    }
}
