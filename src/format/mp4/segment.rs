use bytes::{BufMut, Bytes, BytesMut};

use crate::av::{Sample, SampleFlags, Timestamp, Track, VideoConfig};
use crate::codec::aac::{AacFrame, AudioConfig};
use crate::codec::h264::{parse_sps, NalUnit, NalUnitType, SpsInfo};
use crate::config::Config;
use crate::error::{MuxError, Result};

/// Samples of one track ready to be boxed into a `moof` + `mdat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFragment {
    pub track_id: u32,
    /// Decode time of the first sample in 90kHz ticks.
    pub base_media_decode_time: u64,
    pub samples: Vec<Sample>,
    /// Sample payloads back to back, in sample order.
    pub data: Bytes,
}

fn clamp_u32(ticks: u64) -> u32 {
    ticks.min(u32::MAX as u64) as u32
}

/// Durations from consecutive decode times. The last sample runs up to
/// `next` when the following sample is already known, otherwise it repeats
/// the previous delta; a lone sample gets `lone_duration`.
fn sample_durations(dts: &[Timestamp], next: Option<Timestamp>, lone_duration: u32) -> Vec<u32> {
    let mut durations: Vec<u32> = dts
        .windows(2)
        .map(|pair| clamp_u32(pair[1].ticks_since(pair[0])))
        .collect();
    match (dts.last(), next, durations.last().copied()) {
        (None, _, _) => {}
        (Some(last), Some(next), _) => durations.push(clamp_u32(next.ticks_since(*last))),
        (Some(_), None, Some(previous)) => durations.push(previous),
        (Some(_), None, None) => durations.push(lone_duration),
    }
    durations
}

struct VideoSample {
    pts: Timestamp,
    dts: Timestamp,
    keyframe: bool,
    data: BytesMut,
}

/// Groups NAL units into AVCC samples for one H.264 track.
#[derive(Debug)]
pub struct VideoSegmentStream {
    track_id: u32,
    dimensions: Option<(u32, u32)>,
    default_sample_duration: u32,
    sps: Option<(Bytes, SpsInfo)>,
    pps: Option<Bytes>,
    nal_units: Vec<NalUnit>,
}

impl VideoSegmentStream {
    pub fn new(track_id: u32, config: &Config) -> Self {
        Self {
            track_id,
            dimensions: config.video_dimensions,
            default_sample_duration: config.default_video_sample_duration,
            sps: None,
            pps: None,
            nal_units: Vec::new(),
        }
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    /// The track description, once an SPS and a PPS have been seen.
    pub fn track(&self) -> Option<Track> {
        let (sps, info) = self.sps.as_ref()?;
        let pps = self.pps.as_ref()?;
        let (width, height) = self.dimensions.unwrap_or((info.width, info.height));
        Some(Track::video(
            self.track_id,
            VideoConfig {
                width,
                height,
                profile_idc: info.profile_idc,
                profile_compatibility: info.profile_compatibility,
                level_idc: info.level_idc,
                sps: sps.clone(),
                pps: pps.clone(),
            },
        ))
    }

    pub fn push(&mut self, nal: NalUnit) {
        match nal.nal_unit_type {
            NalUnitType::Sps if self.sps.is_none() => match parse_sps(&nal.data) {
                Ok(info) => {
                    log::debug!(
                        "track {}: SPS profile {} level {} {}x{}",
                        self.track_id,
                        info.profile_idc,
                        info.level_idc,
                        info.width,
                        info.height
                    );
                    self.sps = Some((nal.data.clone(), info));
                }
                Err(e) => log::warn!("track {}: ignoring unparsable SPS: {}", self.track_id, e),
            },
            NalUnitType::Pps if self.pps.is_none() => self.pps = Some(nal.data.clone()),
            _ => {}
        }
        self.nal_units.push(nal);
    }

    /// Number of NAL units waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.nal_units.len()
    }

    /// Builds a fragment from the access units completed so far.
    ///
    /// Units sharing the newest decode time stay buffered for the next
    /// fragment; more of that access unit may follow.
    /// Fails, dropping the buffered units, if the track still has no SPS
    /// and PPS to describe it.
    pub fn flush(&mut self) -> Result<Option<TrackFragment>> {
        self.build_fragment(false)
    }

    /// Builds a fragment from everything pushed, the newest access unit
    /// included. Used once the input has ended.
    pub fn finish(&mut self) -> Result<Option<TrackFragment>> {
        self.build_fragment(true)
    }

    fn build_fragment(&mut self, include_newest: bool) -> Result<Option<TrackFragment>> {
        let Some(newest_dts) = self.nal_units.last().map(|nal| nal.dts) else {
            return Ok(None);
        };
        if self.track().is_none() {
            log::warn!(
                "track {}: dropping {} NAL units received before SPS/PPS",
                self.track_id,
                self.nal_units.len()
            );
            self.nal_units.clear();
            return Err(MuxError::Codec(format!(
                "video track {} has no SPS/PPS",
                self.track_id
            )));
        }

        let held_back = if include_newest {
            Vec::new()
        } else {
            let split = self
                .nal_units
                .iter()
                .rposition(|nal| nal.dts != newest_dts)
                .map_or(0, |i| i + 1);
            self.nal_units.split_off(split)
        };
        let nal_units = std::mem::replace(&mut self.nal_units, held_back);
        if nal_units.is_empty() {
            return Ok(None);
        }
        let next_dts = self.nal_units.first().map(|nal| nal.dts);

        // consecutive units sharing a decode time form one sample
        let mut grouped: Vec<VideoSample> = Vec::new();
        for nal in nal_units {
            if grouped.last().map_or(true, |sample| sample.dts != nal.dts) {
                grouped.push(VideoSample {
                    pts: nal.pts,
                    dts: nal.dts,
                    keyframe: false,
                    data: BytesMut::new(),
                });
            }
            let Some(sample) = grouped.last_mut() else {
                continue;
            };
            sample.keyframe |= nal.is_keyframe();
            sample.data.put_u32(nal.data.len() as u32);
            sample.data.put_slice(&nal.data);
        }

        let dts: Vec<Timestamp> = grouped.iter().map(|s| s.dts).collect();
        let durations = sample_durations(&dts, next_dts, self.default_sample_duration);

        let mut data = BytesMut::with_capacity(grouped.iter().map(|s| s.data.len()).sum());
        let samples = grouped
            .iter()
            .zip(durations)
            .map(|(sample, duration)| {
                data.put_slice(&sample.data);
                Sample {
                    duration,
                    size: sample.data.len() as u32,
                    composition_time_offset: clamp_u32(sample.pts.ticks_since(sample.dts)),
                    flags: if sample.keyframe {
                        SampleFlags::sync()
                    } else {
                        SampleFlags::non_sync()
                    },
                }
            })
            .collect::<Vec<_>>();

        log::debug!(
            "track {}: video fragment with {} samples at {}",
            self.track_id,
            samples.len(),
            dts[0]
        );

        Ok(Some(TrackFragment {
            track_id: self.track_id,
            base_media_decode_time: dts[0].ticks(),
            samples,
            data: data.freeze(),
        }))
    }
}

/// Turns AAC frames into samples for one audio track. Every frame is its
/// own sync sample.
#[derive(Debug)]
pub struct AudioSegmentStream {
    track_id: u32,
    audio_config: Option<AudioConfig>,
    frames: Vec<AacFrame>,
}

impl AudioSegmentStream {
    pub fn new(track_id: u32) -> Self {
        Self {
            track_id,
            audio_config: None,
            frames: Vec::new(),
        }
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    pub fn track(&self) -> Option<Track> {
        self.audio_config
            .map(|config| Track::audio(self.track_id, config))
    }

    pub fn push(&mut self, frame: AacFrame) {
        if self.audio_config.is_none() {
            log::debug!(
                "track {}: AAC object type {} {}Hz {} channels",
                self.track_id,
                frame.audio_config.object_type,
                frame.audio_config.sample_rate,
                frame.audio_config.channel_count
            );
            self.audio_config = Some(frame.audio_config);
        }
        self.frames.push(frame);
    }

    pub fn pending(&self) -> usize {
        self.frames.len()
    }

    pub fn flush(&mut self) -> Result<Option<TrackFragment>> {
        let frames = std::mem::take(&mut self.frames);
        let audio_config = match (frames.first(), self.audio_config) {
            (None, _) => return Ok(None),
            (Some(_), Some(config)) => config,
            (Some(first), None) => first.audio_config,
        };

        let dts: Vec<Timestamp> = frames.iter().map(|f| f.dts).collect();
        let durations = sample_durations(&dts, None, clamp_u32(audio_config.frame_duration()));

        let mut data = BytesMut::with_capacity(frames.iter().map(|f| f.data.len()).sum());
        let samples = frames
            .iter()
            .zip(durations)
            .map(|(frame, duration)| {
                data.put_slice(&frame.data);
                Sample {
                    duration,
                    size: frame.data.len() as u32,
                    composition_time_offset: clamp_u32(frame.pts.ticks_since(frame.dts)),
                    flags: SampleFlags::sync(),
                }
            })
            .collect::<Vec<_>>();

        log::debug!(
            "track {}: audio fragment with {} samples at {}",
            self.track_id,
            samples.len(),
            dts[0]
        );

        Ok(Some(TrackFragment {
            track_id: self.track_id,
            base_media_decode_time: dts[0].ticks(),
            samples,
            data: data.freeze(),
        }))
    }
}
