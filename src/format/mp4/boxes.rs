//! ISO BMFF box serialization for fragmented MP4.
//!
//! Boxes are written straight into a `BytesMut`; a box's size field is
//! reserved up front and patched once its content is known.

use bytes::{BufMut, Bytes, BytesMut};

use crate::av::{Sample, Track, TrackConfig, VideoConfig, TRACK_TIMESCALE};
use crate::codec::aac::AudioConfig;

/// `duration` written in mvhd, tkhd and mdhd: unknown.
pub const UNKNOWN_DURATION: u32 = 0xFFFF_FFFF;

/// tfhd flag: base data offset is the start of the enclosing moof.
pub const TFHD_DEFAULT_BASE_IS_MOOF: u32 = 0x02_0000;

/// trun flags: data-offset, sample duration, size, flags and composition
/// time offset present.
pub const TRUN_FLAGS: u32 = 0x00_0F01;

const UNITY_MATRIX: [u32; 9] = [
    0x0001_0000,
    0,
    0,
    0,
    0x0001_0000,
    0,
    0,
    0,
    0x4000_0000,
];

fn write_box<F>(buf: &mut BytesMut, box_type: &[u8; 4], content: F)
where
    F: FnOnce(&mut BytesMut),
{
    let start = buf.len();
    buf.put_u32(0);
    buf.put_slice(box_type);
    content(buf);
    let size = (buf.len() - start) as u32;
    buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
}

fn write_full_box<F>(buf: &mut BytesMut, box_type: &[u8; 4], version: u8, flags: u32, content: F)
where
    F: FnOnce(&mut BytesMut),
{
    write_box(buf, box_type, |buf| {
        buf.put_u32(((version as u32) << 24) | (flags & 0x00FF_FFFF));
        content(buf);
    });
}

/// Writes and numbers the boxes of one fMP4 stream.
///
/// Every `moof` takes the next `mfhd` sequence number, so fragments of
/// different tracks produced by the same generator never share one.
#[derive(Debug)]
pub struct Mp4Generator {
    sequence_number: u32,
}

impl Default for Mp4Generator {
    fn default() -> Self {
        Self { sequence_number: 1 }
    }
}

impl Mp4Generator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next fragment will carry.
    pub fn next_sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// `ftyp` + `moov` describing `tracks`.
    pub fn init_segment(&self, tracks: &[Track]) -> Bytes {
        let mut buf = BytesMut::with_capacity(1024);
        write_ftyp(&mut buf);
        write_moov(&mut buf, tracks);
        buf.freeze()
    }

    /// `moof` + `mdat` for one track. `data` holds the samples back to back
    /// in the order of `samples`.
    pub fn fragment(
        &mut self,
        track_id: u32,
        base_media_decode_time: u64,
        samples: &[Sample],
        data: &[u8],
    ) -> Bytes {
        let mut buf = BytesMut::with_capacity(256 + samples.len() * 17 + data.len());
        let sequence_number = self.sequence_number;
        self.sequence_number = self.sequence_number.wrapping_add(1);

        let data_offset_pos =
            write_moof(&mut buf, sequence_number, track_id, base_media_decode_time, samples);
        // samples start right after the mdat header
        let data_offset = buf.len() as u32 + 8;
        buf[data_offset_pos..data_offset_pos + 4].copy_from_slice(&data_offset.to_be_bytes());

        write_box(&mut buf, b"mdat", |buf| buf.put_slice(data));
        buf.freeze()
    }
}

fn write_ftyp(buf: &mut BytesMut) {
    write_box(buf, b"ftyp", |buf| {
        buf.put_slice(b"isom"); // major brand
        buf.put_u32(1); // minor version
        buf.put_slice(b"isom");
        buf.put_slice(b"avc1");
    });
}

fn write_moov(buf: &mut BytesMut, tracks: &[Track]) {
    write_box(buf, b"moov", |buf| {
        write_mvhd(buf);
        for track in tracks {
            write_trak(buf, track);
        }
        write_box(buf, b"mvex", |buf| {
            for track in tracks {
                write_trex(buf, track.id);
            }
        });
    });
}

fn write_mvhd(buf: &mut BytesMut) {
    write_full_box(buf, b"mvhd", 0, 0, |buf| {
        buf.put_u32(0); // creation_time
        buf.put_u32(0); // modification_time
        buf.put_u32(TRACK_TIMESCALE);
        buf.put_u32(UNKNOWN_DURATION);
        buf.put_u32(0x0001_0000); // rate 1.0
        buf.put_u16(0x0100); // volume 1.0
        buf.put_bytes(0, 10); // reserved
        for value in UNITY_MATRIX {
            buf.put_u32(value);
        }
        buf.put_bytes(0, 24); // pre_defined
        buf.put_u32(0xFFFF_FFFF); // next_track_ID
    });
}

fn write_trak(buf: &mut BytesMut, track: &Track) {
    write_box(buf, b"trak", |buf| {
        write_tkhd(buf, track);
        write_box(buf, b"mdia", |buf| {
            write_mdhd(buf, track.timescale);
            write_hdlr(buf, &track.config);
            write_minf(buf, &track.config);
        });
    });
}

fn write_tkhd(buf: &mut BytesMut, track: &Track) {
    // track_enabled | track_in_movie | track_in_preview
    write_full_box(buf, b"tkhd", 0, 0x07, |buf| {
        buf.put_u32(0); // creation_time
        buf.put_u32(0); // modification_time
        buf.put_u32(track.id);
        buf.put_u32(0); // reserved
        buf.put_u32(UNKNOWN_DURATION);
        buf.put_bytes(0, 8); // reserved
        buf.put_u16(0); // layer
        buf.put_u16(0); // alternate_group
        match &track.config {
            TrackConfig::Audio(_) => buf.put_u16(0x0100),
            TrackConfig::Video(_) => buf.put_u16(0),
        }
        buf.put_u16(0); // reserved
        for value in UNITY_MATRIX {
            buf.put_u32(value);
        }
        let (width, height) = match &track.config {
            TrackConfig::Video(video) => (video.width, video.height),
            TrackConfig::Audio(_) => (0, 0),
        };
        // 16.16 fixed point
        buf.put_u32(width << 16);
        buf.put_u32(height << 16);
    });
}

fn write_mdhd(buf: &mut BytesMut, timescale: u32) {
    write_full_box(buf, b"mdhd", 0, 0, |buf| {
        buf.put_u32(0); // creation_time
        buf.put_u32(0); // modification_time
        buf.put_u32(timescale);
        buf.put_u32(UNKNOWN_DURATION);
        buf.put_u16(0x55C4); // 'und'
        buf.put_u16(0); // pre_defined
    });
}

fn write_hdlr(buf: &mut BytesMut, config: &TrackConfig) {
    let (handler, name): (&[u8; 4], &[u8]) = match config {
        TrackConfig::Video(_) => (b"vide", b"VideoHandler\0"),
        TrackConfig::Audio(_) => (b"soun", b"SoundHandler\0"),
    };
    write_full_box(buf, b"hdlr", 0, 0, |buf| {
        buf.put_u32(0); // pre_defined
        buf.put_slice(handler);
        buf.put_bytes(0, 12); // reserved
        buf.put_slice(name);
    });
}

fn write_minf(buf: &mut BytesMut, config: &TrackConfig) {
    write_box(buf, b"minf", |buf| {
        match config {
            TrackConfig::Video(_) => write_full_box(buf, b"vmhd", 0, 1, |buf| {
                buf.put_u16(0); // graphicsmode
                buf.put_bytes(0, 6); // opcolor
            }),
            TrackConfig::Audio(_) => write_full_box(buf, b"smhd", 0, 0, |buf| {
                buf.put_u16(0); // balance
                buf.put_u16(0); // reserved
            }),
        }
        write_box(buf, b"dinf", |buf| {
            write_full_box(buf, b"dref", 0, 0, |buf| {
                buf.put_u32(1); // entry_count
                // self-contained
                write_full_box(buf, b"url ", 0, 1, |_| {});
            });
        });
        write_stbl(buf, config);
    });
}

fn write_stbl(buf: &mut BytesMut, config: &TrackConfig) {
    write_box(buf, b"stbl", |buf| {
        write_full_box(buf, b"stsd", 0, 0, |buf| {
            buf.put_u32(1); // entry_count
            match config {
                TrackConfig::Video(video) => write_avc1(buf, video),
                TrackConfig::Audio(audio) => write_mp4a(buf, audio),
            }
        });
        // samples live in the fragments
        write_full_box(buf, b"stts", 0, 0, |buf| buf.put_u32(0));
        write_full_box(buf, b"stsc", 0, 0, |buf| buf.put_u32(0));
        write_full_box(buf, b"stsz", 0, 0, |buf| {
            buf.put_u32(0); // sample_size
            buf.put_u32(0); // sample_count
        });
        write_full_box(buf, b"stco", 0, 0, |buf| buf.put_u32(0));
    });
}

fn write_avc1(buf: &mut BytesMut, video: &VideoConfig) {
    write_box(buf, b"avc1", |buf| {
        buf.put_bytes(0, 6); // reserved
        buf.put_u16(1); // data_reference_index
        buf.put_u16(0); // pre_defined
        buf.put_u16(0); // reserved
        buf.put_bytes(0, 12); // pre_defined
        buf.put_u16(video.width as u16);
        buf.put_u16(video.height as u16);
        buf.put_u32(0x0048_0000); // horizresolution 72 dpi
        buf.put_u32(0x0048_0000); // vertresolution 72 dpi
        buf.put_u32(0); // reserved
        buf.put_u16(1); // frame_count
        buf.put_bytes(0, 32); // compressorname
        buf.put_u16(0x0018); // depth
        buf.put_i16(-1); // pre_defined

        write_box(buf, b"avcC", |buf| {
            buf.put_u8(1); // configurationVersion
            buf.put_u8(video.profile_idc);
            buf.put_u8(video.profile_compatibility);
            buf.put_u8(video.level_idc);
            buf.put_u8(0xFF); // 4-byte NAL lengths
            buf.put_u8(0xE0 | 1); // one SPS
            buf.put_u16(video.sps.len() as u16);
            buf.put_slice(&video.sps);
            buf.put_u8(1); // one PPS
            buf.put_u16(video.pps.len() as u16);
            buf.put_slice(&video.pps);
        });
    });
}

fn write_mp4a(buf: &mut BytesMut, audio: &AudioConfig) {
    write_box(buf, b"mp4a", |buf| {
        buf.put_bytes(0, 6); // reserved
        buf.put_u16(1); // data_reference_index
        buf.put_bytes(0, 8); // reserved
        buf.put_u16(audio.channel_count as u16);
        buf.put_u16(16); // samplesize
        buf.put_u16(0); // pre_defined
        buf.put_u16(0); // reserved
        buf.put_u32(audio.sample_rate << 16); // 16.16

        write_full_box(buf, b"esds", 0, 0, |buf| {
            let asc = audio.audio_specific_config();
            // ES_Descriptor
            buf.put_u8(0x03);
            buf.put_u8(0x19);
            buf.put_u16(0); // ES_ID
            buf.put_u8(0); // flags
            // DecoderConfigDescriptor
            buf.put_u8(0x04);
            buf.put_u8(0x11);
            buf.put_u8(0x40); // MPEG-4 audio
            buf.put_u8(0x15); // AudioStream
            buf.put_bytes(0, 3); // bufferSizeDB
            buf.put_u32(0); // maxBitrate
            buf.put_u32(0); // avgBitrate
            // DecoderSpecificInfo
            buf.put_u8(0x05);
            buf.put_u8(asc.len() as u8);
            buf.put_slice(&asc);
            // SLConfigDescriptor
            buf.put_u8(0x06);
            buf.put_u8(0x01);
            buf.put_u8(0x02);
        });
    });
}

fn write_trex(buf: &mut BytesMut, track_id: u32) {
    write_full_box(buf, b"trex", 0, 0, |buf| {
        buf.put_u32(track_id);
        buf.put_u32(1); // default_sample_description_index
        buf.put_u32(0); // default_sample_duration
        buf.put_u32(0); // default_sample_size
        buf.put_u32(0x0001_0001); // default_sample_flags
    });
}

/// Writes a moof and returns the position of trun's data_offset field.
fn write_moof(
    buf: &mut BytesMut,
    sequence_number: u32,
    track_id: u32,
    base_media_decode_time: u64,
    samples: &[Sample],
) -> usize {
    let mut data_offset_pos = 0;
    write_box(buf, b"moof", |buf| {
        write_full_box(buf, b"mfhd", 0, 0, |buf| buf.put_u32(sequence_number));
        write_box(buf, b"traf", |buf| {
            write_full_box(buf, b"tfhd", 0, TFHD_DEFAULT_BASE_IS_MOOF, |buf| {
                buf.put_u32(track_id)
            });
            write_full_box(buf, b"tfdt", 1, 0, |buf| buf.put_u64(base_media_decode_time));
            write_full_box(buf, b"trun", 0, TRUN_FLAGS, |buf| {
                buf.put_u32(samples.len() as u32);
                data_offset_pos = buf.len();
                buf.put_u32(0); // patched once the moof size is known
                for sample in samples {
                    buf.put_u32(sample.duration);
                    buf.put_u32(sample.size);
                    buf.put_u32(sample.flags.to_u32());
                    buf.put_u32(sample.composition_time_offset);
                }
            });
            write_full_box(buf, b"sdtp", 0, 0, |buf| {
                for sample in samples {
                    buf.put_u8(sample.flags.to_sdtp());
                }
            });
        });
    });
    data_offset_pos
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use crate::av::SampleFlags;
    use pretty_assertions::assert_eq;

    fn video_track() -> Track {
        Track::video(
            0x100,
            VideoConfig {
                width: 640,
                height: 480,
                profile_idc: 66,
                profile_compatibility: 0xC0,
                level_idc: 30,
                sps: Bytes::from_static(&[0x67, 0x42, 0xC0, 0x1E, 0xED]),
                pps: Bytes::from_static(&[0x68, 0xCE, 0x38, 0x80]),
            },
        )
    }

    fn audio_track() -> Track {
        Track::audio(
            0x101,
            AudioConfig {
                object_type: 2,
                sample_rate: 44100,
                channel_count: 2,
                sampling_frequency_index: 4,
            },
        )
    }

    #[test]
    fn test_ftyp() {
        let init = Mp4Generator::new().init_segment(&[]);
        assert_eq!(
            &init[..24],
            &[
                0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm', 0x00, 0x00,
                0x00, 0x01, b'i', b's', b'o', b'm', b'a', b'v', b'c', b'1'
            ]
        );
    }

    #[test]
    fn test_video_init_segment() {
        let init = Mp4Generator::new().init_segment(&[video_track()]);
        let top: Vec<[u8; 4]> = boxes(&init).into_iter().map(|(t, _)| t).collect();
        assert_eq!(top, vec![*b"ftyp", *b"moov"]);

        let moov = find(&init, &["moov"]).unwrap();
        assert_eq!(count(moov, "trak"), 1);

        let mvhd = find(moov, &["mvhd"]).unwrap();
        assert_eq!(u32_at(mvhd, 12), TRACK_TIMESCALE);
        assert_eq!(u32_at(mvhd, 16), UNKNOWN_DURATION);

        let tkhd = find(moov, &["trak", "tkhd"]).unwrap();
        assert_eq!(u32_at(tkhd, 12), 0x100);
        assert_eq!(u32_at(tkhd, 76), 640 << 16);
        assert_eq!(u32_at(tkhd, 80), 480 << 16);

        let mdhd = find(moov, &["trak", "mdia", "mdhd"]).unwrap();
        assert_eq!(u32_at(mdhd, 12), 90_000);
        assert_eq!(u32_at(mdhd, 16), 0xFFFF_FFFF);

        let hdlr = find(moov, &["trak", "mdia", "hdlr"]).unwrap();
        assert_eq!(&hdlr[8..12], b"vide");

        let avcc = find(
            moov,
            &["trak", "mdia", "minf", "stbl", "stsd", "avc1", "avcC"],
        )
        .unwrap();
        assert_eq!(
            avcc,
            &[
                0x01, 66, 0xC0, 30, 0xFF, 0xE1, 0x00, 0x05, 0x67, 0x42, 0xC0, 0x1E, 0xED, 0x01,
                0x00, 0x04, 0x68, 0xCE, 0x38, 0x80
            ]
        );

        let trex = find(moov, &["mvex", "trex"]).unwrap();
        assert_eq!(u32_at(trex, 4), 0x100);
    }

    #[test]
    fn test_audio_init_segment() {
        let init = Mp4Generator::new().init_segment(&[video_track(), audio_track()]);
        let moov = find(&init, &["moov"]).unwrap();
        assert_eq!(count(moov, "trak"), 2);
        assert_eq!(count(find(moov, &["mvex"]).unwrap(), "trex"), 2);

        let traks: Vec<&[u8]> = boxes(moov)
            .into_iter()
            .filter(|(t, _)| t == b"trak")
            .map(|(_, payload)| payload)
            .collect();
        let audio = traks[1];
        assert!(find(audio, &["mdia", "minf", "smhd"]).is_some());

        let mp4a = find(audio, &["mdia", "minf", "stbl", "stsd", "mp4a"]).unwrap();
        assert_eq!(u32::from(u16::from_be_bytes([mp4a[16], mp4a[17]])), 2);
        assert_eq!(u32_at(mp4a, 24) >> 16, 44100);

        let esds = find(audio, &["mdia", "minf", "stbl", "stsd", "mp4a", "esds"]).unwrap();
        // version/flags, then ES_Descriptor
        assert_eq!(esds[4], 0x03);
        assert_eq!(esds[5] as usize, esds.len() - 6);
        // DecoderSpecificInfo carries the AudioSpecificConfig
        assert_eq!(&esds[24..28], &[0x05, 0x02, 0x12, 0x10]);
    }

    #[test]
    fn test_fragment_layout() {
        let mut generator = Mp4Generator::new();
        let samples = [
            Sample {
                duration: 3000,
                size: 5,
                composition_time_offset: 0,
                flags: SampleFlags::sync(),
            },
            Sample {
                duration: 3000,
                size: 3,
                composition_time_offset: 1500,
                flags: SampleFlags::non_sync(),
            },
        ];
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let fragment = generator.fragment(0x100, 900_000, &samples, &data);

        let top = boxes(&fragment);
        assert_eq!(top.len(), 2);
        assert_eq!(&top[0].0, b"moof");
        assert_eq!(&top[1].0, b"mdat");
        assert_eq!(top[1].1, &data);

        let moof = top[0].1;
        assert_eq!(u32_at(find(moof, &["mfhd"]).unwrap(), 4), 1);

        let tfhd = find(moof, &["traf", "tfhd"]).unwrap();
        assert_eq!(u32_at(tfhd, 0), TFHD_DEFAULT_BASE_IS_MOOF);
        assert_eq!(u32_at(tfhd, 4), 0x100);

        let tfdt = find(moof, &["traf", "tfdt"]).unwrap();
        assert_eq!(tfdt[0], 1);
        assert_eq!(&tfdt[4..12], &900_000u64.to_be_bytes());

        let trun = find(moof, &["traf", "trun"]).unwrap();
        assert_eq!(u32_at(trun, 0), TRUN_FLAGS);
        assert_eq!(u32_at(trun, 4), 2);
        // data_offset points at the first mdat byte
        let moof_size = moof.len() + 8;
        assert_eq!(u32_at(trun, 8) as usize, moof_size + 8);
        assert_eq!(&fragment[moof_size + 8..], &data);
        assert_eq!(u32_at(trun, 12), 3000);
        assert_eq!(u32_at(trun, 16), 5);
        assert_eq!(u32_at(trun, 20), 0x0200_0000);
        assert_eq!(u32_at(trun, 40), 1500);

        let sdtp = find(moof, &["traf", "sdtp"]).unwrap();
        assert_eq!(&sdtp[4..], &[0x20, 0x10]);
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let mut generator = Mp4Generator::new();
        let numbers: Vec<u32> = (0..3)
            .map(|_| {
                let fragment = generator.fragment(1, 0, &[], &[]);
                u32_at(find(&fragment, &["moof", "mfhd"]).unwrap(), 4)
            })
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(generator.next_sequence_number(), 4);
    }
}
