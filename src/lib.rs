#![doc(html_root_url = "https://docs.rs/hlsmux/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # hlsmux - MPEG-TS to fragmented MP4
//!
//! `hlsmux` converts HLS media segments (MPEG-2 Transport Stream carrying
//! H.264 video and ADTS AAC audio) into fragmented MP4 suitable for Media
//! Source Extensions: one init segment (`ftyp` + `moov`) followed by media
//! segments (`moof` + `mdat`).
//!
//! The conversion is a synchronous push pipeline. Bytes go in through
//! [`Transmuxer::push`] in chunks of any size and every stage runs to
//! completion before the call returns:
//!
//! ```text
//! PacketStream -> TransportParseStream -> ElementaryStream
//!     -> H264Stream -> VideoSegmentStream \
//!     -> AacStream  -> AudioSegmentStream  -> Mp4Generator
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hlsmux::{Config, TransmuxEvent, Transmuxer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let segment = std::fs::read("segment0.ts")?;
//! let mut transmuxer = Transmuxer::with_config(Config::from_env());
//!
//! let mut events = transmuxer.push(&segment)?;
//! events.extend(transmuxer.end()?);
//!
//! for event in events {
//!     match event {
//!         TransmuxEvent::Metadata(tracks) => println!("tracks: {:?}", tracks),
//!         TransmuxEvent::InitSegment(init) => println!("init: {} bytes", init.len()),
//!         TransmuxEvent::MediaSegment(segment) => {
//!             println!("media: {} bytes", segment.data.len())
//!         }
//!         TransmuxEvent::Error(e) => eprintln!("skipped: {}", e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: timestamps, track descriptions and sample flags
//! - `codec`: H.264 NAL unit splitting and SPS parsing, ADTS framing
//! - `format`: transport stream demuxing and fMP4 box generation
//! - `config`: transmuxer settings, optionally from `HLSMUX_*` variables
//! - `error`: the crate error type
//! - `utils`: bit reader and CRC-32/MPEG-2

/// Timestamps, tracks and samples
pub mod av;

/// H.264 and AAC elementary stream handling
pub mod codec;

/// Configuration module
pub mod config;

/// Error types and utilities
pub mod error;

/// MPEG-TS demuxing and fragmented MP4 muxing
pub mod format;

/// The end-to-end pipeline
pub mod transmuxer;

/// Common utilities and helper functions
pub mod utils;

pub use config::Config;
pub use error::{MuxError, Result};
pub use transmuxer::{FragmentInfo, MediaSegment, TransmuxEvent, Transmuxer};
