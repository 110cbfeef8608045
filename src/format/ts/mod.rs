//! # MPEG Transport Stream demultiplexing
//!
//! Three stages turn raw segment bytes into whole elementary frames:
//!
//! - [`PacketStream`]: realigns arbitrary chunks into 188-byte packets
//! - [`TransportParseStream`]: decodes packet headers, PAT, PMT and PES headers
//! - [`ElementaryStream`]: reassembles PES payloads per PID
//!
//! ```rust
//! use hlsmux::format::Stream;
//! use hlsmux::format::ts::{PacketStream, TS_PACKET_SIZE};
//!
//! let mut packets = PacketStream::new();
//! let mut out = Vec::new();
//! packets.push(&[0x47u8; TS_PACKET_SIZE + 10][..], &mut out);
//! assert_eq!(out.len(), 1);
//! assert_eq!(packets.pending(), 10);
//! ```

mod elementary;
mod packet;
mod parser;
mod pes;
mod types;

pub use elementary::{ElementaryEvent, ElementaryFrame, ElementaryStream};
pub use packet::PacketStream;
pub use parser::{PesPacket, TransportEvent, TransportParseStream};
pub use pes::{read_timestamp, write_timestamp, PesHeader, PES_FIXED_HEADER_SIZE};
pub use types::*;
