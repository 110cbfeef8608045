use bytes::{Bytes, BytesMut};

use super::types::TS_PACKET_SIZE;
use crate::format::Stream;

/// Realigns arbitrarily sized byte chunks into 188-byte transport packets.
///
/// Bytes that do not yet form a whole packet are carried over to the next
/// [`push`](Stream::push).
#[derive(Debug, Default)]
pub struct PacketStream {
    buffer: BytesMut,
}

impl PacketStream {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(TS_PACKET_SIZE),
        }
    }

    /// Number of bytes waiting for the rest of their packet.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl<'a> Stream<&'a [u8]> for PacketStream {
    type Output = Bytes;

    fn push(&mut self, data: &'a [u8], out: &mut Vec<Bytes>) {
        if data.is_empty() {
            return;
        }
        self.buffer.extend_from_slice(data);

        while self.buffer.len() >= TS_PACKET_SIZE {
            out.push(self.buffer.split_to(TS_PACKET_SIZE).freeze());
        }
    }

    fn end(&mut self, _out: &mut Vec<Bytes>) {
        if !self.buffer.is_empty() {
            log::warn!(
                "discarding {} trailing bytes that do not form a whole TS packet",
                self.buffer.len()
            );
            self.buffer.clear();
        }
    }
}
