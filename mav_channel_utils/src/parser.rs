// mav_channel_utils/src/parser.rs

//! Streaming MAVLink frame parser.
//!
//! Transports deliver bytes in arbitrary chunks: a TCP read or a WebSocket frame may
//! hold half a packet or several packets. `MavFrameParser` buffers those chunks,
//! finds frame boundaries from the MAVLink 1/2 headers and hands each complete frame
//! to rust-mavlink for CRC checking and decoding.
//!
//! # Framing
//!
//! | version | start | length                                     |
//! |---------|-------|--------------------------------------------|
//! | 1       | 0xFE  | 6 header + payload + 2 CRC                 |
//! | 2       | 0xFD  | 10 header + payload + 2 CRC (+13 if signed) |
//!
//! Bytes in front of a start marker are discarded. A complete frame that fails to
//! decode is dropped one byte at a time so the parser can resynchronise on the next
//! start marker.

use std::io::Cursor;

use log::debug;
use mavlink::common::MavMessage;
use mavlink::peek_reader::PeekReader;
use mavlink::MavlinkVersion;

use crate::error::ChannelError;
use crate::packet::MavPacket;

const MAV_STX_V1: u8 = 0xFE;
const MAV_STX_V2: u8 = 0xFD;
const V1_OVERHEAD: usize = 6 + 2;
const V2_OVERHEAD: usize = 10 + 2;
const V2_SIGNATURE_LEN: usize = 13;
const V2_FLAG_SIGNED: u8 = 0x01;

/// Parser counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Frames decoded into packets.
    pub packets_decoded: u64,
    /// Complete frames rejected (CRC mismatch, unknown message, bad enum value).
    pub decode_errors: u64,
    /// Bytes thrown away while searching for a start marker.
    pub bytes_discarded: u64,
}

/// Incremental byte-to-packet assembler. One instance per inbound byte stream.
#[derive(Debug, Default)]
pub struct MavFrameParser {
    buffer: Vec<u8>,
    stats: ParserStats,
}

impl MavFrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drops any partially assembled frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Feeds raw bytes and returns every packet completed by them, in stream order.
    pub fn push(&mut self, data: &[u8]) -> Vec<MavPacket> {
        self.buffer.extend_from_slice(data);

        let mut packets = Vec::new();
        while let Some(result) = self.next_frame() {
            match result {
                Ok(packet) => packets.push(packet),
                Err(e) => debug!("[MavFrameParser] Discarding invalid frame: {}", e),
            }
        }
        packets
    }

    /// Takes one frame off the front of the buffer.
    ///
    /// `None` means more bytes are needed.
    fn next_frame(&mut self) -> Option<Result<MavPacket, ChannelError>> {
        let start = match self
            .buffer
            .iter()
            .position(|b| *b == MAV_STX_V1 || *b == MAV_STX_V2)
        {
            Some(start) => start,
            None => {
                self.stats.bytes_discarded += self.buffer.len() as u64;
                self.buffer.clear();
                return None;
            }
        };
        if start > 0 {
            self.stats.bytes_discarded += start as u64;
            self.buffer.drain(..start);
        }

        let version = if self.buffer[0] == MAV_STX_V2 {
            MavlinkVersion::V2
        } else {
            MavlinkVersion::V1
        };
        let frame_len = self.frame_len(version)?;
        if self.buffer.len() < frame_len {
            return None;
        }

        match decode_frame(&self.buffer[..frame_len], version) {
            Ok(packet) => {
                self.buffer.drain(..frame_len);
                self.stats.packets_decoded += 1;
                Some(Ok(packet))
            }
            Err(e) => {
                self.buffer.drain(..1);
                self.stats.decode_errors += 1;
                self.stats.bytes_discarded += 1;
                Some(Err(e))
            }
        }
    }

    /// Full frame length, once enough of the header is buffered to know it.
    fn frame_len(&self, version: MavlinkVersion) -> Option<usize> {
        match version {
            MavlinkVersion::V1 => {
                let payload_len = *self.buffer.get(1)? as usize;
                Some(V1_OVERHEAD + payload_len)
            }
            MavlinkVersion::V2 => {
                let payload_len = *self.buffer.get(1)? as usize;
                let incompat_flags = *self.buffer.get(2)?;
                let signature = if incompat_flags & V2_FLAG_SIGNED != 0 {
                    V2_SIGNATURE_LEN
                } else {
                    0
                };
                Some(V2_OVERHEAD + payload_len + signature)
            }
        }
    }
}

/// Decodes exactly one frame.
fn decode_frame(frame: &[u8], version: MavlinkVersion) -> Result<MavPacket, ChannelError> {
    let mut reader = PeekReader::new(Cursor::new(frame));
    let decoded = match version {
        MavlinkVersion::V1 => mavlink::read_v1_msg::<MavMessage, _>(&mut reader),
        MavlinkVersion::V2 => mavlink::read_v2_msg::<MavMessage, _>(&mut reader),
    };
    decoded
        .map(|(header, message)| MavPacket {
            header,
            message,
            version,
        })
        .map_err(|e| ChannelError::Decode(format!("{e:?}")))
}
