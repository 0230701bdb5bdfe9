// mav_channel_utils/src/packet.rs

//! The packet type every channel moves.
//!
//! `MavPacket` pairs a decoded `common`-dialect message with the header it arrived
//! with and the protocol version of its frame. Packets are immutable once
//! received: they are moved from channel to handler to destination, and forwarding
//! re-encodes them with their original version and header.

use mavlink::common::MavMessage;
use mavlink::{MavHeader, MavlinkVersion, Message};

use crate::error::ChannelError;

/// Largest MAVLink 2 frame: 10 header + 255 payload + 2 CRC + 13 signature bytes.
pub const MAX_FRAME_LEN: usize = 280;

/// A decoded MAVLink message plus its frame envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct MavPacket {
    pub header: MavHeader,
    pub message: MavMessage,
    pub version: MavlinkVersion,
}

impl MavPacket {
    /// Builds a MAVLink 2 packet.
    pub fn new(header: MavHeader, message: MavMessage) -> Self {
        Self {
            header,
            message,
            version: MavlinkVersion::V2,
        }
    }

    /// Builds a MAVLink 2 packet from source ids with sequence 0.
    pub fn from_ids(system_id: u8, component_id: u8, message: MavMessage) -> Self {
        Self::new(
            MavHeader {
                system_id,
                component_id,
                sequence: 0,
            },
            message,
        )
    }

    pub fn with_version(mut self, version: MavlinkVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_sequence(mut self, sequence: u8) -> Self {
        self.header.sequence = sequence;
        self
    }

    /// Numeric message type identifier.
    pub fn msgid(&self) -> u32 {
        self.message.message_id()
    }

    /// Message name as defined by the dialect, e.g. `"COMMAND_LONG"`.
    pub fn name(&self) -> &'static str {
        self.message.message_name()
    }

    pub fn sysid(&self) -> u8 {
        self.header.system_id
    }

    pub fn compid(&self) -> u8 {
        self.header.component_id
    }

    pub fn sequence(&self) -> u8 {
        self.header.sequence
    }

    /// Serializes the packet into a complete wire frame.
    pub fn encode(&self) -> Result<Vec<u8>, ChannelError> {
        if self.version == MavlinkVersion::V1 && self.msgid() > u8::MAX as u32 {
            return Err(ChannelError::Encode(format!(
                "{} (id {}) cannot be framed as MAVLink 1",
                self.name(),
                self.msgid()
            )));
        }
        let mut buf = Vec::with_capacity(MAX_FRAME_LEN);
        mavlink::write_versioned_msg(&mut buf, self.version, self.header, &self.message)
            .map_err(|e| ChannelError::Encode(format!("{e:?}")))?;
        Ok(buf)
    }
}
