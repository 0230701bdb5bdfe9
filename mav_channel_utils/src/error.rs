// mav_channel_utils/src/error.rs

//! Error type shared by every MAVLink channel implementation.

use thiserror::Error;

/// Unified error for channel operations.
///
/// Variants split into two groups. Connection-loss errors (`Io`,
/// `WebSocketProtocol`, `Closed`) mean the transport is gone and the owning session
/// must be closed; see [`ChannelError::is_fatal`]. The rest concern a single packet
/// and leave the channel usable.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Underlying socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket framing or handshake failure.
    #[error("WebSocket protocol error: {0}")]
    WebSocketProtocol(#[from] tokio_tungstenite::tungstenite::Error),

    /// The peer went away or the channel's writer has stopped.
    #[error("channel closed")]
    Closed,

    /// A packet could not be serialized.
    #[error("failed to encode MAVLink packet: {0}")]
    Encode(String),

    /// Bytes did not assemble into a valid packet.
    #[error("failed to decode MAVLink frame: {0}")]
    Decode(String),

    /// A bounded queue refused the packet.
    #[error("queue '{0}' is full")]
    QueueFull(String),

    /// Malformed endpoint URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl ChannelError {
    /// True when the error means the connection is lost.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChannelError::Io(_) | ChannelError::WebSocketProtocol(_) | ChannelError::Closed
        )
    }
}
