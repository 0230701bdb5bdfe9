// mav_channel_utils/src/server/transport.rs

//! Listener setup and the push channel for callback-driven sessions.

use std::net::SocketAddr;

use async_trait::async_trait;
use log::info;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::channel::MavChannel;
use crate::error::ChannelError;
use crate::packet::MavPacket;

/// Binds listeners for the gateway's acceptors.
pub struct ServerTransport;

impl ServerTransport {
    /// Binds a TCP listener.
    ///
    /// # Arguments
    /// * `addr` - Address to listen on. Port 0 picks a free port.
    ///
    /// # Returns
    /// * `Result<(TcpListener, SocketAddr), ChannelError>` - The listener and the address
    ///   it actually bound, or `ChannelError::Io` if the bind failed.
    pub async fn bind(addr: SocketAddr) -> Result<(TcpListener, SocketAddr), ChannelError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("[ServerTransport] Listening on {}", local_addr);
        Ok((listener, local_addr))
    }
}

/// Outbound-only channel.
///
/// Sending encodes the packet and hands the frame to whatever drains the paired
/// receiver (for the WebSocket endpoint, the session's writer task). Inbound frames
/// arrive through the transport's own callbacks, so `receive_message` never yields
/// a packet.
pub struct PushChannel {
    label: String,
    outbound_tx: mpsc::Sender<Vec<u8>>,
}

impl PushChannel {
    /// Creates the channel and the receiver its frames are pushed into.
    ///
    /// # Arguments
    /// * `label` - Used by `describe()`, e.g. `"ws://<session id>"`.
    /// * `buffer` - Frames that may be pending. Beyond that, `send_message` fails
    ///   with `QueueFull` instead of waiting.
    pub fn new(label: impl Into<String>, buffer: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                label: label.into(),
                outbound_tx,
            },
            outbound_rx,
        )
    }
}

#[async_trait]
impl MavChannel for PushChannel {
    async fn receive_message(&self) -> Result<Option<MavPacket>, ChannelError> {
        Ok(None)
    }

    async fn send_message(&self, packet: MavPacket) -> Result<(), ChannelError> {
        let frame = packet.encode()?;
        self.outbound_tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::QueueFull(self.label.clone()),
            TrySendError::Closed(_) => ChannelError::Closed,
        })
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
