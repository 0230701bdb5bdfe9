// mav_channel_utils/src/tcp.rs

//! `MavChannel` over a TCP stream.
//!
//! The stream is split in two. The read half sits behind an async mutex together
//! with the frame parser, so `receive_message` is a genuinely blocking read. The
//! write half is owned by a dedicated writer task fed through an mpsc channel, so
//! several tasks can send to the same client without contending for the socket.

use std::collections::VecDeque;
use std::net::SocketAddr;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

use crate::channel::MavChannel;
use crate::error::ChannelError;
use crate::packet::MavPacket;
use crate::parser::MavFrameParser;

const READ_BUF_LEN: usize = 1024;
/// Frames waiting for the writer task. Beyond that, `send_message` fails with
/// `QueueFull` and the frame is dropped.
const OUTBOUND_BUFFER: usize = 64;

struct TcpReader {
    read_half: OwnedReadHalf,
    parser: MavFrameParser,
    pending: VecDeque<MavPacket>,
}

/// A client or vehicle connection carried over TCP.
pub struct TcpChannel {
    peer_addr: SocketAddr,
    reader: Mutex<TcpReader>,
    outbound_tx: mpsc::Sender<Vec<u8>>,
}

impl TcpChannel {
    /// Wraps a connected stream and spawns its writer task.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn new(stream: TcpStream) -> Result<Self, ChannelError> {
        let peer_addr = stream.peer_addr()?;
        Ok(Self::with_peer(stream, peer_addr))
    }

    /// Same as [`TcpChannel::new`] when the peer address is already known (from `accept`).
    pub fn with_peer(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("[TcpChannel] Could not set TCP_NODELAY for {}: {}", peer_addr, e);
        }
        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        tokio::spawn(write_loop(write_half, outbound_rx, peer_addr));

        Self {
            peer_addr,
            reader: Mutex::new(TcpReader {
                read_half,
                parser: MavFrameParser::new(),
                pending: VecDeque::new(),
            }),
            outbound_tx,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

/// Drains queued frames onto the socket until the channel is dropped or a write fails.
async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<Vec<u8>>,
    peer_addr: SocketAddr,
) {
    while let Some(frame) = outbound_rx.recv().await {
        if let Err(e) = write_half.write_all(&frame).await {
            warn!("[TcpChannel] Write to {} failed, stopping writer: {}", peer_addr, e);
            break;
        }
    }
    let _ = write_half.shutdown().await;
    debug!("[TcpChannel] Writer for {} finished", peer_addr);
}

#[async_trait]
impl MavChannel for TcpChannel {
    async fn receive_message(&self) -> Result<Option<MavPacket>, ChannelError> {
        let mut reader = self.reader.lock().await;
        let mut buf = [0u8; READ_BUF_LEN];
        loop {
            if let Some(packet) = reader.pending.pop_front() {
                return Ok(Some(packet));
            }
            let n = reader.read_half.read(&mut buf).await?;
            if n == 0 {
                return Err(ChannelError::Closed);
            }
            let packets = reader.parser.push(&buf[..n]);
            reader.pending.extend(packets);
        }
    }

    async fn send_message(&self, packet: MavPacket) -> Result<(), ChannelError> {
        let frame = packet.encode()?;
        self.outbound_tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::QueueFull(self.describe()),
            TrySendError::Closed(_) => ChannelError::Closed,
        })
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.peer_addr)
    }
}
