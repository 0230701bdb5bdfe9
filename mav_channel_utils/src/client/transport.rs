// mav_channel_utils/src/client/transport.rs

//! GCS-side connections to the gateway.
//!
//! TCP clients get a full [`TcpChannel`]. WebSocket clients get a
//! [`WsClientConnection`], which frames each packet as one binary WebSocket message
//! and runs inbound binary data through a streaming parser.

use std::collections::VecDeque;
use std::net::SocketAddr;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::ChannelError;
use crate::packet::MavPacket;
use crate::parser::MavFrameParser;
use crate::tcp::TcpChannel;

/// A possibly TLS-wrapped client WebSocket stream.
pub type ClientWsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens a TCP connection to a gateway listener.
pub async fn connect_tcp(addr: SocketAddr) -> Result<TcpChannel, ChannelError> {
    info!("[Client] Connecting to tcp://{}", addr);
    let stream = TcpStream::connect(addr).await?;
    Ok(TcpChannel::with_peer(stream, addr))
}

/// An open WebSocket connection to the gateway's endpoint.
pub struct WsClientConnection {
    ws_sender: SplitSink<ClientWsStream, Message>,
    ws_receiver: SplitStream<ClientWsStream>,
    parser: MavFrameParser,
    pending: VecDeque<MavPacket>,
}

impl WsClientConnection {
    /// Connects and completes the WebSocket handshake.
    ///
    /// # Arguments
    /// * `url_str` - Full endpoint URL, e.g. `"ws://127.0.0.1:8080/ws"`.
    ///
    /// # Returns
    /// * `Result<WsClientConnection, ChannelError>` - `InvalidUrl` for an unparsable
    ///   URL, `WebSocketProtocol` when the connection or handshake fails.
    pub async fn connect(url_str: &str) -> Result<Self, ChannelError> {
        let url = Url::parse(url_str)
            .map_err(|e| ChannelError::InvalidUrl(format!("'{}': {}", url_str, e)))?;

        match connect_async(url.as_str()).await {
            Ok((ws_stream, response)) => {
                info!("[WsClient] Connected to {} (HTTP {})", url, response.status());
                let (ws_sender, ws_receiver) = ws_stream.split();
                Ok(Self {
                    ws_sender,
                    ws_receiver,
                    parser: MavFrameParser::new(),
                    pending: VecDeque::new(),
                })
            }
            Err(e) => {
                error!("[WsClient] Connection to {} failed: {}", url, e);
                Err(ChannelError::WebSocketProtocol(e))
            }
        }
    }

    /// Sends one packet as one binary message.
    pub async fn send_packet(&mut self, packet: &MavPacket) -> Result<(), ChannelError> {
        let frame = packet.encode()?;
        debug!("[WsClient] Sending {} ({} bytes)", packet.name(), frame.len());
        self.ws_sender.send(Message::Binary(frame)).await?;
        Ok(())
    }

    /// Sends raw bytes as a single binary message, for callers that batch frames.
    pub async fn send_raw(&mut self, bytes: Vec<u8>) -> Result<(), ChannelError> {
        self.ws_sender.send(Message::Binary(bytes)).await?;
        Ok(())
    }

    /// Waits for the next packet from the gateway.
    ///
    /// # Returns
    /// * `None` - The server closed the connection.
    /// * `Some(Err(_))` - The WebSocket failed.
    /// * `Some(Ok(packet))` - The next decoded packet. Text frames are ignored.
    pub async fn receive_packet(&mut self) -> Option<Result<MavPacket, ChannelError>> {
        loop {
            if let Some(packet) = self.pending.pop_front() {
                return Some(Ok(packet));
            }
            match self.ws_receiver.next().await? {
                Ok(Message::Binary(bytes)) => {
                    let packets = self.parser.push(&bytes);
                    self.pending.extend(packets);
                }
                Ok(Message::Close(frame)) => {
                    info!("[WsClient] Server closed the connection: {:?}", frame);
                    return None;
                }
                Ok(other) => {
                    debug!("[WsClient] Ignoring non-binary message: {:?}", other);
                }
                Err(e) => return Some(Err(ChannelError::WebSocketProtocol(e))),
            }
        }
    }

    /// Sends a close frame.
    pub async fn close(&mut self) -> Result<(), ChannelError> {
        self.ws_sender.close().await?;
        Ok(())
    }
}
