// spl_gateway/src/proxy_server/ws_endpoint.rs

//! WebSocket endpoint for browser ground stations.
//!
//! Binary messages carry raw MAVLink frames. A message may hold several frames, or
//! a frame may span messages; each connection keeps its own parser so both work.
//! Outbound packets travel through a [`PushChannel`] drained by a per-connection
//! sender task.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use gateway_models::{SessionInfo, TransportKind};
use log::{debug, error, info, warn};
use mav_channel_utils::server::transport::{PushChannel, ServerTransport};
use mav_channel_utils::{MavChannel, MavFrameParser};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::proxy_server::session_factory::SessionFactory;

/// Frames queued for one client. Further sends fail with `QueueFull` and are dropped.
const OUTBOUND_BUFFER: usize = 64;

struct WsState {
    factory: Arc<dyn SessionFactory>,
    cancel: CancellationToken,
}

pub struct WsService {
    addr: SocketAddr,
    path: String,
    factory: Arc<dyn SessionFactory>,
    cancel: CancellationToken,
}

impl WsService {
    /// # Arguments
    /// * `addr` - Listen address; port 0 picks a free port.
    /// * `path` - Route the endpoint is mounted on, e.g. `/ws`.
    /// * `factory` - Creates the session for each upgraded connection.
    pub fn new(addr: SocketAddr, path: impl Into<String>, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            addr,
            path: path.into(),
            factory,
            cancel: CancellationToken::new(),
        }
    }

    /// Ties the endpoint's lifetime to `parent`.
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Binds the listener and serves the endpoint in the background.
    ///
    /// # Returns
    /// * `Ok(SocketAddr)` - The address actually bound.
    /// * `Err(GatewayError::Bind)` - The address could not be bound.
    pub async fn start(&self) -> Result<SocketAddr, GatewayError> {
        let (listener, local_addr) =
            ServerTransport::bind(self.addr)
                .await
                .map_err(|source| GatewayError::Bind {
                    addr: self.addr.to_string(),
                    source,
                })?;

        let state = Arc::new(WsState {
            factory: self.factory.clone(),
            cancel: self.cancel.clone(),
        });
        let router = Router::new()
            .route(&self.path, get(ws_handler))
            .with_state(state);

        let shutdown = self.cancel.clone();
        tokio::spawn(async move {
            let server = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = server.await {
                error!("[WsService] Server exited with error: {}", e);
            }
        });

        info!(
            "[WsService] Accepting {} sessions on ws://{}{}",
            self.factory.kind(),
            local_addr,
            self.path
        );
        Ok(local_addr)
    }

    /// Stops the listener and ends every open WebSocket session.
    pub fn stop(&self) {
        info!("[WsService] Stopping endpoint on {}", self.addr);
        self.cancel.cancel();
    }
}

async fn ws_handler(
    State(state): State<Arc<WsState>>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, peer_addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<WsState>, peer_addr: SocketAddr) {
    let session_id = Uuid::new_v4().to_string();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (push, mut outbound_rx) = PushChannel::new(format!("ws://{}", session_id), OUTBOUND_BUFFER);
    let transport: Arc<dyn MavChannel> = Arc::new(push);
    let info = SessionInfo::new(
        session_id.clone(),
        state.factory.kind(),
        TransportKind::WebSocket,
        Some(peer_addr.to_string()),
    );
    let session = state.factory.create_session(transport.clone(), info);

    let sender_session_id = session_id.clone();
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = ws_sender.send(Message::Binary(frame)).await {
                debug!("[WsService] Send to {} failed: {}", sender_session_id, e);
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    if let Err(e) = session.on_open().await {
        warn!("[WsService] Could not open session {}: {}", session_id, e);
        drop(session);
        drop(transport);
        let _ = sender_task.await;
        return;
    }

    let mut parser = MavFrameParser::new();
    'receive: loop {
        let next = tokio::select! {
            _ = state.cancel.cancelled() => break,
            next = ws_receiver.next() => next,
        };

        match next {
            Some(Ok(Message::Binary(bytes))) => {
                for packet in parser.push(&bytes) {
                    if let Err(e) = session.on_message(packet).await {
                        if e.is_connection_loss() {
                            info!("[WsService] Session {} lost: {}", session_id, e);
                            break 'receive;
                        }
                        warn!("[WsService] Session {}: {}", session_id, e);
                    }
                }
            }
            Some(Ok(Message::Text(_))) => {
                debug!("[WsService] Ignoring text message from {}", session_id);
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                info!("[WsService] Session {} receive error: {}", session_id, e);
                break;
            }
        }
    }

    let stats = parser.stats();
    if stats.decode_errors > 0 || stats.bytes_discarded > 0 {
        info!(
            "[WsService] Session {} parser: {} decoded, {} decode errors, {} bytes discarded",
            session_id, stats.packets_decoded, stats.decode_errors, stats.bytes_discarded
        );
    }

    session.on_close().await;
    // The sender task ends once the last handle on the push channel is gone.
    drop(session);
    drop(transport);
    let _ = sender_task.await;
}
