// spl_gateway/src/proxy_server/tcp_server.rs

//! TCP acceptor for MAVLink ground stations.
//!
//! Each accepted socket becomes a [`TcpChannel`] wrapped in a session from the
//! server's factory. The session is opened before its read loop is spawned, and the
//! read loop closes it when the connection is lost or the server stops.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gateway_models::{SessionInfo, TransportKind};
use log::{debug, error, info, warn};
use mav_channel_utils::server::transport::ServerTransport;
use mav_channel_utils::{MavChannel, TcpChannel};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use crate::proxy_server::client_session::ClientSession;
use crate::proxy_server::session_factory::SessionFactory;

/// Pause after a failed accept, e.g. when the process is out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct MavlinkTcpServer {
    addr: SocketAddr,
    factory: Arc<dyn SessionFactory>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl MavlinkTcpServer {
    /// # Arguments
    /// * `addr` - Listen address; port 0 picks a free port.
    /// * `factory` - Decides whether connections get live or shadow sessions.
    /// * `poll_interval` - Pause after a receive that yielded nothing.
    pub fn new(addr: SocketAddr, factory: Arc<dyn SessionFactory>, poll_interval: Duration) -> Self {
        Self {
            addr,
            factory,
            poll_interval,
            cancel: CancellationToken::new(),
        }
    }

    /// Ties the server's lifetime to `parent`: cancelling it stops this server too.
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Binds the listener and spawns the accept loop.
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
        info!(
            "[TcpServer] Accepting {} sessions on {}",
            self.factory.kind(),
            local_addr
        );

        tokio::spawn(accept_loop(
            listener,
            self.factory.clone(),
            self.poll_interval,
            self.cancel.clone(),
        ));
        Ok(local_addr)
    }

    /// Stops accepting, closes the listening socket and ends every read loop.
    pub fn stop(&self) {
        info!("[TcpServer] Stopping listener on {}", self.addr);
        self.cancel.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    factory: Arc<dyn SessionFactory>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer_addr)) => {
                let transport: Arc<dyn MavChannel> =
                    Arc::new(TcpChannel::with_peer(stream, peer_addr));
                let info = SessionInfo::new(
                    peer_addr.to_string(),
                    factory.kind(),
                    TransportKind::Tcp,
                    Some(peer_addr.to_string()),
                );
                let session = factory.create_session(transport.clone(), info);

                if let Err(e) = session.on_open().await {
                    warn!("[TcpServer] Could not open session for {}: {}", peer_addr, e);
                    continue;
                }
                tokio::spawn(read_loop(
                    transport,
                    session,
                    poll_interval,
                    cancel.child_token(),
                ));
            }
            Err(e) => {
                error!("[TcpServer] Accept failed: {}. Retrying in {:?}.", e, ACCEPT_BACKOFF);
                if !back_off(&cancel, ACCEPT_BACKOFF).await {
                    break;
                }
            }
        }
    }
    info!(
        "[TcpServer] Listener on {:?} closed",
        listener.local_addr().ok()
    );
}

/// Waits `delay` unless cancelled first.
///
/// # Returns
/// `false` when `cancel` fired during the wait.
async fn back_off(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Feeds packets from one connection into its session until the connection is
/// lost or the server stops, then closes the session.
async fn read_loop(
    transport: Arc<dyn MavChannel>,
    session: Arc<dyn ClientSession>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("[TcpServer] Read loop for {} cancelled", session.session_id());
                break;
            }
            received = transport.receive_message() => received,
        };

        match received {
            Ok(Some(packet)) => {
                if let Err(e) = session.on_message(packet).await {
                    if e.is_connection_loss() {
                        info!("[TcpServer] Session {} lost: {}", session.session_id(), e);
                        break;
                    }
                    warn!("[TcpServer] Session {}: {}", session.session_id(), e);
                }
            }
            Ok(None) => tokio::time::sleep(poll_interval).await,
            Err(e) if e.is_fatal() => {
                info!("[TcpServer] Session {} disconnected: {}", session.session_id(), e);
                break;
            }
            Err(e) => warn!("[TcpServer] Session {}: receive failed: {}", session.session_id(), e),
        }
    }
    session.on_close().await;
}
