// spl_gateway/src/proxy_server/connection_manager.rs

//! Session registry.
//!
//! Maps session ids to the session's description and its transport. Sessions add
//! themselves on open and remove themselves on close; the downlink relay reads the
//! registry to deliver vehicle traffic.

use std::sync::Arc;

use dashmap::DashMap;
use gateway_models::SessionInfo;
use log::{debug, info, warn};
use mav_channel_utils::{MavChannel, MavPacket};

use crate::error::GatewayError;

/// A registered session.
#[derive(Clone)]
pub struct SessionEntry {
    pub info: SessionInfo,
    pub transport: Arc<dyn MavChannel>,
}

#[derive(Clone, Default)]
pub struct ConnectionManager {
    sessions: Arc<DashMap<String, SessionEntry>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session, replacing any previous entry with the same id.
    pub fn add_session(&self, info: SessionInfo, transport: Arc<dyn MavChannel>) {
        let session_id = info.session_id.clone();
        let peer = info.peer_addr.clone().unwrap_or_else(|| "-".to_string());
        if self
            .sessions
            .insert(session_id.clone(), SessionEntry { info, transport })
            .is_some()
        {
            warn!("[ConnectionManager] Replaced existing session {}", session_id);
        }
        info!(
            "[ConnectionManager] Session {} registered (peer {}), {} active",
            session_id,
            peer,
            self.sessions.len()
        );
    }

    pub fn remove_session(&self, session_id: &str) -> Option<SessionInfo> {
        match self.sessions.remove(session_id) {
            Some((_, entry)) => {
                info!(
                    "[ConnectionManager] Session {} removed, {} active",
                    session_id,
                    self.sessions.len()
                );
                Some(entry.info)
            }
            None => {
                warn!("[ConnectionManager] Tried to remove unknown session {}", session_id);
                None
            }
        }
    }

    pub fn get_transport(&self, session_id: &str) -> Option<Arc<dyn MavChannel>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(&entry.value().transport))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|entry| entry.value().info.clone())
            .collect()
    }

    /// Sends `packet` to every registered session.
    ///
    /// Delivery failures are logged and skipped; the failing session's own read
    /// loop notices the dead transport and closes it. Client transports never block
    /// here: a client whose outbound buffer is full just misses the packet.
    ///
    /// # Returns
    /// The number of sessions the packet was delivered to.
    pub async fn broadcast(&self, packet: &MavPacket) -> usize {
        // Collect first so no map shard stays locked across an await.
        let targets: Vec<(String, Arc<dyn MavChannel>)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.value().transport)))
            .collect();

        let mut delivered = 0;
        for (session_id, transport) in targets {
            match transport.send_message(packet.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    "[ConnectionManager] Broadcast of {} to {} failed: {}",
                    packet.name(),
                    session_id,
                    e
                ),
            }
        }
        debug!(
            "[ConnectionManager] Broadcast {} to {} sessions",
            packet.name(),
            delivered
        );
        delivered
    }

    /// Sends `packet` to one session.
    pub async fn send_to(&self, session_id: &str, packet: MavPacket) -> Result<(), GatewayError> {
        let transport = self
            .get_transport(session_id)
            .ok_or_else(|| GatewayError::UnknownSession(session_id.to_string()))?;
        transport.send_message(packet).await?;
        Ok(())
    }
}
