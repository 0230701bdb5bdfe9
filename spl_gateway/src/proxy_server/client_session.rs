// spl_gateway/src/proxy_server/client_session.rs

//! Client sessions.
//!
//! A session binds one ground-station transport to the gateway for the lifetime of
//! the connection. Acceptors drive it through `on_open`, one `on_message` per
//! inbound packet, and `on_close`.

use std::sync::Arc;

use async_trait::async_trait;
use gateway_models::SessionInfo;
use log::{debug, info};
use mav_channel_utils::{MavChannel, MavPacket};

use crate::error::GatewayError;
use crate::mavlink_handler::{MavlinkHandler, MissionTransferState};
use crate::proxy_server::connection_manager::ConnectionManager;

/// Lifecycle of one connected client.
#[async_trait]
pub trait ClientSession: Send + Sync {
    fn info(&self) -> &SessionInfo;

    fn session_id(&self) -> &str {
        &self.info().session_id
    }

    /// Registers the session. Runs before the first `on_message`.
    async fn on_open(&self) -> Result<(), GatewayError>;

    /// Handles one packet from the client.
    ///
    /// An error for which [`GatewayError::is_connection_loss`] is true means the
    /// client's transport is gone and the acceptor must close the session.
    async fn on_message(&self, packet: MavPacket) -> Result<(), GatewayError>;

    /// Deregisters the session. Called once, after the last `on_message`.
    async fn on_close(&self);

    /// Upload progress of this session's own handler.
    fn mission_state(&self) -> MissionTransferState;
}

/// Session that forwards to the shared satellite uplink.
///
/// Downlink traffic reaches the client through the registry entry added in
/// `on_open` (see the downlink relay).
pub struct LiveClientSession {
    info: SessionInfo,
    transport: Arc<dyn MavChannel>,
    handler: MavlinkHandler,
    registry: Arc<ConnectionManager>,
}

impl LiveClientSession {
    /// # Arguments
    /// * `transport` - The client's channel.
    /// * `uplink` - The shared mobile-terminated queue.
    /// * `registry` - Registry of live sessions used for downlink fan-out.
    pub fn new(
        info: SessionInfo,
        transport: Arc<dyn MavChannel>,
        uplink: Arc<dyn MavChannel>,
        registry: Arc<ConnectionManager>,
    ) -> Self {
        let handler = MavlinkHandler::new(transport.clone(), uplink);
        Self {
            info,
            transport,
            handler,
            registry,
        }
    }
}

#[async_trait]
impl ClientSession for LiveClientSession {
    fn info(&self) -> &SessionInfo {
        &self.info
    }

    async fn on_open(&self) -> Result<(), GatewayError> {
        self.registry
            .add_session(self.info.clone(), self.transport.clone());
        info!(
            "[ClientSession] Opened {} session {} ({})",
            self.info.transport,
            self.info.session_id,
            self.transport.describe()
        );
        Ok(())
    }

    async fn on_message(&self, packet: MavPacket) -> Result<(), GatewayError> {
        let disposition = self.handler.handle_packet(packet).await?;
        debug!("[ClientSession] {}: {:?}", self.info.session_id, disposition);
        Ok(())
    }

    async fn on_close(&self) {
        self.registry.remove_session(&self.info.session_id);
        info!("[ClientSession] Closed session {}", self.info.session_id);
    }

    fn mission_state(&self) -> MissionTransferState {
        self.handler.mission_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_models::{SessionKind, TransportKind};
    use mav_channel_utils::MessageQueue;
    use mavlink::common::{MavMessage, MISSION_COUNT_DATA, MISSION_ITEM_DATA};

    fn session(
        id: &str,
        uplink: Arc<MessageQueue>,
        registry: Arc<ConnectionManager>,
    ) -> (LiveClientSession, Arc<MessageQueue>) {
        let transport = Arc::new(MessageQueue::new(id, 32));
        let info = SessionInfo::new(id, SessionKind::Live, TransportKind::Tcp, None);
        let session = LiveClientSession::new(info, transport.clone(), uplink, registry);
        (session, transport)
    }

    fn count(n: u16) -> MavPacket {
        MavPacket::from_ids(
            255,
            190,
            MavMessage::MISSION_COUNT(MISSION_COUNT_DATA {
                count: n,
                target_system: 1,
                target_component: 1,
                ..Default::default()
            }),
        )
    }

    fn mission_item(seq: u16) -> MavPacket {
        MavPacket::from_ids(
            255,
            190,
            MavMessage::MISSION_ITEM(MISSION_ITEM_DATA {
                seq,
                target_system: 1,
                target_component: 1,
                ..Default::default()
            }),
        )
    }

    fn requested_seq(packet: &MavPacket) -> Option<u16> {
        match &packet.message {
            MavMessage::MISSION_REQUEST(data) => Some(data.seq),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_open_and_close_maintain_registry() {
        let uplink = Arc::new(MessageQueue::new("mt", 8));
        let registry = Arc::new(ConnectionManager::new());
        let (session, _) = session("a", uplink, registry.clone());

        session.on_open().await.expect("open");
        assert_eq!(registry.session_count(), 1);
        assert_eq!(session.session_id(), "a");

        session.on_close().await;
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn test_sessions_keep_independent_mission_state() {
        let uplink = Arc::new(MessageQueue::new("mt", 16));
        let registry = Arc::new(ConnectionManager::new());
        let (a, a_transport) = session("a", uplink.clone(), registry.clone());
        let (b, b_transport) = session("b", uplink.clone(), registry.clone());
        a.on_open().await.expect("open a");
        b.on_open().await.expect("open b");

        a.on_message(count(3)).await.expect("a count");
        b.on_message(count(2)).await.expect("b count");
        b.on_message(mission_item(0)).await.expect("b item 0");
        b.on_message(mission_item(1)).await.expect("b item 1");

        // b finished its upload without touching a's transfer.
        assert!(b.mission_state().is_idle());
        assert_eq!(
            a.mission_state(),
            MissionTransferState::AwaitingItem {
                expected_count: 3,
                requested_seq: 0,
            }
        );
        let b_replies = b_transport.drain();
        assert_eq!(b_replies.len(), 3);
        assert!(matches!(
            b_replies.last().map(|p| &p.message),
            Some(MavMessage::MISSION_ACK(_))
        ));

        a.on_message(mission_item(0)).await.expect("a item 0");
        let a_replies = a_transport.drain();
        assert_eq!(
            a_replies.iter().filter_map(requested_seq).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert_eq!(
            a.mission_state(),
            MissionTransferState::AwaitingItem {
                expected_count: 3,
                requested_seq: 1,
            }
        );
        assert!(b_transport.is_empty());
        assert_eq!(uplink.len(), 5);
    }
}
