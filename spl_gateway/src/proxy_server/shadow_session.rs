// spl_gateway/src/proxy_server/shadow_session.rs

//! Session of the shadow server.
//!
//! Same lifecycle as a live session, but nothing reaches the satellite. Queries are
//! answered from the [`VehicleShadow`]; everything else goes through a
//! `MavlinkHandler` whose destination is a [`ShadowChannel`], so commands are still
//! acknowledged, mission uploads are still sequenced, and allowed writes update the
//! shadow.

use std::sync::Arc;

use async_trait::async_trait;
use gateway_models::SessionInfo;
use log::{debug, info};
use mav_channel_utils::{MavChannel, MavPacket};

use crate::error::GatewayError;
use crate::mavlink_handler::{MavlinkHandler, MissionTransferState};
use crate::proxy_server::client_session::ClientSession;
use crate::proxy_server::connection_manager::ConnectionManager;
use crate::proxy_server::shadow::{ShadowChannel, VehicleShadow};

pub struct ShadowClientSession {
    info: SessionInfo,
    transport: Arc<dyn MavChannel>,
    shadow: Arc<VehicleShadow>,
    handler: MavlinkHandler,
    registry: Arc<ConnectionManager>,
}

impl ShadowClientSession {
    pub fn new(
        info: SessionInfo,
        transport: Arc<dyn MavChannel>,
        shadow: Arc<VehicleShadow>,
        registry: Arc<ConnectionManager>,
    ) -> Self {
        let sink: Arc<dyn MavChannel> = Arc::new(ShadowChannel::new(shadow.clone()));
        let handler = MavlinkHandler::new(transport.clone(), sink);
        Self {
            info,
            transport,
            shadow,
            handler,
            registry,
        }
    }
}

#[async_trait]
impl ClientSession for ShadowClientSession {
    fn info(&self) -> &SessionInfo {
        &self.info
    }

    async fn on_open(&self) -> Result<(), GatewayError> {
        self.registry
            .add_session(self.info.clone(), self.transport.clone());
        info!(
            "[ShadowSession] Opened session {} ({})",
            self.info.session_id,
            self.transport.describe()
        );
        Ok(())
    }

    async fn on_message(&self, packet: MavPacket) -> Result<(), GatewayError> {
        if let Some(replies) = self.shadow.answer_query(&packet).await {
            debug!(
                "[ShadowSession] {}: answered {} locally",
                self.info.session_id,
                packet.name()
            );
            for reply in replies {
                self.transport.send_message(reply).await?;
            }
            return Ok(());
        }
        self.handler.handle_packet(packet).await?;
        Ok(())
    }

    async fn on_close(&self) {
        self.registry.remove_session(&self.info.session_id);
        info!("[ShadowSession] Closed session {}", self.info.session_id);
    }

    fn mission_state(&self) -> MissionTransferState {
        self.handler.mission_state()
    }
}
