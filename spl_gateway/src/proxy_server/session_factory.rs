// spl_gateway/src/proxy_server/session_factory.rs

//! Chooses which kind of session an acceptor creates.
//!
//! The TCP acceptor and the WebSocket endpoint are the same for live and shadow
//! service; only the factory they are given differs.

use std::sync::Arc;

use gateway_models::{SessionInfo, SessionKind};
use mav_channel_utils::MavChannel;

use crate::proxy_server::client_session::{ClientSession, LiveClientSession};
use crate::proxy_server::connection_manager::ConnectionManager;
use crate::proxy_server::shadow::VehicleShadow;
use crate::proxy_server::shadow_session::ShadowClientSession;

pub trait SessionFactory: Send + Sync {
    fn kind(&self) -> SessionKind;

    /// Wraps a freshly accepted transport. The session is not opened yet.
    fn create_session(
        &self,
        transport: Arc<dyn MavChannel>,
        info: SessionInfo,
    ) -> Arc<dyn ClientSession>;
}

/// Creates sessions wired to the shared satellite uplink.
pub struct LiveSessionFactory {
    uplink: Arc<dyn MavChannel>,
    registry: Arc<ConnectionManager>,
}

impl LiveSessionFactory {
    pub fn new(uplink: Arc<dyn MavChannel>, registry: Arc<ConnectionManager>) -> Self {
        Self { uplink, registry }
    }
}

impl SessionFactory for LiveSessionFactory {
    fn kind(&self) -> SessionKind {
        SessionKind::Live
    }

    fn create_session(
        &self,
        transport: Arc<dyn MavChannel>,
        info: SessionInfo,
    ) -> Arc<dyn ClientSession> {
        Arc::new(LiveClientSession::new(
            info,
            transport,
            self.uplink.clone(),
            self.registry.clone(),
        ))
    }
}

/// Creates sessions served from the vehicle shadow.
pub struct ShadowSessionFactory {
    shadow: Arc<VehicleShadow>,
    registry: Arc<ConnectionManager>,
}

impl ShadowSessionFactory {
    pub fn new(shadow: Arc<VehicleShadow>, registry: Arc<ConnectionManager>) -> Self {
        Self { shadow, registry }
    }
}

impl SessionFactory for ShadowSessionFactory {
    fn kind(&self) -> SessionKind {
        SessionKind::Shadow
    }

    fn create_session(
        &self,
        transport: Arc<dyn MavChannel>,
        info: SessionInfo,
    ) -> Arc<dyn ClientSession> {
        Arc::new(ShadowClientSession::new(
            info,
            transport,
            self.shadow.clone(),
            self.registry.clone(),
        ))
    }
}
