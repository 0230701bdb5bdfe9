// spl_gateway/src/proxy_server/service.rs

//! Top-level wiring of the gateway.
//!
//! `GatewayService::start` builds the satellite MT/MO queues, the live session
//! registry, the TCP server, the WebSocket endpoint and the downlink relay, plus
//! the shadow TCP server when enabled. All of them hang off one cancellation token,
//! so `stop` shuts everything down together.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info, warn};
use mav_channel_utils::MessageQueue;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::error::GatewayError;
use crate::proxy_server::connection_manager::ConnectionManager;
use crate::proxy_server::downlink_relay::DownlinkRelay;
use crate::proxy_server::session_factory::{LiveSessionFactory, ShadowSessionFactory};
use crate::proxy_server::shadow::{save_quietly, VehicleShadow};
use crate::proxy_server::tcp_server::MavlinkTcpServer;
use crate::proxy_server::ws_endpoint::WsService;

/// Addresses the gateway actually bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayAddrs {
    pub tcp: SocketAddr,
    pub websocket: SocketAddr,
    pub shadow: Option<SocketAddr>,
}

pub struct GatewayService {
    uplink: Arc<MessageQueue>,
    downlink: Arc<MessageQueue>,
    registry: Arc<ConnectionManager>,
    shadow_registry: Arc<ConnectionManager>,
    shadow: Option<Arc<VehicleShadow>>,
    addrs: GatewayAddrs,
    cancel: CancellationToken,
}

impl GatewayService {
    /// Starts every listener and the downlink relay.
    ///
    /// A listener that fails to bind stops whatever was already started and the
    /// error is returned.
    pub async fn start(config: &AppConfig) -> Result<Self, GatewayError> {
        let cancel = CancellationToken::new();

        let uplink = Arc::new(MessageQueue::new("mt", config.queues.mt_capacity));
        let downlink = Arc::new(MessageQueue::new("mo", config.queues.mo_capacity));
        let registry = Arc::new(ConnectionManager::new());
        let shadow_registry = Arc::new(ConnectionManager::new());

        let shadow = if config.shadow.enabled {
            let shadow = match &config.shadow.snapshot_path {
                Some(path) => VehicleShadow::load(path)?,
                None => VehicleShadow::new(),
            };
            Some(Arc::new(shadow))
        } else {
            None
        };

        let result = Self::start_listeners(
            config,
            &cancel,
            uplink.clone(),
            downlink.clone(),
            registry.clone(),
            shadow_registry.clone(),
            shadow.clone(),
        )
        .await;

        match result {
            Ok(addrs) => {
                info!(
                    "[GatewayService] Started: tcp={} ws={} shadow={:?}",
                    addrs.tcp, addrs.websocket, addrs.shadow
                );
                Ok(Self {
                    uplink,
                    downlink,
                    registry,
                    shadow_registry,
                    shadow,
                    addrs,
                    cancel,
                })
            }
            Err(e) => {
                cancel.cancel();
                Err(e)
            }
        }
    }

    async fn start_listeners(
        config: &AppConfig,
        cancel: &CancellationToken,
        uplink: Arc<MessageQueue>,
        downlink: Arc<MessageQueue>,
        registry: Arc<ConnectionManager>,
        shadow_registry: Arc<ConnectionManager>,
        shadow: Option<Arc<VehicleShadow>>,
    ) -> Result<GatewayAddrs, GatewayError> {
        let poll_interval = config.handler.poll_interval();
        let live_factory = Arc::new(LiveSessionFactory::new(uplink, registry.clone()));

        let tcp = MavlinkTcpServer::new(config.tcp.socket_addr()?, live_factory.clone(), poll_interval)
            .with_parent(cancel)
            .start()
            .await?;

        let websocket = WsService::new(
            config.websocket.socket_addr()?,
            config.websocket.path.clone(),
            live_factory,
        )
        .with_parent(cancel)
        .start()
        .await?;

        let mut relay = DownlinkRelay::new(downlink, registry, poll_interval);
        let shadow_addr = match shadow {
            Some(shadow) => {
                relay = relay.with_shadow(shadow.clone());
                let factory = Arc::new(ShadowSessionFactory::new(shadow, shadow_registry));
                let addr = MavlinkTcpServer::new(config.shadow.socket_addr()?, factory, poll_interval)
                    .with_parent(cancel)
                    .start()
                    .await?;
                Some(addr)
            }
            None => None,
        };

        let relay_cancel = cancel.child_token();
        tokio::spawn(async move {
            if let Err(e) = relay.run(relay_cancel).await {
                error!("[GatewayService] Downlink relay stopped: {}", e);
            }
        });

        Ok(GatewayAddrs {
            tcp,
            websocket,
            shadow: shadow_addr,
        })
    }

    pub fn addrs(&self) -> GatewayAddrs {
        self.addrs
    }

    /// Satellite mobile-terminated queue: everything clients send upstream.
    pub fn uplink(&self) -> Arc<MessageQueue> {
        self.uplink.clone()
    }

    /// Satellite mobile-originated queue: the bearer backend pushes vehicle traffic here.
    pub fn downlink(&self) -> Arc<MessageQueue> {
        self.downlink.clone()
    }

    /// Live sessions.
    pub fn registry(&self) -> Arc<ConnectionManager> {
        self.registry.clone()
    }

    pub fn shadow_registry(&self) -> Arc<ConnectionManager> {
        self.shadow_registry.clone()
    }

    pub fn shadow(&self) -> Option<Arc<VehicleShadow>> {
        self.shadow.clone()
    }

    /// Stops every listener, session and the relay, then saves the shadow.
    pub async fn stop(&self) {
        info!("[GatewayService] Stopping");
        self.cancel.cancel();
        if let Some(shadow) = &self.shadow {
            save_quietly(shadow).await;
        }
        let pending = self.uplink.len();
        if pending > 0 {
            warn!(
                "[GatewayService] {} packets left in the uplink queue at shutdown",
                pending
            );
        }
    }
}
