// spl_gateway/src/proxy_server/downlink_relay.rs

//! Pump from the satellite mobile-originated queue to the connected clients.
//!
//! Every downlink packet is broadcast to all live sessions; no filtering happens in
//! this direction. When a vehicle shadow is attached, the packet first updates the
//! shadow's reported state so shadow clients see what the vehicle last said.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use mav_channel_utils::{ChannelError, MavChannel, MavPacket};
use tokio_util::sync::CancellationToken;

use crate::proxy_server::connection_manager::ConnectionManager;
use crate::proxy_server::shadow::VehicleShadow;

pub struct DownlinkRelay {
    downlink: Arc<dyn MavChannel>,
    registry: Arc<ConnectionManager>,
    shadow: Option<Arc<VehicleShadow>>,
    poll_interval: Duration,
}

impl DownlinkRelay {
    /// # Arguments
    /// * `downlink` - The shared mobile-originated queue.
    /// * `registry` - Live sessions to fan packets out to.
    /// * `poll_interval` - Pause when the downlink is empty.
    pub fn new(
        downlink: Arc<dyn MavChannel>,
        registry: Arc<ConnectionManager>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            downlink,
            registry,
            shadow: None,
            poll_interval,
        }
    }

    /// Also records each relayed packet into `shadow`.
    pub fn with_shadow(mut self, shadow: Arc<VehicleShadow>) -> Self {
        self.shadow = Some(shadow);
        self
    }

    /// Delivers one downlink packet.
    ///
    /// # Returns
    /// The number of sessions that received it.
    pub async fn relay(&self, packet: MavPacket) -> usize {
        if let Some(shadow) = &self.shadow {
            if shadow.record_reported(&packet).await {
                trace!("[DownlinkRelay] {} updated the shadow", packet.name());
            }
        }
        self.registry.broadcast(&packet).await
    }

    /// Pumps the downlink until `cancel` fires or the downlink channel is lost.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ChannelError> {
        info!("[DownlinkRelay] Relaying {}", self.downlink.describe());
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.downlink.receive_message() => received,
            };

            match received {
                Ok(Some(packet)) => {
                    let delivered = self.relay(packet).await;
                    if delivered == 0 {
                        debug!("[DownlinkRelay] No live session to deliver to");
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(
                    "[DownlinkRelay] Receive from {} failed: {}",
                    self.downlink.describe(),
                    e
                ),
            }
        }
        info!("[DownlinkRelay] Stopped");
        Ok(())
    }
}
