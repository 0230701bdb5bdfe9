// mav_channel_utils/src/channel.rs

//! The Message Channel contract.
//!
//! Every endpoint the gateway talks to (a client socket, a WebSocket session, the
//! satellite uplink and downlink queues, the vehicle shadow) is a `MavChannel`.
//! The routing code only ever calls these three methods and never looks at the
//! transport behind them.

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::packet::MavPacket;

/// A bidirectional MAVLink endpoint.
///
/// Receivers take `&self` so that one channel can be shared between the task that
/// reads from it and the tasks that write to it (acknowledgements from the session's
/// own handler, broadcasts from the downlink relay).
#[async_trait]
pub trait MavChannel: Send + Sync {
    /// Returns the next inbound packet.
    ///
    /// Blocking channels wait until a packet is available. Polling channels return
    /// `Ok(None)` when nothing is queued. An error for which
    /// [`ChannelError::is_fatal`] is true means the connection is lost.
    async fn receive_message(&self) -> Result<Option<MavPacket>, ChannelError>;

    /// Emits one packet.
    async fn send_message(&self, packet: MavPacket) -> Result<(), ChannelError>;

    /// Short human-readable name for log lines, e.g. `tcp://10.0.0.5:51022`.
    fn describe(&self) -> String;
}
