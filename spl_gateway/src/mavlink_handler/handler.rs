// spl_gateway/src/mavlink_handler/handler.rs

//! `MavlinkHandler`: routes packets from a source channel to a destination channel.
//!
//! For every packet read from `src`:
//!
//! 1. Commands are acknowledged on `src` right away, whether or not they are forwarded.
//! 2. The outbound filter decides whether the packet goes any further.
//! 3. Forwarded packets drive the mission sequencer, whose replies go back on `src`.
//! 4. The packet itself is sent, unmodified, to `dst`.
//!
//! Each handler owns its own mission state, so one handler per session keeps
//! concurrent uploads from different clients apart. The handler never reads
//! `src` itself: the acceptor's read loop feeds it one packet at a time.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, trace, warn};
use mav_channel_utils::{ChannelError, MavChannel, MavPacket};

use super::command_ack::build_command_ack;
use super::filter::should_forward;
use super::mission_sequencer::{MissionSequencer, MissionTransferState};

/// What happened to a packet passed to [`MavlinkHandler::handle_packet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Delivered to the destination channel.
    Forwarded,
    /// Rejected by the outbound filter.
    Filtered,
    /// Passed the filter but the destination refused it (e.g. a full queue).
    Dropped,
}

pub struct MavlinkHandler {
    src: Arc<dyn MavChannel>,
    dst: Arc<dyn MavChannel>,
    sequencer: Mutex<MissionSequencer>,
    reply_sequence: AtomicU8,
}

impl MavlinkHandler {
    /// # Arguments
    /// * `src` - Channel packets are read from and replies are written to.
    /// * `dst` - Channel forwarded packets are written to.
    pub fn new(src: Arc<dyn MavChannel>, dst: Arc<dyn MavChannel>) -> Self {
        Self {
            src,
            dst,
            sequencer: Mutex::new(MissionSequencer::new()),
            reply_sequence: AtomicU8::new(0),
        }
    }

    pub fn mission_state(&self) -> MissionTransferState {
        self.lock_sequencer().state()
    }

    /// Processes one packet from `src`.
    ///
    /// # Returns
    /// * `Ok(Disposition)` - What happened to the packet.
    /// * `Err(ChannelError)` - A reply could not be written to `src`, or `dst` failed
    ///   with a connection-loss error. Non-fatal `dst` errors yield
    ///   `Disposition::Dropped` instead.
    pub async fn handle_packet(&self, packet: MavPacket) -> Result<Disposition, ChannelError> {
        if let Some(ack) = build_command_ack(&packet) {
            self.reply(ack).await?;
        }

        if !should_forward(&packet) {
            trace!("[MavlinkHandler] Filtered {} from {}", packet.name(), self.src.describe());
            return Ok(Disposition::Filtered);
        }

        let mission_reply = self.lock_sequencer().handle(&packet);
        if let Some(reply) = mission_reply {
            self.reply(reply).await?;
        }

        let name = packet.name();
        match self.dst.send_message(packet).await {
            Ok(()) => {
                debug!(
                    "[MavlinkHandler] Forwarded {} from {} to {}",
                    name,
                    self.src.describe(),
                    self.dst.describe()
                );
                Ok(Disposition::Forwarded)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(
                    "[MavlinkHandler] {} dropped {} from {}: {}",
                    self.dst.describe(),
                    name,
                    self.src.describe(),
                    e
                );
                Ok(Disposition::Dropped)
            }
        }
    }

    async fn reply(&self, packet: MavPacket) -> Result<(), ChannelError> {
        let sequence = self.reply_sequence.fetch_add(1, Ordering::Relaxed);
        debug!("[MavlinkHandler] Replying {} to {}", packet.name(), self.src.describe());
        self.src.send_message(packet.with_sequence(sequence)).await
    }

    fn lock_sequencer(&self) -> MutexGuard<'_, MissionSequencer> {
        self.sequencer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
