// mav_channel_utils/src/queue.rs

//! In-memory satellite message queue.
//!
//! The gateway's uplink (mobile-terminated, MT) and downlink (mobile-originated, MO)
//! are bounded FIFOs. The bearer backend that actually moves payloads over the
//! satellite network drains MT and fills MO through the same `MavChannel` contract,
//! so `MessageQueue` is both the production hand-off point and the test double for
//! any channel.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use log::{debug, warn};

use crate::channel::MavChannel;
use crate::error::ChannelError;
use crate::packet::MavPacket;

/// Bounded packet FIFO with polling receive semantics.
#[derive(Debug)]
pub struct MessageQueue {
    name: String,
    capacity: usize,
    packets: Mutex<VecDeque<MavPacket>>,
}

impl MessageQueue {
    /// Creates an empty queue.
    ///
    /// # Arguments
    /// * `name` - Label used in logs and in `QueueFull` errors (e.g. `"mt"`).
    /// * `capacity` - Maximum number of queued packets. A capacity of 0 is raised to 1.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity: capacity.max(1),
            packets: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<MavPacket> {
        self.lock().drain(..).collect()
    }

    /// Synchronous enqueue, used by the bearer backend and by `send_message`.
    pub fn push(&self, packet: MavPacket) -> Result<(), ChannelError> {
        let mut packets = self.lock();
        if packets.len() >= self.capacity {
            warn!(
                "[MessageQueue:{}] Full ({} packets), rejecting {}",
                self.name,
                self.capacity,
                packet.name()
            );
            return Err(ChannelError::QueueFull(self.name.clone()));
        }
        debug!("[MessageQueue:{}] Queued {}", self.name, packet.name());
        packets.push_back(packet);
        Ok(())
    }

    /// Synchronous dequeue.
    pub fn pop(&self) -> Option<MavPacket> {
        self.lock().pop_front()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<MavPacket>> {
        // Poisoning leaves the deque intact.
        self.packets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MavChannel for MessageQueue {
    async fn receive_message(&self) -> Result<Option<MavPacket>, ChannelError> {
        Ok(self.pop())
    }

    async fn send_message(&self, packet: MavPacket) -> Result<(), ChannelError> {
        self.push(packet)
    }

    fn describe(&self) -> String {
        format!("queue://{}", self.name)
    }
}
