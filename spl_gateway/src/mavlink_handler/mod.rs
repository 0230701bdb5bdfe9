// spl_gateway/src/mavlink_handler/mod.rs

//! Per-packet protocol logic.
//!
//! - `filter`: which client messages are worth satellite uplink capacity.
//! - `command_ack`: immediate local `COMMAND_ACK` for commands.
//! - `mission_sequencer`: drives mission uploads one item at a time.
//! - `handler`: `MavlinkHandler`, which composes the three between a source and a
//!   destination channel.

pub mod command_ack;
pub mod filter;
pub mod handler;
pub mod mission_sequencer;

pub use handler::{Disposition, MavlinkHandler};
pub use mission_sequencer::{MissionSequencer, MissionTransferState};
