//! `mav_channel_utils`: the Message Channel contract and the transports behind it.
//!
//! - `packet`: `MavPacket`, a decoded MAVLink message plus header and framing version.
//! - `parser`: `MavFrameParser`, the streaming bytes-to-packets codec adapter.
//! - `channel`: the `MavChannel` trait every endpoint implements.
//! - `error`: `ChannelError` and its connection-loss classification.
//! - `queue`: `MessageQueue`, the bounded in-memory satellite MT/MO queue.
//! - `tcp`: `TcpChannel`, a channel over a TCP stream.
//! - `server`: listener binding and the outbound-only `PushChannel`.
//! - `client`: GCS-side TCP and WebSocket connections.

pub mod channel;
pub mod client;
pub mod error;
pub mod packet;
pub mod parser;
pub mod queue;
pub mod server;
pub mod tcp;

pub use channel::MavChannel;
pub use error::ChannelError;
pub use packet::MavPacket;
pub use parser::{MavFrameParser, ParserStats};
pub use queue::MessageQueue;
pub use tcp::TcpChannel;
