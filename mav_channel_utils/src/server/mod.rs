// mav_channel_utils/src/server/mod.rs

//! Server-side transport pieces: binding the TCP listener and the outbound-only
//! channel used by callback-driven transports such as WebSocket sessions.

pub mod transport;
