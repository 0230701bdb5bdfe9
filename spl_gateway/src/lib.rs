//! `spl_gateway`: MAVLink gateway for satellite-linked vehicles.
//!
//! Ground control stations connect over TCP or WebSocket as if the vehicle were on
//! the other end. The gateway keeps the costly satellite uplink quiet: only mission,
//! parameter, mode and command traffic is queued for the vehicle, commands are
//! acknowledged locally, and mission uploads are sequenced item by item at the
//! gateway. A shadow server answers from the last-known vehicle state without using
//! the satellite at all.
//!
//! Modules:
//! - `config`: settings file loading and global access.
//! - `error`: `GatewayError`.
//! - `mavlink_handler`: outbound filter, command acknowledger, mission sequencer and
//!   the routing handler composing them.
//! - `proxy_server`: sessions, acceptors, session registry, downlink relay, vehicle
//!   shadow and the service wiring them together.

pub mod config;
pub mod error;
pub mod mavlink_handler;
pub mod proxy_server;
