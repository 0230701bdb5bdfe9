//! Shared enums.
//!
//! Enums used by more than one crate in the gateway workspace. All of them derive
//! `Serialize`, `Deserialize`, `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq` and `Hash`
//! so they can travel through the settings file, snapshots and log lines, and be used
//! as map keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which downstream a client session is wired to.
///
/// The acceptors are identical for both kinds; only the session factory a server
/// is built with decides which one a new connection gets.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Live passthrough: filtered client traffic goes to the satellite uplink queue
    /// and satellite downlink traffic is relayed back to the client.
    Live,
    /// Shadow: the session only reads and writes the locally cached vehicle state
    /// and never touches the satellite queues.
    Shadow,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The client-facing transport a session arrived on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Raw MAVLink over a TCP socket.
    Tcp,
    /// MAVLink bytes carried in WebSocket binary frames.
    WebSocket,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp => write!(f, "tcp"),
            TransportKind::WebSocket => write!(f, "ws"),
        }
    }
}
