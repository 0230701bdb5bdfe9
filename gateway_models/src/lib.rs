//! `gateway_models`: data shared across the gateway workspace.
//!
//! Everything here derives `serde::Serialize`/`Deserialize` so it can be written to
//! the settings file, shadow snapshots and structured log lines.
//!
//! - `enums`: session kind (live/shadow) and client transport kind.
//! - `session_models`: `SessionInfo`, the registry's description of a connected client.
//! - `shadow_models`: `ShadowSnapshot`, the persisted last-known vehicle state.

pub mod enums;
pub mod session_models;
pub mod shadow_models;

pub use enums::{SessionKind, TransportKind};
pub use session_models::SessionInfo;
pub use shadow_models::{ShadowHome, ShadowParam, ShadowSnapshot};
