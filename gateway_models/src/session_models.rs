// gateway_models/src/session_models.rs

//! Descriptors for connected client sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{SessionKind, TransportKind};

/// Public description of one client session, as kept by the session registry.
///
/// The identifier is derived from the transport: the remote socket address for TCP
/// clients, a generated UUID for WebSocket sessions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionInfo {
    /// Unique identifier of the session within one server instance.
    pub session_id: String,
    /// Live passthrough or shadow.
    pub kind: SessionKind,
    /// Transport the client connected over.
    pub transport: TransportKind,
    /// Remote endpoint, when the transport exposes one.
    pub peer_addr: Option<String>,
    /// When the session was opened (UTC).
    pub connected_at: DateTime<Utc>,
}

impl SessionInfo {
    /// Describes a session opened now.
    pub fn new(
        session_id: impl Into<String>,
        kind: SessionKind,
        transport: TransportKind,
        peer_addr: Option<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            kind,
            transport,
            peer_addr,
            connected_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_info_new() {
        let info = SessionInfo::new(
            "127.0.0.1:40000",
            SessionKind::Live,
            TransportKind::Tcp,
            Some("127.0.0.1:40000".to_string()),
        );
        assert_eq!(info.session_id, "127.0.0.1:40000");
        assert_eq!(info.kind, SessionKind::Live);
        assert!(info.connected_at <= Utc::now());
    }

    #[test]
    fn test_session_info_json_shape() {
        let info = SessionInfo::new("abc", SessionKind::Shadow, TransportKind::WebSocket, None);
        let json = serde_json::to_value(&info).expect("serialize SessionInfo");
        assert_eq!(json["session_id"], "abc");
        assert_eq!(json["kind"], "Shadow");
        assert_eq!(json["transport"], "WebSocket");
        assert!(json["peer_addr"].is_null());
    }
}
