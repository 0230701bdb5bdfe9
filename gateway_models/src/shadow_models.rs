// gateway_models/src/shadow_models.rs

//! Serializable snapshot of the vehicle shadow.
//!
//! The shadow is the gateway's locally held copy of the last-known vehicle state.
//! GCS clients connected to the shadow server query and edit it without spending
//! satellite bandwidth. `ShadowSnapshot` is the form it takes on disk.

use chrono::{DateTime, Utc};
use mavlink::common::{MavParamType, MISSION_ITEM_INT_DATA};
use serde::{Deserialize, Serialize};

/// Length of the fixed-size MAVLink parameter id field.
pub const PARAM_ID_LEN: usize = 16;

/// One on-board parameter as last seen or last set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ShadowParam {
    /// Parameter name, at most 16 characters.
    pub param_id: String,
    /// Parameter value (MAVLink carries every type in a float).
    pub param_value: f32,
    /// On-board type of the value.
    pub param_type: MavParamType,
}

/// Home position in MAVLink integer form (degrees * 1e7, millimetres).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowHome {
    pub latitude: i32,
    pub longitude: i32,
    pub altitude: i32,
}

/// Everything the shadow knows about the vehicle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ShadowSnapshot {
    /// Parameters ordered by id.
    pub params: Vec<ShadowParam>,
    /// Mission items, index == `seq`.
    pub mission: Vec<MISSION_ITEM_INT_DATA>,
    /// Home position, if one was set or reported.
    pub home: Option<ShadowHome>,
    /// Autopilot-specific flight mode, if known.
    pub custom_mode: Option<u32>,
    /// Last change to any of the above.
    pub updated_at: Option<DateTime<Utc>>,
}

impl ShadowSnapshot {
    /// Parses a snapshot previously written by [`ShadowSnapshot::to_json`].
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Pretty-printed JSON form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Reads a NUL-padded MAVLink parameter id.
pub fn decode_param_id(raw: &[u8; PARAM_ID_LEN]) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(PARAM_ID_LEN);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Encodes a parameter name into the fixed 16-byte field, truncating longer names.
pub fn encode_param_id(name: &str) -> [u8; PARAM_ID_LEN] {
    let mut raw = [0u8; PARAM_ID_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(PARAM_ID_LEN);
    raw[..len].copy_from_slice(&bytes[..len]);
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_id_encoding() {
        let raw = encode_param_id("WP_RADIUS");
        assert_eq!(&raw[..9], b"WP_RADIUS");
        assert!(raw[9..].iter().all(|b| *b == 0));
        assert_eq!(decode_param_id(&raw), "WP_RADIUS");

        // Exactly 16 characters has no terminator.
        let full = encode_param_id("ABCDEFGHIJKLMNOPQRST");
        assert_eq!(decode_param_id(&full), "ABCDEFGHIJKLMNOP");
    }

    #[test]
    fn test_snapshot_json_cycle() {
        let snapshot = ShadowSnapshot {
            params: vec![ShadowParam {
                param_id: "CRUISE_SPEED".to_string(),
                param_value: 2.5,
                param_type: MavParamType::MAV_PARAM_TYPE_REAL32,
            }],
            mission: vec![MISSION_ITEM_INT_DATA {
                seq: 0,
                x: 473_977_418,
                y: 85_455_939,
                z: 10.0,
                ..Default::default()
            }],
            home: Some(ShadowHome {
                latitude: 473_977_418,
                longitude: 85_455_939,
                altitude: 488_000,
            }),
            custom_mode: Some(10),
            updated_at: Some(Utc::now()),
        };

        let json = snapshot.to_json().expect("snapshot to json");
        let back = ShadowSnapshot::from_json(&json).expect("snapshot from json");
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_empty_snapshot_default() {
        let snapshot = ShadowSnapshot::default();
        assert!(snapshot.params.is_empty());
        assert!(snapshot.mission.is_empty());
        assert!(snapshot.home.is_none());
        assert!(snapshot.updated_at.is_none());
    }
}
