// spl_gateway/src/mavlink_handler/filter.rs

//! Outbound allow-list.
//!
//! Every message forwarded to the uplink costs satellite airtime, so only mission,
//! parameter, mode and command traffic passes. Telemetry, heartbeats and stream
//! requests from the ground station are dropped here.

use mav_channel_utils::MavPacket;
use mavlink::common::{MavCmd, MavMessage};

/// Returns true when `packet` should be forwarded to the uplink.
///
/// `COMMAND_LONG` is allowed except for `MAV_CMD_REQUEST_AUTOPILOT_CAPABILITIES`,
/// which ground stations repeat at a high rate.
pub fn should_forward(packet: &MavPacket) -> bool {
    match &packet.message {
        MavMessage::COMMAND_LONG(data) => {
            data.command != MavCmd::MAV_CMD_REQUEST_AUTOPILOT_CAPABILITIES
        }
        MavMessage::SET_MODE(_)
        | MavMessage::PARAM_SET(_)
        | MavMessage::MISSION_REQUEST_PARTIAL_LIST(_)
        | MavMessage::MISSION_WRITE_PARTIAL_LIST(_)
        | MavMessage::MISSION_ITEM(_)
        | MavMessage::MISSION_REQUEST(_)
        | MavMessage::MISSION_SET_CURRENT(_)
        | MavMessage::MISSION_CURRENT(_)
        | MavMessage::MISSION_REQUEST_LIST(_)
        | MavMessage::MISSION_COUNT(_)
        | MavMessage::MISSION_CLEAR_ALL(_)
        | MavMessage::MISSION_REQUEST_INT(_)
        | MavMessage::MISSION_ITEM_INT(_)
        | MavMessage::COMMAND_INT(_)
        | MavMessage::SET_HOME_POSITION(_) => true,
        _ => false,
    }
}
