// spl_gateway/src/mavlink_handler/command_ack.rs

//! Local command acknowledgement.
//!
//! A satellite round trip takes far longer than a ground station waits for
//! `COMMAND_ACK`, so the gateway answers every command itself with
//! `MAV_RESULT_ACCEPTED` while the command travels to the vehicle.

use mav_channel_utils::MavPacket;
use mavlink::common::{MavMessage, MavResult, COMMAND_ACK_DATA};

/// Builds the acknowledgement for a `COMMAND_LONG` or `COMMAND_INT`.
///
/// The ack appears to come from the command's target (`target_system`,
/// `target_component` become the header ids) and is addressed back to the sender.
/// It uses the framing version of the command. Other messages return `None`.
pub fn build_command_ack(packet: &MavPacket) -> Option<MavPacket> {
    let (command, target_system, target_component) = match &packet.message {
        MavMessage::COMMAND_LONG(data) => {
            (data.command, data.target_system, data.target_component)
        }
        MavMessage::COMMAND_INT(data) => {
            (data.command, data.target_system, data.target_component)
        }
        _ => return None,
    };

    let ack = COMMAND_ACK_DATA {
        command,
        result: MavResult::MAV_RESULT_ACCEPTED,
        target_system: packet.sysid(),
        target_component: packet.compid(),
        ..Default::default()
    };
    Some(
        MavPacket::from_ids(target_system, target_component, MavMessage::COMMAND_ACK(ack))
            .with_version(packet.version),
    )
}
