// spl_gateway/src/mavlink_handler/mission_sequencer.rs

//! Mission upload sequencing.
//!
//! Ground stations upload a mission by announcing `MISSION_COUNT` and then sending
//! each item when the vehicle requests it. Over the satellite link those requests
//! would take minutes each, so the gateway plays the vehicle's side of the exchange:
//! it requests items from the client one at a time and acknowledges the upload when
//! the last item arrives. The count and the items themselves are still forwarded.
//!
//! ```text
//! Idle --MISSION_COUNT(n>0)--> AwaitingItem{n, 0}     reply MISSION_REQUEST(0)
//! AwaitingItem{n, _} --ITEM(seq), seq+1<n--> AwaitingItem{n, seq+1}   reply request(seq+1)
//! AwaitingItem{n, _} --ITEM(seq), seq+1>=n--> Idle                     reply MISSION_ACK
//! ```
//!
//! There is no timeout: if the client never sends the requested item the transfer
//! stays open until the next `MISSION_COUNT` replaces it.

use mav_channel_utils::MavPacket;
use mavlink::common::{
    MavMessage, MavMissionResult, MavMissionType, MISSION_ACK_DATA, MISSION_REQUEST_DATA,
    MISSION_REQUEST_INT_DATA,
};

/// Upload progress of one routing direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissionTransferState {
    #[default]
    Idle,
    /// `expected_count` items were announced and item `requested_seq` was asked for.
    AwaitingItem {
        expected_count: u16,
        requested_seq: u16,
    },
}

impl MissionTransferState {
    /// Announced item count, 0 when idle.
    pub fn expected_count(&self) -> u16 {
        match self {
            MissionTransferState::Idle => 0,
            MissionTransferState::AwaitingItem { expected_count, .. } => *expected_count,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, MissionTransferState::Idle)
    }
}

/// Which request message follows an item.
#[derive(Debug, Clone, Copy)]
enum RequestForm {
    Legacy,
    Int,
}

/// State machine for one client-to-uplink direction. Never shared between sessions.
#[derive(Debug, Default)]
pub struct MissionSequencer {
    state: MissionTransferState,
}

impl MissionSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MissionTransferState {
        self.state
    }

    /// Advances the state machine with one client packet.
    ///
    /// # Returns
    /// The reply to send back to the client (a mission request or the final
    /// `MISSION_ACK`), or `None` when the packet does not call for one.
    pub fn handle(&mut self, packet: &MavPacket) -> Option<MavPacket> {
        match &packet.message {
            MavMessage::MISSION_COUNT(data) => {
                if data.count == 0 {
                    self.state = MissionTransferState::Idle;
                    return None;
                }
                self.state = MissionTransferState::AwaitingItem {
                    expected_count: data.count,
                    requested_seq: 0,
                };
                Some(request_item(
                    packet,
                    data.target_system,
                    data.target_component,
                    0,
                    data.mission_type,
                    RequestForm::Legacy,
                ))
            }
            MavMessage::MISSION_ITEM(data) => self.on_item(
                packet,
                data.seq,
                data.target_system,
                data.target_component,
                data.mission_type,
                RequestForm::Legacy,
            ),
            MavMessage::MISSION_ITEM_INT(data) => self.on_item(
                packet,
                data.seq,
                data.target_system,
                data.target_component,
                data.mission_type,
                RequestForm::Int,
            ),
            _ => None,
        }
    }

    fn on_item(
        &mut self,
        packet: &MavPacket,
        seq: u16,
        target_system: u8,
        target_component: u8,
        mission_type: MavMissionType,
        form: RequestForm,
    ) -> Option<MavPacket> {
        let expected_count = match self.state {
            MissionTransferState::Idle => return None,
            MissionTransferState::AwaitingItem { expected_count, .. } => expected_count,
        };

        let next_seq = u32::from(seq) + 1;
        if next_seq < u32::from(expected_count) {
            // next_seq < expected_count <= u16::MAX
            let next_seq = next_seq as u16;
            self.state = MissionTransferState::AwaitingItem {
                expected_count,
                requested_seq: next_seq,
            };
            Some(request_item(
                packet,
                target_system,
                target_component,
                next_seq,
                mission_type,
                form,
            ))
        } else {
            self.state = MissionTransferState::Idle;
            let ack = MISSION_ACK_DATA {
                target_system: packet.sysid(),
                target_component: packet.compid(),
                mavtype: MavMissionResult::MAV_MISSION_ACCEPTED,
                mission_type,
                ..Default::default()
            };
            Some(reply(packet, target_system, target_component, MavMessage::MISSION_ACK(ack)))
        }
    }
}

fn request_item(
    packet: &MavPacket,
    target_system: u8,
    target_component: u8,
    seq: u16,
    mission_type: MavMissionType,
    form: RequestForm,
) -> MavPacket {
    let message = match form {
        RequestForm::Legacy => MavMessage::MISSION_REQUEST(MISSION_REQUEST_DATA {
            seq,
            target_system: packet.sysid(),
            target_component: packet.compid(),
            mission_type,
            ..Default::default()
        }),
        RequestForm::Int => MavMessage::MISSION_REQUEST_INT(MISSION_REQUEST_INT_DATA {
            seq,
            target_system: packet.sysid(),
            target_component: packet.compid(),
            mission_type,
            ..Default::default()
        }),
    };
    reply(packet, target_system, target_component, message)
}

/// Wraps `message` as if sent by the packet's target, in the packet's framing version.
fn reply(packet: &MavPacket, system_id: u8, component_id: u8, message: MavMessage) -> MavPacket {
    MavPacket::from_ids(system_id, component_id, message).with_version(packet.version)
}
